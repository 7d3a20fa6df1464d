//! Resource directory
//!
//! Per-region image listings, rebuilt from scratch every time they are
//! needed. Nothing here is cached between calls.

use super::error::{AggregatedError, DispatchError};
use super::fanout::fan_out;
use crate::provider::image::{Image, ListFilter};
use crate::provider::regions::RegionRegistry;
use crate::provider::RegionClient;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Region name to images, each list ascending by creation time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResourceDirectory {
    regions: BTreeMap<String, Vec<Image>>,
}

impl ResourceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a region's listing, sorting it oldest first
    pub fn insert(&mut self, region: impl Into<String>, mut images: Vec<Image>) {
        sort_by_creation(&mut images);
        self.regions.insert(region.into(), images);
    }

    pub fn get(&self, region: &str) -> Option<&[Image]> {
        self.regions.get(region).map(|v| v.as_slice())
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Image])> {
        self.regions
            .iter()
            .map(|(region, images)| (region.as_str(), images.as_slice()))
    }

    /// Number of regions with a listing (possibly empty)
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn image_count(&self) -> usize {
        self.regions.values().map(Vec::len).sum()
    }

    /// True when no region listed a single image
    pub fn is_empty(&self) -> bool {
        self.image_count() == 0
    }

    /// Region owning `image_id`, if any listing contains it
    pub fn region_of(&self, image_id: &str) -> Option<&str> {
        self.iter()
            .find(|(_, images)| images.iter().any(|image| image.id == image_id))
            .map(|(region, _)| region)
    }

    /// Find an image by id across all regions
    pub fn find(&self, image_id: &str) -> Option<&Image> {
        self.regions
            .values()
            .flat_map(|images| images.iter())
            .find(|image| image.id == image_id)
    }

    /// All images of all regions in one list, region by region
    pub fn flatten(&self) -> Vec<&Image> {
        self.regions.values().flat_map(|images| images.iter()).collect()
    }
}

/// Sort images oldest first. Stable, so images with equal or missing
/// creation times keep the order the backend returned them in; missing
/// times sort before any known time.
pub fn sort_by_creation(images: &mut [Image]) {
    images.sort_by_key(|image| image.creation_time);
}

/// List images in every registered region concurrently.
///
/// A failing region contributes a listing error and is absent from the
/// directory; all other regions are still returned.
pub async fn build_directory<C>(
    registry: &RegionRegistry<C>,
    filter: &ListFilter,
) -> (ResourceDirectory, Option<AggregatedError>)
where
    C: RegionClient + 'static,
{
    let units = registry.iter().map(|(region, client)| {
        let region = region.to_string();
        let client = Arc::clone(client);
        let filter = filter.clone();
        let unit_region = region.clone();

        let unit = async move {
            client
                .list_images(&filter)
                .await
                .map_err(|e| DispatchError::listing(unit_region, e))
        };
        (region, unit)
    });

    let outcome = fan_out(units).await;

    let mut directory = ResourceDirectory::new();
    for (region, images) in outcome.results {
        directory.insert(region, images);
    }

    tracing::info!(
        "Listed {} images in {} of {} regions",
        directory.image_count(),
        directory.region_count(),
        registry.len()
    );

    (directory, outcome.errors)
}
