//! Operation dispatcher
//!
//! The single execution path for every image operation that touches more
//! than one region.

use super::directory::{build_directory, ResourceDirectory};
use super::error::{AggregatedError, DispatchError, DispatchResult};
use super::fanout::fan_out;
use super::resolver::{resolve, RegionMatches};
use crate::provider::image::{CopyImageInput, ListFilter, Tag};
use crate::provider::regions::RegionRegistry;
use crate::provider::RegionClient;
use anyhow::anyhow;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Copy one source image into other regions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub source_id: String,
    pub destinations: Vec<String>,
    /// Empty means "use the source image's description"
    pub description: String,
    pub dry_run: bool,
}

/// Destination region to new image id
pub type CopiedImages = BTreeMap<String, String>;

/// Routes image operations to the regions owning the images
pub struct Dispatcher<C> {
    registry: RegionRegistry<C>,
}

impl<C: RegionClient + 'static> Dispatcher<C> {
    pub fn new(registry: RegionRegistry<C>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RegionRegistry<C> {
        &self.registry
    }

    fn ensure_regions(&self) -> DispatchResult {
        if self.registry.is_empty() {
            return Err(DispatchError::configuration(
                "no regions configured. Please check your configuration",
            )
            .into());
        }
        Ok(())
    }

    /// Fresh listing of every region. Partial failures come back next to
    /// whatever the healthy regions returned.
    pub async fn list(&self, filter: &ListFilter) -> (ResourceDirectory, Option<AggregatedError>) {
        build_directory(&self.registry, filter).await
    }

    /// Locate the owning region of every id against a fresh listing.
    ///
    /// Listing failures only matter when some id stays unresolved; they are
    /// then returned after the resolution errors they explain.
    async fn locate(&self, ids: &[String], filter: &ListFilter) -> DispatchResult<RegionMatches> {
        let (directory, listing_errors) = self.list(filter).await;

        if let Some(listing_errors) = &listing_errors {
            tracing::warn!(
                "Resolving ids with incomplete listings, failed regions: {:?}",
                listing_errors.failed_regions()
            );
        }

        resolve(&directory, ids).map_err(|errors| errors.append(listing_errors))
    }

    /// Run `op` once per region owning at least one of `ids`, concurrently.
    ///
    /// With a single registered region every id is assumed to belong to it
    /// and `op` runs once without any listing. Otherwise ids are resolved
    /// against a fresh listing first; an unknown id stops the dispatch before
    /// any `op` runs. Regions that succeed keep their changes when others
    /// fail.
    pub async fn multi_call<F, Fut>(&self, ids: &[String], op: F) -> DispatchResult
    where
        F: Fn(Arc<C>, Vec<String>) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.ensure_regions()?;

        if ids.is_empty() {
            tracing::debug!("multi_call: no ids, nothing to do");
            return Ok(());
        }

        // TODO: ids are not checked against the listing on this path; decide
        // whether an id from an unconfigured region should fail resolution here
        if let Some((region, client)) = self.registry.single() {
            let ids = dedup_ids(ids);
            tracing::info!("multi_call: single region {}, {} ids", region, ids.len());
            return op(Arc::clone(client), ids)
                .await
                .map_err(|e| DispatchError::operation(region, e).into());
        }

        let matched = self.locate(ids, &ListFilter::owned()).await?;
        tracing::info!("multi_call: dispatching to {} regions", matched.len());

        // Directory keys come from the registry, so every match has a client
        let units: Vec<_> = matched
            .into_iter()
            .filter_map(|(region, region_ids)| {
                let client = self.registry.get(&region);
                debug_assert!(client.is_some(), "no client for listed region {}", region);

                let call = op(client?, region_ids);
                let unit_region = region.clone();
                let unit = async move { call.await.map_err(|e| DispatchError::operation(unit_region, e)) };
                Some((region, unit))
            })
            .collect();

        fan_out(units).await.into_result()
    }

    /// Add or overwrite tags on the given images
    pub async fn create_tags(&self, tags: &[Tag], dry_run: bool, ids: &[String]) -> DispatchResult {
        let tags: Arc<[Tag]> = tags.into();
        self.multi_call(ids, move |client, ids| {
            let tags = Arc::clone(&tags);
            async move { client.create_tags(&ids, &tags, dry_run).await }
        })
        .await
    }

    /// Remove tags from the given images
    pub async fn delete_tags(&self, tags: &[Tag], dry_run: bool, ids: &[String]) -> DispatchResult {
        let tags: Arc<[Tag]> = tags.into();
        self.multi_call(ids, move |client, ids| {
            let tags = Arc::clone(&tags);
            async move { client.delete_tags(&ids, &tags, dry_run).await }
        })
        .await
    }

    /// Deregister the given images. Within one region images are deregistered
    /// one after another and their failures reported as one region error.
    pub async fn deregister(&self, dry_run: bool, ids: &[String]) -> DispatchResult {
        self.multi_call(ids, move |client, ids| async move {
            let mut failures = Vec::new();
            for id in &ids {
                if let Err(e) = client.deregister_image(id, dry_run).await {
                    failures.push(format!("{}: {:#}", id, e));
                }
            }

            if failures.is_empty() {
                Ok(())
            } else {
                Err(anyhow!(
                    "{} of {} images failed to deregister: {}",
                    failures.len(),
                    ids.len(),
                    failures.join("; ")
                ))
            }
        })
        .await
    }

    /// Copy one image into every destination region.
    ///
    /// The source is always located through a listing, even with a single
    /// region configured. Copies are issued through the source region's
    /// client. Successful copies are returned next to any failures.
    pub async fn copy(&self, request: &CopyRequest) -> (CopiedImages, Option<AggregatedError>) {
        match self.prepare_copy(request).await {
            Ok((client, input)) => self.fan_out_copies(client, input, &request.destinations).await,
            Err(errors) => (CopiedImages::new(), Some(errors)),
        }
    }

    async fn prepare_copy(&self, request: &CopyRequest) -> DispatchResult<(Arc<C>, CopyImageInput)> {
        self.ensure_regions()?;

        if request.source_id.is_empty() {
            return Err(DispatchError::configuration("no source image given").into());
        }
        if request.destinations.iter().all(|d| d.trim().is_empty()) {
            return Err(DispatchError::configuration("no destination regions given").into());
        }

        let source_ids = [request.source_id.clone()];
        let filter = ListFilter::owned().with_ids(source_ids.iter().cloned());
        let matched = self.locate(&source_ids, &filter).await?;

        let Some(source_region) = matched.into_keys().next() else {
            return Err(DispatchError::Resolution {
                id: request.source_id.clone(),
            }
            .into());
        };

        let client = self.registry.get(&source_region).ok_or_else(|| {
            DispatchError::operation(
                source_region.clone(),
                anyhow!("no client found for region '{}'", source_region),
            )
        })?;

        let image = client
            .describe_image(&request.source_id)
            .await
            .map_err(|source| DispatchError::Describe {
                id: request.source_id.clone(),
                region: source_region.clone(),
                source,
            })?;

        let description = if request.description.is_empty() {
            image.description.clone().unwrap_or_default()
        } else {
            request.description.clone()
        };

        let input = CopyImageInput {
            source_image_id: request.source_id.clone(),
            source_region: source_region.clone(),
            destination_region: String::new(),
            name: image.name.clone(),
            description: format!(
                "[Copied {} from {} via images] {}",
                request.source_id, source_region, description
            ),
            client_token: String::new(),
            dry_run: request.dry_run,
        };

        Ok((client, input))
    }

    async fn fan_out_copies(
        &self,
        client: Arc<C>,
        template: CopyImageInput,
        destinations: &[String],
    ) -> (CopiedImages, Option<AggregatedError>) {
        let mut targets: Vec<String> = Vec::new();
        for destination in destinations.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
            if !targets.iter().any(|t| t == destination) {
                targets.push(destination.to_string());
            }
        }

        tracing::info!(
            "Copying {} from {} to {:?}",
            template.source_image_id,
            template.source_region,
            targets
        );

        let units = targets.into_iter().map(|destination| {
            let client = Arc::clone(&client);
            let input = CopyImageInput {
                destination_region: destination.clone(),
                client_token: uuid::Uuid::new_v4().to_string(),
                ..template.clone()
            };
            let unit_region = destination.clone();
            let unit = async move {
                client
                    .copy_image(&input)
                    .await
                    .map_err(|e| DispatchError::operation(unit_region, e))
            };
            (destination, unit)
        });

        let outcome = fan_out(units).await;
        (outcome.results, outcome.errors)
    }
}

/// Collapse repeated ids, keeping first-seen order
fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(id.clone());
        }
    }
    unique
}
