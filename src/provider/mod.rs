//! Regional image API interaction module
//!
//! This module provides everything needed to talk to the per-region image
//! endpoints of one provider account.
//!
//! # Module Structure
//!
//! - [`credentials`] - Static key pair shared by all regions
//! - [`http`] - HTTP utilities for REST API calls
//! - [`client`] - REST implementation of [`RegionClient`]
//! - [`image`] - Image model and request types
//! - [`regions`] - Region catalog and the region registry
//!
//! # Example
//!
//! ```ignore
//! use images::provider::{client::RestRegionClient, regions::RegionRegistry};
//!
//! async fn example(creds: Credentials) -> anyhow::Result<()> {
//!     let registry = RegionRegistry::from_spec(&["all"], &["cn-north-1"], &catalog, |region| {
//!         RestRegionClient::new(region, "https://{region}.images.example.net", creds.clone(), timeout)
//!     })?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod credentials;
pub mod http;
pub mod image;
pub mod regions;

use anyhow::Result;
use async_trait::async_trait;
use image::{CopyImageInput, Image, ListFilter, Tag};

/// Operations one regional image endpoint must support.
///
/// Implementations are shared between concurrently running tasks, hence the
/// `Send + Sync` bound. Every call is a network round trip; none of them are
/// cached.
#[async_trait]
pub trait RegionClient: Send + Sync {
    /// Region this client talks to
    fn region(&self) -> &str;

    /// List images matching the filter. Returned images carry this region.
    async fn list_images(&self, filter: &ListFilter) -> Result<Vec<Image>>;

    /// Fetch full detail for a single image
    async fn describe_image(&self, image_id: &str) -> Result<Image>;

    /// Add or overwrite tags on every given image
    async fn create_tags(&self, image_ids: &[String], tags: &[Tag], dry_run: bool) -> Result<()>;

    /// Remove tags from every given image
    async fn delete_tags(&self, image_ids: &[String], tags: &[Tag], dry_run: bool) -> Result<()>;

    /// Deregister (delete) one image
    async fn deregister_image(&self, image_id: &str, dry_run: bool) -> Result<()>;

    /// Copy an image owned by this region into another region.
    /// Returns the id of the new image.
    async fn copy_image(&self, input: &CopyImageInput) -> Result<String>;
}
