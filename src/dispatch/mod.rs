//! Multi-region dispatch
//!
//! Routes image operations to the regions that own the images and runs
//! the per-region work concurrently.
//!
//! # Architecture
//!
//! - [`directory`] - Builds a fresh region to images listing
//! - [`resolver`] - Maps requested image ids onto their owning regions
//! - [`dispatcher`] - Entry point for list, tag, deregister and copy
//! - [`fanout`] - The one spawn/collect/join implementation everything uses
//! - [`error`] - Per-unit errors and their aggregate
//! - [`tags`] - Tag spec parsing
//!
//! # Example
//!
//! ```ignore
//! use images::dispatch::{Dispatcher, parse_tags, TagMode};
//!
//! async fn tag(dispatcher: &Dispatcher<RestRegionClient>, ids: &[String]) -> anyhow::Result<()> {
//!     let tags = parse_tags("env=prod", TagMode::Create)?;
//!     dispatcher.create_tags(&tags, false, ids).await?;
//!     Ok(())
//! }
//! ```

pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod fanout;
pub mod resolver;
pub mod tags;

#[cfg(test)]
pub(crate) mod mock;

pub use directory::{build_directory, sort_by_creation, ResourceDirectory};
pub use dispatcher::{CopiedImages, CopyRequest, Dispatcher};
pub use error::{AggregatedError, DispatchError, DispatchResult};
pub use fanout::{fan_out, FanOutOutcome};
pub use resolver::{resolve, RegionMatches};
pub use tags::{parse_tags, TagMode};
