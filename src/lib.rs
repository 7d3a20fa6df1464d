//! Manage machine images across every region of a cloud account.
//!
//! - [`provider`] - Per-region REST clients and the region registry
//! - [`dispatch`] - Multi-region listing, id resolution and fan-out
//! - [`config`] - Layered configuration
//! - [`output`] - Listing renderers

pub mod config;
pub mod dispatch;
pub mod output;
pub mod provider;

/// Version injected at compile time via IMAGES_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("IMAGES_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
