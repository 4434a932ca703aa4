//! Deep-zoom provider adapters
//!
//! This module provides the [`TileAdapter`] trait and its implementations
//! for concrete tile providers, plus the shared utilities adapters build
//! on: authentication rendering, byte-level tile sniffing, and multi-hop
//! page-scraping helpers.
//!
//! Adapters are registered with the engine behind `Arc<dyn TileAdapter>`;
//! the service facade selects the first registered adapter whose
//! [`TileAdapter::validate_url`] accepts a given URL.

mod auth;
mod iiif;
mod kbr;
pub mod scrape;
pub mod sniff;
mod types;

pub use auth::TileAuthConfig;
pub use iiif::IiifAdapter;
pub use kbr::KbrAdapter;
pub use types::{DiscoveryError, TileAdapter, TileValidationMetadata, TileValidationResult};
