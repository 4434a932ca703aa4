//! Adapter trait and shared result types

use futures::future::BoxFuture;
use thiserror::Error;

use crate::grid::{TileCoordinate, TileGridConfig};
use crate::http::HttpError;

use super::auth::TileAuthConfig;

/// Errors that can occur while discovering tile geometry or auth.
///
/// Discovery failures abort a session before any tile traffic, so every
/// variant carries enough context to attribute the failure to a specific
/// provider interaction.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A scraping hop could not extract its required token from the page.
    #[error("discovery hop '{hop}' failed: required token not found in {url}")]
    MissingToken { hop: &'static str, url: String },

    /// A discovery page or descriptor could not be fetched.
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: HttpError,
    },

    /// A machine-readable descriptor was fetched but could not be parsed.
    #[error("invalid image descriptor from {url}: {reason}")]
    InvalidDescriptor { url: String, reason: String },

    /// The URL does not belong to this adapter's provider.
    #[error("URL not recognized by this adapter: {0}")]
    UnsupportedUrl(String),
}

/// Outcome of byte-level tile validation.
///
/// Errors make the tile invalid (and drive the engine's retry policy);
/// warnings are informational and never fail a tile.
#[derive(Debug, Clone)]
pub struct TileValidationResult {
    /// True when no errors were recorded.
    pub is_valid: bool,
    /// Hard failures (empty buffer, undersized buffer, bad signature).
    pub errors: Vec<String>,
    /// Soft findings (implausible size, dimension mismatch).
    pub warnings: Vec<String>,
    /// Observations made while validating.
    pub metadata: Option<TileValidationMetadata>,
}

/// Measurements recorded during tile validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileValidationMetadata {
    /// Pixel dimensions decoded from the tile header, when decodable.
    pub observed_dimensions: Option<(u32, u32)>,
    /// Pixel dimensions the grid config expects for this tile.
    pub expected_dimensions: Option<(u32, u32)>,
    /// Size of the tile response in bytes.
    pub byte_size: usize,
}

/// A deep-zoom tile provider.
///
/// One implementation per provider, held behind `Arc<dyn TileAdapter>` in a
/// registration-ordered registry. Async operations return boxed futures so
/// the trait stays object-safe.
pub trait TileAdapter: Send + Sync {
    /// Short registry name for this adapter (e.g. "belgica-kbr").
    fn name(&self) -> &str;

    /// One-line human description of the provider.
    fn description(&self) -> &str;

    /// Cheap, network-free structural check whether this adapter can handle
    /// the URL. Never fails.
    fn validate_url(&self, url: &str) -> bool;

    /// Discovers the tile grid geometry at the provider's maximum zoom.
    ///
    /// Performs whatever discovery is required (page scraping, descriptor
    /// probing). Fails with a hop-attributable [`DiscoveryError`] when
    /// geometry cannot be determined; never returns a guessed default.
    fn analyze_page<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, Result<TileGridConfig, DiscoveryError>>;

    /// Generates the ordered tile URL list for the grid.
    ///
    /// The result has length exactly `grid_width × grid_height`, in
    /// row-major order (y outer, x inner).
    fn generate_tile_urls(
        &self,
        base_url: &str,
        config: &TileGridConfig,
    ) -> Result<Vec<String>, DiscoveryError>;

    /// Derives the authentication configuration for tile requests,
    /// often from the same discovery chain used for geometry.
    fn auth_config<'a>(
        &'a self,
        base_url: &'a str,
    ) -> BoxFuture<'a, Result<TileAuthConfig, DiscoveryError>>;

    /// Validates a downloaded tile's bytes.
    fn validate_tile(&self, bytes: &[u8], coordinate: TileCoordinate) -> TileValidationResult;

    /// Fills format/overlap defaults into a discovered grid config.
    ///
    /// Must be idempotent: applying twice equals applying once.
    fn optimize_grid_config(&self, config: &TileGridConfig) -> TileGridConfig {
        config.normalized()
    }
}
