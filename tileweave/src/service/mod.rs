//! Service facade
//!
//! [`TileEngineService`] is the high-level entry point for the layers that
//! consume this crate: give it a URL and it auto-selects the first
//! registered adapter whose structural check accepts it, then runs the
//! real download, a dry-run analysis, or a validation pass.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::adapter::{IiifAdapter, KbrAdapter, TileAdapter, TileAuthConfig};
use crate::config::EngineConfig;
use crate::engine::{EngineError, TileDownloadCallbacks, TileEngineCore, TileEngineResult};
use crate::grid::TileGridConfig;
use crate::http::{AsyncHttpClient, AsyncReqwestClient, HttpError};

/// Flat per-tile size estimate used for dry-run analysis.
const ESTIMATED_TILE_BYTES: u64 = 50 * 1024;

/// Tile counts above this draw a validation warning.
const LARGE_TILE_COUNT: usize = 100;

/// Estimated downloads above this draw a validation warning.
const LARGE_ESTIMATED_BYTES: u64 = 50 * 1024 * 1024;

/// Dry-run analysis of a tile source.
#[derive(Debug, Clone)]
pub struct SourceAnalysis {
    /// Name of the adapter that will handle the URL.
    pub adapter: String,
    /// Discovered (and normalized) grid geometry.
    pub grid: TileGridConfig,
    /// Authentication the download would run with.
    pub auth: TileAuthConfig,
    /// Number of tiles a download would fetch.
    pub estimated_tiles: usize,
    /// Rough download volume at 50 KB per tile.
    pub estimated_bytes: u64,
    /// Rough duration at the configured steady-state rate.
    pub estimated_duration: Duration,
}

/// Outcome of a validation-only pass over a tile source.
#[derive(Debug, Clone)]
pub struct SourceValidation {
    /// True when a download could plausibly proceed.
    pub is_valid: bool,
    /// Adapter that matched the URL, when any did.
    pub adapter: Option<String>,
    /// Discovered geometry, when discovery succeeded.
    pub grid: Option<TileGridConfig>,
    /// Hard findings that make the source unusable.
    pub errors: Vec<String>,
    /// Soft findings (large downloads, long runtimes).
    pub warnings: Vec<String>,
}

/// Registry statistics for diagnostics surfaces.
#[derive(Debug, Clone)]
pub struct ServiceStatistics {
    /// Number of registered adapters.
    pub adapter_count: usize,
    /// Adapter names in registration order.
    pub adapters: Vec<String>,
}

/// High-level facade over [`TileEngineCore`].
pub struct TileEngineService<C: AsyncHttpClient> {
    engine: Arc<TileEngineCore<C>>,
}

impl TileEngineService<Arc<AsyncReqwestClient>> {
    /// Creates a service with the production HTTP client and the default
    /// adapters (Belgica KBR, IIIF) registered.
    pub fn new(config: EngineConfig) -> Result<Self, HttpError> {
        let client = Arc::new(AsyncReqwestClient::with_timeout(
            config.request_timeout.as_secs(),
        )?);

        let service = Self::with_client(config, Arc::clone(&client));
        service.register_adapter(Arc::new(KbrAdapter::new(Arc::clone(&client))));
        service.register_adapter(Arc::new(IiifAdapter::new(client)));
        Ok(service)
    }
}

impl<C: AsyncHttpClient + 'static> TileEngineService<C> {
    /// Creates a service over a specific HTTP client with an empty adapter
    /// registry.
    pub fn with_client(config: EngineConfig, client: C) -> Self {
        Self {
            engine: Arc::new(TileEngineCore::new(config, client)),
        }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &Arc<TileEngineCore<C>> {
        &self.engine
    }

    /// Registers an adapter at the end of the detection order.
    pub fn register_adapter(&self, adapter: Arc<dyn TileAdapter>) {
        self.engine.register_adapter(adapter);
    }

    /// Selects the first registered adapter whose structural check accepts
    /// the URL.
    pub fn detect_adapter(&self, url: &str) -> Option<Arc<dyn TileAdapter>> {
        self.engine
            .adapters()
            .into_iter()
            .find(|adapter| adapter.validate_url(url))
    }

    /// Whether any registered adapter recognizes the URL.
    pub fn is_tile_source(&self, url: &str) -> bool {
        self.detect_adapter(url).is_some()
    }

    /// Runs a real download session against the auto-detected adapter.
    pub async fn download(
        &self,
        url: &str,
        output_path: impl AsRef<std::path::Path>,
        callbacks: TileDownloadCallbacks,
    ) -> Result<TileEngineResult, EngineError> {
        let adapter = self
            .detect_adapter(url)
            .ok_or_else(|| EngineError::NoAdapterForUrl(url.to_string()))?;

        info!(adapter = adapter.name(), url = url, "Dispatching download");
        self.engine
            .download_and_stitch(url, adapter.name(), output_path, callbacks)
            .await
    }

    /// Dry-run analysis: geometry, auth, and estimates without downloading
    /// a single tile.
    pub async fn analyze_url(&self, url: &str) -> Result<SourceAnalysis, EngineError> {
        let adapter = self
            .detect_adapter(url)
            .ok_or_else(|| EngineError::NoAdapterForUrl(url.to_string()))?;

        let discovered = adapter.analyze_page(url).await?;
        let grid = adapter.optimize_grid_config(&discovered);
        let auth = adapter.auth_config(url).await?;

        let estimated_tiles = grid.tile_count();
        let requests_per_second = self
            .engine
            .config()
            .rate_limit
            .requests_per_second
            .max(1) as usize;

        debug!(
            adapter = adapter.name(),
            tiles = estimated_tiles,
            "Source analysis complete"
        );

        Ok(SourceAnalysis {
            adapter: adapter.name().to_string(),
            grid,
            auth,
            estimated_tiles,
            estimated_bytes: estimated_tiles as u64 * ESTIMATED_TILE_BYTES,
            estimated_duration: Duration::from_secs(
                estimated_tiles.div_ceil(requests_per_second) as u64,
            ),
        })
    }

    /// Validation-only pass: confirms an adapter matches, discovery
    /// succeeds, and at least one tile URL can be generated. Collects
    /// findings instead of failing.
    pub async fn validate_source(&self, url: &str) -> SourceValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let Some(adapter) = self.detect_adapter(url) else {
            errors.push("no suitable tile adapter found for this URL".to_string());
            return SourceValidation {
                is_valid: false,
                adapter: None,
                grid: None,
                errors,
                warnings,
            };
        };
        let adapter_name = adapter.name().to_string();

        let analysis = match self.analyze_url(url).await {
            Ok(analysis) => analysis,
            Err(e) => {
                errors.push(format!("discovery failed: {}", e));
                return SourceValidation {
                    is_valid: false,
                    adapter: Some(adapter_name),
                    grid: None,
                    errors,
                    warnings,
                };
            }
        };

        match adapter.generate_tile_urls(url, &analysis.grid) {
            Ok(urls) if urls.is_empty() => {
                errors.push("no tile URLs could be generated for this source".to_string());
            }
            Ok(_) => {}
            Err(e) => errors.push(format!("tile URL generation failed: {}", e)),
        }

        if analysis.estimated_tiles > LARGE_TILE_COUNT {
            warnings.push(format!(
                "large tile count ({}), download may take significant time",
                analysis.estimated_tiles
            ));
        }
        if analysis.estimated_bytes > LARGE_ESTIMATED_BYTES {
            warnings.push(format!(
                "large estimated download ({} MB)",
                analysis.estimated_bytes / (1024 * 1024)
            ));
        }

        SourceValidation {
            is_valid: errors.is_empty(),
            adapter: Some(adapter_name),
            grid: Some(analysis.grid),
            errors,
            warnings,
        }
    }

    /// Registry statistics.
    pub fn statistics(&self) -> ServiceStatistics {
        let adapters = self.engine.adapter_names();
        ServiceStatistics {
            adapter_count: adapters.len(),
            adapters,
        }
    }

    /// Cancels every running session.
    pub fn abort_all(&self) {
        self.engine.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::sniff::validate_tile_bytes;
    use crate::adapter::{DiscoveryError, TileValidationResult};
    use crate::grid::TileCoordinate;
    use crate::http::tests::MockAsyncHttpClient;
    use futures::future::BoxFuture;

    /// Minimal adapter matching a URL prefix over a fixed grid.
    struct PrefixAdapter {
        name: &'static str,
        prefix: &'static str,
        grid_width: u32,
        grid_height: u32,
    }

    impl TileAdapter for PrefixAdapter {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "prefix-matching test adapter"
        }

        fn validate_url(&self, url: &str) -> bool {
            url.starts_with(self.prefix)
        }

        fn analyze_page<'a>(
            &'a self,
            _url: &'a str,
        ) -> BoxFuture<'a, Result<TileGridConfig, DiscoveryError>> {
            Box::pin(async move {
                Ok(TileGridConfig {
                    grid_width: self.grid_width,
                    grid_height: self.grid_height,
                    tile_width: 256,
                    tile_height: 256,
                    zoom_level: 0,
                    total_width: None,
                    total_height: None,
                    overlap: None,
                    format: None,
                })
            })
        }

        fn generate_tile_urls(
            &self,
            base_url: &str,
            config: &TileGridConfig,
        ) -> Result<Vec<String>, DiscoveryError> {
            Ok(config
                .coordinates()
                .map(|c| format!("{}/{}-{}.jpg", base_url, c.x, c.y))
                .collect())
        }

        fn auth_config<'a>(
            &'a self,
            _base_url: &'a str,
        ) -> BoxFuture<'a, Result<TileAuthConfig, DiscoveryError>> {
            Box::pin(async move { Ok(TileAuthConfig::None) })
        }

        fn validate_tile(&self, bytes: &[u8], coordinate: TileCoordinate) -> TileValidationResult {
            validate_tile_bytes(bytes, coordinate, None)
        }
    }

    fn service(grid_width: u32, grid_height: u32) -> TileEngineService<Arc<MockAsyncHttpClient>> {
        let client = Arc::new(MockAsyncHttpClient::new(Ok(Vec::new())));
        let service = TileEngineService::with_client(EngineConfig::default(), client);
        service.register_adapter(Arc::new(PrefixAdapter {
            name: "alpha",
            prefix: "http://alpha.test/",
            grid_width,
            grid_height,
        }));
        service.register_adapter(Arc::new(PrefixAdapter {
            name: "beta",
            prefix: "http://",
            grid_width,
            grid_height,
        }));
        service
    }

    #[test]
    fn test_detection_prefers_registration_order() {
        let service = service(2, 2);

        // Both adapters match; the first registered wins
        let adapter = service.detect_adapter("http://alpha.test/doc").unwrap();
        assert_eq!(adapter.name(), "alpha");

        // Only the catch-all matches
        let adapter = service.detect_adapter("http://other.test/doc").unwrap();
        assert_eq!(adapter.name(), "beta");

        assert!(service.detect_adapter("ftp://alpha.test/doc").is_none());
        assert!(service.is_tile_source("http://alpha.test/doc"));
        assert!(!service.is_tile_source("gopher://x"));
    }

    #[tokio::test]
    async fn test_download_without_matching_adapter_errors() {
        let service = service(1, 1);

        let err = service
            .download(
                "ftp://nowhere/doc",
                "/tmp/out.jpg",
                TileDownloadCallbacks::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoAdapterForUrl(_)));
    }

    #[tokio::test]
    async fn test_analyze_url_estimates() {
        let service = service(4, 5);

        let analysis = service.analyze_url("http://alpha.test/doc").await.unwrap();
        assert_eq!(analysis.adapter, "alpha");
        assert_eq!(analysis.estimated_tiles, 20);
        assert_eq!(analysis.estimated_bytes, 20 * 50 * 1024);
        // 20 tiles at the default 2 rps
        assert_eq!(analysis.estimated_duration, Duration::from_secs(10));
        // Analysis normalizes the grid before returning it
        assert_eq!(analysis.grid.overlap, Some(0));
    }

    #[tokio::test]
    async fn test_validate_source_ok_small() {
        let service = service(2, 2);

        let validation = service.validate_source("http://alpha.test/doc").await;
        assert!(validation.is_valid);
        assert_eq!(validation.adapter.as_deref(), Some("alpha"));
        assert!(validation.errors.is_empty());
        assert!(validation.warnings.is_empty());
        assert!(validation.grid.is_some());
    }

    #[tokio::test]
    async fn test_validate_source_warns_on_large_grid() {
        // 15×15 = 225 tiles > 100, and 225 × 50 KB < 50 MB
        let service = service(15, 15);

        let validation = service.validate_source("http://alpha.test/doc").await;
        assert!(validation.is_valid);
        assert_eq!(validation.warnings.len(), 1);
        assert!(validation.warnings[0].contains("large tile count"));
    }

    #[tokio::test]
    async fn test_validate_source_warns_on_large_size() {
        // 40×40 = 1600 tiles ≈ 78 MB estimated
        let service = service(40, 40);

        let validation = service.validate_source("http://alpha.test/doc").await;
        assert!(validation.is_valid);
        assert!(validation
            .warnings
            .iter()
            .any(|w| w.contains("large estimated download")));
    }

    #[tokio::test]
    async fn test_validate_source_no_adapter() {
        let service = service(2, 2);

        let validation = service.validate_source("ftp://nowhere").await;
        assert!(!validation.is_valid);
        assert!(validation.adapter.is_none());
        assert_eq!(validation.errors.len(), 1);
    }

    #[test]
    fn test_statistics() {
        let service = service(1, 1);
        let stats = service.statistics();
        assert_eq!(stats.adapter_count, 2);
        assert_eq!(stats.adapters, vec!["alpha", "beta"]);
    }
}
