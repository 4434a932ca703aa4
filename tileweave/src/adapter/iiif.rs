//! IIIF Image API adapter.
//!
//! Descriptor-based discovery for servers implementing the IIIF Image API
//! (Level 1+): fetch the machine-readable `info.json` descriptor from the
//! well-known endpoint, read the full image dimensions and native tile
//! size, and request the image tile-by-tile as region crops at full
//! resolution.
//!
//! # Tile URLs
//!
//! `{base}/{x},{y},{w},{h}/{w},/0/default.jpg` — region coordinates in
//! full-resolution pixels. Edge tiles request the *exact* remaining
//! width/height instead of the nominal tile size; many servers reject or
//! distort out-of-bounds regions.

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use crate::grid::{TileCoordinate, TileFormat, TileGridConfig};
use crate::http::AsyncHttpClient;

use super::auth::TileAuthConfig;
use super::sniff::validate_tile_bytes;
use super::types::{DiscoveryError, TileAdapter, TileValidationResult};

/// Tile size assumed when the descriptor does not advertise one.
const DEFAULT_TILE_SIZE: u32 = 512;

/// IIIF `info.json` image descriptor (the fields we consume).
#[derive(Debug, Deserialize)]
struct ImageInfo {
    width: u32,
    height: u32,
    #[serde(default)]
    tiles: Vec<TileSpec>,
}

/// One entry of the descriptor's `tiles` array.
#[derive(Debug, Deserialize)]
struct TileSpec {
    width: u32,
    height: Option<u32>,
}

/// IIIF Image API deep-zoom adapter.
pub struct IiifAdapter<C: AsyncHttpClient> {
    http_client: C,
}

impl<C: AsyncHttpClient> IiifAdapter<C> {
    /// Creates a new IIIF adapter.
    pub fn new(http_client: C) -> Self {
        Self { http_client }
    }

    /// The image service base: the URL with any `/info.json` suffix and
    /// trailing slash removed.
    fn service_base(url: &str) -> &str {
        url.trim_end_matches('/')
            .trim_end_matches("info.json")
            .trim_end_matches('/')
    }

    /// The descriptor endpoint for a service URL.
    fn info_url(url: &str) -> String {
        format!("{}/info.json", Self::service_base(url))
    }

    /// Zoom level of the full-resolution layer in the tile pyramid.
    fn full_resolution_level(width: u32, height: u32, tile_size: u32) -> u8 {
        let span = width.max(height).max(1) as f64 / tile_size.max(1) as f64;
        span.log2().ceil().max(0.0) as u8
    }

    async fn fetch_descriptor(&self, url: &str) -> Result<ImageInfo, DiscoveryError> {
        let info_url = Self::info_url(url);
        let body = self
            .http_client
            .get(&info_url)
            .await
            .map_err(|e| DiscoveryError::Fetch {
                url: info_url.clone(),
                source: e,
            })?;

        let info: ImageInfo =
            serde_json::from_slice(&body).map_err(|e| DiscoveryError::InvalidDescriptor {
                url: info_url.clone(),
                reason: e.to_string(),
            })?;

        if info.width == 0 || info.height == 0 {
            return Err(DiscoveryError::InvalidDescriptor {
                url: info_url,
                reason: format!("degenerate dimensions {}x{}", info.width, info.height),
            });
        }

        Ok(info)
    }
}

impl<C: AsyncHttpClient> TileAdapter for IiifAdapter<C> {
    fn name(&self) -> &str {
        "iiif"
    }

    fn description(&self) -> &str {
        "IIIF Image API services (descriptor-based tiled download)"
    }

    fn validate_url(&self, url: &str) -> bool {
        (url.starts_with("http://") || url.starts_with("https://"))
            && (url.contains("/iiif/") || url.ends_with("/info.json"))
    }

    fn analyze_page<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, Result<TileGridConfig, DiscoveryError>> {
        Box::pin(async move {
            let info = self.fetch_descriptor(url).await?;

            let tile_width = info.tiles.first().map(|t| t.width).unwrap_or(DEFAULT_TILE_SIZE);
            let tile_height = info
                .tiles
                .first()
                .and_then(|t| t.height)
                .unwrap_or(tile_width);

            let grid_width = info.width.div_ceil(tile_width);
            let grid_height = info.height.div_ceil(tile_height);

            debug!(
                image_width = info.width,
                image_height = info.height,
                tile_width = tile_width,
                grid = %format!("{}x{}", grid_width, grid_height),
                "IIIF descriptor resolved"
            );

            Ok(TileGridConfig {
                grid_width,
                grid_height,
                tile_width,
                tile_height,
                zoom_level: Self::full_resolution_level(info.width, info.height, tile_width),
                total_width: Some(info.width),
                total_height: Some(info.height),
                overlap: Some(0),
                format: Some(TileFormat::Jpg),
            })
        })
    }

    fn generate_tile_urls(
        &self,
        base_url: &str,
        config: &TileGridConfig,
    ) -> Result<Vec<String>, DiscoveryError> {
        let base = Self::service_base(base_url);

        let urls = config
            .coordinates()
            .map(|coord| {
                let region_x = coord.x * config.tile_width;
                let region_y = coord.y * config.tile_height;
                // Exact remaining extent on edge tiles; servers reject
                // regions that overrun the canvas.
                let (region_w, region_h) = config.tile_extent(coord);
                format!(
                    "{}/{},{},{},{}/{},/0/default.jpg",
                    base, region_x, region_y, region_w, region_h, region_w
                )
            })
            .collect();
        Ok(urls)
    }

    fn auth_config<'a>(
        &'a self,
        _base_url: &'a str,
    ) -> BoxFuture<'a, Result<TileAuthConfig, DiscoveryError>> {
        Box::pin(async move { Ok(TileAuthConfig::None) })
    }

    fn validate_tile(&self, bytes: &[u8], coordinate: TileCoordinate) -> TileValidationResult {
        // Edge tiles legitimately differ from the nominal tile size, so no
        // expected dimensions are asserted here.
        validate_tile_bytes(bytes, coordinate, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockAsyncHttpClient;
    use crate::http::HttpError;

    const SERVICE_URL: &str = "https://images.example.org/iiif/2/ms-1234";

    fn descriptor(width: u32, height: u32, tile: u32) -> Vec<u8> {
        format!(
            r#"{{"@context":"http://iiif.io/api/image/2/context.json","@id":"{}","width":{},"height":{},"tiles":[{{"width":{},"scaleFactors":[1,2,4,8]}}]}}"#,
            SERVICE_URL, width, height, tile
        )
        .into_bytes()
    }

    fn adapter_with_descriptor(body: Vec<u8>) -> IiifAdapter<MockAsyncHttpClient> {
        let mock = MockAsyncHttpClient::new(Err(HttpError::Status {
            status: 404,
            url: "default".to_string(),
        }));
        mock.script(&format!("{}/info.json", SERVICE_URL), Ok(body));
        IiifAdapter::new(mock)
    }

    #[test]
    fn test_validate_url() {
        let adapter = adapter_with_descriptor(descriptor(100, 100, 512));
        assert!(adapter.validate_url(SERVICE_URL));
        assert!(adapter.validate_url("https://images.example.org/iiif/2/ms-1234/info.json"));
        assert!(!adapter.validate_url("https://example.org/gallery/page1"));
        assert!(!adapter.validate_url("ftp://images.example.org/iiif/2/x"));
    }

    #[tokio::test]
    async fn test_analyze_page_computes_ceil_grid() {
        // 3000x2000 at tile 512: ceil(3000/512)=6, ceil(2000/512)=4
        let adapter = adapter_with_descriptor(descriptor(3000, 2000, 512));

        let config = adapter.analyze_page(SERVICE_URL).await.unwrap();
        assert_eq!((config.grid_width, config.grid_height), (6, 4));
        assert_eq!((config.tile_width, config.tile_height), (512, 512));
        assert_eq!(config.total_width, Some(3000));
        assert_eq!(config.total_height, Some(2000));
    }

    #[tokio::test]
    async fn test_analyze_page_exact_multiple() {
        let adapter = adapter_with_descriptor(descriptor(2048, 1024, 512));

        let config = adapter.analyze_page(SERVICE_URL).await.unwrap();
        assert_eq!((config.grid_width, config.grid_height), (4, 2));
        assert_eq!(config.zoom_level, 2); // log2(2048/512)
    }

    #[tokio::test]
    async fn test_analyze_page_defaults_tile_size_when_absent() {
        let body = br#"{"width":1500,"height":800}"#.to_vec();
        let adapter = adapter_with_descriptor(body);

        let config = adapter.analyze_page(SERVICE_URL).await.unwrap();
        assert_eq!(config.tile_width, DEFAULT_TILE_SIZE);
        assert_eq!((config.grid_width, config.grid_height), (3, 2));
    }

    #[tokio::test]
    async fn test_analyze_page_accepts_info_json_url() {
        let adapter = adapter_with_descriptor(descriptor(1000, 1000, 512));
        let url = format!("{}/info.json", SERVICE_URL);

        let config = adapter.analyze_page(&url).await.unwrap();
        assert_eq!((config.grid_width, config.grid_height), (2, 2));
    }

    #[tokio::test]
    async fn test_malformed_descriptor_is_attributed() {
        let adapter = adapter_with_descriptor(b"<html>Not JSON</html>".to_vec());

        let err = adapter.analyze_page(SERVICE_URL).await.unwrap_err();
        match err {
            DiscoveryError::InvalidDescriptor { url, .. } => {
                assert!(url.ends_with("/info.json"));
            }
            other => panic!("expected InvalidDescriptor, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_degenerate_dimensions_rejected() {
        let adapter = adapter_with_descriptor(descriptor(0, 2000, 512));

        let err = adapter.analyze_page(SERVICE_URL).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidDescriptor { .. }));
    }

    #[tokio::test]
    async fn test_generate_tile_urls_edge_tiles_use_exact_extent() {
        let adapter = adapter_with_descriptor(descriptor(3000, 2000, 512));
        let config = adapter.analyze_page(SERVICE_URL).await.unwrap();

        let urls = adapter.generate_tile_urls(SERVICE_URL, &config).unwrap();
        assert_eq!(urls.len(), 24);

        // First tile: full 512x512 region at origin
        assert_eq!(
            urls[0],
            format!("{}/0,0,512,512/512,/0/default.jpg", SERVICE_URL)
        );
        // Last tile: 3000 - 5*512 = 440 wide, 2000 - 3*512 = 464 tall
        assert_eq!(
            urls[23],
            format!("{}/2560,1536,440,464/440,/0/default.jpg", SERVICE_URL)
        );
    }

    #[tokio::test]
    async fn test_generate_tile_urls_row_major() {
        let adapter = adapter_with_descriptor(descriptor(1024, 1024, 512));
        let config = adapter.analyze_page(SERVICE_URL).await.unwrap();

        let urls = adapter.generate_tile_urls(SERVICE_URL, &config).unwrap();
        assert_eq!(urls.len(), 4);
        assert!(urls[0].contains("/0,0,"));
        assert!(urls[1].contains("/512,0,"));
        assert!(urls[2].contains("/0,512,"));
        assert!(urls[3].contains("/512,512,"));
    }

    #[tokio::test]
    async fn test_auth_config_is_none() {
        let adapter = adapter_with_descriptor(descriptor(100, 100, 512));
        let auth = adapter.auth_config(SERVICE_URL).await.unwrap();
        assert_eq!(auth, TileAuthConfig::None);
    }

    #[test]
    fn test_full_resolution_level() {
        assert_eq!(
            IiifAdapter::<MockAsyncHttpClient>::full_resolution_level(2048, 1024, 512),
            2
        );
        assert_eq!(
            IiifAdapter::<MockAsyncHttpClient>::full_resolution_level(3000, 2000, 512),
            3
        );
        // Image smaller than one tile is level 0
        assert_eq!(
            IiifAdapter::<MockAsyncHttpClient>::full_resolution_level(300, 200, 512),
            0
        );
    }
}
