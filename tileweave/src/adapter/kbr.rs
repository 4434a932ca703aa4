//! Belgica KBR manuscript adapter.
//!
//! Downloads manuscript scans from the Royal Library of Belgium's Belgica
//! portal, which serves pages through an AjaxZoom deep-zoom viewer.
//!
//! # Discovery chain
//!
//! The viewer exposes no geometry API; reaching the tile base requires a
//! chain of page scrapes, each hop extracting one required token:
//!
//! 1. Document page → permalink `https://uurl.kbr.be/<id>`
//! 2. Permalink page → embedded `gallery.php` viewer URL
//! 3. Gallery URL → `map=` parameter (tile directory path)
//! 4. Gallery page → `ajaxZoom.parameter` and `ajaxZoom.path` config
//!
//! A missing token at any hop fails discovery immediately with that hop's
//! name. Grid geometry is a static per-zoom table; the adapter always
//! selects the highest zoom.
//!
//! # Tile URLs
//!
//! `{base}{zoom}-{x}-{y}.jpg`, row-major. Tiles are referrer-gated: the
//! server rejects requests without a plausible `Referer` and browser-like
//! headers.

use std::sync::OnceLock;

use futures::future::BoxFuture;
use regex::Regex;
use tracing::{debug, trace};

use crate::grid::{TileCoordinate, TileFormat, TileGridConfig};
use crate::http::AsyncHttpClient;

use super::auth::TileAuthConfig;
use super::scrape::{extract_token, fetch_page, origin_of};
use super::sniff::{detect_format, validate_tile_bytes, SniffedFormat};
use super::types::{DiscoveryError, TileAdapter, TileValidationResult};

/// Highest zoom level the viewer serves.
const MAX_ZOOM: u8 = 3;

/// Edge length of every tile in pixels.
const TILE_SIZE: u32 = 768;

/// Grid dimensions (columns, rows) per zoom level 0..=3.
const GRID_TABLE: [(u32, u32); 4] = [(1, 2), (2, 3), (4, 5), (8, 10)];

/// Fallback referrer when the tile base URL has no parseable origin.
const FALLBACK_REFERRER: &str = "https://viewerd.kbr.be/";

/// Probing stops after this many consecutive missing pages.
const PAGE_PROBE_MISS_LIMIT: u32 = 3;

/// Hard cap on page probing.
const PAGE_PROBE_MAX: u32 = 1000;

fn uurl_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https://uurl\.kbr\.be/(\d+)").unwrap())
}

fn gallery_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"src="([^"]*gallery\.php[^"]*)""#).unwrap())
}

fn map_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"map=([^&"]+)"#).unwrap())
}

fn zoom_parameter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"ajaxZoom\.parameter = ['"]([^'"]*)['"]"#).unwrap())
}

fn zoom_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"ajaxZoom\.path = ['"]([^'"]*)['"]"#).unwrap())
}

/// Tokens recovered by walking the full viewer chain.
#[derive(Debug, Clone)]
struct ViewerChain {
    document_id: String,
    gallery_url: String,
    map_path: String,
}

/// Belgica KBR deep-zoom adapter.
///
/// # Example
///
/// ```ignore
/// use tileweave::adapter::KbrAdapter;
/// use tileweave::http::AsyncReqwestClient;
///
/// let client = AsyncReqwestClient::new()?;
/// let adapter = KbrAdapter::new(client);
/// ```
pub struct KbrAdapter<C: AsyncHttpClient> {
    http_client: C,
}

impl<C: AsyncHttpClient> KbrAdapter<C> {
    /// Creates a new Belgica KBR adapter.
    pub fn new(http_client: C) -> Self {
        Self { http_client }
    }

    /// Grid geometry at the given zoom level from the static table.
    fn grid_for_zoom(zoom: u8) -> TileGridConfig {
        let (columns, rows) = GRID_TABLE[zoom as usize];
        TileGridConfig {
            grid_width: columns,
            grid_height: rows,
            tile_width: TILE_SIZE,
            tile_height: TILE_SIZE,
            zoom_level: zoom,
            total_width: Some(columns * TILE_SIZE),
            total_height: Some(rows * TILE_SIZE),
            overlap: Some(0),
            format: Some(TileFormat::Jpg),
        }
    }

    /// Grid geometry for every zoom level the viewer serves, ascending.
    pub fn zoom_levels() -> Vec<TileGridConfig> {
        (0..=MAX_ZOOM).map(Self::grid_for_zoom).collect()
    }

    /// Walks the document → permalink → gallery → viewer-config chain.
    ///
    /// Every hop is required; the first hop whose token is missing fails
    /// the whole chain with that hop's name.
    async fn extract_viewer_chain(&self, document_url: &str) -> Result<ViewerChain, DiscoveryError> {
        let document_body = fetch_page(&self.http_client, document_url).await?;
        let uurl_id = extract_token("uurl-permalink", document_url, &document_body, uurl_pattern())?;
        let uurl = format!("https://uurl.kbr.be/{}", uurl_id);
        trace!(document_url = document_url, uurl = %uurl, "Resolved permalink");

        let uurl_body = fetch_page(&self.http_client, &uurl).await?;
        let gallery_url = extract_token("gallery-viewer", &uurl, &uurl_body, gallery_pattern())?;
        let map_path = extract_token("gallery-map", &gallery_url, &gallery_url, map_pattern())?;

        let gallery_body = fetch_page(&self.http_client, &gallery_url).await?;
        let _parameters = extract_token(
            "ajaxzoom-parameter",
            &gallery_url,
            &gallery_body,
            zoom_parameter_pattern(),
        )?;
        let _path = extract_token(
            "ajaxzoom-path",
            &gallery_url,
            &gallery_body,
            zoom_path_pattern(),
        )?;

        let document_id = document_url
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("unknown")
            .to_string();

        debug!(
            document_id = %document_id,
            gallery_url = %gallery_url,
            map = %map_path,
            "Viewer chain resolved"
        );

        Ok(ViewerChain {
            document_id,
            gallery_url,
            map_path,
        })
    }

    /// Enumerates the tile base URLs of consecutive manuscript pages.
    ///
    /// Pages are probed by fetching each page's first max-zoom tile;
    /// enumeration stops after [`PAGE_PROBE_MISS_LIMIT`] consecutive misses.
    pub async fn available_pages(&self, document_url: &str) -> Result<Vec<String>, DiscoveryError> {
        let chain = self.extract_viewer_chain(document_url).await?;
        let headers = vec![("Referer".to_string(), chain.gallery_url.clone())];

        let mut pages = Vec::new();
        let mut consecutive_misses = 0;
        let mut page_number = 1u32;

        while consecutive_misses < PAGE_PROBE_MISS_LIMIT && page_number <= PAGE_PROBE_MAX {
            let page_id = format!("{}_{:04}", chain.document_id, page_number);
            let page_url = format!(
                "https://viewerd.kbr.be/display/SYRACUSE/zoomtiles/{}/",
                page_id
            );
            let probe_url = format!("{}{}-0-0.jpg", page_url, MAX_ZOOM);

            match self.http_client.get_with_headers(&probe_url, &headers).await {
                Ok(_) => {
                    pages.push(page_url);
                    consecutive_misses = 0;
                }
                Err(_) => {
                    consecutive_misses += 1;
                }
            }
            page_number += 1;
        }

        debug!(
            document_id = %chain.document_id,
            pages = pages.len(),
            "Page enumeration complete"
        );
        Ok(pages)
    }
}

impl<C: AsyncHttpClient> TileAdapter for KbrAdapter<C> {
    fn name(&self) -> &str {
        "belgica-kbr"
    }

    fn description(&self) -> &str {
        "Belgica KBR manuscript viewer (AjaxZoom deep-zoom tiles)"
    }

    fn validate_url(&self, url: &str) -> bool {
        url.contains("belgica.kbr.be") && url.contains("/doc/") && url.contains("SYRACUSE")
    }

    fn analyze_page<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, Result<TileGridConfig, DiscoveryError>> {
        Box::pin(async move {
            // The chain walk is the discovery: if every hop resolves, the
            // tile pyramid exists and the static table applies.
            self.extract_viewer_chain(url).await?;
            Ok(Self::grid_for_zoom(MAX_ZOOM))
        })
    }

    fn generate_tile_urls(
        &self,
        base_url: &str,
        config: &TileGridConfig,
    ) -> Result<Vec<String>, DiscoveryError> {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let extension = config.format.unwrap_or_default().extension();

        let urls = config
            .coordinates()
            .map(|coord| format!("{}{}-{}-{}.{}", base, coord.z, coord.x, coord.y, extension))
            .collect();
        Ok(urls)
    }

    fn auth_config<'a>(
        &'a self,
        base_url: &'a str,
    ) -> BoxFuture<'a, Result<TileAuthConfig, DiscoveryError>> {
        Box::pin(async move {
            let referrer =
                origin_of(base_url).unwrap_or_else(|| FALLBACK_REFERRER.to_string());

            Ok(TileAuthConfig::Referrer {
                referrer,
                extra_headers: vec![
                    (
                        "Accept".to_string(),
                        "image/avif,image/webp,image/apng,image/*,*/*;q=0.8".to_string(),
                    ),
                    ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
                    ("Sec-Fetch-Dest".to_string(), "image".to_string()),
                    ("Sec-Fetch-Mode".to_string(), "no-cors".to_string()),
                    ("Sec-Fetch-Site".to_string(), "cross-site".to_string()),
                ],
            })
        })
    }

    fn validate_tile(&self, bytes: &[u8], coordinate: TileCoordinate) -> TileValidationResult {
        let mut result =
            validate_tile_bytes(bytes, coordinate, Some((TILE_SIZE, TILE_SIZE)));

        // The viewer only ever serves JPEG; any other container means an
        // error page or placeholder slipped through.
        if result.is_valid && detect_format(bytes) != Some(SniffedFormat::Jpeg) {
            result
                .errors
                .push(format!("tile {}: expected a JPEG tile", coordinate));
            result.is_valid = false;
        }

        result
    }

    fn optimize_grid_config(&self, config: &TileGridConfig) -> TileGridConfig {
        let mut optimized = config.normalized();
        optimized.zoom_level = MAX_ZOOM;
        optimized.format = Some(TileFormat::Jpg);
        optimized
    }
}
