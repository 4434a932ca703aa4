//! Session outcome types

use std::path::PathBuf;
use std::time::Duration;

use crate::adapter::TileAuthConfig;
use crate::grid::{TileCoordinate, TileGridConfig};

/// A tile that permanently failed, with its failure record.
#[derive(Debug, Clone)]
pub struct FailedTile {
    /// Grid position of the tile.
    pub coordinate: TileCoordinate,
    /// Download attempts actually made (0 when aborted before the first).
    pub attempts: u32,
    /// Text of the last error observed.
    pub error: String,
    /// True when the failure was a cancellation rather than a retriable
    /// error.
    pub aborted: bool,
}

/// Descriptive metadata attached to a session result.
#[derive(Debug, Clone)]
pub struct SessionMetadata {
    /// The normalized grid config the session ran with.
    pub grid: TileGridConfig,
    /// The auth configuration tile requests were made with.
    pub auth: TileAuthConfig,
    /// Final stitched dimensions: grid × tile size.
    pub final_dimensions: (u32, u32),
    /// Total raw tile bytes downloaded.
    pub total_bytes: u64,
}

/// Outcome of one download-and-stitch session.
///
/// Created once at the end of a session; the only artifact that outlives
/// it besides the output file. A successful session may still carry a
/// non-empty `failed_tiles` list — whether partial completeness is
/// acceptable is the caller's policy, not the engine's.
#[derive(Debug, Clone)]
pub struct TileEngineResult {
    /// True for every result the engine returns (hard failures surface as
    /// errors instead); carried for consumers that persist results.
    pub success: bool,
    /// Where the stitched raster was written.
    pub output_path: PathBuf,
    /// Wall-clock duration of the whole session.
    pub total_time: Duration,
    /// Number of tiles the session attempted.
    pub total_tiles: usize,
    /// Number of tiles downloaded and validated.
    pub downloaded_tiles: usize,
    /// Tiles that permanently failed.
    pub failed_tiles: Vec<FailedTile>,
    /// Accumulated per-tile error descriptions.
    pub errors: Vec<String>,
    /// Session metadata.
    pub metadata: SessionMetadata,
}

impl TileEngineResult {
    /// Fraction of tiles downloaded, 0.0 - 1.0.
    pub fn completeness(&self) -> f64 {
        if self.total_tiles == 0 {
            return 1.0;
        }
        self.downloaded_tiles as f64 / self.total_tiles as f64
    }
}
