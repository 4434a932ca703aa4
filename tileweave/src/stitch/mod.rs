//! Tile composition
//!
//! Reassembles downloaded tile files into one contiguous raster. The
//! composition step is abstracted behind [`Stitcher`]: the default
//! implementation spawns ImageMagick's `montage` as an external process
//! (exit codes mapped to typed errors), with an in-process compositor as
//! fallback when the tool is not installed.

mod canvas;
mod magick;

use std::path::PathBuf;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::warn;

use crate::config::StitchingConfig;
use crate::grid::{TileCoordinate, TileGridConfig};

pub use canvas::CanvasStitcher;
pub use magick::MagickStitcher;

/// A successfully downloaded tile awaiting composition.
#[derive(Debug, Clone)]
pub struct PlacedTile {
    /// Grid position of the tile.
    pub coordinate: TileCoordinate,
    /// File the raw tile bytes were written to.
    pub path: PathBuf,
}

/// Everything a [`Stitcher`] needs to compose one raster.
#[derive(Debug, Clone)]
pub struct StitchPlan {
    /// Tiles to compose, sorted by (y, x). See [`sort_tiles`].
    pub tiles: Vec<PlacedTile>,
    /// Grid geometry the tiles belong to.
    pub grid: TileGridConfig,
    /// Destination of the composed raster.
    pub output_path: PathBuf,
    /// Encoder and memory options.
    pub options: StitchingConfig,
}

/// Errors from the composition step.
#[derive(Debug, Error)]
pub enum StitchError {
    /// The external tool could not be spawned.
    #[error("stitching tool unavailable: {0}")]
    ToolUnavailable(String),

    /// The external tool ran but exited non-zero.
    #[error("stitching tool exited with status {code:?}: {stderr}")]
    ToolFailed { code: Option<i32>, stderr: String },

    /// A tile file could not be read or decoded.
    #[error("failed to decode tile {path}: {reason}")]
    TileDecode { path: PathBuf, reason: String },

    /// The composed raster could not be written.
    #[error("failed to write output {path}: {reason}")]
    OutputWrite { path: PathBuf, reason: String },

    /// The plan contained no tiles.
    #[error("stitch plan contains no tiles")]
    EmptyPlan,
}

/// Composes sorted tile files into a single raster at the plan's output
/// path.
pub trait Stitcher: Send + Sync {
    /// Implementation name for logging.
    fn name(&self) -> &str;

    /// Runs the composition. The output file exists on success; any
    /// failure is a hard session failure for the caller.
    fn stitch<'a>(&'a self, plan: &'a StitchPlan) -> BoxFuture<'a, Result<(), StitchError>>;
}

/// Sorts tiles by (y ascending, then x ascending).
///
/// Completion order of downloads is nondeterministic; this sort is what
/// makes the composed output deterministic.
pub fn sort_tiles(tiles: &mut [PlacedTile]) {
    tiles.sort_by_key(|tile| (tile.coordinate.y, tile.coordinate.x));
}

/// External-tool stitcher with an in-process fallback.
///
/// Tries ImageMagick first; if the tool cannot be spawned at all, falls
/// back to the in-process compositor. A tool that runs and fails is a
/// hard error — only unavailability triggers the fallback.
pub struct FallbackStitcher {
    external: MagickStitcher,
    fallback: CanvasStitcher,
}

impl FallbackStitcher {
    /// Creates the default stitcher pair.
    pub fn new() -> Self {
        Self {
            external: MagickStitcher::new(),
            fallback: CanvasStitcher::new(),
        }
    }
}

impl Default for FallbackStitcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Stitcher for FallbackStitcher {
    fn name(&self) -> &str {
        "magick-with-fallback"
    }

    fn stitch<'a>(&'a self, plan: &'a StitchPlan) -> BoxFuture<'a, Result<(), StitchError>> {
        Box::pin(async move {
            match self.external.stitch(plan).await {
                Err(StitchError::ToolUnavailable(reason)) => {
                    warn!(
                        reason = %reason,
                        "External stitching tool unavailable, composing in-process"
                    );
                    self.fallback.stitch(plan).await
                }
                other => other,
            }
        })
    }
}
