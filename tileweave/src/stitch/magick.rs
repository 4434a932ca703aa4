//! External ImageMagick stitcher

use std::ffi::OsString;
use std::io::ErrorKind;

use futures::future::BoxFuture;
use tokio::process::Command;
use tracing::{debug, trace};

use super::{StitchError, StitchPlan, Stitcher};

/// Default ImageMagick binary name.
const DEFAULT_BINARY: &str = "magick";

/// Stitcher that spawns ImageMagick's `montage` tool.
///
/// The tool concatenates the sorted tile files into a `grid_width ×
/// grid_height` mosaic. The invocation is an OS-process boundary: a
/// missing binary maps to [`StitchError::ToolUnavailable`], a non-zero
/// exit to [`StitchError::ToolFailed`] with captured stderr.
pub struct MagickStitcher {
    binary: String,
}

impl MagickStitcher {
    /// Creates a stitcher using the `magick` binary from `PATH`.
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_BINARY)
    }

    /// Creates a stitcher using a specific binary.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Builds the full `montage` argument list for a plan.
    fn build_args(plan: &StitchPlan) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "montage".into(),
            "-mode".into(),
            "concatenate".into(),
            "-tile".into(),
            format!("{}x{}", plan.grid.grid_width, plan.grid.grid_height).into(),
            "-geometry".into(),
            format!("{}x{}+0+0", plan.grid.tile_width, plan.grid.tile_height).into(),
            "-background".into(),
            "white".into(),
            "-quality".into(),
            plan.options.quality.to_string().into(),
        ];
        args.extend(plan.tiles.iter().map(|tile| tile.path.clone().into()));
        args.push(plan.output_path.clone().into());
        args
    }
}

impl Default for MagickStitcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Stitcher for MagickStitcher {
    fn name(&self) -> &str {
        "magick"
    }

    fn stitch<'a>(&'a self, plan: &'a StitchPlan) -> BoxFuture<'a, Result<(), StitchError>> {
        Box::pin(async move {
            if plan.tiles.is_empty() {
                return Err(StitchError::EmptyPlan);
            }

            let args = Self::build_args(plan);
            trace!(binary = %self.binary, args = args.len(), "Spawning stitch tool");

            let output = Command::new(&self.binary)
                .args(&args)
                .output()
                .await
                .map_err(|e| match e.kind() {
                    ErrorKind::NotFound => {
                        StitchError::ToolUnavailable(format!("'{}' not found", self.binary))
                    }
                    _ => StitchError::ToolUnavailable(e.to_string()),
                })?;

            if !output.status.success() {
                return Err(StitchError::ToolFailed {
                    code: output.status.code(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                });
            }

            debug!(
                output = %plan.output_path.display(),
                tiles = plan.tiles.len(),
                "External stitch complete"
            );
            Ok(())
        })
    }
}
