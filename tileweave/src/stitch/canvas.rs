//! In-process fallback compositor

use futures::future::BoxFuture;
use image::{Rgb, RgbImage};
use tracing::{debug, warn};

use crate::grid::TileFormat;

use super::{StitchError, StitchPlan, Stitcher};

/// Canvas background where no tile was placed (matches the external
/// tool's `-background white`).
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Stitcher that composes tiles onto an in-memory canvas.
///
/// Used when ImageMagick is not installed. Decodes each tile file with the
/// `image` crate and places it at its grid offset; composition is CPU-bound
/// and runs under `spawn_blocking`.
pub struct CanvasStitcher;

impl CanvasStitcher {
    /// Creates a new in-process compositor.
    pub fn new() -> Self {
        Self
    }
}

impl Default for CanvasStitcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Stitcher for CanvasStitcher {
    fn name(&self) -> &str {
        "canvas"
    }

    fn stitch<'a>(&'a self, plan: &'a StitchPlan) -> BoxFuture<'a, Result<(), StitchError>> {
        Box::pin(async move {
            if plan.tiles.is_empty() {
                return Err(StitchError::EmptyPlan);
            }

            let plan = plan.clone();
            tokio::task::spawn_blocking(move || compose(&plan))
                .await
                .map_err(|e| StitchError::OutputWrite {
                    path: std::path::PathBuf::new(),
                    reason: format!("compositor task failed: {}", e),
                })?
        })
    }
}

/// Synchronous composition (runs in `spawn_blocking`).
fn compose(plan: &StitchPlan) -> Result<(), StitchError> {
    let (canvas_width, canvas_height) = canvas_dimensions(plan);
    let mut canvas = RgbImage::from_pixel(canvas_width, canvas_height, BACKGROUND);

    for tile in &plan.tiles {
        let decoded = image::open(&tile.path)
            .map_err(|e| StitchError::TileDecode {
                path: tile.path.clone(),
                reason: e.to_string(),
            })?
            .to_rgb8();

        let x_offset = tile.coordinate.x * plan.grid.tile_width;
        let y_offset = tile.coordinate.y * plan.grid.tile_height;
        place_tile(&mut canvas, &decoded, x_offset, y_offset);
    }

    save_canvas(plan, &canvas)?;

    debug!(
        width = canvas_width,
        height = canvas_height,
        tiles = plan.tiles.len(),
        output = %plan.output_path.display(),
        "In-process stitch complete"
    );
    Ok(())
}

/// Canvas size: the exact source dimensions when the provider reported
/// them, the nominal grid extent otherwise.
fn canvas_dimensions(plan: &StitchPlan) -> (u32, u32) {
    let (nominal_width, nominal_height) = plan.grid.final_dimensions();
    (
        plan.grid.total_width.unwrap_or(nominal_width),
        plan.grid.total_height.unwrap_or(nominal_height),
    )
}

/// Places a decoded tile at its offset, clamped to the canvas bounds.
///
/// Edge tiles may be smaller than the nominal tile size, and the canvas may
/// be smaller than the nominal grid extent; both are handled by clamping.
fn place_tile(canvas: &mut RgbImage, tile: &RgbImage, x_offset: u32, y_offset: u32) {
    if x_offset >= canvas.width() || y_offset >= canvas.height() {
        warn!(
            x_offset = x_offset,
            y_offset = y_offset,
            "Tile placed entirely outside canvas, skipping"
        );
        return;
    }

    let width = tile.width().min(canvas.width() - x_offset);
    let height = tile.height().min(canvas.height() - y_offset);

    for y in 0..height {
        for x in 0..width {
            canvas.put_pixel(x_offset + x, y_offset + y, *tile.get_pixel(x, y));
        }
    }
}

fn save_canvas(plan: &StitchPlan, canvas: &RgbImage) -> Result<(), StitchError> {
    let write_error = |e: image::ImageError| StitchError::OutputWrite {
        path: plan.output_path.clone(),
        reason: e.to_string(),
    };

    // Prefer the output path's extension; fall back to the configured format
    // when the path has none the codec registry recognizes.
    match image::ImageFormat::from_path(&plan.output_path) {
        Ok(_) => canvas.save(&plan.output_path).map_err(write_error),
        Err(_) => {
            let format = match plan.options.output_format {
                TileFormat::Jpg => image::ImageFormat::Jpeg,
                TileFormat::Png => image::ImageFormat::Png,
                TileFormat::Webp => image::ImageFormat::WebP,
            };
            canvas
                .save_with_format(&plan.output_path, format)
                .map_err(write_error)
        }
    }
}
