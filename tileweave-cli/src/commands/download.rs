//! Download command - download a tiled source and stitch it to one image.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use tileweave::engine::TileDownloadCallbacks;

use super::build_service;
use crate::error::CliError;

/// Arguments for the download command.
#[derive(Args)]
pub struct DownloadArgs {
    /// Source URL (document page or IIIF image service)
    pub url: String,

    /// Output image path
    #[arg(short, long, default_value = "stitched.jpg")]
    pub output: PathBuf,

    /// Maximum simultaneous tile downloads
    #[arg(long, default_value_t = 5)]
    pub concurrency: usize,

    /// Retry attempts per failed tile
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Steady-state request rate (requests per second)
    #[arg(long, default_value_t = 2)]
    pub rate: u32,

    /// Request burst capacity
    #[arg(long, default_value_t = 5)]
    pub burst: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

/// Run the download command.
pub async fn run(args: DownloadArgs) -> Result<(), CliError> {
    let service = Arc::new(build_service(
        args.concurrency,
        args.retries,
        args.rate,
        args.burst,
        args.timeout_secs,
    )?);

    // Ctrl-C aborts all in-flight sessions; tiles already downloaded are
    // still stitched if any succeeded before the signal
    let abort_handle = Arc::clone(&service);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, aborting downloads...");
        abort_handle.abort_all();
    }) {
        info!(error = %e, "Could not install Ctrl-C handler");
    }

    println!("Analyzing source: {}", args.url);
    let analysis = service.analyze_url(&args.url).await?;
    println!(
        "  Adapter: {} | grid {}x{} tiles of {}x{} px | ~{} MB estimated",
        analysis.adapter,
        analysis.grid.grid_width,
        analysis.grid.grid_height,
        analysis.grid.tile_width,
        analysis.grid.tile_height,
        analysis.estimated_bytes / (1024 * 1024),
    );

    let bar = ProgressBar::new(analysis.estimated_tiles as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} tiles ({percent}%) {msg}",
        )
        .expect("static progress template is valid"),
    );

    let progress_bar = bar.clone();
    let error_bar = bar.clone();
    let callbacks = TileDownloadCallbacks::new()
        .on_progress(move |progress| {
            progress_bar.set_position(progress.downloaded_tiles as u64);
            progress_bar.set_message(format!(
                "{:.0} KB/s",
                progress.download_speed / 1024.0
            ));
        })
        .on_tile_error(move |coordinate, error| {
            error_bar.println(format!("tile {} failed: {}", coordinate, error));
        });

    let result = service.download(&args.url, &args.output, callbacks).await?;
    bar.finish_and_clear();

    println!(
        "Stitched {}/{} tiles into {} ({}x{} px) in {:.1}s",
        result.downloaded_tiles,
        result.total_tiles,
        result.output_path.display(),
        result.metadata.final_dimensions.0,
        result.metadata.final_dimensions.1,
        result.total_time.as_secs_f64(),
    );

    if !result.failed_tiles.is_empty() {
        println!(
            "Warning: {} tile(s) failed permanently; the output has gaps:",
            result.failed_tiles.len()
        );
        for failure in &result.failed_tiles {
            println!(
                "  {} after {} attempt(s): {}",
                failure.coordinate, failure.attempts, failure.error
            );
        }
    }

    log_transfer_stats(result.metadata.total_bytes, result.total_time);
    Ok(())
}

fn log_transfer_stats(total_bytes: u64, total_time: Duration) {
    let seconds = total_time.as_secs_f64();
    if seconds > 0.0 {
        info!(
            bytes = total_bytes,
            seconds = %format!("{:.1}", seconds),
            rate_kbps = %format!("{:.0}", total_bytes as f64 / 1024.0 / seconds),
            "Transfer complete"
        );
    }
}
