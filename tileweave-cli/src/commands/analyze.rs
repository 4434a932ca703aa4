//! Analyze command - dry-run geometry and cost estimates.

use clap::Args;

use super::build_service;
use crate::error::CliError;

/// Arguments for the analyze command.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Source URL (document page or IIIF image service)
    pub url: String,
}

/// Run the analyze command.
pub async fn run(args: AnalyzeArgs) -> Result<(), CliError> {
    let service = build_service(5, 3, 2, 5, 30)?;

    println!("Analyzing source: {}", args.url);
    let analysis = service.analyze_url(&args.url).await?;

    let (width, height) = analysis.grid.final_dimensions();
    println!("  Adapter:         {}", analysis.adapter);
    println!(
        "  Grid:            {}x{} tiles of {}x{} px (zoom {})",
        analysis.grid.grid_width,
        analysis.grid.grid_height,
        analysis.grid.tile_width,
        analysis.grid.tile_height,
        analysis.grid.zoom_level,
    );
    println!("  Stitched size:   {}x{} px", width, height);
    println!("  Authentication:  {}", analysis.auth.scheme());
    println!("  Tiles:           {}", analysis.estimated_tiles);
    println!(
        "  Estimated fetch: ~{} MB, ~{}s at the configured rate",
        analysis.estimated_bytes / (1024 * 1024),
        analysis.estimated_duration.as_secs(),
    );

    Ok(())
}
