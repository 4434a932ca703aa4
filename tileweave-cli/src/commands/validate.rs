//! Validate command - check that a URL is a usable tiled source.

use clap::Args;

use super::build_service;
use crate::error::CliError;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Source URL (document page or IIIF image service)
    pub url: String,
}

/// Run the validate command.
pub async fn run(args: ValidateArgs) -> Result<(), CliError> {
    let service = build_service(5, 3, 2, 5, 30)?;

    println!("Validating source: {}", args.url);
    let validation = service.validate_source(&args.url).await;

    if let Some(adapter) = &validation.adapter {
        println!("  Adapter: {}", adapter);
    }
    if let Some(grid) = &validation.grid {
        println!(
            "  Grid:    {}x{} tiles of {}x{} px",
            grid.grid_width, grid.grid_height, grid.tile_width, grid.tile_height
        );
    }
    for warning in &validation.warnings {
        println!("  Warning: {}", warning);
    }
    for error in &validation.errors {
        println!("  Error:   {}", error);
    }

    if validation.is_valid {
        println!("Source is valid.");
        Ok(())
    } else {
        Err(CliError::InvalidSource(validation.errors))
    }
}
