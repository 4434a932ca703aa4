//! TileWeave CLI - Command-line interface
//!
//! Downloads deep-zoom tile pyramids (manuscript viewers, IIIF image
//! services) and stitches them into full-resolution images.

mod commands;
mod error;

use clap::{Parser, Subcommand};

use error::CliError;

#[derive(Parser)]
#[command(
    name = "tileweave",
    version = tileweave::VERSION,
    about = "Download deep-zoom tile pyramids and stitch them into full-resolution images"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory for log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a tiled source and stitch it into one image
    Download(commands::download::DownloadArgs),
    /// Analyze a tiled source without downloading
    Analyze(commands::analyze::AnalyzeArgs),
    /// Validate that a URL is a usable tiled source
    Validate(commands::validate::ValidateArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let _logging_guard = match tileweave::logging::init_logging(
        &cli.log_dir,
        tileweave::logging::default_log_file(),
    ) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e.to_string()).exit(),
    };

    let result = match cli.command {
        Commands::Download(args) => commands::download::run(args).await,
        Commands::Analyze(args) => commands::analyze::run(args).await,
        Commands::Validate(args) => commands::validate::run(args).await,
    };

    if let Err(e) = result {
        e.exit();
    }
}
