//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use tileweave::engine::EngineError;
use tileweave::http::HttpError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Failed to build the HTTP client
    ClientSetup(HttpError),
    /// A download/analysis session failed
    Engine(EngineError),
    /// Validation-only run found the source unusable
    InvalidSource(Vec<String>),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Engine(EngineError::NoAdapterForUrl(_)) => {
                eprintln!();
                eprintln!("Supported sources:");
                eprintln!("  - Belgica KBR document pages (belgica.kbr.be/.../doc/SYRACUSE/...)");
                eprintln!("  - IIIF Image API services (any URL containing /iiif/ or ending in info.json)");
            }
            CliError::Engine(EngineError::Composition(_)) => {
                eprintln!();
                eprintln!("Stitching runs ImageMagick when available; check that the");
                eprintln!("'magick' binary works, or rerun to use the built-in compositor.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::ClientSetup(e) => write!(f, "Failed to set up HTTP client: {}", e),
            CliError::Engine(e) => write!(f, "{}", e),
            CliError::InvalidSource(errors) => {
                write!(f, "Source failed validation: {}", errors.join("; "))
            }
        }
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

impl From<HttpError> for CliError {
    fn from(e: HttpError) -> Self {
        CliError::ClientSetup(e)
    }
}
