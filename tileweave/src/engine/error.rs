//! Engine error types

use std::path::PathBuf;

use thiserror::Error;

use crate::adapter::DiscoveryError;
use crate::stitch::StitchError;

/// Per-tile failures.
///
/// These drive the bounded retry policy: transport, validation, and
/// storage failures are retried with linear backoff; aborts are reported
/// distinctly and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    /// Network failure, non-2xx response, or request timeout.
    #[error("transport: {0}")]
    Transport(String),

    /// Tile bytes failed format/size validation.
    #[error("validation: {0}")]
    Validation(String),

    /// The tile file could not be written to session scratch space.
    #[error("storage: {0}")]
    Storage(String),

    /// The session was cancelled before or during this tile.
    #[error("aborted")]
    Aborted,
}

impl TileError {
    /// Whether the retry policy applies to this failure.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TileError::Aborted)
    }
}

/// Session-fatal errors.
///
/// Configuration and discovery errors abort the session before any tile
/// traffic. Per-tile failures never surface here; the session as a whole
/// fails only on zero successes or a stitch failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No adapter is registered under the requested name.
    #[error("no adapter registered under name '{0}'")]
    AdapterNotFound(String),

    /// No registered adapter recognizes the URL (service auto-detection).
    #[error("no suitable tile adapter found for URL: {0}")]
    NoAdapterForUrl(String),

    /// The adapter's structural URL check rejected the session URL.
    #[error("URL rejected by adapter '{adapter}': {url}")]
    UrlRejected { adapter: String, url: String },

    /// Geometry or auth discovery failed.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Every tile failed; nothing was stitched or written.
    #[error("no tiles downloaded successfully ({total} attempted)")]
    NoTilesDownloaded { total: usize },

    /// The composition step failed.
    #[error(transparent)]
    Composition(#[from] StitchError),

    /// Session-level filesystem failure (e.g. scratch directory creation).
    #[error("session I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
