//! Session callback interface
//!
//! The excluded UI/queue layer observes a session exclusively through
//! these callbacks. All are optional; unset callbacks cost nothing.

use std::path::Path;
use std::time::Duration;

use crate::grid::TileCoordinate;

use super::error::{EngineError, TileError};
use super::progress::TileDownloadProgress;

/// Called with a fresh progress snapshot after every downloaded tile.
pub type ProgressCallback = Box<dyn Fn(&TileDownloadProgress) + Send + Sync>;

/// Called with the raw bytes of every downloaded tile.
pub type TileDownloadedCallback = Box<dyn Fn(TileCoordinate, &[u8]) + Send + Sync>;

/// Called when a tile permanently fails (retries exhausted or aborted).
pub type TileErrorCallback = Box<dyn Fn(TileCoordinate, &TileError) + Send + Sync>;

/// Called once when the stitched output has been written.
pub type CompleteCallback = Box<dyn Fn(&Path, Duration) + Send + Sync>;

/// Called once when the session fails.
pub type ErrorCallback = Box<dyn Fn(&EngineError) + Send + Sync>;

/// Optional observer callbacks for one download session.
#[derive(Default)]
pub struct TileDownloadCallbacks {
    pub on_progress: Option<ProgressCallback>,
    pub on_tile_downloaded: Option<TileDownloadedCallback>,
    pub on_tile_error: Option<TileErrorCallback>,
    pub on_complete: Option<CompleteCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl TileDownloadCallbacks {
    /// Creates an empty callback set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the progress callback.
    pub fn on_progress(
        mut self,
        callback: impl Fn(&TileDownloadProgress) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Sets the per-tile success callback.
    pub fn on_tile_downloaded(
        mut self,
        callback: impl Fn(TileCoordinate, &[u8]) + Send + Sync + 'static,
    ) -> Self {
        self.on_tile_downloaded = Some(Box::new(callback));
        self
    }

    /// Sets the per-tile permanent-failure callback.
    pub fn on_tile_error(
        mut self,
        callback: impl Fn(TileCoordinate, &TileError) + Send + Sync + 'static,
    ) -> Self {
        self.on_tile_error = Some(Box::new(callback));
        self
    }

    /// Sets the completion callback.
    pub fn on_complete(
        mut self,
        callback: impl Fn(&Path, Duration) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Sets the session-failure callback.
    pub fn on_error(mut self, callback: impl Fn(&EngineError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub(crate) fn emit_progress(&self, progress: &TileDownloadProgress) {
        if let Some(callback) = &self.on_progress {
            callback(progress);
        }
    }

    pub(crate) fn emit_tile_downloaded(&self, coordinate: TileCoordinate, bytes: &[u8]) {
        if let Some(callback) = &self.on_tile_downloaded {
            callback(coordinate, bytes);
        }
    }

    pub(crate) fn emit_tile_error(&self, coordinate: TileCoordinate, error: &TileError) {
        if let Some(callback) = &self.on_tile_error {
            callback(coordinate, error);
        }
    }

    pub(crate) fn emit_complete(&self, output_path: &Path, total_time: Duration) {
        if let Some(callback) = &self.on_complete {
            callback(output_path, total_time);
        }
    }

    pub(crate) fn emit_error(&self, error: &EngineError) {
        if let Some(callback) = &self.on_error {
            callback(error);
        }
    }
}
