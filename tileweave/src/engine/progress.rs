//! Session progress tracking

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::grid::TileCoordinate;

/// Immutable snapshot of a session's download progress.
///
/// A fresh snapshot is built for every emission; consumers may hold on to
/// it without observing later mutation.
#[derive(Debug, Clone)]
pub struct TileDownloadProgress {
    /// Number of tiles the session will attempt.
    pub total_tiles: usize,
    /// Tiles downloaded and validated so far.
    pub downloaded_tiles: usize,
    /// Tile that triggered this snapshot, if any.
    pub current_tile: Option<TileCoordinate>,
    /// Completion percentage (0.0 - 100.0) over downloaded tiles.
    pub percentage: f64,
    /// Wall-clock time since the session started.
    pub elapsed: Duration,
    /// Remaining time extrapolated from the download rate so far.
    pub estimated_remaining: Option<Duration>,
    /// Raw tile bytes downloaded so far.
    pub bytes_downloaded: u64,
    /// Instantaneous speed in bytes per second (bytes / elapsed seconds).
    pub download_speed: f64,
    /// Tiles that have permanently failed so far.
    pub failed_tiles: Vec<TileCoordinate>,
}

struct ProgressState {
    downloaded: usize,
    bytes: u64,
    failed: Vec<TileCoordinate>,
}

/// Shared per-session progress accounting.
///
/// Updated concurrently by download units; all mutation happens under one
/// mutex and snapshots are taken atomically.
pub(crate) struct ProgressTracker {
    total_tiles: usize,
    started: Instant,
    state: Mutex<ProgressState>,
}

impl ProgressTracker {
    pub(crate) fn new(total_tiles: usize) -> Self {
        Self {
            total_tiles,
            started: Instant::now(),
            state: Mutex::new(ProgressState {
                downloaded: 0,
                bytes: 0,
                failed: Vec::new(),
            }),
        }
    }

    /// Records a downloaded tile and returns the snapshot to emit.
    pub(crate) fn record_success(
        &self,
        coordinate: TileCoordinate,
        bytes: usize,
    ) -> TileDownloadProgress {
        let mut state = self.state.lock();
        state.downloaded += 1;
        state.bytes += bytes as u64;
        self.snapshot_locked(&state, Some(coordinate))
    }

    /// Records a permanently failed tile.
    pub(crate) fn record_failure(&self, coordinate: TileCoordinate) {
        self.state.lock().failed.push(coordinate);
    }

    /// Total bytes downloaded so far.
    pub(crate) fn bytes_downloaded(&self) -> u64 {
        self.state.lock().bytes
    }

    fn snapshot_locked(
        &self,
        state: &ProgressState,
        current_tile: Option<TileCoordinate>,
    ) -> TileDownloadProgress {
        let elapsed = self.started.elapsed();
        let elapsed_secs = elapsed.as_secs_f64();

        let download_speed = if elapsed_secs > 0.0 {
            state.bytes as f64 / elapsed_secs
        } else {
            0.0
        };

        let remaining = self.total_tiles.saturating_sub(state.downloaded);
        let estimated_remaining = if state.downloaded > 0 && remaining > 0 {
            Some(Duration::from_secs_f64(
                elapsed_secs * remaining as f64 / state.downloaded as f64,
            ))
        } else {
            None
        };

        let percentage = if self.total_tiles > 0 {
            state.downloaded as f64 / self.total_tiles as f64 * 100.0
        } else {
            100.0
        };

        TileDownloadProgress {
            total_tiles: self.total_tiles,
            downloaded_tiles: state.downloaded,
            current_tile,
            percentage,
            elapsed,
            estimated_remaining,
            bytes_downloaded: state.bytes,
            download_speed,
            failed_tiles: state.failed.clone(),
        }
    }
}
