//! Tile download engine
//!
//! [`TileEngineCore`] orchestrates one full session: resolve the adapter,
//! discover geometry and auth, fan the tile grid out as concurrent
//! download units gated by a bounded worker pool and the shared token
//! bucket, retry failures with linear backoff, validate tile bytes, stitch
//! the survivors, clean up, and report a [`TileEngineResult`].
//!
//! # Concurrency
//!
//! Units are spawned into a `JoinSet` and gated twice: a `Semaphore` sized
//! by `max_concurrent_downloads` caps in-flight units (memory bound for
//! large grids), and the [`TokenBucket`] enforces the request rate.
//! Completion order is nondeterministic; the output is deterministic
//! because tiles are sorted by (y, x) before composition.
//!
//! # Cancellation
//!
//! Each session owns a child `CancellationToken`. Cancellation is checked
//! before a unit starts and raced against the in-flight HTTP call; aborted
//! units are reported distinctly and never retried.

mod callbacks;
mod error;
mod progress;
mod result;

pub use callbacks::{
    CompleteCallback, ErrorCallback, ProgressCallback, TileDownloadCallbacks,
    TileDownloadedCallback, TileErrorCallback,
};
pub use error::{EngineError, TileError};
pub use progress::TileDownloadProgress;
pub use result::{FailedTile, SessionMetadata, TileEngineResult};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::select;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::adapter::TileAdapter;
use crate::config::EngineConfig;
use crate::grid::TileCoordinate;
use crate::http::AsyncHttpClient;
use crate::ratelimit::TokenBucket;
use crate::stitch::{sort_tiles, FallbackStitcher, PlacedTile, StitchPlan, Stitcher};

use progress::ProgressTracker;

/// The tile acquisition engine.
///
/// Holds the adapter registry (in registration order), the HTTP client,
/// the stitcher, and the active-session registry used for aborts. Cheap to
/// share behind an `Arc`.
pub struct TileEngineCore<C: AsyncHttpClient> {
    config: EngineConfig,
    http_client: Arc<C>,
    stitcher: Arc<dyn Stitcher>,
    adapters: RwLock<Vec<Arc<dyn TileAdapter>>>,
    sessions: Mutex<HashMap<u64, CancellationToken>>,
    next_session_id: AtomicU64,
}

/// Per-session state shared by all download units.
struct SessionShared<C: AsyncHttpClient> {
    http_client: Arc<C>,
    adapter: Arc<dyn TileAdapter>,
    headers: Vec<(String, String)>,
    limiter: TokenBucket,
    workers: Semaphore,
    tracker: ProgressTracker,
    callbacks: Arc<TileDownloadCallbacks>,
    cancel: CancellationToken,
    retry_attempts: u32,
    retry_delay: Duration,
    request_timeout: Duration,
    temp_dir: PathBuf,
    extension: &'static str,
}

/// Outcome of one download unit.
enum UnitOutcome {
    Success(PlacedTile),
    Failure(FailedTile),
}

impl<C: AsyncHttpClient + 'static> TileEngineCore<C> {
    /// Creates an engine with the default stitcher (external ImageMagick
    /// with in-process fallback).
    pub fn new(config: EngineConfig, http_client: C) -> Self {
        Self::with_stitcher(config, http_client, Arc::new(FallbackStitcher::new()))
    }

    /// Creates an engine with a specific stitcher implementation.
    pub fn with_stitcher(
        config: EngineConfig,
        http_client: C,
        stitcher: Arc<dyn Stitcher>,
    ) -> Self {
        Self {
            config,
            http_client: Arc::new(http_client),
            stitcher,
            adapters: RwLock::new(Vec::new()),
            sessions: Mutex::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Registers an adapter. Registration order is significant: the
    /// service facade auto-detects by first match.
    pub fn register_adapter(&self, adapter: Arc<dyn TileAdapter>) {
        debug!(adapter = adapter.name(), "Registering tile adapter");
        self.adapters.write().push(adapter);
    }

    /// Looks an adapter up by registry name.
    pub fn adapter(&self, name: &str) -> Option<Arc<dyn TileAdapter>> {
        self.adapters
            .read()
            .iter()
            .find(|adapter| adapter.name() == name)
            .cloned()
    }

    /// Registered adapters in registration order.
    pub fn adapters(&self) -> Vec<Arc<dyn TileAdapter>> {
        self.adapters.read().clone()
    }

    /// Registered adapter names in registration order.
    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters
            .read()
            .iter()
            .map(|adapter| adapter.name().to_string())
            .collect()
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ids of sessions currently running.
    pub fn active_sessions(&self) -> Vec<u64> {
        self.sessions.lock().keys().copied().collect()
    }

    /// Cancels one running session. Returns false when the id is unknown.
    pub fn abort_session(&self, session_id: u64) -> bool {
        match self.sessions.lock().get(&session_id) {
            Some(token) => {
                info!(session_id = session_id, "Aborting session");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every running session.
    pub fn abort_all(&self) {
        let sessions = self.sessions.lock();
        info!(sessions = sessions.len(), "Aborting all sessions");
        for token in sessions.values() {
            token.cancel();
        }
    }

    /// Runs one full download-and-stitch session.
    ///
    /// Fails fast on configuration/discovery errors (nothing to clean up),
    /// tolerates per-tile failures up to the retry budget, and fails the
    /// session as a whole only on zero successes or a stitch failure. The
    /// returned result may carry a non-empty `failed_tiles` list; partial
    /// completeness policy is the caller's.
    pub async fn download_and_stitch(
        &self,
        url: &str,
        adapter_name: &str,
        output_path: impl AsRef<Path>,
        callbacks: TileDownloadCallbacks,
    ) -> Result<TileEngineResult, EngineError> {
        let callbacks = Arc::new(callbacks);
        let output_path = output_path.as_ref();

        let result = self
            .try_download_and_stitch(url, adapter_name, output_path, Arc::clone(&callbacks))
            .await;

        if let Err(error) = &result {
            warn!(url = url, error = %error, "Session failed");
            callbacks.emit_error(error);
        }
        result
    }

    async fn try_download_and_stitch(
        &self,
        url: &str,
        adapter_name: &str,
        output_path: &Path,
        callbacks: Arc<TileDownloadCallbacks>,
    ) -> Result<TileEngineResult, EngineError> {
        let adapter = self
            .adapter(adapter_name)
            .ok_or_else(|| EngineError::AdapterNotFound(adapter_name.to_string()))?;

        if !adapter.validate_url(url) {
            return Err(EngineError::UrlRejected {
                adapter: adapter_name.to_string(),
                url: url.to_string(),
            });
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        self.sessions.lock().insert(session_id, cancel.clone());

        let result = self
            .run_session(session_id, cancel, adapter, url, output_path, callbacks)
            .await;

        self.sessions.lock().remove(&session_id);
        result
    }

    async fn run_session(
        &self,
        session_id: u64,
        cancel: CancellationToken,
        adapter: Arc<dyn TileAdapter>,
        url: &str,
        output_path: &Path,
        callbacks: Arc<TileDownloadCallbacks>,
    ) -> Result<TileEngineResult, EngineError> {
        let started = Instant::now();
        info!(
            session_id = session_id,
            adapter = adapter.name(),
            url = url,
            "Starting tile session"
        );

        // Discovery chain: geometry, normalization, URLs, auth. Any failure
        // here aborts before tile traffic.
        let discovered = adapter.analyze_page(url).await?;
        let grid = adapter.optimize_grid_config(&discovered);
        let tile_urls = adapter.generate_tile_urls(url, &grid)?;
        let auth = adapter.auth_config(url).await?;

        let total_tiles = tile_urls.len();
        if total_tiles != grid.tile_count() {
            warn!(
                adapter = adapter.name(),
                urls = total_tiles,
                grid_tiles = grid.tile_count(),
                "Adapter generated a URL count that does not match its grid"
            );
        }

        info!(
            session_id = session_id,
            grid = %format!("{}x{}", grid.grid_width, grid.grid_height),
            zoom = grid.zoom_level,
            tiles = total_tiles,
            auth = auth.scheme(),
            "Discovery complete"
        );

        let temp_dir = self
            .config
            .stitching
            .temp_directory
            .join(format!("session-{:06}", session_id));
        tokio::fs::create_dir_all(&temp_dir)
            .await
            .map_err(|e| EngineError::Io {
                path: temp_dir.clone(),
                source: e,
            })?;

        let shared = Arc::new(SessionShared {
            http_client: Arc::clone(&self.http_client),
            adapter: Arc::clone(&adapter),
            headers: auth.header_pairs(),
            limiter: TokenBucket::new(
                self.config.rate_limit.requests_per_second,
                self.config.rate_limit.burst_size,
            ),
            workers: Semaphore::new(self.config.max_concurrent_downloads),
            tracker: ProgressTracker::new(total_tiles),
            callbacks: Arc::clone(&callbacks),
            cancel,
            retry_attempts: self.config.retry_attempts,
            retry_delay: self.config.retry_delay,
            request_timeout: self.config.request_timeout,
            temp_dir: temp_dir.clone(),
            extension: grid.format.unwrap_or_default().extension(),
        });

        let mut units = JoinSet::new();
        for (index, tile_url) in tile_urls.into_iter().enumerate() {
            let shared = Arc::clone(&shared);
            let coordinate = grid.index_to_coordinate(index);
            units.spawn(async move { run_unit(shared, coordinate, tile_url).await });
        }

        let mut placed = Vec::new();
        let mut failed = Vec::new();
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(UnitOutcome::Success(tile)) => placed.push(tile),
                Ok(UnitOutcome::Failure(failure)) => failed.push(failure),
                Err(join_error) => warn!(error = %join_error, "Download unit panicked"),
            }
        }

        let errors: Vec<String> = failed
            .iter()
            .map(|f| format!("tile {}: {}", f.coordinate, f.error))
            .collect();

        if placed.is_empty() {
            cleanup_temp(&temp_dir).await;
            return Err(EngineError::NoTilesDownloaded { total: total_tiles });
        }

        // Deterministic composition order regardless of completion order.
        sort_tiles(&mut placed);
        let downloaded_tiles = placed.len();

        let plan = StitchPlan {
            tiles: placed,
            grid: grid.clone(),
            output_path: output_path.to_path_buf(),
            options: self.config.stitching.clone(),
        };
        let stitched = self.stitcher.stitch(&plan).await;

        // Scratch space is deleted unconditionally, stitch success or not.
        cleanup_temp(&temp_dir).await;
        stitched?;

        let total_time = started.elapsed();
        callbacks.emit_complete(output_path, total_time);
        info!(
            session_id = session_id,
            downloaded = downloaded_tiles,
            failed = failed.len(),
            total_ms = total_time.as_millis() as u64,
            output = %output_path.display(),
            "Session complete"
        );

        let final_dimensions = grid.final_dimensions();
        Ok(TileEngineResult {
            success: true,
            output_path: output_path.to_path_buf(),
            total_time,
            total_tiles,
            downloaded_tiles,
            failed_tiles: failed,
            errors,
            metadata: SessionMetadata {
                grid,
                auth,
                final_dimensions,
                total_bytes: shared.tracker.bytes_downloaded(),
            },
        })
    }
}

/// Downloads one tile with bounded retries, writing it into session
/// scratch space on success.
async fn run_unit<C: AsyncHttpClient>(
    shared: Arc<SessionShared<C>>,
    coordinate: TileCoordinate,
    tile_url: String,
) -> UnitOutcome {
    // Units cancelled before starting fail immediately as aborted.
    if shared.cancel.is_cancelled() {
        return fail_unit(&shared, coordinate, 0, TileError::Aborted);
    }

    let _permit = select! {
        biased;
        _ = shared.cancel.cancelled() => {
            return fail_unit(&shared, coordinate, 0, TileError::Aborted);
        }
        permit = shared.workers.acquire() => {
            permit.expect("worker pool semaphore closed unexpectedly")
        }
    };

    let max_attempts = shared.retry_attempts + 1;
    let mut attempts = 0u32;
    let mut last_error = TileError::Aborted;

    while attempts < max_attempts {
        attempts += 1;

        match attempt_tile(&shared, coordinate, &tile_url).await {
            Ok(placed) => {
                trace!(tile = %coordinate, attempt = attempts, "Tile stored");
                return UnitOutcome::Success(placed);
            }
            Err(error) => {
                warn!(
                    tile = %coordinate,
                    url = %tile_url,
                    attempt = attempts,
                    error = %error,
                    "Tile download attempt failed"
                );
                let retryable = error.is_retryable();
                last_error = error;
                if !retryable {
                    break;
                }
            }
        }

        if attempts < max_attempts {
            // Linear backoff: attempt N waits N × retry_delay.
            let backoff = shared.retry_delay * attempts;
            select! {
                biased;
                _ = shared.cancel.cancelled() => {
                    last_error = TileError::Aborted;
                    break;
                }
                _ = sleep(backoff) => {}
            }
        }
    }

    fail_unit(&shared, coordinate, attempts, last_error)
}

/// One download attempt: rate limit → fetch → validate → store.
async fn attempt_tile<C: AsyncHttpClient>(
    shared: &SessionShared<C>,
    coordinate: TileCoordinate,
    tile_url: &str,
) -> Result<PlacedTile, TileError> {
    select! {
        biased;
        _ = shared.cancel.cancelled() => return Err(TileError::Aborted),
        _ = shared.limiter.acquire() => {}
    }

    let request = shared.http_client.get_with_headers(tile_url, &shared.headers);
    let bytes = select! {
        biased;
        _ = shared.cancel.cancelled() => return Err(TileError::Aborted),
        outcome = timeout(shared.request_timeout, request) => match outcome {
            Err(_) => {
                return Err(TileError::Transport(format!(
                    "timed out after {} ms",
                    shared.request_timeout.as_millis()
                )))
            }
            Ok(Err(e)) => return Err(TileError::Transport(e.to_string())),
            Ok(Ok(bytes)) => bytes,
        },
    };

    let validation = shared.adapter.validate_tile(&bytes, coordinate);
    for warning in &validation.warnings {
        debug!(tile = %coordinate, warning = %warning, "Tile validation warning");
    }
    if !validation.is_valid {
        return Err(TileError::Validation(validation.errors.join(", ")));
    }

    let path = shared.temp_dir.join(format!(
        "tile_x{}_y{}.{}",
        coordinate.x, coordinate.y, shared.extension
    ));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| TileError::Storage(e.to_string()))?;

    let progress = shared.tracker.record_success(coordinate, bytes.len());
    shared.callbacks.emit_progress(&progress);
    shared.callbacks.emit_tile_downloaded(coordinate, &bytes);

    Ok(PlacedTile { coordinate, path })
}

/// Records a permanent tile failure and builds its outcome.
fn fail_unit<C: AsyncHttpClient>(
    shared: &SessionShared<C>,
    coordinate: TileCoordinate,
    attempts: u32,
    error: TileError,
) -> UnitOutcome {
    shared.tracker.record_failure(coordinate);
    shared.callbacks.emit_tile_error(coordinate, &error);

    let aborted = matches!(error, TileError::Aborted);
    UnitOutcome::Failure(FailedTile {
        coordinate,
        attempts,
        error: error.to_string(),
        aborted,
    })
}

/// Deletes session scratch space. Cleanup errors are swallowed, never
/// surfaced to the session outcome.
async fn cleanup_temp(temp_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(temp_dir).await {
        debug!(path = %temp_dir.display(), error = %e, "Temp cleanup failed");
    }
}
