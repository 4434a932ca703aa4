//! Engine configuration
//!
//! Groups all parameters recognized by the download engine and the service
//! facade, providing the defaults the system ships with while allowing
//! customization through builder-style `with_*` methods.

use std::path::PathBuf;
use std::time::Duration;

use crate::grid::TileFormat;

/// Default number of simultaneously in-flight tile downloads.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 5;

/// Default retry attempts per failed tile (in addition to the first try).
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay between retries; attempt N waits N × this.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default steady-state request rate.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 2;

/// Default burst capacity.
pub const DEFAULT_BURST_SIZE: u32 = 5;

/// Token-bucket rate limiting parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Steady-state requests per second.
    pub requests_per_second: u32,
    /// Maximum tokens the bucket can hold.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst_size: DEFAULT_BURST_SIZE,
        }
    }
}

/// Tile caching parameters.
///
/// Recognized and carried for the download-queue layer that consumes this
/// crate; the core itself performs no cross-session caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachingConfig {
    /// Whether the consuming layer should cache tiles.
    pub enabled: bool,
    /// Maximum cache size in bytes.
    pub max_size: u64,
    /// Cache entry time-to-live.
    pub ttl: Duration,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 100 * 1024 * 1024,
            ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Stitching parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitchingConfig {
    /// Output raster format.
    pub output_format: TileFormat,
    /// Encoder quality (1-100) for lossy output.
    pub quality: u8,
    /// Encoder compression level for formats that use one.
    pub compression: u8,
    /// Memory ceiling hint for the compositor, in bytes.
    pub max_memory_usage: u64,
    /// Prefer streaming composition over whole-canvas buffering.
    pub use_streaming: bool,
    /// Root directory for per-session tile scratch space.
    pub temp_directory: PathBuf,
}

impl Default for StitchingConfig {
    fn default() -> Self {
        Self {
            output_format: TileFormat::Jpg,
            quality: 95,
            compression: 95,
            max_memory_usage: 512 * 1024 * 1024,
            use_streaming: true,
            temp_directory: std::env::temp_dir().join("tileweave"),
        }
    }
}

/// Configuration for the tile download engine.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tileweave::config::EngineConfig;
///
/// // Using defaults
/// let config = EngineConfig::default();
/// assert_eq!(config.max_concurrent_downloads, 5);
/// assert_eq!(config.retry_attempts, 3);
///
/// // Custom configuration
/// let config = EngineConfig::new()
///     .with_max_concurrent_downloads(8)
///     .with_retry_attempts(1)
///     .with_request_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum simultaneously in-flight tile downloads (the worker pool
    /// bound, enforced in addition to the rate limiter).
    pub max_concurrent_downloads: usize,
    /// Retry attempts per failed tile (in addition to the first try).
    pub retry_attempts: u32,
    /// Base retry delay; attempt N backs off N × this.
    pub retry_delay: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Token-bucket parameters shared by a session's downloads.
    pub rate_limit: RateLimitConfig,
    /// Caching parameters (carried for the consuming layer).
    pub caching: CachingConfig,
    /// Stitching parameters.
    pub stitching: StitchingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            rate_limit: RateLimitConfig::default(),
            caching: CachingConfig::default(),
            stitching: StitchingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker pool bound. Clamped to at least 1.
    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = max.max(1);
        self
    }

    /// Sets the retry attempts per failed tile.
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Sets the base retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the rate limit parameters.
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Sets the caching parameters.
    pub fn with_caching(mut self, caching: CachingConfig) -> Self {
        self.caching = caching;
        self
    }

    /// Sets the stitching parameters.
    pub fn with_stitching(mut self, stitching: StitchingConfig) -> Self {
        self.stitching = stitching;
        self
    }
}
