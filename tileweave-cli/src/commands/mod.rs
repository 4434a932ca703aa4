//! CLI command implementations.

pub mod analyze;
pub mod download;
pub mod validate;

use std::sync::Arc;
use std::time::Duration;

use tileweave::config::{EngineConfig, RateLimitConfig};
use tileweave::http::AsyncReqwestClient;
use tileweave::service::TileEngineService;

use crate::error::CliError;

/// Builds a service with the default adapters and the given knobs.
pub(crate) fn build_service(
    concurrency: usize,
    retries: u32,
    rate: u32,
    burst: u32,
    timeout_secs: u64,
) -> Result<TileEngineService<Arc<AsyncReqwestClient>>, CliError> {
    let config = EngineConfig::new()
        .with_max_concurrent_downloads(concurrency)
        .with_retry_attempts(retries)
        .with_request_timeout(Duration::from_secs(timeout_secs))
        .with_rate_limit(RateLimitConfig {
            requests_per_second: rate,
            burst_size: burst,
        });

    TileEngineService::new(config).map_err(CliError::from)
}
