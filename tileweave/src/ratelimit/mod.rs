//! Token-bucket rate limiting
//!
//! A session's download units all draw from one [`TokenBucket`]; its token
//! state is the single piece of mutable state they share, guarded by a
//! `tokio::sync::Mutex` so the concurrency contract is explicit under true
//! parallelism. Built on `tokio::time` so paused-clock tests are exact.

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::trace;

/// Token-bucket throttle.
///
/// Permits accumulate at `requests_per_second` up to `burst_size` and are
/// spent one per acquisition. Bursts up to `burst_size` proceed
/// immediately; once drained, each acquisition blocks for one refill
/// interval (`1000 / requests_per_second` ms) and then proceeds as if one
/// token had been granted.
pub struct TokenBucket {
    requests_per_second: u32,
    burst_size: u32,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a bucket that starts full.
    ///
    /// A `requests_per_second` of 0 is clamped to 1.
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        let requests_per_second = requests_per_second.max(1);
        Self {
            requests_per_second,
            burst_size,
            state: Mutex::new(BucketState {
                tokens: burst_size,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Acquires one permit, waiting for the refill interval if the bucket
    /// is empty.
    pub async fn acquire(&self) {
        let delay = {
            let mut state = self.state.lock().await;

            let now = Instant::now();
            let elapsed = now.duration_since(state.last_refill);
            let refill =
                (elapsed.as_secs_f64() * self.requests_per_second as f64).floor() as u32;
            state.tokens = state.tokens.saturating_add(refill).min(self.burst_size);
            state.last_refill = now;

            if state.tokens == 0 {
                Some(Duration::from_secs_f64(
                    1.0 / self.requests_per_second as f64,
                ))
            } else {
                state.tokens -= 1;
                None
            }
        };

        // Lock released before sleeping: each exhausted waiter blocks one
        // interval and proceeds as if one token had been granted.
        if let Some(delay) = delay {
            trace!(delay_ms = delay.as_millis() as u64, "Rate limit exhausted, waiting");
            sleep(delay).await;
        }
    }

    /// The configured steady-state rate.
    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second
    }

    /// The configured burst capacity.
    pub fn burst_size(&self) -> u32 {
        self.burst_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_acquisitions_are_immediate() {
        let bucket = TokenBucket::new(2, 5);

        let start = Instant::now();
        for _ in 0..5 {
            bucket.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquisition_after_burst_waits_one_interval() {
        let bucket = TokenBucket::new(2, 5);
        for _ in 0..5 {
            bucket.acquire().await;
        }

        // Bucket drained: the 6th acquisition waits 1000/2 = 500 ms
        let start = Instant::now();
        bucket.acquire().await;

        let waited = start.elapsed();
        assert!(
            waited >= Duration::from_millis(500) && waited < Duration::from_millis(600),
            "expected ~500ms wait, got {:?}",
            waited
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_refill_at_steady_rate() {
        let bucket = TokenBucket::new(2, 5);
        for _ in 0..5 {
            bucket.acquire().await;
        }

        // 1 second accrues floor(1.0 * 2) = 2 tokens
        tokio::time::advance(Duration::from_secs(1)).await;

        let start = Instant::now();
        bucket.acquire().await;
        bucket.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        // Third acquisition exceeds the accrued tokens
        let start = Instant::now();
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped_at_burst_size() {
        let bucket = TokenBucket::new(10, 3);
        for _ in 0..3 {
            bucket.acquire().await;
        }

        // A long idle period must not accumulate beyond the burst cap
        tokio::time::advance(Duration::from_secs(100)).await;

        let start = Instant::now();
        for _ in 0..3 {
            bucket.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        let start = Instant::now();
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fractional_accrual_floors_to_zero() {
        let bucket = TokenBucket::new(2, 1);
        bucket.acquire().await;

        // 400 ms at 2 rps accrues floor(0.8) = 0 tokens
        tokio::time::advance(Duration::from_millis(400)).await;

        let start = Instant::now();
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let bucket = TokenBucket::new(0, 1);
        assert_eq!(bucket.requests_per_second(), 1);
        assert_eq!(bucket.burst_size(), 1);
    }
}
