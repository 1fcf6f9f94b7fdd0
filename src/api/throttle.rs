//! Pacing of outbound requests.

use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Enforces a minimum delay between consecutive requests on the shared
/// outbound connection.
///
/// The first request goes out immediately; every later one waits until
/// `interval` plus a random share of `jitter` has passed since the previous
/// request started.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    jitter: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration, jitter: Duration) -> Self {
        Self {
            interval,
            jitter,
            last_request: Mutex::new(None),
        }
    }

    /// A limiter that never waits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Minimum spacing between requests, without jitter.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next request slot.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let spacing = self.interval + self.sample_jitter();
            let elapsed = previous.elapsed();
            if elapsed < spacing {
                let wait = spacing - elapsed;
                tracing::trace!("Rate limiting: waiting {:?}", wait);
                sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }

    fn sample_jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
