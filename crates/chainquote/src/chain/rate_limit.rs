//! Minimum-gap rate limiter shared by every outbound call of one client.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct RateLimiter {
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: Mutex::new(None),
        }
    }

    /// Delay in (possibly fractional) seconds; negative or NaN means no delay.
    pub fn from_secs_f64(secs: f64) -> Self {
        let delay = if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        };
        Self::new(delay)
    }

    /// No gap enforced. For tests and offline use.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleep until `delay` has passed since the previous `wait` returned,
    /// then record now as the last request time. The lock is held across
    /// the sleep, so concurrent callers queue and each keeps the full gap.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let sleep_for = self.delay.saturating_sub(prev.elapsed());
            if !sleep_for.is_zero() {
                tokio::time::sleep(sleep_for).await;
            }
        }
        *last = Some(Instant::now());
    }
}
