// src/provider/rate_limiter.rs
// Minimum-interval limiter for outbound provider calls

use parking_lot::Mutex;
use tokio::time::{sleep_until, Duration, Instant};

/// Spaces outbound calls at least `min_interval` apart.
///
/// Each caller reserves its slot under the lock and then sleeps outside it,
/// so concurrent callers are released in arrival order, one interval apart.
/// A reservation is consumed even if the waiting future is dropped.
pub struct RateLimiter {
    min_interval: Duration,
    last_request_at: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request_at: Mutex::new(None),
        }
    }

    /// Wait until this caller may issue its request.
    pub async fn await_turn(&self) {
        let slot = {
            let mut last = self.last_request_at.lock();
            let now = Instant::now();
            let slot = match *last {
                Some(prev) => now.max(prev + self.min_interval),
                None => now,
            };
            *last = Some(slot);
            slot
        };

        if slot > Instant::now() {
            tracing::trace!(wait_ms = (slot - Instant::now()).as_millis() as u64, "rate limited");
            sleep_until(slot).await;
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn last_request_at(&self) -> Option<Instant> {
        *self.last_request_at.lock()
    }
}
