//! Per-origin request pacing.
//!
//! Every request reserves the next free slot for its origin under a short
//! lock, then sleeps until that slot with the lock released. Concurrent
//! callers therefore queue up one `delay` apart without serializing on the
//! mutex, and pacing is cumulative across all workers sharing the limiter.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a request to `origin` may be sent.
    ///
    /// The first request to an origin goes out immediately.
    pub async fn acquire(&self, origin: &str) {
        if self.delay.is_zero() {
            return;
        }
        let slot = self.reserve(origin);
        tokio::time::sleep_until(slot).await;
    }

    fn reserve(&self, origin: &str) -> Instant {
        let now = Instant::now();
        let mut slots = self.next_slot.lock().unwrap_or_else(|p| p.into_inner());
        let slot = match slots.get(origin) {
            Some(next) if *next > now => *next,
            _ => now,
        };
        slots.insert(origin.to_string(), slot + self.delay);
        slot
    }
}
