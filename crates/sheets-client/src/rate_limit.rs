//! Sliding-window request pacing.
//!
//! The host enforces a per-token quota of 100 requests per 100 seconds.
//! `RateLimiter::acquire` blocks until issuing one more request would stay
//! inside that window, so callers never see a quota rejection under normal
//! operation (429s that slip through are still retried upstream).

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(100);

pub struct RateLimiter {
    capacity: usize,
    window: Duration,
    issued: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window,
            issued: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Wait until a request slot is free, then claim it.
    pub async fn acquire(&self) {
        let mut issued = self.issued.lock().await;
        loop {
            let now = Instant::now();
            while let Some(front) = issued.front() {
                if now.duration_since(*front) >= self.window {
                    issued.pop_front();
                } else {
                    break;
                }
            }

            if issued.len() < self.capacity {
                issued.push_back(now);
                return;
            }

            // Oldest in-window timestamp decides when a slot frees up.
            let wake_at = issued[0] + self.window;
            debug!(
                in_window = issued.len(),
                wait_ms = wake_at.saturating_duration_since(now).as_millis(),
                "request quota exhausted, pausing"
            );
            sleep_until(wake_at).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_WINDOW)
    }
}
