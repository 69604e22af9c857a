use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Sliding-window limiter: at most `max_requests` admissions in any
/// trailing `interval`.
///
/// Waiters never hold a reserved slot. After sleeping they re-prune and
/// re-check, so overlapping waits stay within the bound.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    interval: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, interval: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            interval,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a slot is free, then record the admission.
    pub async fn acquire(&self) {
        loop {
            // Compute the wait with the lock held, sleep without it
            let wait = {
                let mut ts = self.timestamps.lock().await;
                let now = Instant::now();
                while ts
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.interval)
                {
                    ts.pop_front();
                }

                if ts.len() < self.max_requests {
                    ts.push_back(now);
                    return;
                }

                match ts.front() {
                    Some(oldest) => self.interval.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };

            debug!("TMDB rate limit: waiting {}ms", wait.as_millis());
            sleep(wait).await;
        }
    }

    /// Admissions currently inside the window.
    #[cfg(test)]
    pub async fn in_flight(&self) -> usize {
        let mut ts = self.timestamps.lock().await;
        let now = Instant::now();
        ts.retain(|t| now.duration_since(*t) < self.interval);
        ts.len()
    }
}
