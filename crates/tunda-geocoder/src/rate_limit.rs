//! Per-process sliding windows over outbound geocoder requests.
//!
//! Timestamps are kept for one hour in a single deque. The minute count is
//! taken from its tail, so the deque never holds more than the hourly cap.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Minute,
    Hour,
}

impl std::fmt::Display for RateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateWindow::Minute => write!(f, "minute"),
            RateWindow::Hour => write!(f, "hour"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCounts {
    pub last_minute: usize,
    pub last_hour: usize,
}

#[derive(Debug)]
pub struct RateLimiter {
    max_per_minute: usize,
    max_per_hour: usize,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_per_minute: usize, max_per_hour: usize) -> Self {
        Self {
            max_per_minute,
            max_per_hour,
            timestamps: Mutex::new(VecDeque::with_capacity(max_per_hour.min(4096))),
        }
    }

    #[must_use]
    pub fn max_per_minute(&self) -> usize {
        self.max_per_minute
    }

    #[must_use]
    pub fn max_per_hour(&self) -> usize {
        self.max_per_hour
    }

    /// Admits one request if both windows are under their caps and records
    /// it. Check and record happen under one lock.
    ///
    /// # Errors
    ///
    /// Returns the first full [`RateWindow`], hour before minute.
    pub fn try_acquire(&self) -> Result<(), RateWindow> {
        let now = Instant::now();
        let mut timestamps = self
            .timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        prune(&mut timestamps, now);

        if timestamps.len() >= self.max_per_hour {
            tracing::warn!(limit = self.max_per_hour, "hourly geocoder rate limit reached");
            return Err(RateWindow::Hour);
        }
        if count_since(&timestamps, now, MINUTE) >= self.max_per_minute {
            tracing::warn!(limit = self.max_per_minute, "per-minute geocoder rate limit reached");
            return Err(RateWindow::Minute);
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// `true` when [`try_acquire`](Self::try_acquire) would currently admit a
    /// request. Nothing is recorded.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        let counts = self.counts();
        counts.last_hour < self.max_per_hour && counts.last_minute < self.max_per_minute
    }

    #[must_use]
    pub fn counts(&self) -> WindowCounts {
        let now = Instant::now();
        let mut timestamps = self
            .timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        prune(&mut timestamps, now);
        WindowCounts {
            last_minute: count_since(&timestamps, now, MINUTE),
            last_hour: timestamps.len(),
        }
    }
}

fn prune(timestamps: &mut VecDeque<Instant>, now: Instant) {
    while let Some(&oldest) = timestamps.front() {
        if now.duration_since(oldest) >= HOUR {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

fn count_since(timestamps: &VecDeque<Instant>, now: Instant, window: Duration) -> usize {
    timestamps
        .iter()
        .rev()
        .take_while(|&&t| now.duration_since(t) < window)
        .count()
}
