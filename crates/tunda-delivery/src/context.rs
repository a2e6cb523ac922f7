//! Per-request deadline carried through every suspension point.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    #[must_use]
    pub fn unbounded() -> Self {
        Self { deadline: None }
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Drives `fut` until it completes or the deadline passes. `None` means
    /// the deadline won and `fut` was dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        match self.deadline {
            None => Some(fut.await),
            Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        }
    }
}
