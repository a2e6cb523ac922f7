//! Retry with exponential back-off and jitter inside a cumulative budget.
//!
//! [`retry_within_budget`] retries transient failures (network errors, 5xx,
//! transient upstream statuses). Misses and local rate-limit rejections are
//! returned at once: retrying a miss returns the same miss, and a full window
//! stays full for longer than any back-off.

use std::future::Future;
use std::time::Duration;

use crate::error::GeocoderError;

const MAX_DELAY_MS: u64 = 10_000;

/// Upstream statuses that may succeed on a second attempt.
const TRANSIENT_API_STATUSES: &[&str] = &["UNKNOWN_ERROR", "OVER_QUERY_LIMIT"];

pub(crate) fn is_retriable(err: &GeocoderError) -> bool {
    match err {
        GeocoderError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        GeocoderError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
        GeocoderError::ApiStatus { status, .. } => TRANSIENT_API_STATUSES.contains(&status.as_str()),
        GeocoderError::Miss { .. }
        | GeocoderError::RateLimited { .. }
        | GeocoderError::Disabled
        | GeocoderError::Deserialize { .. }
        | GeocoderError::BudgetExhausted { .. }
        | GeocoderError::InvalidBaseUrl { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` extra attempts, giving up with
/// [`GeocoderError::BudgetExhausted`] once `budget` has elapsed in total.
///
/// Back-off before retry `n` is `backoff_base_ms * 2^(n-1)` with ±25 % jitter,
/// capped at 10 s.
pub(crate) async fn retry_within_budget<T, F, Fut>(
    budget: Duration,
    max_retries: u32,
    backoff_base_ms: u64,
    operation: F,
) -> Result<T, GeocoderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GeocoderError>>,
{
    match tokio::time::timeout(budget, retry_with_backoff(max_retries, backoff_base_ms, operation))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(GeocoderError::BudgetExhausted {
            budget_secs: budget.as_secs(),
        }),
    }
}

async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, GeocoderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GeocoderError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "geocoder transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
