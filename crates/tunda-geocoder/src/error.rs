use thiserror::Error;

use crate::rate_limit::RateWindow;

/// Errors returned by the geocoder client.
#[derive(Debug, Error)]
pub enum GeocoderError {
    /// The upstream answered but found nothing for the query.
    #[error("no result for '{query}'")]
    Miss { query: String },

    /// A local sliding window is full; no request was sent.
    #[error("geocoder rate limit reached ({window} window)")]
    RateLimited { window: RateWindow },

    /// The client failed its startup probe or has no API key.
    #[error("geocoder is disabled")]
    Disabled,

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The JSON envelope carried a non-OK status.
    #[error("geocoder API status {status}: {message}")]
    ApiStatus { status: String, message: String },

    /// Retries did not finish inside the cumulative budget.
    #[error("geocoder retry budget of {budget_secs}s exhausted")]
    BudgetExhausted { budget_secs: u64 },

    #[error("invalid geocoder base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// The three outcomes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Miss,
    RateLimited,
    Upstream,
}

impl GeocoderError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeocoderError::Miss { .. } => ErrorKind::Miss,
            GeocoderError::RateLimited { .. } => ErrorKind::RateLimited,
            GeocoderError::Disabled
            | GeocoderError::Http(_)
            | GeocoderError::UnexpectedStatus { .. }
            | GeocoderError::Deserialize { .. }
            | GeocoderError::ApiStatus { .. }
            | GeocoderError::BudgetExhausted { .. }
            | GeocoderError::InvalidBaseUrl { .. } => ErrorKind::Upstream,
        }
    }
}
