//! Outbound geocoding for the delivery engine.
//!
//! [`GeocoderClient`] wraps forward geocoding, reverse geocoding and driving
//! distance behind a per-process rate limiter and a bounded retry budget.
//! Callers branch on [`GeocoderError::kind`].

pub mod client;
pub mod error;
pub mod rate_limit;
pub(crate) mod retry;
pub mod types;

pub use client::{GeocoderClient, GeocoderConfig, DEFAULT_BASE_URL, PROBE_ADDRESS};
pub use error::{ErrorKind, GeocoderError};
pub use rate_limit::{RateLimiter, RateWindow, WindowCounts};
pub use types::{sub_county_of, AddressComponent, UsageStats};
