//! Process-wide tallies of absorbed failures and degraded outcomes.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tunda_geocoder::ErrorKind;

use crate::error::LookupError;

#[derive(Debug, Default)]
pub struct EngineCounters {
    quotes: AtomicU64,
    geocoder_misses: AtomicU64,
    geocoder_rate_limited: AtomicU64,
    geocoder_upstream_errors: AtomicU64,
    out_of_bounds: AtomicU64,
    deadline_expired: AtomicU64,
    address_fallbacks: AtomicU64,
    distance_fallbacks: AtomicU64,
    fee_error_fallbacks: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CounterSnapshot {
    pub quotes: u64,
    pub geocoder_misses: u64,
    pub geocoder_rate_limited: u64,
    pub geocoder_upstream_errors: u64,
    pub out_of_bounds: u64,
    pub deadline_expired: u64,
    pub address_fallbacks: u64,
    pub distance_fallbacks: u64,
    pub fee_error_fallbacks: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl EngineCounters {
    pub(crate) fn record_lookup_failure(&self, err: &LookupError) {
        match err {
            LookupError::Geocoder(e) => match e.kind() {
                ErrorKind::Miss => bump(&self.geocoder_misses),
                ErrorKind::RateLimited => bump(&self.geocoder_rate_limited),
                ErrorKind::Upstream => bump(&self.geocoder_upstream_errors),
            },
            LookupError::OutOfBounds { .. } => bump(&self.out_of_bounds),
            LookupError::DeadlineExpired => bump(&self.deadline_expired),
        }
    }

    pub(crate) fn record_quote(&self) {
        bump(&self.quotes);
    }

    pub(crate) fn record_address_fallback(&self) {
        bump(&self.address_fallbacks);
    }

    pub(crate) fn record_distance_fallback(&self) {
        bump(&self.distance_fallbacks);
    }

    pub(crate) fn record_fee_error_fallback(&self) {
        bump(&self.fee_error_fallbacks);
    }

    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            quotes: self.quotes.load(Ordering::Relaxed),
            geocoder_misses: self.geocoder_misses.load(Ordering::Relaxed),
            geocoder_rate_limited: self.geocoder_rate_limited.load(Ordering::Relaxed),
            geocoder_upstream_errors: self.geocoder_upstream_errors.load(Ordering::Relaxed),
            out_of_bounds: self.out_of_bounds.load(Ordering::Relaxed),
            deadline_expired: self.deadline_expired.load(Ordering::Relaxed),
            address_fallbacks: self.address_fallbacks.load(Ordering::Relaxed),
            distance_fallbacks: self.distance_fallbacks.load(Ordering::Relaxed),
            fee_error_fallbacks: self.fee_error_fallbacks.load(Ordering::Relaxed),
        }
    }
}
