//! A canned [`GeocodingBackend`] for tests. Nothing in the shipped
//! binaries constructs it; `--offline` still geocodes upstream.
//!
//! Geocodes and distances not scripted are misses. Every call is counted
//! so callers can assert on upstream traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tunda_core::Coordinates;
use tunda_geocoder::{AddressComponent, GeocoderError};

use crate::backend::GeocodingBackend;

#[derive(Debug, Default)]
pub struct ScriptedBackend {
    unavailable: AtomicBool,
    failing: bool,
    latency: Option<Duration>,
    geocodes: HashMap<String, Coordinates>,
    distances: HashMap<(String, String), f64>,
    sub_counties: HashMap<String, String>,
    geocode_calls: AtomicUsize,
    distance_calls: AtomicUsize,
    reverse_calls: AtomicUsize,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers `query` (compared ignoring case) with `coords`.
    #[must_use]
    pub fn with_geocode(mut self, query: &str, coords: Coordinates) -> Self {
        self.geocodes.insert(query.to_lowercase(), coords);
        self
    }

    #[must_use]
    pub fn with_distance(mut self, origin: Coordinates, destination: Coordinates, km: f64) -> Self {
        self.distances
            .insert((origin.to_query(), destination.to_query()), km);
        self
    }

    /// Reverse geocoding of `coords` yields a level-two area named
    /// `sub_county`.
    #[must_use]
    pub fn with_sub_county(mut self, coords: Coordinates, sub_county: &str) -> Self {
        self.sub_counties
            .insert(coords.to_query(), sub_county.to_string());
        self
    }

    /// Every call fails with a 503.
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Every call sleeps for `latency` first.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Reports no capacity; calls still answer if made.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::Release);
    }

    #[must_use]
    pub fn geocode_calls(&self) -> usize {
        self.geocode_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn distance_calls(&self) -> usize {
        self.distance_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn reverse_calls(&self) -> usize {
        self.reverse_calls.load(Ordering::SeqCst)
    }

    async fn answer<T>(&self, found: Option<T>, query: String) -> Result<T, GeocoderError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing {
            return Err(GeocoderError::UnexpectedStatus {
                status: 503,
                url: "scripted://backend".to_string(),
            });
        }
        found.ok_or(GeocoderError::Miss { query })
    }
}

#[async_trait]
impl GeocodingBackend for ScriptedBackend {
    fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::Acquire)
    }

    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocoderError> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        let found = self.geocodes.get(&address.to_lowercase()).copied();
        self.answer(found, address.to_string()).await
    }

    async fn reverse_geocode(
        &self,
        coords: Coordinates,
    ) -> Result<Vec<AddressComponent>, GeocoderError> {
        self.reverse_calls.fetch_add(1, Ordering::SeqCst);
        let found = self.sub_counties.get(&coords.to_query()).map(|name| {
            vec![AddressComponent {
                long_name: name.clone(),
                short_name: name.clone(),
                types: vec![
                    "administrative_area_level_2".to_string(),
                    "political".to_string(),
                ],
            }]
        });
        self.answer(found, coords.to_query()).await
    }

    async fn driving_distance_km(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<f64, GeocoderError> {
        self.distance_calls.fetch_add(1, Ordering::SeqCst);
        let found = self
            .distances
            .get(&(origin.to_query(), destination.to_query()))
            .copied();
        self.answer(found, format!("{}|{}", origin.to_query(), destination.to_query()))
            .await
    }
}
