//! HTTP client for a Google-compatible geocoding and distance-matrix API.
//!
//! Every outbound attempt passes the [`RateLimiter`] first; a full window
//! fails fast with [`GeocoderError::RateLimited`] and sends nothing. Requests
//! authenticate with a bearer token. JSON envelopes are checked for their
//! `status` field, `ZERO_RESULTS` becoming [`GeocoderError::Miss`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tunda_core::{Coordinates, GeocoderSettings};

use crate::error::GeocoderError;
use crate::rate_limit::RateLimiter;
use crate::retry::retry_within_budget;
use crate::types::{AddressComponent, DistanceMatrixResponse, GeocodeResponse, UsageStats};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/";

/// Address geocoded once at startup to check connectivity and credentials.
pub const PROBE_ADDRESS: &str = "Nairobi, Kenya";

#[derive(Clone)]
pub struct GeocoderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry_budget_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub max_per_minute: usize,
    pub max_per_hour: usize,
}

impl std::fmt::Debug for GeocoderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocoderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry_budget_secs", &self.retry_budget_secs)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("max_per_minute", &self.max_per_minute)
            .field("max_per_hour", &self.max_per_hour)
            .finish()
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_secs: 10,
            retry_budget_secs: 60,
            max_retries: 3,
            backoff_base_ms: 500,
            max_per_minute: 50,
            max_per_hour: 1000,
        }
    }
}

impl From<&GeocoderSettings> for GeocoderConfig {
    fn from(settings: &GeocoderSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            timeout_secs: settings.timeout_secs,
            retry_budget_secs: settings.retry_budget_secs,
            max_retries: settings.max_retries,
            backoff_base_ms: settings.backoff_base_ms,
            max_per_minute: settings.max_per_minute,
            max_per_hour: settings.max_per_hour,
        }
    }
}

/// Rate-limited geocoder client.
///
/// Use [`GeocoderClient::connect`] in production: it runs the startup probe
/// and disables the client when the probe fails. [`GeocoderClient::new`]
/// skips the probe, which tests pointed at a mock server rely on.
pub struct GeocoderClient {
    client: Client,
    api_key: String,
    base_url: Url,
    limiter: RateLimiter,
    enabled: AtomicBool,
    retry_budget: Duration,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl std::fmt::Debug for GeocoderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocoderClient")
            .field("base_url", &self.base_url.as_str())
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl GeocoderClient {
    /// Builds the client without probing. A config without an API key
    /// yields a disabled client.
    ///
    /// # Errors
    ///
    /// Returns [`GeocoderError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`GeocoderError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocoderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .user_agent("tunda/0.1 (delivery-fees)")
            .build()?;

        let normalised = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| GeocoderError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        let api_key = config.api_key.clone().unwrap_or_default();
        let enabled = !api_key.is_empty();
        if !enabled {
            tracing::warn!("no geocoder API key configured; geocoding disabled");
        }

        Ok(Self {
            client,
            api_key,
            base_url,
            limiter: RateLimiter::new(config.max_per_minute, config.max_per_hour),
            enabled: AtomicBool::new(enabled),
            retry_budget: Duration::from_secs(config.retry_budget_secs),
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
        })
    }

    /// Builds the client and runs the connectivity probe.
    ///
    /// # Errors
    ///
    /// Same as [`GeocoderClient::new`]. A failed probe is not an error; it
    /// leaves the client disabled.
    pub async fn connect(config: &GeocoderConfig) -> Result<Self, GeocoderError> {
        let client = Self::new(config)?;
        client.probe().await;
        Ok(client)
    }

    /// Geocodes [`PROBE_ADDRESS`]. On failure the client is disabled for the
    /// rest of the process lifetime. Returns whether the client is enabled.
    pub async fn probe(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        match self.geocode(PROBE_ADDRESS).await {
            Ok(coords) => {
                tracing::info!(%coords, "geocoder connectivity probe succeeded");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "geocoder connectivity probe failed; disabling geocoder");
                self.enabled.store(false, Ordering::Release);
                false
            }
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// `true` when enabled and both rate-limit windows have room.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.is_enabled() && self.limiter.has_capacity()
    }

    #[must_use]
    pub fn usage(&self) -> UsageStats {
        let counts = self.limiter.counts();
        UsageStats {
            api_available: self.is_enabled(),
            requests_last_minute: counts.last_minute,
            requests_last_hour: counts.last_hour,
            minute_limit: self.limiter.max_per_minute(),
            hour_limit: self.limiter.max_per_hour(),
            within_limits: counts.last_hour < self.limiter.max_per_hour()
                && counts.last_minute < self.limiter.max_per_minute(),
        }
    }

    /// Forward-geocodes a free-text address to the first result's location.
    ///
    /// # Errors
    ///
    /// - [`GeocoderError::Miss`] when the upstream finds nothing.
    /// - [`GeocoderError::RateLimited`] when a local window is full.
    /// - Any other variant for disabled, network, status or parse failures.
    pub async fn geocode(&self, address: &str) -> Result<Coordinates, GeocoderError> {
        let url = self.build_url("geocode/json", &[("address", address)])?;
        let response: GeocodeResponse = self.call(&url, address).await?;
        check_status(&response.status, response.error_message.as_deref(), address)?;

        let first = response.results.first().ok_or_else(|| GeocoderError::Miss {
            query: address.to_owned(),
        })?;
        let location = first.geometry.location;
        Ok(Coordinates::new(location.lat, location.lng))
    }

    /// Reverse-geocodes coordinates to the first result's address components.
    ///
    /// # Errors
    ///
    /// Same kinds as [`GeocoderClient::geocode`].
    pub async fn reverse_geocode(
        &self,
        coords: Coordinates,
    ) -> Result<Vec<AddressComponent>, GeocoderError> {
        let latlng = coords.to_query();
        let url = self.build_url("geocode/json", &[("latlng", latlng.as_str())])?;
        let response: GeocodeResponse = self.call(&url, &latlng).await?;
        check_status(&response.status, response.error_message.as_deref(), &latlng)?;

        response
            .results
            .into_iter()
            .next()
            .map(|r| r.address_components)
            .ok_or(GeocoderError::Miss { query: latlng })
    }

    /// Driving distance in kilometres, avoiding tolls.
    ///
    /// # Errors
    ///
    /// Same kinds as [`GeocoderClient::geocode`]. An element status other
    /// than `OK` is a miss.
    pub async fn distance_matrix(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<f64, GeocoderError> {
        let origins = origin.to_query();
        let destinations = destination.to_query();
        let url = self.build_url(
            "distancematrix/json",
            &[
                ("origins", origins.as_str()),
                ("destinations", destinations.as_str()),
                ("mode", "driving"),
                ("units", "metric"),
                ("avoid", "tolls"),
            ],
        )?;
        let context = format!("{origins}|{destinations}");
        let response: DistanceMatrixResponse = self.call(&url, &context).await?;
        check_status(&response.status, response.error_message.as_deref(), &context)?;

        let element = response
            .rows
            .first()
            .and_then(|row| row.elements.first())
            .ok_or_else(|| GeocoderError::ApiStatus {
                status: response.status.clone(),
                message: "distance matrix response has no elements".to_owned(),
            })?;

        match (&element.distance, element.status.as_str()) {
            (Some(distance), "OK") => Ok(distance.value / 1000.0),
            (None, "OK") => Err(GeocoderError::ApiStatus {
                status: "OK".to_owned(),
                message: "distance matrix element has no distance".to_owned(),
            }),
            (_, status) => {
                tracing::warn!(status, %context, "distance matrix element not OK");
                Err(GeocoderError::Miss { query: context })
            }
        }
    }

    fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, GeocoderError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| GeocoderError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(&self, url: &Url, context: &str) -> Result<T, GeocoderError> {
        if !self.is_enabled() {
            return Err(GeocoderError::Disabled);
        }
        retry_within_budget(self.retry_budget, self.max_retries, self.backoff_base_ms, || {
            self.request_json(url, context)
        })
        .await
    }

    /// One admitted attempt: rate-limit check, GET, 2xx check, JSON parse.
    async fn request_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        context: &str,
    ) -> Result<T, GeocoderError> {
        self.limiter
            .try_acquire()
            .map_err(|window| GeocoderError::RateLimited { window })?;

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeocoderError::UnexpectedStatus {
                status: status.as_u16(),
                url: redact_url(url),
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| GeocoderError::Deserialize {
            context: context.to_owned(),
            source: e,
        })
    }
}

fn check_status(status: &str, message: Option<&str>, query: &str) -> Result<(), GeocoderError> {
    match status {
        "OK" => Ok(()),
        "ZERO_RESULTS" | "NOT_FOUND" => Err(GeocoderError::Miss {
            query: query.to_owned(),
        }),
        other => Err(GeocoderError::ApiStatus {
            status: other.to_owned(),
            message: message.unwrap_or_default().to_owned(),
        }),
    }
}

/// Path only; query strings carry customer addresses.
fn redact_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
