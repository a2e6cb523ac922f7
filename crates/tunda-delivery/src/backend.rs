//! The seam between the engine and the upstream geocoder.

use async_trait::async_trait;
use tunda_core::Coordinates;
use tunda_geocoder::{AddressComponent, GeocoderClient, GeocoderError, UsageStats};

/// Forward, reverse and distance lookups the engine needs from a geocoder.
#[async_trait]
pub trait GeocodingBackend: Send + Sync {
    /// `true` when a call would currently be attempted: the backend is
    /// enabled and its rate-limit windows have room.
    fn is_available(&self) -> bool;

    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocoderError>;

    async fn reverse_geocode(
        &self,
        coords: Coordinates,
    ) -> Result<Vec<AddressComponent>, GeocoderError>;

    async fn driving_distance_km(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<f64, GeocoderError>;

    fn usage(&self) -> Option<UsageStats> {
        None
    }
}

#[async_trait]
impl GeocodingBackend for GeocoderClient {
    fn is_available(&self) -> bool {
        self.has_capacity()
    }

    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocoderError> {
        GeocoderClient::geocode(self, address).await
    }

    async fn reverse_geocode(
        &self,
        coords: Coordinates,
    ) -> Result<Vec<AddressComponent>, GeocoderError> {
        GeocoderClient::reverse_geocode(self, coords).await
    }

    async fn driving_distance_km(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<f64, GeocoderError> {
        self.distance_matrix(origin, destination).await
    }

    fn usage(&self) -> Option<UsageStats> {
        Some(GeocoderClient::usage(self))
    }
}
