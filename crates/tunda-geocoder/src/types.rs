//! Upstream response shapes.
//!
//! Only the fields the engine reads are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResult {
    #[serde(default)]
    pub formatted_address: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl AddressComponent {
    #[must_use]
    pub fn has_type(&self, kind: &str) -> bool {
        self.types.iter().any(|t| t == kind)
    }
}

/// Second-level administrative area name, the sub-county for Kenyan
/// addresses.
#[must_use]
pub fn sub_county_of(components: &[AddressComponent]) -> Option<&str> {
    components
        .iter()
        .find(|c| c.has_type("administrative_area_level_2"))
        .map(|c| c.long_name.as_str())
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistanceMatrixResponse {
    pub status: String,
    #[serde(default)]
    pub rows: Vec<DistanceRow>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistanceRow {
    #[serde(default)]
    pub elements: Vec<DistanceElement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistanceElement {
    pub status: String,
    #[serde(default)]
    pub distance: Option<DistanceValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistanceValue {
    /// Metres.
    pub value: f64,
    #[serde(default)]
    pub text: String,
}

/// Snapshot of the client's rate-limit windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageStats {
    pub api_available: bool,
    pub requests_last_minute: usize,
    pub requests_last_hour: usize,
    pub minute_limit: usize,
    pub hour_limit: usize,
    pub within_limits: bool,
}
