//! Delivery address shapes and their normalized forms.
//!
//! Callers submit one of three [`DeliveryAddress`] shapes. Before resolution
//! each is normalized against the [`RegionDirectory`] into an
//! [`AddressInput`]: optional direct coordinates plus the textual components
//! the geocoding strategies are built from.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;
use crate::regions::RegionDirectory;
use crate::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryAddress {
    Coordinates { latitude: f64, longitude: f64 },
    Structured(StructuredAddress),
    Legacy(LegacyLocation),
}

/// A saved customer address with an administrative selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAddress {
    #[serde(default)]
    pub detailed_address: String,
    pub sub_county_id: i64,
    pub county_id: i64,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Older location records: free text split over several fields, with an
/// optional administrative selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyLocation {
    #[serde(default)]
    pub detailed_address: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub sub_location: Option<String>,
    #[serde(default)]
    pub landmark: Option<String>,
    #[serde(default)]
    pub sub_county_id: Option<i64>,
    #[serde(default)]
    pub county_id: Option<i64>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Textual components used to build geocoding strategies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressComponents {
    pub detailed: String,
    pub sub_county: Option<String>,
    pub county: Option<String>,
}

impl AddressComponents {
    #[must_use]
    pub fn administrative(sub_county: &str, county: &str) -> Self {
        Self {
            detailed: String::new(),
            sub_county: non_empty(sub_county),
            county: non_empty(county),
        }
    }
}

/// A [`DeliveryAddress`] after id lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressInput {
    pub direct: Option<Coordinates>,
    pub components: AddressComponents,
    pub sub_county_id: Option<i64>,
    pub county_id: Option<i64>,
    /// What the caller entered, joined for display.
    pub input_text: String,
}

impl DeliveryAddress {
    /// Resolves region ids to names and checks the coordinate fields.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for coordinates outside the WGS84
    /// ranges, unknown region ids, or a sub-county that does not belong to
    /// the selected county.
    pub fn normalize(&self, regions: &RegionDirectory) -> Result<AddressInput, CoreError> {
        match self {
            DeliveryAddress::Coordinates {
                latitude,
                longitude,
            } => {
                let coords = checked_coords(Some(*latitude), Some(*longitude))?
                    .ok_or_else(|| CoreError::invalid("delivery_address", "missing coordinates"))?;
                Ok(AddressInput {
                    direct: Some(coords),
                    components: AddressComponents::default(),
                    sub_county_id: None,
                    county_id: None,
                    input_text: coords.to_query(),
                })
            }
            DeliveryAddress::Structured(addr) => {
                let (sub_county, county) =
                    lookup_regions(regions, Some(addr.sub_county_id), Some(addr.county_id))?;
                let components = AddressComponents {
                    detailed: addr.detailed_address.trim().to_string(),
                    sub_county,
                    county,
                };
                Ok(AddressInput {
                    direct: checked_coords(addr.latitude, addr.longitude)?,
                    input_text: display_text(&components),
                    components,
                    sub_county_id: Some(addr.sub_county_id),
                    county_id: Some(addr.county_id),
                })
            }
            DeliveryAddress::Legacy(loc) => {
                let (sub_county, county) =
                    lookup_regions(regions, loc.sub_county_id, loc.county_id)?;
                let detailed = [
                    loc.detailed_address.as_deref(),
                    loc.location_name.as_deref(),
                    loc.sub_location.as_deref(),
                    loc.landmark.as_deref(),
                ]
                .into_iter()
                .flatten()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
                let components = AddressComponents {
                    detailed,
                    sub_county,
                    county,
                };
                Ok(AddressInput {
                    direct: checked_coords(loc.latitude, loc.longitude)?,
                    input_text: display_text(&components),
                    components,
                    sub_county_id: loc.sub_county_id,
                    county_id: loc.county_id,
                })
            }
        }
    }
}

fn checked_coords(lat: Option<f64>, lon: Option<f64>) -> Result<Option<Coordinates>, CoreError> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            let coords = Coordinates::new(lat, lon);
            if coords.is_valid() {
                Ok(Some(coords))
            } else {
                Err(CoreError::invalid(
                    "delivery_address.latitude",
                    format!("coordinates {lat},{lon} are out of range"),
                ))
            }
        }
        _ => Ok(None),
    }
}

fn lookup_regions(
    regions: &RegionDirectory,
    sub_county_id: Option<i64>,
    county_id: Option<i64>,
) -> Result<(Option<String>, Option<String>), CoreError> {
    let county = match county_id {
        Some(id) => Some(regions.county(id).ok_or_else(|| {
            CoreError::invalid("delivery_address.county_id", format!("unknown county {id}"))
        })?),
        None => None,
    };

    let sub_county = match sub_county_id {
        Some(id) => Some(regions.sub_county(id).ok_or_else(|| {
            CoreError::invalid(
                "delivery_address.sub_county_id",
                format!("unknown sub-county {id}"),
            )
        })?),
        None => None,
    };

    if let (Some(sub), Some(county)) = (sub_county, county) {
        if sub.county_id != county.id {
            return Err(CoreError::invalid(
                "delivery_address.sub_county_id",
                format!("{} is not in {}", sub.name, county.name),
            ));
        }
    }

    // A sub-county alone still implies its county.
    let county_name = county
        .or_else(|| sub_county.and_then(|s| regions.county(s.county_id)))
        .map(|c| c.name.clone());

    Ok((sub_county.map(|s| s.name.clone()), county_name))
}

fn display_text(components: &AddressComponents) -> String {
    [
        Some(components.detailed.as_str()),
        components.sub_county.as_deref(),
        components.county.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(", ")
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Which ranked step produced a [`ResolvedAddress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Direct,
    DetailedWithCounty,
    DetailedWithSubCounty,
    DetailedOnly,
    SubCountyWithCounty,
    CountyCenter,
    CityFallback,
    CountryCentroid,
}

impl Strategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::DetailedWithCounty => "detailed_with_county",
            Strategy::DetailedWithSubCounty => "detailed_with_sub_county",
            Strategy::DetailedOnly => "detailed_only",
            Strategy::SubCountyWithCounty => "sub_county_with_county",
            Strategy::CountyCenter => "county_center",
            Strategy::CityFallback => "city_fallback",
            Strategy::CountryCentroid => "country_centroid",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Strategy::Direct => "Direct coordinates provided",
            Strategy::DetailedWithCounty => "Detailed address with county context",
            Strategy::DetailedWithSubCounty => "Detailed address with sub-county context",
            Strategy::DetailedOnly => "Detailed address only",
            Strategy::SubCountyWithCounty => "Sub-county with county",
            Strategy::CountyCenter => "County center",
            Strategy::CityFallback => "City fallback table",
            Strategy::CountryCentroid => "Country centroid",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub coords: Coordinates,
    pub confidence: f64,
    pub strategy: Strategy,
    pub address_used: String,
}
