//! Coordinates, great-circle distance, and the per-country constants the
//! resolver and validator are seeded with.
//!
//! A second country is added by declaring another set of name, bounds,
//! city-fallback and landmark constants and bundling them in a
//! [`CountryProfile`].

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// `true` when both components are finite and inside the WGS84 ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// `lat,lon` with six decimals, the form used in upstream query strings
    /// and distance cache keys.
    #[must_use]
    pub fn to_query(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lon)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Great-circle distance in kilometres between two points.
#[must_use]
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lon - a.lon).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Inclusive latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountryBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl CountryBounds {
    #[must_use]
    pub fn contains(&self, coords: Coordinates) -> bool {
        (self.min_lat..=self.max_lat).contains(&coords.lat)
            && (self.min_lon..=self.max_lon).contains(&coords.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CityCentroid {
    pub name: &'static str,
    pub coords: Coordinates,
}

/// Compiled-in landmark used when the landmark table is empty or unreachable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultLandmark {
    pub name: &'static str,
    pub alt_names: &'static [&'static str],
    pub sub_county: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct CountryProfile {
    pub name: &'static str,
    pub bounds: CountryBounds,
    /// First entry is the capital; it doubles as the country centroid.
    pub cities: &'static [CityCentroid],
    pub landmarks: &'static [DefaultLandmark],
}

impl CountryProfile {
    #[must_use]
    pub fn capital(&self) -> CityCentroid {
        self.cities[0]
    }

    /// Finds a fallback city whose name contains `place` or is contained by it,
    /// ignoring case.
    #[must_use]
    pub fn city_for(&self, place: &str) -> Option<CityCentroid> {
        let place = place.trim().to_lowercase();
        if place.is_empty() {
            return None;
        }
        self.cities.iter().copied().find(|city| {
            let city_name = city.name.to_lowercase();
            place.contains(&city_name) || city_name.contains(&place)
        })
    }
}

pub const KENYA_NAME: &str = "Kenya";

pub const KENYA_BOUNDS: CountryBounds = CountryBounds {
    min_lat: -4.7,
    max_lat: 5.5,
    min_lon: 33.9,
    max_lon: 42.0,
};

pub const KENYA_CITY_FALLBACKS: &[CityCentroid] = &[
    CityCentroid {
        name: "Nairobi",
        coords: Coordinates::new(-1.292_065_9, 36.821_946_2),
    },
    CityCentroid {
        name: "Mombasa",
        coords: Coordinates::new(-4.043_477_1, 39.668_206_5),
    },
    CityCentroid {
        name: "Kisumu",
        coords: Coordinates::new(-0.102_155_4, 34.761_713_5),
    },
    CityCentroid {
        name: "Nakuru",
        coords: Coordinates::new(-0.303_098_8, 36.080_021_7),
    },
    CityCentroid {
        name: "Eldoret",
        coords: Coordinates::new(0.514_3, 35.269_7),
    },
    CityCentroid {
        name: "Thika",
        coords: Coordinates::new(-1.033_2, 37.069_4),
    },
    CityCentroid {
        name: "Malindi",
        coords: Coordinates::new(-3.217_5, 40.116_9),
    },
    CityCentroid {
        name: "Kitale",
        coords: Coordinates::new(1.017_7, 35.006_2),
    },
    CityCentroid {
        name: "Garissa",
        coords: Coordinates::new(-0.456_9, 39.658_2),
    },
    CityCentroid {
        name: "Kakamega",
        coords: Coordinates::new(0.282_7, 34.751_9),
    },
];

pub const KENYA_DEFAULT_LANDMARKS: &[DefaultLandmark] = &[
    DefaultLandmark {
        name: "westgate",
        alt_names: &["westgate mall"],
        sub_county: "westlands",
    },
    DefaultLandmark {
        name: "sarit centre",
        alt_names: &["sarit center"],
        sub_county: "westlands",
    },
    DefaultLandmark {
        name: "village market",
        alt_names: &[],
        sub_county: "westlands",
    },
    DefaultLandmark {
        name: "jkia",
        alt_names: &["jomo kenyatta international airport"],
        sub_county: "embakasi south",
    },
    DefaultLandmark {
        name: "wilson airport",
        alt_names: &[],
        sub_county: "langata",
    },
    DefaultLandmark {
        name: "nairobi national park",
        alt_names: &[],
        sub_county: "langata",
    },
    DefaultLandmark {
        name: "uhuru park",
        alt_names: &[],
        sub_county: "starehe",
    },
    DefaultLandmark {
        name: "kenyatta national hospital",
        alt_names: &["knh"],
        sub_county: "starehe",
    },
];

pub const KENYA: CountryProfile = CountryProfile {
    name: KENYA_NAME,
    bounds: KENYA_BOUNDS,
    cities: KENYA_CITY_FALLBACKS,
    landmarks: KENYA_DEFAULT_LANDMARKS,
};
