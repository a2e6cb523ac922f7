//! Ranked geocoding strategies with a country-bounds guard and a
//! never-failing fallback ladder.
//!
//! Resolution order: direct coordinates, then each [`GeocodeStrategy`] built
//! from the address components, then the country's city table, then the
//! capital. Every upstream failure moves on to the next rung.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tunda_core::{
    AddressComponents, AddressInput, Coordinates, CountryProfile, ResolvedAddress, Strategy,
};
use tunda_geocoder::sub_county_of;

use crate::backend::GeocodingBackend;
use crate::cache::{address_key, Lookup, TtlCache};
use crate::context::RequestContext;
use crate::counters::EngineCounters;
use crate::error::LookupError;

pub const DIRECT_CONFIDENCE: f64 = 1.0;
pub const CITY_FALLBACK_CONFIDENCE: f64 = 0.5;
pub const COUNTRY_CENTROID_CONFIDENCE: f64 = 0.3;

const ADDRESS_LEXICON: &[&str] = &[
    "road",
    "street",
    "avenue",
    "drive",
    "lane",
    "close",
    "crescent",
    "mall",
    "shopping",
    "center",
    "centre",
    "building",
    "tower",
    "hotel",
    "hospital",
    "school",
    "university",
    "church",
    "mosque",
    "market",
    "stage",
    "junction",
    "roundabout",
    "estate",
    "plaza",
    "gardens",
    "park",
    "stadium",
    "airport",
    "station",
];

const GENERIC_TERMS: &[&str] = &["town", "city", "area", "location", "place"];

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+.*[a-zA-Z]|[a-zA-Z].*\d+").expect("valid address pattern regex")
});

/// One ranked query tried against the geocoder.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeStrategy {
    pub query: String,
    pub confidence: f64,
    pub strategy: Strategy,
}

/// `true` when free text is specific enough to geocode on its own: it names
/// a street-level feature or mixes letters and digits, and is not a short
/// generic phrase such as "my area".
#[must_use]
pub fn is_meaningful_address(address: &str) -> bool {
    let trimmed = address.trim();
    if trimmed.chars().count() < 3 {
        return false;
    }
    let lower = trimmed.to_lowercase();

    let has_lexicon_word = ADDRESS_LEXICON.iter().any(|w| lower.contains(w));
    let has_address_pattern = ADDRESS_PATTERN.is_match(trimmed);
    let too_generic = trimmed.split_whitespace().count() <= 2
        && GENERIC_TERMS.iter().any(|t| lower.contains(t));

    (has_lexicon_word || has_address_pattern) && !too_generic
}

/// Builds the ranked strategies for `components`, highest confidence first.
///
/// Empty components are skipped when joining, and a query already produced
/// by a higher-ranked strategy is not repeated.
#[must_use]
pub fn build_strategies(components: &AddressComponents, country: &str) -> Vec<GeocodeStrategy> {
    let detailed = components.detailed.trim();
    let sub_county = components.sub_county.as_deref().unwrap_or_default();
    let county = components.county.as_deref().unwrap_or_default();
    let meaningful = is_meaningful_address(detailed);

    let candidates: [(bool, Vec<&str>, f64, Strategy); 5] = [
        (
            meaningful,
            vec![detailed, county, country],
            0.9,
            Strategy::DetailedWithCounty,
        ),
        (
            meaningful && !sub_county.is_empty(),
            vec![detailed, sub_county, county, country],
            0.85,
            Strategy::DetailedWithSubCounty,
        ),
        (
            meaningful,
            vec![detailed, country],
            0.8,
            Strategy::DetailedOnly,
        ),
        (
            !sub_county.is_empty(),
            vec![sub_county, county, country],
            0.7,
            Strategy::SubCountyWithCounty,
        ),
        (
            !county.is_empty(),
            vec![county, country],
            0.6,
            Strategy::CountyCenter,
        ),
    ];

    let mut strategies: Vec<GeocodeStrategy> = Vec::new();
    for (enabled, parts, confidence, strategy) in candidates {
        if !enabled {
            continue;
        }
        let query = join_parts(&parts);
        if strategies
            .iter()
            .any(|s| s.query.eq_ignore_ascii_case(&query))
        {
            continue;
        }
        strategies.push(GeocodeStrategy {
            query,
            confidence,
            strategy,
        });
    }
    strategies
}

fn join_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct AddressResolver {
    backend: Arc<dyn GeocodingBackend>,
    cache: Arc<TtlCache<Coordinates>>,
    country: CountryProfile,
    counters: Arc<EngineCounters>,
}

impl std::fmt::Debug for AddressResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressResolver")
            .field("country", &self.country.name)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl AddressResolver {
    #[must_use]
    pub fn new(
        backend: Arc<dyn GeocodingBackend>,
        cache: Arc<TtlCache<Coordinates>>,
        country: CountryProfile,
        counters: Arc<EngineCounters>,
    ) -> Self {
        Self {
            backend,
            cache,
            country,
            counters,
        }
    }

    #[must_use]
    pub fn country(&self) -> &CountryProfile {
        &self.country
    }

    /// Resolves a normalized delivery address. Never fails.
    pub async fn resolve(&self, input: &AddressInput, ctx: &RequestContext) -> ResolvedAddress {
        if let Some(coords) = input.direct {
            if self.country.bounds.contains(coords) {
                return ResolvedAddress {
                    coords,
                    confidence: DIRECT_CONFIDENCE,
                    strategy: Strategy::Direct,
                    address_used: coords.to_query(),
                };
            }
            let err = LookupError::OutOfBounds {
                coords,
                country: self.country.name,
            };
            self.counters.record_lookup_failure(&err);
            tracing::warn!(%coords, "direct coordinates rejected; resolving from components");
        }
        self.resolve_components(&input.components, ctx).await
    }

    /// Runs the ranked strategies for `components`, then the fallbacks.
    pub async fn resolve_components(
        &self,
        components: &AddressComponents,
        ctx: &RequestContext,
    ) -> ResolvedAddress {
        for candidate in build_strategies(components, self.country.name) {
            match self.geocode_text(&candidate.query, ctx).await {
                Ok(coords) => {
                    tracing::debug!(
                        query = %candidate.query,
                        strategy = %candidate.strategy,
                        "address resolved"
                    );
                    return ResolvedAddress {
                        coords,
                        confidence: candidate.confidence,
                        strategy: candidate.strategy,
                        address_used: candidate.query,
                    };
                }
                Err(LookupError::DeadlineExpired) => {
                    tracing::warn!(query = %candidate.query, "deadline expired during address resolution");
                    break;
                }
                Err(e) => {
                    tracing::debug!(
                        query = %candidate.query,
                        strategy = %candidate.strategy,
                        error = %e,
                        "strategy failed; trying next"
                    );
                }
            }
        }
        self.fallback(components)
    }

    /// Geocodes one query through the cache. Only in-bounds results are
    /// cached; failures are not.
    ///
    /// # Errors
    ///
    /// Returns the upstream failure, [`LookupError::OutOfBounds`] for a result
    /// outside the country, or [`LookupError::DeadlineExpired`].
    pub async fn geocode_text(
        &self,
        query: &str,
        ctx: &RequestContext,
    ) -> Result<Coordinates, LookupError> {
        let key = address_key(query);
        if let Lookup::Hit(coords) = self.cache.get(&key) {
            return Ok(coords);
        }

        let result = match ctx.run(self.backend.geocode(query)).await {
            None => Err(LookupError::DeadlineExpired),
            Some(Err(e)) => Err(LookupError::from(e)),
            Some(Ok(coords)) if !self.country.bounds.contains(coords) => {
                Err(LookupError::OutOfBounds {
                    coords,
                    country: self.country.name,
                })
            }
            Some(Ok(coords)) => Ok(coords),
        };

        match result {
            Ok(coords) => {
                self.cache.insert(key, coords);
                Ok(coords)
            }
            Err(e) => {
                self.counters.record_lookup_failure(&e);
                Err(e)
            }
        }
    }

    /// Second-level administrative area at `coords`, if the geocoder knows
    /// one.
    pub async fn sub_county_at(&self, coords: Coordinates, ctx: &RequestContext) -> Option<String> {
        match ctx.run(self.backend.reverse_geocode(coords)).await {
            Some(Ok(components)) => sub_county_of(&components).map(ToString::to_string),
            Some(Err(e)) => {
                let err = LookupError::from(e);
                self.counters.record_lookup_failure(&err);
                tracing::debug!(%coords, error = %err, "reverse geocoding failed");
                None
            }
            None => {
                self.counters
                    .record_lookup_failure(&LookupError::DeadlineExpired);
                None
            }
        }
    }

    fn fallback(&self, components: &AddressComponents) -> ResolvedAddress {
        self.counters.record_address_fallback();

        let city = [components.county.as_deref(), components.sub_county.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|place| self.country.city_for(place));

        if let Some(city) = city {
            tracing::info!(city = city.name, "using city fallback coordinates");
            return ResolvedAddress {
                coords: city.coords,
                confidence: CITY_FALLBACK_CONFIDENCE,
                strategy: Strategy::CityFallback,
                address_used: format!("{}, {}", city.name, self.country.name),
            };
        }

        let capital = self.country.capital();
        tracing::warn!(
            country = self.country.name,
            "no strategy resolved; using country centroid"
        );
        ResolvedAddress {
            coords: capital.coords,
            confidence: COUNTRY_CENTROID_CONFIDENCE,
            strategy: Strategy::CountryCentroid,
            address_used: format!("{}, {}", capital.name, self.country.name),
        }
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
