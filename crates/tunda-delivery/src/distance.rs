//! Driving distance with a great-circle fallback.
//!
//! A cached answer keeps the method it was computed with. When the geocoder
//! is disabled, out of quota, slow past the deadline, or wrong, the
//! Haversine distance is used and cached the same way.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tunda_core::{haversine_km, Coordinates};

use crate::backend::GeocodingBackend;
use crate::cache::{distance_key, Lookup, TtlCache};
use crate::context::RequestContext;
use crate::counters::EngineCounters;
use crate::error::LookupError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMethod {
    Driving,
    GreatCircle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedDistance {
    pub km: f64,
    pub method: DistanceMethod,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceResult {
    pub km: f64,
    pub method: DistanceMethod,
    pub cached: bool,
}

pub struct DistanceEngine {
    backend: Arc<dyn GeocodingBackend>,
    cache: Arc<TtlCache<CachedDistance>>,
    counters: Arc<EngineCounters>,
}

impl std::fmt::Debug for DistanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistanceEngine")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl DistanceEngine {
    #[must_use]
    pub fn new(
        backend: Arc<dyn GeocodingBackend>,
        cache: Arc<TtlCache<CachedDistance>>,
        counters: Arc<EngineCounters>,
    ) -> Self {
        Self {
            backend,
            cache,
            counters,
        }
    }

    /// Distance from `origin` to `destination`. Never fails.
    pub async fn distance(
        &self,
        origin: Coordinates,
        destination: Coordinates,
        ctx: &RequestContext,
    ) -> DistanceResult {
        let key = distance_key(origin, destination);
        if let Lookup::Hit(hit) = self.cache.get(&key) {
            return DistanceResult {
                km: hit.km,
                method: hit.method,
                cached: true,
            };
        }

        if !self.backend.is_available() {
            tracing::debug!("geocoder unavailable; using great-circle distance");
            return self.great_circle(key, origin, destination);
        }

        let outcome = match ctx
            .run(self.backend.driving_distance_km(origin, destination))
            .await
        {
            Some(Ok(km)) if km.is_finite() && km >= 0.0 => Ok(km),
            Some(Ok(km)) => {
                tracing::warn!(km, "distance matrix returned an unusable distance");
                Err(None)
            }
            Some(Err(e)) => Err(Some(LookupError::from(e))),
            None => Err(Some(LookupError::DeadlineExpired)),
        };

        match outcome {
            Ok(km) => {
                self.cache.insert(
                    key,
                    CachedDistance {
                        km,
                        method: DistanceMethod::Driving,
                    },
                );
                DistanceResult {
                    km,
                    method: DistanceMethod::Driving,
                    cached: false,
                }
            }
            Err(err) => {
                if let Some(err) = err {
                    tracing::warn!(error = %err, "driving distance failed; using great-circle distance");
                    self.counters.record_lookup_failure(&err);
                }
                self.great_circle(key, origin, destination)
            }
        }
    }

    fn great_circle(&self, key: String, origin: Coordinates, destination: Coordinates) -> DistanceResult {
        self.counters.record_distance_fallback();
        let km = haversine_km(origin, destination);
        self.cache.insert(
            key,
            CachedDistance {
                km,
                method: DistanceMethod::GreatCircle,
            },
        );
        DistanceResult {
            km,
            method: DistanceMethod::GreatCircle,
            cached: false,
        }
    }
}
