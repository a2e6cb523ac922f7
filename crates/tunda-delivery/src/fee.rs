//! The delivery fee formula.
//!
//! `total = base + weight surcharge + distance fee + consolidation fee`,
//! or zero once the subtotal reaches the free-delivery threshold. Money is
//! `Decimal` throughout; distances are quantized to three decimals before
//! they are multiplied by the per-kilometre rate.

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tunda_core::{
    cart::distinct_farms, AddressComponents, AddressInput, CartItem, CartTotals, CoreError,
    DeliverySettings, FarmLocation, RegionDirectory, ResolvedAddress,
};

use crate::context::RequestContext;
use crate::counters::EngineCounters;
use crate::distance::{DistanceEngine, DistanceMethod, DistanceResult};
use crate::resolver::AddressResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    Driving,
    GreatCircle,
    None,
    ErrorFallback,
}

impl CalculationMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CalculationMethod::Driving => "driving",
            CalculationMethod::GreatCircle => "great_circle",
            CalculationMethod::None => "none",
            CalculationMethod::ErrorFallback => "error_fallback",
        }
    }
}

impl std::fmt::Display for CalculationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DistanceMethod> for CalculationMethod {
    fn from(method: DistanceMethod) -> Self {
        match method {
            DistanceMethod::Driving => CalculationMethod::Driving,
            DistanceMethod::GreatCircle => CalculationMethod::GreatCircle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub total_fee: Decimal,
    pub subtotal: Decimal,
    pub base_fee: Decimal,
    pub weight_surcharge: Decimal,
    pub distance_fee: Decimal,
    pub consolidation_fee: Decimal,
    pub total_weight_kg: Decimal,
    pub distance_km: Option<f64>,
    pub calculation_method: CalculationMethod,
    pub resolved_address: Option<ResolvedAddress>,
    pub is_free: bool,
    pub farms_count: usize,
}

impl FeeBreakdown {
    #[must_use]
    pub fn address_used(&self) -> Option<&str> {
        self.resolved_address
            .as_ref()
            .map(|r| r.address_used.as_str())
    }

    #[must_use]
    pub fn geocoding_confidence(&self) -> Option<f64> {
        self.resolved_address.as_ref().map(|r| r.confidence)
    }
}

/// Distance contribution of step four.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DistancePart {
    km: Decimal,
    distance_fee: Decimal,
    consolidation_fee: Decimal,
    method: CalculationMethod,
}

impl DistancePart {
    const NONE: Self = Self {
        km: Decimal::ZERO,
        distance_fee: Decimal::ZERO,
        consolidation_fee: Decimal::ZERO,
        method: CalculationMethod::None,
    };

    const ERROR_FALLBACK: Self = Self {
        method: CalculationMethod::ErrorFallback,
        ..Self::NONE
    };
}

/// Surcharge for a cart weighing `weight_kg`. Thresholds are strict.
#[must_use]
pub fn weight_surcharge(weight_kg: Decimal, settings: &DeliverySettings) -> Decimal {
    if weight_kg > settings.weight_threshold_heavy {
        settings.weight_surcharge_heavy
    } else if weight_kg > settings.weight_threshold_light {
        settings.weight_surcharge_light
    } else {
        Decimal::ZERO
    }
}

/// Kilometres as a three-decimal `Decimal`; non-finite input is zero.
#[must_use]
pub fn quantize_km(km: f64) -> Decimal {
    Decimal::from_f64(km)
        .map(|d| d.round_dp(3))
        .unwrap_or(Decimal::ZERO)
}

#[derive(Debug)]
pub struct FeeCalculator {
    resolver: Arc<AddressResolver>,
    distances: Arc<DistanceEngine>,
    regions: Arc<RegionDirectory>,
    counters: Arc<EngineCounters>,
}

impl FeeCalculator {
    #[must_use]
    pub fn new(
        resolver: Arc<AddressResolver>,
        distances: Arc<DistanceEngine>,
        regions: Arc<RegionDirectory>,
        counters: Arc<EngineCounters>,
    ) -> Self {
        Self {
            resolver,
            distances,
            regions,
            counters,
        }
    }

    /// Computes the fee for `items` delivered to `address`. Never fails:
    /// upstream trouble shows up as a coarser `calculation_method`.
    /// `totals` must come from [`CartTotals::of`] over the same `items`.
    pub async fn calculate(
        &self,
        items: &[CartItem],
        totals: CartTotals,
        address: Option<&AddressInput>,
        settings: &DeliverySettings,
        ctx: &RequestContext,
    ) -> FeeBreakdown {
        let subtotal = totals.subtotal.round_dp(2);
        let total_weight_kg = totals.weight_kg;
        let farms = distinct_farms(items);

        let resolved = match address {
            Some(input) => Some(self.resolver.resolve(input, ctx).await),
            None => None,
        };

        if subtotal >= settings.free_delivery_threshold {
            return FeeBreakdown {
                total_fee: Decimal::ZERO,
                subtotal,
                base_fee: Decimal::ZERO,
                weight_surcharge: Decimal::ZERO,
                distance_fee: Decimal::ZERO,
                consolidation_fee: Decimal::ZERO,
                total_weight_kg,
                distance_km: None,
                calculation_method: CalculationMethod::None,
                resolved_address: resolved,
                is_free: true,
                farms_count: farms.len(),
            };
        }

        let base_fee = settings.base_delivery_fee;
        let surcharge = weight_surcharge(total_weight_kg, settings);

        let part = match &resolved {
            None => DistancePart::NONE,
            Some(customer) => match self.distance_part(&farms, customer, settings, ctx).await {
                Ok(part) => part,
                Err(e) => {
                    tracing::warn!(error = %e, "distance fee failed; charging without it");
                    self.counters.record_fee_error_fallback();
                    DistancePart::ERROR_FALLBACK
                }
            },
        };

        let total_fee = base_fee
            .saturating_add(surcharge)
            .saturating_add(part.distance_fee)
            .saturating_add(part.consolidation_fee)
            .round_dp(2);

        FeeBreakdown {
            total_fee,
            subtotal,
            base_fee,
            weight_surcharge: surcharge,
            distance_fee: part.distance_fee,
            consolidation_fee: part.consolidation_fee,
            total_weight_kg,
            distance_km: match part.method {
                CalculationMethod::Driving | CalculationMethod::GreatCircle => part.km.to_f64(),
                CalculationMethod::None | CalculationMethod::ErrorFallback => None,
            },
            calculation_method: part.method,
            resolved_address: resolved,
            is_free: false,
            farms_count: farms.len(),
        }
    }

    /// Step four: the farthest farm sets the distance fee; every farm after
    /// the first adds a consolidation fee.
    async fn distance_part(
        &self,
        farms: &[FarmLocation],
        customer: &ResolvedAddress,
        settings: &DeliverySettings,
        ctx: &RequestContext,
    ) -> Result<DistancePart, CoreError> {
        if farms.is_empty() {
            return Ok(DistancePart::NONE);
        }

        let seeds = farms
            .iter()
            .map(|farm| self.farm_components(farm))
            .collect::<Result<Vec<_>, _>>()?;

        let lookups = seeds.iter().map(|components| async move {
            let farm = self.resolver.resolve_components(components, ctx).await;
            self.distances.distance(farm.coords, customer.coords, ctx).await
        });
        let results: Vec<DistanceResult> = join_all(lookups).await;

        let mut farthest = Decimal::ZERO;
        let mut method = CalculationMethod::Driving;
        for (index, result) in results.iter().enumerate() {
            let km = quantize_km(result.km);
            if index == 0 || km > farthest {
                farthest = km;
            }
            if result.method == DistanceMethod::GreatCircle {
                method = CalculationMethod::GreatCircle;
            }
        }

        let distance_fee = farthest
            .saturating_mul(settings.delivery_fee_per_km)
            .round_dp(2);
        let extra_farms = Decimal::from(farms.len() - 1);
        let consolidation_fee = extra_farms
            .saturating_mul(settings.multi_farm_consolidation_fee)
            .round_dp(2);

        Ok(DistancePart {
            km: farthest,
            distance_fee,
            consolidation_fee,
            method,
        })
    }

    fn farm_components(&self, farm: &FarmLocation) -> Result<AddressComponents, CoreError> {
        let sub_county = self.regions.sub_county(farm.sub_county_id).ok_or_else(|| {
            CoreError::InvalidInput {
                field: format!("farm[{}].sub_county_id", farm.farm_id),
                reason: format!("unknown sub-county {}", farm.sub_county_id),
            }
        })?;
        let county = self
            .regions
            .county(farm.county_id)
            .or_else(|| self.regions.county(sub_county.county_id))
            .ok_or_else(|| CoreError::InvalidInput {
                field: format!("farm[{}].county_id", farm.farm_id),
                reason: format!("unknown county {}", farm.county_id),
            })?;
        Ok(AddressComponents::administrative(&sub_county.name, &county.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> DeliverySettings {
        DeliverySettings::default()
    }

    #[test]
    fn weight_thresholds_are_strict() {
        let s = settings();
        assert_eq!(weight_surcharge(Decimal::new(10, 0), &s), Decimal::ZERO);
        assert_eq!(weight_surcharge(Decimal::new(1001, 2), &s), s.weight_surcharge_light);
        assert_eq!(weight_surcharge(Decimal::new(20, 0), &s), s.weight_surcharge_light);
        assert_eq!(weight_surcharge(Decimal::new(2001, 2), &s), s.weight_surcharge_heavy);
    }

    #[test]
    fn km_is_quantized_to_three_decimals() {
        assert_eq!(quantize_km(4.123_456), Decimal::new(4123, 3));
        assert_eq!(quantize_km(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn calculation_method_serializes_snake_case() {
        let json = serde_json::to_string(&CalculationMethod::ErrorFallback).unwrap();
        assert_eq!(json, "\"error_fallback\"");
        assert_eq!(CalculationMethod::from(DistanceMethod::GreatCircle).as_str(), "great_circle");
    }
}
