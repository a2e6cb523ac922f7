//! The fee-computation request: input checks, one settings snapshot,
//! resolution and fee in parallel with address validation.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tunda_core::{
    AppConfig, CartItem, CartTotals, Coordinates, CountryProfile, DeliveryAddress,
    DeliverySettings, RegionDirectory, ResolvedAddress, SettingsStore,
};
use tunda_geocoder::UsageStats;

use crate::backend::GeocodingBackend;
use crate::cache::{CacheStats, TtlCache};
use crate::context::RequestContext;
use crate::counters::{CounterSnapshot, EngineCounters};
use crate::distance::{CachedDistance, DistanceEngine};
use crate::error::DeliveryError;
use crate::fee::{CalculationMethod, FeeBreakdown, FeeCalculator};
use crate::landmarks::{LandmarkSource, LandmarkStore};
use crate::resolver::AddressResolver;
use crate::validator::{AddressValidator, AutocompleteSuggestion, ValidationRequest, ValidationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub geocoding_cache_ttl: Duration,
    pub distance_cache_ttl: Duration,
    pub cache_max_entries: usize,
    /// Ambient deadline of one request; `None` waits as long as the
    /// geocoder's own budget allows.
    pub request_deadline: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            geocoding_cache_ttl: Duration::from_secs(24 * 3600),
            distance_cache_ttl: Duration::from_secs(3600),
            cache_max_entries: 100_000,
            request_deadline: Some(Duration::from_secs(20)),
        }
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            geocoding_cache_ttl: Duration::from_secs(config.geocoding_cache_ttl_secs),
            distance_cache_ttl: Duration::from_secs(config.distance_cache_ttl_secs),
            cache_max_entries: config.cache_max_entries,
            request_deadline: Some(Duration::from_millis(config.request_deadline_ms)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRequest {
    pub cart_items: Vec<CartItem>,
    #[serde(default)]
    pub delivery_address: Option<DeliveryAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationDetails {
    pub base_fee: Decimal,
    pub fee_per_km: Decimal,
    pub free_delivery_threshold: Decimal,
    pub calculation_method: CalculationMethod,
    pub weight_surcharge: Decimal,
    pub distance_fee: Decimal,
    pub consolidation_fee: Decimal,
    pub total_weight_kg: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressResolution {
    pub address_used: String,
    pub geocoding_confidence: f64,
    pub input_address: String,
    pub strategy_used: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub total_fee: Decimal,
    pub subtotal: Decimal,
    pub distance_km: Option<f64>,
    pub is_free_delivery: bool,
    pub farms_count: usize,
    pub calculation_details: CalculationDetails,
    pub address_resolution: Option<AddressResolution>,
    pub address_validation: ValidationResult,
}

impl FeeQuote {
    fn assemble(
        breakdown: FeeBreakdown,
        settings: &DeliverySettings,
        input_address: Option<String>,
        validation: ValidationResult,
    ) -> Self {
        let address_resolution = breakdown.resolved_address.as_ref().map(|r| AddressResolution {
            address_used: r.address_used.clone(),
            geocoding_confidence: r.confidence,
            input_address: input_address.unwrap_or_default(),
            strategy_used: r.strategy.as_str().to_string(),
            coordinates: r.coords,
        });
        Self {
            total_fee: breakdown.total_fee,
            subtotal: breakdown.subtotal,
            distance_km: breakdown.distance_km,
            is_free_delivery: breakdown.is_free,
            farms_count: breakdown.farms_count,
            calculation_details: CalculationDetails {
                base_fee: settings.base_delivery_fee,
                fee_per_km: settings.delivery_fee_per_km,
                free_delivery_threshold: settings.free_delivery_threshold,
                calculation_method: breakdown.calculation_method,
                weight_surcharge: breakdown.weight_surcharge,
                distance_fee: breakdown.distance_fee,
                consolidation_fee: breakdown.consolidation_fee,
                total_weight_kg: breakdown.total_weight_kg,
            },
            address_resolution,
            address_validation: validation,
        }
    }
}

/// Geocoder windows, cache occupancy and absorbed-failure tallies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineUsage {
    pub geocoder: Option<UsageStats>,
    pub geocoding_cache: CacheStats,
    pub distance_cache: CacheStats,
    pub landmarks: usize,
    pub counters: CounterSnapshot,
}

pub struct DeliveryEngine {
    config: EngineConfig,
    backend: Arc<dyn GeocodingBackend>,
    settings: Arc<dyn SettingsStore>,
    regions: Arc<RegionDirectory>,
    landmarks: Arc<LandmarkStore>,
    geocoding_cache: Arc<TtlCache<Coordinates>>,
    distance_cache: Arc<TtlCache<CachedDistance>>,
    resolver: Arc<AddressResolver>,
    validator: AddressValidator,
    calculator: FeeCalculator,
    counters: Arc<EngineCounters>,
}

impl std::fmt::Debug for DeliveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryEngine")
            .field("config", &self.config)
            .field("geocoding_cache", &self.geocoding_cache.len())
            .field("distance_cache", &self.distance_cache.len())
            .finish_non_exhaustive()
    }
}

impl DeliveryEngine {
    #[must_use]
    pub fn new(
        config: EngineConfig,
        country: CountryProfile,
        backend: Arc<dyn GeocodingBackend>,
        settings: Arc<dyn SettingsStore>,
        regions: Arc<RegionDirectory>,
        landmarks: Arc<LandmarkStore>,
    ) -> Self {
        let counters = Arc::new(EngineCounters::default());
        let geocoding_cache = Arc::new(TtlCache::new(
            "geocoding",
            config.geocoding_cache_ttl,
            config.cache_max_entries,
        ));
        let distance_cache = Arc::new(TtlCache::new(
            "distance",
            config.distance_cache_ttl,
            config.cache_max_entries,
        ));

        let resolver = Arc::new(AddressResolver::new(
            Arc::clone(&backend),
            Arc::clone(&geocoding_cache),
            country,
            Arc::clone(&counters),
        ));
        let distances = Arc::new(DistanceEngine::new(
            Arc::clone(&backend),
            Arc::clone(&distance_cache),
            Arc::clone(&counters),
        ));
        let validator = AddressValidator::new(
            Arc::clone(&landmarks),
            Arc::clone(&regions),
            Arc::clone(&resolver),
        );
        let calculator = FeeCalculator::new(
            Arc::clone(&resolver),
            distances,
            Arc::clone(&regions),
            Arc::clone(&counters),
        );

        Self {
            config,
            backend,
            settings,
            regions,
            landmarks,
            geocoding_cache,
            distance_cache,
            resolver,
            validator,
            calculator,
            counters,
        }
    }

    /// A context carrying the configured request deadline.
    #[must_use]
    pub fn context(&self) -> RequestContext {
        match self.config.request_deadline {
            Some(deadline) => RequestContext::with_timeout(deadline),
            None => RequestContext::unbounded(),
        }
    }

    #[must_use]
    pub fn regions(&self) -> &RegionDirectory {
        &self.regions
    }

    #[must_use]
    pub fn settings_store(&self) -> &dyn SettingsStore {
        self.settings.as_ref()
    }

    /// Computes the delivery fee for `request`.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::InvalidInput`] for an empty cart, a bad cart line,
    ///   or an address that does not normalize.
    /// - [`DeliveryError::Config`] when a stored delivery setting is invalid.
    pub async fn quote(
        &self,
        request: &FeeRequest,
        ctx: &RequestContext,
    ) -> Result<FeeQuote, DeliveryError> {
        if request.cart_items.is_empty() {
            return Err(DeliveryError::invalid("cart_items", "must not be empty"));
        }
        for (index, item) in request.cart_items.iter().enumerate() {
            item.validate(index)?;
        }
        let totals = CartTotals::of(&request.cart_items)?;
        let address = request
            .delivery_address
            .as_ref()
            .map(|a| a.normalize(&self.regions))
            .transpose()?;

        let settings = DeliverySettings::load(self.settings.as_ref()).await?;

        let validation_request = address.as_ref().map(|a| ValidationRequest {
            detailed_address: a.components.detailed.clone(),
            sub_county_id: a.sub_county_id,
            county_id: a.county_id,
        });

        let (breakdown, validation) = tokio::join!(
            self.calculator
                .calculate(&request.cart_items, totals, address.as_ref(), &settings, ctx),
            async {
                match &validation_request {
                    Some(req) => self.validator.validate(req, ctx).await,
                    None => ValidationResult::default(),
                }
            }
        );

        self.counters.record_quote();
        tracing::info!(
            total_fee = %breakdown.total_fee,
            subtotal = %breakdown.subtotal,
            method = %breakdown.calculation_method,
            farms = breakdown.farms_count,
            free = breakdown.is_free,
            "delivery fee computed"
        );

        Ok(FeeQuote::assemble(
            breakdown,
            &settings,
            address.map(|a| a.input_text),
            validation,
        ))
    }

    /// Resolves one delivery address through the strategy ladder.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidInput`] when the address does not
    /// normalize.
    pub async fn resolve_address(
        &self,
        address: &DeliveryAddress,
        ctx: &RequestContext,
    ) -> Result<ResolvedAddress, DeliveryError> {
        let input = address.normalize(&self.regions)?;
        Ok(self.resolver.resolve(&input, ctx).await)
    }

    pub async fn validate_address(
        &self,
        request: &ValidationRequest,
        ctx: &RequestContext,
    ) -> ValidationResult {
        self.validator.validate(request, ctx).await
    }

    #[must_use]
    pub fn autocomplete(&self, query: &str, limit: usize) -> Vec<AutocompleteSuggestion> {
        self.validator.suggest(query, limit)
    }

    /// The settings snapshot a quote would use right now.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Config`] when a stored value is invalid.
    pub async fn delivery_settings(&self) -> Result<DeliverySettings, DeliveryError> {
        Ok(DeliverySettings::load(self.settings.as_ref()).await?)
    }

    pub async fn refresh_landmarks(&self, source: &dyn LandmarkSource) -> usize {
        self.landmarks.refresh(source).await
    }

    /// Drops expired entries from both caches; returns how many went.
    pub fn purge_expired(&self) -> usize {
        self.geocoding_cache.purge_expired() + self.distance_cache.purge_expired()
    }

    #[must_use]
    pub fn usage(&self) -> EngineUsage {
        EngineUsage {
            geocoder: self.backend.usage(),
            geocoding_cache: self.geocoding_cache.stats(),
            distance_cache: self.distance_cache.stats(),
            landmarks: self.landmarks.snapshot().landmark_count(),
            counters: self.counters.snapshot(),
        }
    }
}
