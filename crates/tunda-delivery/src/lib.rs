//! Delivery fee computation and address resolution.
//!
//! [`DeliveryEngine`] is the entry point. It wires the geocoding and
//! distance caches, the [`AddressResolver`], [`AddressValidator`],
//! [`DistanceEngine`] and [`FeeCalculator`] around one
//! [`GeocodingBackend`]. Upstream failures never surface from here: they
//! are counted, logged, and turned into lower-confidence results.

pub mod backend;
pub mod cache;
pub mod context;
pub mod counters;
pub mod distance;
pub mod engine;
pub mod error;
pub mod fee;
pub mod landmarks;
pub mod resolver;
pub mod scripted;
pub mod validator;

pub use backend::GeocodingBackend;
pub use cache::{address_key, distance_key, CacheStats, Lookup, TtlCache};
pub use context::RequestContext;
pub use counters::{CounterSnapshot, EngineCounters};
pub use distance::{CachedDistance, DistanceEngine, DistanceMethod, DistanceResult};
pub use engine::{
    AddressResolution, CalculationDetails, DeliveryEngine, EngineConfig, EngineUsage, FeeQuote,
    FeeRequest,
};
pub use error::{DeliveryError, LookupError};
pub use fee::{quantize_km, weight_surcharge, CalculationMethod, FeeBreakdown, FeeCalculator};
pub use landmarks::{
    LandmarkName, LandmarkSnapshot, LandmarkSource, LandmarkSourceError, LandmarkStore,
    StaticLandmarks,
};
pub use resolver::{build_strategies, is_meaningful_address, AddressResolver, GeocodeStrategy};
pub use scripted::ScriptedBackend;
pub use validator::{
    jaccard_similarity, AddressValidator, AutocompleteSuggestion, DetectedLocation,
    DetectionMethod, SuggestionKind, ValidationRequest, ValidationResult,
    DEFAULT_SUGGESTION_LIMIT,
};
