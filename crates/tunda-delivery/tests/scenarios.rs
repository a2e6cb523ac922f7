//! End-to-end fee computations against a scripted geocoder.

use std::path::Path;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tunda_core::{
    haversine_km, load_regions, CartItem, Coordinates, DeliveryAddress, FarmLocation, InMemorySettings,
    LegacyLocation, RegionDirectory, SettingRecord, SettingType, SettingsStore, Strategy,
    StructuredAddress, UnitOfMeasure, KENYA,
};
use tunda_delivery::{
    quantize_km, CalculationMethod, DeliveryEngine, DeliveryError, EngineConfig, FeeRequest,
    LandmarkStore, RequestContext, ScriptedBackend,
};

const FARM_A: Coordinates = Coordinates::new(-1.2676, 36.8108);
const FARM_B: Coordinates = Coordinates::new(-1.2190, 36.8960);
const HOME: Coordinates = Coordinates::new(-1.3100, 36.8200);

// Westlands and Kasarani, both in Nairobi.
const FARM_A_LOCATION: FarmLocation = FarmLocation {
    farm_id: 11,
    sub_county_id: 1,
    county_id: 1,
};
const FARM_B_LOCATION: FarmLocation = FarmLocation {
    farm_id: 12,
    sub_county_id: 7,
    county_id: 1,
};

fn regions() -> RegionDirectory {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/regions.yaml");
    let file = load_regions(&path).expect("regions seed loads");
    RegionDirectory::new(file.counties, file.sub_counties)
}

fn backend() -> ScriptedBackend {
    ScriptedBackend::new()
        .with_geocode("Westlands, Nairobi, Kenya", FARM_A)
        .with_geocode("Kasarani, Nairobi, Kenya", FARM_B)
}

fn engine_with(backend: ScriptedBackend, settings: InMemorySettings) -> DeliveryEngine {
    DeliveryEngine::new(
        EngineConfig::default(),
        KENYA,
        Arc::new(backend),
        Arc::new(settings),
        Arc::new(regions()),
        Arc::new(LandmarkStore::with_defaults(KENYA)),
    )
}

fn engine(backend: ScriptedBackend) -> DeliveryEngine {
    engine_with(backend, InMemorySettings::with_defaults())
}

fn item(farm: FarmLocation, quantity: i64, unit_price: i64) -> CartItem {
    CartItem {
        listing_ref: farm.farm_id * 100 + quantity,
        quantity: Decimal::from(quantity),
        unit_price: Decimal::from(unit_price),
        farm,
        unit_of_measure: UnitOfMeasure::Kg,
        product_is_weighted: true,
    }
}

fn at_home() -> Option<DeliveryAddress> {
    Some(DeliveryAddress::Coordinates {
        latitude: HOME.lat,
        longitude: HOME.lon,
    })
}

fn request(cart_items: Vec<CartItem>, delivery_address: Option<DeliveryAddress>) -> FeeRequest {
    FeeRequest {
        cart_items,
        delivery_address,
    }
}

#[tokio::test]
async fn single_farm_driving_distance() {
    let engine = engine(backend().with_distance(FARM_A, HOME, 5.0));
    let quote = engine
        .quote(
            &request(vec![item(FARM_A_LOCATION, 5, 100)], at_home()),
            &RequestContext::unbounded(),
        )
        .await
        .unwrap();

    assert_eq!(quote.subtotal, Decimal::from(500));
    assert_eq!(quote.total_fee, Decimal::from(75));
    assert_eq!(
        quote.calculation_details.calculation_method,
        CalculationMethod::Driving
    );
    assert_eq!(quote.calculation_details.weight_surcharge, Decimal::ZERO);
    assert_eq!(quote.calculation_details.distance_fee, Decimal::from(25));
    assert_eq!(quote.distance_km, Some(5.0));
    assert_eq!(quote.farms_count, 1);

    let resolution = quote.address_resolution.unwrap();
    assert_eq!(resolution.strategy_used, "direct");
    assert!((resolution.geocoding_confidence - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn subtotal_over_threshold_is_free() {
    let engine = engine(backend().with_distance(FARM_A, HOME, 2.0));
    let quote = engine
        .quote(
            &request(vec![item(FARM_A_LOCATION, 12, 100)], at_home()),
            &RequestContext::unbounded(),
        )
        .await
        .unwrap();

    assert!(quote.is_free_delivery);
    assert_eq!(quote.total_fee, Decimal::ZERO);
    assert_eq!(quote.subtotal, Decimal::from(1200));
    assert_eq!(quote.calculation_details.calculation_method, CalculationMethod::None);
    assert!(quote.address_resolution.is_some());
}

#[tokio::test]
async fn subtotal_equal_to_threshold_is_free() {
    let engine = engine(backend());
    let quote = engine
        .quote(
            &request(vec![item(FARM_A_LOCATION, 10, 100)], None),
            &RequestContext::unbounded(),
        )
        .await
        .unwrap();
    assert!(quote.is_free_delivery);
    assert_eq!(quote.total_fee, Decimal::ZERO);
}

#[tokio::test]
async fn two_farms_charge_the_farthest_plus_consolidation() {
    let engine = engine(
        backend()
            .with_distance(FARM_A, HOME, 4.0)
            .with_distance(FARM_B, HOME, 9.0),
    );
    let quote = engine
        .quote(
            &request(
                vec![item(FARM_A_LOCATION, 11, 50), item(FARM_B_LOCATION, 3, 50)],
                at_home(),
            ),
            &RequestContext::unbounded(),
        )
        .await
        .unwrap();

    assert_eq!(quote.subtotal, Decimal::from(700));
    assert_eq!(quote.calculation_details.total_weight_kg, Decimal::from(14));
    assert_eq!(quote.calculation_details.weight_surcharge, Decimal::from(15));
    assert_eq!(quote.calculation_details.distance_fee, Decimal::from(45));
    assert_eq!(quote.calculation_details.consolidation_fee, Decimal::from(25));
    assert_eq!(quote.total_fee, Decimal::from(135));
    assert_eq!(quote.farms_count, 2);
    assert_eq!(quote.distance_km, Some(9.0));
}

#[tokio::test]
async fn one_great_circle_farm_downgrades_the_whole_quote() {
    // Only farm A has a driving distance; farm B falls back to haversine.
    let engine = engine(backend().with_distance(FARM_A, HOME, 4.0));
    let quote = engine
        .quote(
            &request(
                vec![item(FARM_A_LOCATION, 2, 50), item(FARM_B_LOCATION, 2, 50)],
                at_home(),
            ),
            &RequestContext::unbounded(),
        )
        .await
        .unwrap();

    let farm_b_km = quantize_km(haversine_km(FARM_B, HOME));
    assert!(farm_b_km > Decimal::from(4));
    assert_eq!(
        quote.calculation_details.calculation_method,
        CalculationMethod::GreatCircle
    );
    assert_eq!(quote.distance_km, farm_b_km.to_f64());
    assert_eq!(
        quote.calculation_details.distance_fee,
        (farm_b_km * Decimal::from(5)).round_dp(2)
    );
    assert_eq!(quote.calculation_details.consolidation_fee, Decimal::from(25));
    assert_eq!(quote.farms_count, 2);
}

#[tokio::test]
async fn heavy_cart_takes_the_heavy_surcharge() {
    let engine = engine(backend().with_distance(FARM_A, HOME, 3.0));
    let quote = engine
        .quote(
            &request(vec![item(FARM_A_LOCATION, 25, 20)], at_home()),
            &RequestContext::unbounded(),
        )
        .await
        .unwrap();

    assert_eq!(quote.subtotal, Decimal::from(500));
    assert_eq!(quote.calculation_details.weight_surcharge, Decimal::from(30));
    assert_eq!(quote.total_fee, Decimal::from(95));
}

#[tokio::test]
async fn no_address_charges_base_only() {
    let engine = engine(backend());
    let quote = engine
        .quote(
            &request(vec![item(FARM_A_LOCATION, 1, 100)], None),
            &RequestContext::unbounded(),
        )
        .await
        .unwrap();

    assert_eq!(quote.total_fee, Decimal::from(50));
    assert_eq!(quote.calculation_details.calculation_method, CalculationMethod::None);
    assert_eq!(quote.distance_km, None);
    assert!(quote.address_resolution.is_none());
    assert!(!quote.address_validation.mismatch_detected);
}

#[tokio::test]
async fn landmark_in_another_sub_county_is_flagged_but_priced() {
    let engine = engine(
        backend()
            .with_geocode("Westgate Mall, Nairobi, Kenya", HOME)
            .with_distance(FARM_A, HOME, 5.0),
    );
    let address = DeliveryAddress::Structured(StructuredAddress {
        detailed_address: "Westgate Mall".to_string(),
        sub_county_id: 5,
        county_id: 1,
        full_name: None,
        phone: None,
        latitude: None,
        longitude: None,
    });
    let quote = engine
        .quote(
            &request(vec![item(FARM_A_LOCATION, 1, 100)], Some(address)),
            &RequestContext::unbounded(),
        )
        .await
        .unwrap();

    assert_eq!(quote.total_fee, Decimal::from(75));
    let resolution = quote.address_resolution.unwrap();
    assert_eq!(resolution.strategy_used, "detailed_with_county");

    let validation = quote.address_validation;
    assert!(validation.is_valid);
    assert!(validation.mismatch_detected);
    assert!((validation.confidence - 0.6).abs() < f64::EPSILON);
    assert!(validation.suggestions.iter().any(|s| s.contains("Westlands")));
}

#[tokio::test]
async fn repeated_quotes_are_identical() {
    let engine = engine(
        backend()
            .with_distance(FARM_A, HOME, 4.0)
            .with_distance(FARM_B, HOME, 9.0),
    );
    let req = request(
        vec![item(FARM_A_LOCATION, 2, 80), item(FARM_B_LOCATION, 1, 40)],
        at_home(),
    );
    let ctx = RequestContext::unbounded();

    let first = engine.quote(&req, &ctx).await.unwrap();
    let second = engine.quote(&req, &ctx).await.unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn unknown_farm_sub_county_degrades_to_error_fallback() {
    let engine = engine(backend());
    let stray = FarmLocation {
        farm_id: 99,
        sub_county_id: 9_999,
        county_id: 1,
    };
    let quote = engine
        .quote(&request(vec![item(stray, 1, 100)], at_home()), &RequestContext::unbounded())
        .await
        .unwrap();

    assert_eq!(
        quote.calculation_details.calculation_method,
        CalculationMethod::ErrorFallback
    );
    assert_eq!(quote.total_fee, Decimal::from(50));
    assert_eq!(engine.usage().counters.fee_error_fallbacks, 1);
}

#[tokio::test]
async fn failing_geocoder_still_prices_by_great_circle() {
    let engine = engine(ScriptedBackend::new().failing());
    let quote = engine
        .quote(
            &request(vec![item(FARM_A_LOCATION, 1, 100)], at_home()),
            &RequestContext::unbounded(),
        )
        .await
        .unwrap();

    assert_eq!(
        quote.calculation_details.calculation_method,
        CalculationMethod::GreatCircle
    );
    assert!(quote.total_fee > Decimal::from(50));
    let usage = engine.usage();
    assert_eq!(usage.counters.distance_fallbacks, 1);
    assert!(usage.counters.geocoder_upstream_errors >= 1);
}

#[tokio::test]
async fn negative_setting_is_a_config_error() {
    let settings = InMemorySettings::with_defaults();
    settings
        .store(SettingRecord::new(
            "base_delivery_fee",
            "-5",
            SettingType::Number,
        ))
        .await
        .unwrap();
    let engine = engine_with(backend(), settings);

    let err = engine
        .quote(
            &request(vec![item(FARM_A_LOCATION, 1, 100)], None),
            &RequestContext::unbounded(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Config(_)));
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let engine = engine(backend());
    let err = engine
        .quote(&request(Vec::new(), at_home()), &RequestContext::unbounded())
        .await
        .unwrap_err();
    assert!(
        matches!(err, DeliveryError::InvalidInput { ref field, .. } if field == "cart_items")
    );
}

#[tokio::test]
async fn line_total_too_large_to_price_is_rejected() {
    let engine = engine(backend().with_distance(FARM_A, HOME, 5.0));
    let mut line = item(FARM_A_LOCATION, 1, 1);
    line.quantity = Decimal::from(10_i64.pow(18));
    line.unit_price = Decimal::from(10_i64.pow(18));

    let err = engine
        .quote(&request(vec![line], at_home()), &RequestContext::unbounded())
        .await
        .unwrap_err();
    assert!(
        matches!(err, DeliveryError::InvalidInput { ref field, .. } if field == "cart_items[0].quantity")
    );
}

#[tokio::test]
async fn subtotal_too_large_to_price_is_rejected() {
    let engine = engine(backend().with_distance(FARM_A, HOME, 5.0));
    let mut line = item(FARM_A_LOCATION, 1, 1);
    line.quantity = Decimal::from(500_000_000_000_000_i64);
    line.unit_price = Decimal::from(100_000_000_000_000_i64);

    let err = engine
        .quote(
            &request(vec![line.clone(), line], at_home()),
            &RequestContext::unbounded(),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, DeliveryError::InvalidInput { ref field, .. } if field == "cart_items[1].quantity")
    );
}

#[tokio::test]
async fn expired_caches_are_purged() {
    let engine = engine(backend().with_distance(FARM_A, HOME, 5.0));
    engine
        .quote(
            &request(vec![item(FARM_A_LOCATION, 1, 100)], at_home()),
            &RequestContext::unbounded(),
        )
        .await
        .unwrap();

    let usage = engine.usage();
    assert_eq!(usage.distance_cache.entries, 1);
    assert_eq!(engine.purge_expired(), 0);
}

#[tokio::test]
async fn legacy_location_text_is_joined_before_geocoding() {
    let engine = engine(backend().with_geocode("Plot 12, Ngong Road, Nairobi, Kenya", HOME));
    let address = DeliveryAddress::Legacy(LegacyLocation {
        location_name: Some("Plot 12".to_string()),
        sub_location: Some("Ngong Road".to_string()),
        sub_county_id: Some(5),
        county_id: Some(1),
        ..LegacyLocation::default()
    });

    let resolved = engine
        .resolve_address(&address, &RequestContext::unbounded())
        .await
        .unwrap();
    assert_eq!(resolved.strategy, Strategy::DetailedWithCounty);
    assert_eq!(resolved.coords, HOME);
    assert!((resolved.confidence - 0.9).abs() < f64::EPSILON);
}
