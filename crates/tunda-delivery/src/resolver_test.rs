use std::time::Duration;

use tunda_core::KENYA;

use super::*;
use crate::scripted::ScriptedBackend;

fn components(detailed: &str, sub_county: Option<&str>, county: Option<&str>) -> AddressComponents {
    AddressComponents {
        detailed: detailed.to_string(),
        sub_county: sub_county.map(ToString::to_string),
        county: county.map(ToString::to_string),
    }
}

fn resolver(backend: ScriptedBackend) -> (AddressResolver, Arc<ScriptedBackend>, Arc<EngineCounters>) {
    let backend = Arc::new(backend);
    let counters = Arc::new(EngineCounters::default());
    let resolver = AddressResolver::new(
        backend.clone(),
        Arc::new(TtlCache::new("geocoding", Duration::from_secs(86_400), 1_000)),
        KENYA,
        counters.clone(),
    );
    (resolver, backend, counters)
}

fn input(components: AddressComponents, direct: Option<Coordinates>) -> AddressInput {
    AddressInput {
        direct,
        input_text: components.detailed.clone(),
        components,
        sub_county_id: None,
        county_id: None,
    }
}

#[test]
fn meaningful_address_rules() {
    assert!(is_meaningful_address("Westgate Mall"));
    assert!(is_meaningful_address("Ngong Road"));
    assert!(is_meaningful_address("House 12B"));
    assert!(!is_meaningful_address("ab"));
    assert!(!is_meaningful_address("Kilimani"));
    assert!(!is_meaningful_address("my area"));
    assert!(!is_meaningful_address("city park"));
    assert!(is_meaningful_address("near the city park gate"));
}

#[test]
fn strategies_are_ranked_for_full_components() {
    let strategies = build_strategies(
        &components("Sarit Centre", Some("Westlands"), Some("Nairobi")),
        "Kenya",
    );
    let got: Vec<(&str, f64, Strategy)> = strategies
        .iter()
        .map(|s| (s.query.as_str(), s.confidence, s.strategy))
        .collect();
    assert_eq!(
        got,
        vec![
            ("Sarit Centre, Nairobi, Kenya", 0.9, Strategy::DetailedWithCounty),
            (
                "Sarit Centre, Westlands, Nairobi, Kenya",
                0.85,
                Strategy::DetailedWithSubCounty
            ),
            ("Sarit Centre, Kenya", 0.8, Strategy::DetailedOnly),
            ("Westlands, Nairobi, Kenya", 0.7, Strategy::SubCountyWithCounty),
            ("Nairobi, Kenya", 0.6, Strategy::CountyCenter),
        ]
    );
}

#[test]
fn vague_detail_is_skipped_and_empty_parts_are_dropped() {
    let strategies = build_strategies(&components("Kilimani", None, Some("Nairobi")), "Kenya");
    assert_eq!(strategies.len(), 1);
    assert_eq!(strategies[0].query, "Nairobi, Kenya");
    assert_eq!(strategies[0].strategy, Strategy::CountyCenter);
}

#[test]
fn duplicate_queries_keep_the_higher_rank() {
    // Without a county the first and third detailed queries coincide.
    let strategies = build_strategies(&components("Ngong Road", None, None), "Kenya");
    assert_eq!(strategies.len(), 1);
    assert_eq!(strategies[0].query, "Ngong Road, Kenya");
    assert_eq!(strategies[0].strategy, Strategy::DetailedWithCounty);
}

#[tokio::test]
async fn direct_coordinates_skip_the_geocoder() {
    let (resolver, backend, _) = resolver(ScriptedBackend::new());
    let coords = Coordinates::new(-1.26, 36.80);
    let resolved = resolver
        .resolve(&input(AddressComponents::default(), Some(coords)), &RequestContext::unbounded())
        .await;
    assert_eq!(resolved.strategy, Strategy::Direct);
    assert!((resolved.confidence - 1.0).abs() < f64::EPSILON);
    assert_eq!(backend.geocode_calls(), 0);
}

#[tokio::test]
async fn out_of_country_direct_coordinates_fall_through_to_components() {
    let westlands = Coordinates::new(-1.2676, 36.8108);
    let (resolver, _, counters) = resolver(
        ScriptedBackend::new().with_geocode("Westlands, Nairobi, Kenya", westlands),
    );
    let resolved = resolver
        .resolve(
            &input(
                components("", Some("Westlands"), Some("Nairobi")),
                Some(Coordinates::new(51.5, -0.12)),
            ),
            &RequestContext::unbounded(),
        )
        .await;
    assert_eq!(resolved.strategy, Strategy::SubCountyWithCounty);
    assert_eq!(resolved.coords, westlands);
    assert_eq!(counters.snapshot().out_of_bounds, 1);
}

#[tokio::test]
async fn out_of_bounds_result_rejects_strategy() {
    let (resolver, _, _) = resolver(
        ScriptedBackend::new()
            .with_geocode("Westgate Mall, Nairobi, Kenya", Coordinates::new(40.7, -74.0))
            .with_geocode("Westgate Mall, Westlands, Nairobi, Kenya", Coordinates::new(-1.257, 36.803)),
    );
    let resolved = resolver
        .resolve_components(
            &components("Westgate Mall", Some("Westlands"), Some("Nairobi")),
            &RequestContext::unbounded(),
        )
        .await;
    assert_eq!(resolved.strategy, Strategy::DetailedWithSubCounty);
    assert!(KENYA.bounds.contains(resolved.coords));
}

#[tokio::test]
async fn repeated_geocode_hits_cache() {
    let (resolver, backend, _) = resolver(
        ScriptedBackend::new().with_geocode("Nakuru, Kenya", Coordinates::new(-0.3031, 36.08)),
    );
    let ctx = RequestContext::unbounded();
    resolver.geocode_text("Nakuru, Kenya", &ctx).await.unwrap();
    resolver.geocode_text("nakuru,   KENYA", &ctx).await.unwrap();
    assert_eq!(backend.geocode_calls(), 1);
}

#[tokio::test]
async fn misses_are_not_cached() {
    let (resolver, backend, _) = resolver(ScriptedBackend::new());
    let ctx = RequestContext::unbounded();
    assert!(resolver.geocode_text("Nowhere, Kenya", &ctx).await.is_err());
    assert!(resolver.geocode_text("Nowhere, Kenya", &ctx).await.is_err());
    assert_eq!(backend.geocode_calls(), 2);
}

#[tokio::test]
async fn failing_upstream_uses_city_fallback_for_county() {
    let (resolver, _, counters) = resolver(ScriptedBackend::new().failing());
    let resolved = resolver
        .resolve_components(
            &components("Ngong Road", Some("Langata"), Some("Nairobi")),
            &RequestContext::unbounded(),
        )
        .await;
    assert_eq!(resolved.strategy, Strategy::CityFallback);
    assert!((resolved.confidence - 0.5).abs() < f64::EPSILON);
    assert_eq!(resolved.address_used, "Nairobi, Kenya");
    let snap = counters.snapshot();
    assert_eq!(snap.address_fallbacks, 1);
    assert_eq!(snap.geocoder_upstream_errors, 5);
}

#[tokio::test]
async fn city_fallback_tries_sub_county_after_county() {
    let (resolver, _, _) = resolver(ScriptedBackend::new());
    let resolved = resolver
        .resolve_components(
            &components("", Some("Thika Town"), Some("Kiambu")),
            &RequestContext::unbounded(),
        )
        .await;
    assert_eq!(resolved.strategy, Strategy::CityFallback);
    assert_eq!(resolved.address_used, "Thika, Kenya");
}

#[tokio::test]
async fn unknown_place_falls_back_to_country_centroid() {
    let (resolver, _, _) = resolver(ScriptedBackend::new());
    let resolved = resolver
        .resolve_components(
            &components("", Some("Isiolo North"), Some("Isiolo")),
            &RequestContext::unbounded(),
        )
        .await;
    assert_eq!(resolved.strategy, Strategy::CountryCentroid);
    assert!((resolved.confidence - 0.3).abs() < f64::EPSILON);
    assert_eq!(resolved.coords, KENYA.capital().coords);
}

#[tokio::test(start_paused = true)]
async fn deadline_abandons_strategies_and_degrades() {
    let (resolver, backend, counters) = resolver(
        ScriptedBackend::new()
            .with_geocode("Mombasa, Kenya", Coordinates::new(-4.04, 39.66))
            .with_latency(Duration::from_secs(5)),
    );
    let ctx = RequestContext::with_timeout(Duration::from_secs(1));
    let resolved = resolver
        .resolve_components(&components("", None, Some("Mombasa")), &ctx)
        .await;
    assert_eq!(resolved.strategy, Strategy::CityFallback);
    assert_eq!(backend.geocode_calls(), 1);
    assert_eq!(counters.snapshot().deadline_expired, 1);
}

#[tokio::test]
async fn reverse_lookup_returns_level_two_area() {
    let coords = Coordinates::new(-1.36, 36.75);
    let (resolver, _, _) = resolver(ScriptedBackend::new().with_sub_county(coords, "Langata"));
    let ctx = RequestContext::unbounded();
    assert_eq!(resolver.sub_county_at(coords, &ctx).await.as_deref(), Some("Langata"));
    assert_eq!(
        resolver
            .sub_county_at(Coordinates::new(0.0, 37.0), &ctx)
            .await,
        None
    );
}
