use std::time::Duration;

use tunda_core::{County, Coordinates, SubCounty, KENYA};

use super::*;
use crate::cache::TtlCache;
use crate::counters::EngineCounters;
use crate::scripted::ScriptedBackend;

fn regions() -> RegionDirectory {
    let county = |id: i64, name: &str| County {
        id,
        name: name.to_string(),
        code: name[..3].to_uppercase(),
    };
    let sub = |id: i64, county_id: i64, name: &str| SubCounty {
        id,
        county_id,
        name: name.to_string(),
        code: String::new(),
    };
    RegionDirectory::new(
        vec![county(1, "Nairobi"), county(2, "Kiambu")],
        vec![
            sub(1, 1, "Westlands"),
            sub(2, 1, "Dagoretti North"),
            sub(5, 1, "Langata"),
            sub(9, 1, "Embakasi South"),
            sub(10, 1, "Embakasi North"),
            sub(20, 2, "Ruiru"),
        ],
    )
}

fn validator(backend: ScriptedBackend) -> (AddressValidator, Arc<ScriptedBackend>) {
    let backend = Arc::new(backend);
    let resolver = AddressResolver::new(
        backend.clone(),
        Arc::new(TtlCache::new("geocoding", Duration::from_secs(60), 100)),
        KENYA,
        Arc::new(EngineCounters::default()),
    );
    let validator = AddressValidator::new(
        Arc::new(LandmarkStore::with_defaults(KENYA)),
        Arc::new(regions()),
        Arc::new(resolver),
    );
    (validator, backend)
}

fn request(detailed: &str, sub_county_id: Option<i64>) -> ValidationRequest {
    ValidationRequest {
        detailed_address: detailed.to_string(),
        sub_county_id,
        county_id: Some(1),
    }
}

#[test]
fn jaccard_over_words() {
    assert!((jaccard_similarity("embakasi south", "Embakasi South") - 1.0).abs() < f64::EPSILON);
    assert!((jaccard_similarity("embakasi south", "embakasi north") - 1.0 / 3.0).abs() < 1e-9);
    assert!(jaccard_similarity("westlands", "langata").abs() < f64::EPSILON);
    assert!(jaccard_similarity("", "langata").abs() < f64::EPSILON);
}

#[test]
fn title_case_capitalises_each_word() {
    assert_eq!(title_case("embakasi south"), "Embakasi South");
    assert_eq!(title_case("sarit centre"), "Sarit Centre");
    assert_eq!(title_case("jkia"), "Jkia");
}

#[tokio::test]
async fn empty_address_is_valid_with_full_confidence() {
    let (validator, _) = validator(ScriptedBackend::new());
    let result = validator
        .validate(&request("   ", Some(5)), &RequestContext::unbounded())
        .await;
    assert_eq!(result, ValidationResult::default());
}

#[tokio::test]
async fn landmark_in_wrong_sub_county_is_flagged() {
    let (validator, backend) = validator(ScriptedBackend::new());
    let result = validator
        .validate(&request("Westgate Mall, 2nd floor", Some(5)), &RequestContext::unbounded())
        .await;

    assert!(result.is_valid);
    assert!(result.mismatch_detected);
    assert!((result.confidence - 0.6).abs() < f64::EPSILON);
    let detected = result.detected_location.expect("landmark detected");
    assert_eq!(detected.method, DetectionMethod::Landmarks);
    assert_eq!(detected.expected_sub_county, "westlands");
    assert_eq!(
        result.warnings[0],
        "Address mismatch detected: 'westgate' is typically located in Westlands, but you selected Langata."
    );
    assert_eq!(result.suggestions[0], "Consider selecting 'Westlands' instead");
    assert!(result
        .suggestions
        .iter()
        .any(|s| s.contains("building name")));
    assert_eq!(backend.geocode_calls(), 0);
}

#[tokio::test]
async fn matching_selection_has_no_mismatch() {
    let (validator, _) = validator(ScriptedBackend::new());
    let result = validator
        .validate(&request("Sarit Centre, 00100", Some(1)), &RequestContext::unbounded())
        .await;
    assert!(!result.mismatch_detected);
    assert!((result.confidence - 1.0).abs() < f64::EPSILON);
    assert!(result.warnings.is_empty());
    assert!(result.suggestions.is_empty());
}

#[tokio::test]
async fn sibling_sub_county_below_similarity_threshold_is_flagged() {
    let (validator, _) = validator(ScriptedBackend::new());
    // "Embakasi South" vs "Embakasi North" share one word of three: 0.33.
    let result = validator
        .validate(&request("Cargo gate, JKIA", Some(10)), &RequestContext::unbounded())
        .await;
    assert!(result.mismatch_detected);

    let result = validator
        .validate(&request("Cargo gate, JKIA", Some(9)), &RequestContext::unbounded())
        .await;
    assert!(!result.mismatch_detected);
}

#[tokio::test]
async fn full_sub_county_mention_beats_partial() {
    let (validator, _) = validator(ScriptedBackend::new());
    let result = validator
        .validate(
            &request("Plot 7, Dagoretti North, near Embakasi", Some(2)),
            &RequestContext::unbounded(),
        )
        .await;
    let detected = result.detected_location.unwrap();
    assert_eq!(detected.method, DetectionMethod::DirectMention);
    assert_eq!(detected.name, "Dagoretti North");
    assert!((detected.confidence - 0.9).abs() < f64::EPSILON);
    assert!(!result.mismatch_detected);
}

#[tokio::test]
async fn partial_sub_county_word_is_detected() {
    let (validator, _) = validator(ScriptedBackend::new());
    let result = validator
        .validate(&request("House 4, Dagoretti market lane", Some(5)), &RequestContext::unbounded())
        .await;
    let detected = result.detected_location.unwrap();
    assert_eq!(detected.name, "Dagoretti North");
    assert!((detected.confidence - 0.7).abs() < f64::EPSILON);
    assert!(result.mismatch_detected);
}

#[tokio::test]
async fn reverse_geocoding_is_the_last_detector() {
    let coords = Coordinates::new(-1.145, 36.96);
    let (validator, backend) = validator(
        ScriptedBackend::new()
            .with_geocode("Kamakis Bypass, Kenya", coords)
            .with_sub_county(coords, "Ruiru"),
    );
    let result = validator
        .validate(&request("Kamakis Bypass", Some(1)), &RequestContext::unbounded())
        .await;
    let detected = result.detected_location.unwrap();
    assert_eq!(detected.method, DetectionMethod::ReverseGeocoding);
    assert_eq!(detected.expected_sub_county, "Ruiru");
    assert!(result.mismatch_detected);
    assert_eq!(backend.reverse_calls(), 1);
}

#[tokio::test]
async fn short_address_is_penalised() {
    let (validator, _) = validator(ScriptedBackend::new());
    let result = validator
        .validate(&request("Gate B", None), &RequestContext::unbounded())
        .await;
    assert!(result.detected_location.is_none());
    assert!((result.confidence - 0.8).abs() < 1e-9);
    assert_eq!(
        result.warnings,
        vec!["Address seems very short - consider adding more details".to_string()]
    );
    assert_eq!(
        result.suggestions,
        vec!["Consider adding a postal code for better accuracy".to_string()]
    );
}

#[test]
fn suggestions_list_landmarks_before_sub_counties() {
    let (validator, _) = validator(ScriptedBackend::new());
    let hits = validator.suggest("west", DEFAULT_SUGGESTION_LIMIT);
    let texts: Vec<&str> = hits.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Westgate", "Westgate Mall", "Westlands"]);
    assert_eq!(hits[0].kind, SuggestionKind::Landmark);
    assert_eq!(hits[0].description, "Westgate, Westlands");
    assert_eq!(hits[2].kind, SuggestionKind::SubCounty);
    assert_eq!(hits[2].description, "Westlands, Nairobi");
    assert_eq!(hits[2].county.as_deref(), Some("Nairobi"));
}

#[test]
fn suggestions_respect_limit_and_blank_query() {
    let (validator, _) = validator(ScriptedBackend::new());
    assert_eq!(validator.suggest("embakasi", 1).len(), 1);
    assert!(validator.suggest("", 5).is_empty());
    assert!(validator.suggest("west", 0).is_empty());
}
