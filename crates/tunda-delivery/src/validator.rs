//! Free-text address checks against the selected sub-county, plus
//! autocomplete.
//!
//! Validation never blocks a request. It detects where the text most likely
//! points (landmark, sub-county mention, then reverse geocoding), compares
//! that with the selection, and attaches warnings and suggestions.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tunda_core::RegionDirectory;

use crate::context::RequestContext;
use crate::landmarks::LandmarkStore;
use crate::resolver::AddressResolver;

pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

const MISMATCH_SIMILARITY: f64 = 0.7;
const MISMATCH_CONFIDENCE: f64 = 0.6;
const SHORT_ADDRESS_CHARS: usize = 10;
const SHORT_ADDRESS_PENALTY: f64 = 0.8;

static FLOOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d+\s*(st|nd|rd|th)\s+floor\b").expect("valid floor regex")
});

static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{5}\b").expect("valid postal code regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    #[serde(default)]
    pub detailed_address: String,
    #[serde(default)]
    pub sub_county_id: Option<i64>,
    #[serde(default)]
    pub county_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Landmarks,
    DirectMention,
    ReverseGeocoding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedLocation {
    pub name: String,
    pub expected_sub_county: String,
    pub confidence: f64,
    pub method: DetectionMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub confidence: f64,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub mismatch_detected: bool,
    pub detected_location: Option<DetectedLocation>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            is_valid: true,
            confidence: 1.0,
            warnings: Vec::new(),
            suggestions: Vec::new(),
            mismatch_detected: false,
            detected_location: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Landmark,
    SubCounty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutocompleteSuggestion {
    pub text: String,
    pub description: String,
    pub sub_county: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
}

/// `|A ∩ B| / |A ∪ B|` over lowercase whitespace-separated words.
#[must_use]
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let similarity = words_a.intersection(&words_b).count() as f64 / union as f64;
    similarity
}

/// Capitalises the first letter of every word: "embakasi south" becomes
/// "Embakasi South".
pub(crate) fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_is_letter = false;
    for c in s.chars() {
        if previous_is_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        previous_is_letter = c.is_alphabetic();
    }
    out
}

#[derive(Debug)]
pub struct AddressValidator {
    landmarks: Arc<LandmarkStore>,
    regions: Arc<RegionDirectory>,
    resolver: Arc<AddressResolver>,
}

impl AddressValidator {
    #[must_use]
    pub fn new(
        landmarks: Arc<LandmarkStore>,
        regions: Arc<RegionDirectory>,
        resolver: Arc<AddressResolver>,
    ) -> Self {
        Self {
            landmarks,
            regions,
            resolver,
        }
    }

    /// Checks `request` and returns advisory findings. Never fails.
    pub async fn validate(
        &self,
        request: &ValidationRequest,
        ctx: &RequestContext,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();
        let detailed = request.detailed_address.trim();
        if detailed.is_empty() {
            return result;
        }

        if let Some(detected) = self.detect_location(detailed, ctx).await {
            let selected = request
                .sub_county_id
                .and_then(|id| self.regions.sub_county(id))
                .map(|s| s.name.as_str());
            if let Some(selected) = selected {
                check_mismatch(&detected, selected, &mut result);
            }
            result.detected_location = Some(detected);
        }

        add_text_heuristics(detailed, &mut result);
        result
    }

    async fn detect_location(&self, detailed: &str, ctx: &RequestContext) -> Option<DetectedLocation> {
        if let Some(landmark) = self.landmarks.find_in(detailed) {
            return Some(DetectedLocation {
                name: landmark.name,
                expected_sub_county: landmark.sub_county,
                confidence: 0.8,
                method: DetectionMethod::Landmarks,
            });
        }

        if let Some((name, confidence)) = self.find_sub_county_mention(detailed) {
            return Some(DetectedLocation {
                name: name.clone(),
                expected_sub_county: name,
                confidence,
                method: DetectionMethod::DirectMention,
            });
        }

        self.reverse_detect(detailed, ctx).await
    }

    /// Best sub-county named in `detailed`: 0.9 for the full name, 0.7 for
    /// a distinctive word (longer than three letters) of a multi-word name.
    fn find_sub_county_mention(&self, detailed: &str) -> Option<(String, f64)> {
        let text = detailed.to_lowercase();
        let mut best: Option<(String, f64)> = None;

        for sub_county in self.regions.sub_counties() {
            let name = sub_county.name.to_lowercase();
            let words: Vec<&str> = name.split_whitespace().collect();
            let confidence = if text.contains(&name) {
                0.9
            } else if words.len() > 1
                && words
                    .iter()
                    .any(|w| w.chars().count() > 3 && text.contains(w))
            {
                0.7
            } else {
                continue;
            };

            if best.as_ref().is_none_or(|(_, c)| confidence > *c) {
                best = Some((sub_county.name.clone(), confidence));
            }
        }
        best
    }

    async fn reverse_detect(&self, detailed: &str, ctx: &RequestContext) -> Option<DetectedLocation> {
        let query = format!("{detailed}, {}", self.resolver.country().name);
        let coords = self.resolver.geocode_text(&query, ctx).await.ok()?;
        let sub_county = self.resolver.sub_county_at(coords, ctx).await?;
        Some(DetectedLocation {
            name: detailed.to_string(),
            expected_sub_county: sub_county,
            confidence: 0.7,
            method: DetectionMethod::ReverseGeocoding,
        })
    }

    /// Landmarks matching `query`, then sub-counties, de-duplicated by text
    /// and cut to `limit`.
    #[must_use]
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<AutocompleteSuggestion> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        let landmarks = self.landmarks.search(query).into_iter().map(|hit| {
            let text = title_case(&hit.name);
            let sub_county = title_case(&hit.sub_county);
            AutocompleteSuggestion {
                description: format!("{text}, {sub_county}"),
                text,
                sub_county,
                county: None,
                kind: SuggestionKind::Landmark,
            }
        });

        let sub_counties = self
            .regions
            .search_sub_counties(query)
            .into_iter()
            .take(limit)
            .map(|s| {
                let county = self.regions.county(s.county_id).map(|c| c.name.clone());
                AutocompleteSuggestion {
                    text: s.name.clone(),
                    description: match &county {
                        Some(county) => format!("{}, {county}", s.name),
                        None => s.name.clone(),
                    },
                    sub_county: s.name.clone(),
                    county,
                    kind: SuggestionKind::SubCounty,
                }
            });

        let mut seen = HashSet::new();
        landmarks
            .chain(sub_counties)
            .filter(|s| seen.insert(s.text.clone()))
            .take(limit)
            .collect()
    }
}

fn check_mismatch(detected: &DetectedLocation, selected: &str, result: &mut ValidationResult) {
    let expected = detected.expected_sub_county.trim().to_lowercase();
    if expected.is_empty() || expected == selected.trim().to_lowercase() {
        return;
    }
    if jaccard_similarity(&expected, selected) >= MISMATCH_SIMILARITY {
        return;
    }

    let expected_title = title_case(&expected);
    tracing::info!(
        place = %detected.name,
        expected = %expected_title,
        selected,
        "address mismatch detected"
    );
    result.mismatch_detected = true;
    result.confidence = MISMATCH_CONFIDENCE;
    result.warnings.push(format!(
        "Address mismatch detected: '{}' is typically located in {expected_title}, but you selected {selected}.",
        detected.name
    ));
    result.suggestions.extend([
        format!("Consider selecting '{expected_title}' instead"),
        "Double-check your address details".to_string(),
        "Verify the sub-county selection".to_string(),
    ]);
}

fn add_text_heuristics(detailed: &str, result: &mut ValidationResult) {
    if FLOOR_PATTERN.is_match(&detailed.to_lowercase()) {
        result
            .suggestions
            .push("Tip: Include building name for more accurate delivery".to_string());
    }

    if !POSTAL_CODE.is_match(detailed) {
        result
            .suggestions
            .push("Consider adding a postal code for better accuracy".to_string());
    }

    if detailed.chars().count() < SHORT_ADDRESS_CHARS {
        result
            .warnings
            .push("Address seems very short - consider adding more details".to_string());
        result.confidence *= SHORT_ADDRESS_PENALTY;
    }
}

#[cfg(test)]
#[path = "validator_test.rs"]
mod tests;
