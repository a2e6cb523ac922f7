//! Verified landmark names mapped to the sub-county they sit in.
//!
//! The store holds an immutable snapshot behind an `Arc`; a refresh builds a
//! new snapshot and swaps it in whole. An empty or unreachable source leaves
//! the store on the country's compiled-in landmarks.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tunda_core::{CountryProfile, LandmarkEntry};

#[derive(Debug, Error)]
#[error("landmark source unavailable: {0}")]
pub struct LandmarkSourceError(pub String);

/// Where verified landmarks are loaded from.
#[async_trait]
pub trait LandmarkSource: Send + Sync {
    async fn load_landmarks(&self) -> Result<Vec<LandmarkEntry>, LandmarkSourceError>;
}

/// A fixed list, e.g. parsed from the seed YAML.
#[derive(Debug, Clone, Default)]
pub struct StaticLandmarks(pub Vec<LandmarkEntry>);

#[async_trait]
impl LandmarkSource for StaticLandmarks {
    async fn load_landmarks(&self) -> Result<Vec<LandmarkEntry>, LandmarkSourceError> {
        Ok(self.0.clone())
    }
}

/// A searchable name: a main or alternative landmark name, lowercased,
/// with its lowercased sub-county.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandmarkName {
    pub name: String,
    pub sub_county: String,
}

#[derive(Debug, Clone, Default)]
pub struct LandmarkSnapshot {
    names: Vec<LandmarkName>,
    landmark_count: usize,
    from_defaults: bool,
}

impl LandmarkSnapshot {
    /// Flattens `entries` in order, keeping only verified ones. A name seen
    /// twice keeps its first position and its latest sub-county.
    fn build(entries: &[LandmarkEntry], from_defaults: bool) -> Self {
        let mut names: Vec<LandmarkName> = Vec::new();
        let mut landmark_count = 0;
        for entry in entries.iter().filter(|e| e.verified) {
            landmark_count += 1;
            let sub_county = entry.sub_county.trim().to_lowercase();
            for name in entry.names() {
                let name = name.trim().to_string();
                if name.is_empty() {
                    continue;
                }
                match names.iter_mut().find(|n| n.name == name) {
                    Some(existing) => existing.sub_county.clone_from(&sub_county),
                    None => names.push(LandmarkName {
                        name,
                        sub_county: sub_county.clone(),
                    }),
                }
            }
        }
        Self {
            names,
            landmark_count,
            from_defaults,
        }
    }

    fn defaults(country: &CountryProfile) -> Self {
        let entries: Vec<LandmarkEntry> = country.landmarks.iter().map(LandmarkEntry::from).collect();
        Self::build(&entries, true)
    }

    #[must_use]
    pub fn names(&self) -> &[LandmarkName] {
        &self.names
    }

    #[must_use]
    pub fn landmark_count(&self) -> usize {
        self.landmark_count
    }

    #[must_use]
    pub fn from_defaults(&self) -> bool {
        self.from_defaults
    }
}

#[derive(Debug)]
pub struct LandmarkStore {
    country: CountryProfile,
    snapshot: RwLock<Arc<LandmarkSnapshot>>,
}

impl LandmarkStore {
    /// A store holding only the country's compiled-in landmarks.
    #[must_use]
    pub fn with_defaults(country: CountryProfile) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(LandmarkSnapshot::defaults(&country))),
            country,
        }
    }

    /// Builds a store and performs the first load from `source`.
    pub async fn load(country: CountryProfile, source: &dyn LandmarkSource) -> Self {
        let store = Self::with_defaults(country);
        store.refresh(source).await;
        store
    }

    /// Reloads from `source` and swaps the snapshot. Returns the number of
    /// landmarks now held.
    pub async fn refresh(&self, source: &dyn LandmarkSource) -> usize {
        let next = match source.load_landmarks().await {
            Ok(mut entries) => {
                entries.sort_by(|a, b| b.popularity_score.cmp(&a.popularity_score));
                let snapshot = LandmarkSnapshot::build(&entries, false);
                if snapshot.landmark_count == 0 {
                    tracing::warn!("landmark source returned no verified landmarks; using defaults");
                    LandmarkSnapshot::defaults(&self.country)
                } else {
                    snapshot
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load landmarks; using defaults");
                LandmarkSnapshot::defaults(&self.country)
            }
        };

        let count = next.landmark_count;
        tracing::info!(
            landmarks = count,
            names = next.names.len(),
            defaults = next.from_defaults,
            "landmark snapshot loaded"
        );
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        count
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<LandmarkSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// First landmark name that occurs in `text`, ignoring case.
    #[must_use]
    pub fn find_in(&self, text: &str) -> Option<LandmarkName> {
        let text = text.to_lowercase();
        self.snapshot()
            .names
            .iter()
            .find(|n| text.contains(&n.name))
            .cloned()
    }

    /// Names containing or starting with `query`, ignoring case, in
    /// popularity order.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<LandmarkName> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.snapshot()
            .names
            .iter()
            .filter(|n| n.name.contains(&query) || n.name.starts_with(&query))
            .cloned()
            .collect()
    }
}
