use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geo::DefaultLandmark;
use crate::ConfigError;

/// A named place mapped to the sub-county it lies in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkEntry {
    pub name: String,
    #[serde(default)]
    pub place_type: Option<String>,
    pub sub_county: String,
    #[serde(default)]
    pub alt_names: Vec<String>,
    #[serde(default)]
    pub popularity_score: i32,
    #[serde(default = "default_verified")]
    pub verified: bool,
}

fn default_verified() -> bool {
    true
}

impl LandmarkEntry {
    /// Lowercased main name followed by lowercased alternative names.
    pub fn names(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.name.to_lowercase())
            .chain(self.alt_names.iter().map(|n| n.to_lowercase()))
    }
}

impl From<&DefaultLandmark> for LandmarkEntry {
    fn from(landmark: &DefaultLandmark) -> Self {
        Self {
            name: landmark.name.to_string(),
            place_type: None,
            sub_county: landmark.sub_county.to_string(),
            alt_names: landmark.alt_names.iter().map(ToString::to_string).collect(),
            popularity_score: 0,
            verified: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LandmarksFile {
    pub landmarks: Vec<LandmarkEntry>,
}

/// Load and validate the landmark seed file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_landmarks(path: &Path) -> Result<LandmarksFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SeedFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: LandmarksFile = serde_yaml::from_str(&content)?;
    validate_landmarks(&file)?;

    Ok(file)
}

fn validate_landmarks(file: &LandmarksFile) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for landmark in &file.landmarks {
        if landmark.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "landmark name must be non-empty".to_string(),
            ));
        }
        if landmark.sub_county.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "landmark '{}' has no sub-county",
                landmark.name
            )));
        }
        if landmark.alt_names.iter().any(|n| n.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "landmark '{}' has an empty alternative name",
                landmark.name
            )));
        }
        if !seen.insert(landmark.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate landmark: '{}'",
                landmark.name
            )));
        }
    }
    Ok(())
}
