use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct County {
    pub id: i64,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCounty {
    pub id: i64,
    pub county_id: i64,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct RegionsFile {
    pub counties: Vec<County>,
    pub sub_counties: Vec<SubCounty>,
}

/// Load and validate the region seed file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_regions(path: &Path) -> Result<RegionsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SeedFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let regions: RegionsFile = serde_yaml::from_str(&content)?;
    validate_regions(&regions)?;

    Ok(regions)
}

fn validate_regions(regions: &RegionsFile) -> Result<(), ConfigError> {
    let mut county_ids = HashSet::new();
    for county in &regions.counties {
        if county.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "county {} has an empty name",
                county.id
            )));
        }
        if !county_ids.insert(county.id) {
            return Err(ConfigError::Validation(format!(
                "duplicate county id: {}",
                county.id
            )));
        }
    }

    let mut sub_county_ids = HashSet::new();
    for sub in &regions.sub_counties {
        if sub.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "sub-county {} has an empty name",
                sub.id
            )));
        }
        if !sub_county_ids.insert(sub.id) {
            return Err(ConfigError::Validation(format!(
                "duplicate sub-county id: {}",
                sub.id
            )));
        }
        if !county_ids.contains(&sub.county_id) {
            return Err(ConfigError::Validation(format!(
                "sub-county '{}' references unknown county {}",
                sub.name, sub.county_id
            )));
        }
    }

    Ok(())
}

/// In-memory lookup of counties and sub-counties by id.
///
/// Sub-counties keep their seed order, which autocomplete and mention
/// detection rely on for stable output.
#[derive(Debug, Clone, Default)]
pub struct RegionDirectory {
    counties: HashMap<i64, County>,
    sub_counties: Vec<SubCounty>,
    sub_county_index: HashMap<i64, usize>,
}

impl RegionDirectory {
    #[must_use]
    pub fn new(counties: Vec<County>, sub_counties: Vec<SubCounty>) -> Self {
        let sub_county_index = sub_counties
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
        Self {
            counties: counties.into_iter().map(|c| (c.id, c)).collect(),
            sub_counties,
            sub_county_index,
        }
    }

    #[must_use]
    pub fn county(&self, id: i64) -> Option<&County> {
        self.counties.get(&id)
    }

    #[must_use]
    pub fn sub_county(&self, id: i64) -> Option<&SubCounty> {
        self.sub_county_index
            .get(&id)
            .and_then(|&i| self.sub_counties.get(i))
    }

    #[must_use]
    pub fn sub_counties(&self) -> &[SubCounty] {
        &self.sub_counties
    }

    /// Sub-counties whose name contains `query`, ignoring case.
    #[must_use]
    pub fn search_sub_counties(&self, query: &str) -> Vec<&SubCounty> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.sub_counties
            .iter()
            .filter(|s| s.name.to_lowercase().contains(&query))
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counties.is_empty() && self.sub_counties.is_empty()
    }
}

impl From<RegionsFile> for RegionDirectory {
    fn from(file: RegionsFile) -> Self {
        Self::new(file.counties, file.sub_counties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn county(id: i64, name: &str) -> County {
        County {
            id,
            name: name.to_string(),
            code: name[..3].to_uppercase(),
        }
    }

    fn sub(id: i64, county_id: i64, name: &str) -> SubCounty {
        SubCounty {
            id,
            county_id,
            name: name.to_string(),
            code: name[..3].to_uppercase(),
        }
    }

    #[test]
    fn validate_rejects_orphan_sub_county() {
        let file = RegionsFile {
            counties: vec![county(1, "Nairobi")],
            sub_counties: vec![sub(1, 9, "Westlands")],
        };
        let err = validate_regions(&file).unwrap_err();
        assert!(err.to_string().contains("unknown county 9"));
    }

    #[test]
    fn validate_rejects_duplicate_sub_county_id() {
        let file = RegionsFile {
            counties: vec![county(1, "Nairobi")],
            sub_counties: vec![sub(1, 1, "Westlands"), sub(1, 1, "Langata")],
        };
        let err = validate_regions(&file).unwrap_err();
        assert!(err.to_string().contains("duplicate sub-county id"));
    }

    #[test]
    fn validate_rejects_empty_county_name() {
        let file = RegionsFile {
            counties: vec![County {
                id: 1,
                name: " ".to_string(),
                code: "X".to_string(),
            }],
            sub_counties: vec![],
        };
        assert!(validate_regions(&file).is_err());
    }

    #[test]
    fn directory_lookups_and_search() {
        let dir = RegionDirectory::new(
            vec![county(1, "Nairobi")],
            vec![
                sub(1, 1, "Embakasi South"),
                sub(2, 1, "Embakasi North"),
                sub(3, 1, "Westlands"),
            ],
        );
        assert_eq!(dir.sub_county(3).map(|s| s.name.as_str()), Some("Westlands"));
        assert_eq!(dir.county(1).map(|c| c.name.as_str()), Some("Nairobi"));
        assert!(dir.sub_county(42).is_none());

        let names: Vec<&str> = dir
            .search_sub_counties("EMBAKASI")
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Embakasi South", "Embakasi North"]);
        assert!(dir.search_sub_counties("").is_empty());
    }

    #[test]
    fn load_regions_reads_workspace_seed_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/regions.yaml");
        let file = load_regions(&path).expect("seed file should load");
        let dir = RegionDirectory::from(file);
        assert_eq!(dir.sub_county(5).map(|s| s.name.as_str()), Some("Langata"));
    }
}
