//! Shared domain types and configuration for the Tunda delivery engine.
//!
//! Everything here is transport- and storage-agnostic: cart and address
//! shapes, the country profile, the typed settings contract, the region
//! directory, and process configuration loaded from the environment.

pub mod address;
pub mod app_config;
pub mod cart;
pub mod config;
pub mod geo;
pub mod landmarks;
pub mod regions;
pub mod settings;

use thiserror::Error;

pub use address::{
    AddressComponents, AddressInput, DeliveryAddress, LegacyLocation, ResolvedAddress, Strategy,
    StructuredAddress,
};
pub use app_config::{AppConfig, Environment, GeocoderSettings};
pub use cart::{CartItem, CartTotals, FarmLocation, UnitOfMeasure};
pub use config::{load_app_config, load_app_config_from_env};
pub use geo::{
    haversine_km, CityCentroid, Coordinates, CountryBounds, CountryProfile, DefaultLandmark, KENYA,
};
pub use landmarks::{load_landmarks, LandmarkEntry, LandmarksFile};
pub use regions::{load_regions, County, RegionDirectory, RegionsFile, SubCounty};
pub use settings::{
    get_setting, DefaultSetting, DeliverySettings, InMemorySettings, SettingRecord, SettingType,
    SettingValue, SettingsError, SettingsStore, DEFAULT_DELIVERY_SETTINGS,
};

/// Errors raised while loading process configuration or typed settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read seed file {path}: {source}")]
    SeedFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse seed file: {0}")]
    SeedFileParse(#[from] serde_yaml::Error),

    #[error("seed validation failed: {0}")]
    Validation(String),

    #[error("setting '{key}' has malformed {setting_type} value '{raw}'")]
    MalformedSetting {
        key: String,
        setting_type: SettingType,
        raw: String,
    },

    #[error("setting '{key}' is invalid: {reason}")]
    InvalidSetting { key: String, reason: String },
}

/// Input validation errors for engine requests.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },
}

impl CoreError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
