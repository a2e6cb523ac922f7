//! Typed key/value settings.
//!
//! Raw values are stored as text next to a declared [`SettingType`]. The
//! engine reads the delivery keys once per fee computation into a
//! [`DeliverySettings`] snapshot.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Number,
    Boolean,
    Json,
}

impl SettingType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SettingType::String => "string",
            SettingType::Number => "number",
            SettingType::Boolean => "boolean",
            SettingType::Json => "json",
        }
    }
}

impl std::fmt::Display for SettingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(SettingType::String),
            "number" => Ok(SettingType::Number),
            "boolean" => Ok(SettingType::Boolean),
            "json" => Ok(SettingType::Json),
            other => Err(format!("unknown setting type '{other}'")),
        }
    }
}

/// A setting value after conversion from its raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Boolean(bool),
    Number(Decimal),
    Text(String),
    Json(serde_json::Value),
}

impl SettingValue {
    /// Numeric view. Text values are parsed so a number stored under the
    /// `string` type still reads as a number.
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            SettingValue::Number(d) => Some(*d),
            SettingValue::Text(s) => Decimal::from_str(s.trim()).ok(),
            SettingValue::Boolean(_) | SettingValue::Json(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingRecord {
    pub key: String,
    pub raw_value: String,
    pub setting_type: SettingType,
}

impl SettingRecord {
    #[must_use]
    pub fn new(key: impl Into<String>, raw_value: impl Into<String>, setting_type: SettingType) -> Self {
        Self {
            key: key.into(),
            raw_value: raw_value.into(),
            setting_type,
        }
    }

    #[must_use]
    pub fn number(key: impl Into<String>, value: Decimal) -> Self {
        Self::new(key, value.to_string(), SettingType::Number)
    }

    /// Strict conversion.
    ///
    /// Numbers are rounded to two decimals. Booleans compare
    /// case-insensitively against `"true"`, so any other text reads `false`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MalformedSetting`] when a number or json value
    /// does not parse.
    pub fn parse(&self) -> Result<SettingValue, ConfigError> {
        match self.setting_type {
            SettingType::String => Ok(SettingValue::Text(self.raw_value.clone())),
            SettingType::Number => Decimal::from_str(self.raw_value.trim())
                .map(|d| SettingValue::Number(d.round_dp(2)))
                .map_err(|_| self.malformed()),
            SettingType::Boolean => Ok(SettingValue::Boolean(
                self.raw_value.trim().eq_ignore_ascii_case("true"),
            )),
            SettingType::Json => serde_json::from_str(&self.raw_value)
                .map(SettingValue::Json)
                .map_err(|_| self.malformed()),
        }
    }

    /// Display conversion: malformed numbers read as `0` and malformed json
    /// as `{}`.
    #[must_use]
    pub fn typed_value_lossy(&self) -> SettingValue {
        match self.parse() {
            Ok(value) => value,
            Err(_) => match self.setting_type {
                SettingType::Json => SettingValue::Json(serde_json::json!({})),
                _ => SettingValue::Number(Decimal::ZERO),
            },
        }
    }

    fn malformed(&self) -> ConfigError {
        ConfigError::MalformedSetting {
            key: self.key.clone(),
            setting_type: self.setting_type,
            raw: self.raw_value.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Read/write access to the settings table.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Option<SettingRecord>, SettingsError>;

    async fn store(&self, record: SettingRecord) -> Result<(), SettingsError>;
}

/// Typed read with a caller default.
///
/// A missing key returns `default`. A malformed value returns `default` when
/// one is given and logs a warning.
///
/// # Errors
///
/// Returns [`SettingsError::Config`] when the stored value is malformed and
/// no default is supplied, and [`SettingsError::Backend`] when the store
/// cannot be read.
pub async fn get_setting(
    store: &dyn SettingsStore,
    key: &str,
    default: Option<SettingValue>,
) -> Result<Option<SettingValue>, SettingsError> {
    let Some(record) = store.fetch(key).await? else {
        return Ok(default);
    };
    match record.parse() {
        Ok(value) => Ok(Some(value)),
        Err(e) if default.is_some() => {
            tracing::warn!(key, error = %e, "malformed setting; using default");
            Ok(default)
        }
        Err(e) => Err(e.into()),
    }
}

/// Process-local settings, used by tests and the CLI when no database is
/// configured.
#[derive(Debug, Default)]
pub struct InMemorySettings {
    records: RwLock<HashMap<String, SettingRecord>>,
}

impl InMemorySettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated with [`DEFAULT_DELIVERY_SETTINGS`].
    #[must_use]
    pub fn with_defaults() -> Self {
        let records = DEFAULT_DELIVERY_SETTINGS
            .iter()
            .map(|d| (d.key.to_string(), d.record()))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    fn poisoned() -> SettingsError {
        SettingsError::Backend("in-memory settings lock poisoned".to_string())
    }
}

#[async_trait]
impl SettingsStore for InMemorySettings {
    async fn fetch(&self, key: &str) -> Result<Option<SettingRecord>, SettingsError> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(records.get(key).cloned())
    }

    async fn store(&self, record: SettingRecord) -> Result<(), SettingsError> {
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;
        records.insert(record.key.clone(), record);
        Ok(())
    }
}

pub const BASE_DELIVERY_FEE: &str = "base_delivery_fee";
pub const FREE_DELIVERY_THRESHOLD: &str = "free_delivery_threshold";
pub const WEIGHT_THRESHOLD_LIGHT: &str = "weight_threshold_light";
pub const WEIGHT_SURCHARGE_LIGHT: &str = "weight_surcharge_light";
pub const WEIGHT_THRESHOLD_HEAVY: &str = "weight_threshold_heavy";
pub const WEIGHT_SURCHARGE_HEAVY: &str = "weight_surcharge_heavy";
pub const DELIVERY_FEE_PER_KM: &str = "delivery_fee_per_km";
pub const MULTI_FARM_CONSOLIDATION_FEE: &str = "multi_farm_consolidation_fee";
pub const MAX_DELIVERY_DISTANCE_KM: &str = "max_delivery_distance_km";

/// A delivery setting shipped with the engine.
#[derive(Debug, Clone, Copy)]
pub struct DefaultSetting {
    pub key: &'static str,
    pub raw_value: &'static str,
    pub description: &'static str,
}

impl DefaultSetting {
    #[must_use]
    pub fn record(&self) -> SettingRecord {
        SettingRecord::new(self.key, self.raw_value, SettingType::Number)
    }
}

pub const DEFAULT_DELIVERY_SETTINGS: &[DefaultSetting] = &[
    DefaultSetting {
        key: BASE_DELIVERY_FEE,
        raw_value: "50.00",
        description: "Base delivery fee in KES",
    },
    DefaultSetting {
        key: FREE_DELIVERY_THRESHOLD,
        raw_value: "1000.00",
        description: "Minimum order amount for free delivery in KES",
    },
    DefaultSetting {
        key: WEIGHT_THRESHOLD_LIGHT,
        raw_value: "10.00",
        description: "Cart weight in kg above which the light surcharge applies",
    },
    DefaultSetting {
        key: WEIGHT_SURCHARGE_LIGHT,
        raw_value: "15.00",
        description: "Light weight surcharge in KES",
    },
    DefaultSetting {
        key: WEIGHT_THRESHOLD_HEAVY,
        raw_value: "20.00",
        description: "Cart weight in kg above which the heavy surcharge applies",
    },
    DefaultSetting {
        key: WEIGHT_SURCHARGE_HEAVY,
        raw_value: "30.00",
        description: "Heavy weight surcharge in KES",
    },
    DefaultSetting {
        key: DELIVERY_FEE_PER_KM,
        raw_value: "5.00",
        description: "Delivery fee per kilometre in KES",
    },
    DefaultSetting {
        key: MULTI_FARM_CONSOLIDATION_FEE,
        raw_value: "25.00",
        description: "Fee per additional farm in a multi-farm delivery, in KES",
    },
    DefaultSetting {
        key: MAX_DELIVERY_DISTANCE_KM,
        raw_value: "50",
        description: "Maximum delivery distance in kilometres (advisory)",
    },
];

/// The delivery keys read once at the start of a fee computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySettings {
    pub base_delivery_fee: Decimal,
    pub free_delivery_threshold: Decimal,
    pub weight_threshold_light: Decimal,
    pub weight_surcharge_light: Decimal,
    pub weight_threshold_heavy: Decimal,
    pub weight_surcharge_heavy: Decimal,
    pub delivery_fee_per_km: Decimal,
    pub multi_farm_consolidation_fee: Decimal,
    pub max_delivery_distance_km: Decimal,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            base_delivery_fee: Decimal::new(5000, 2),
            free_delivery_threshold: Decimal::new(100_000, 2),
            weight_threshold_light: Decimal::new(1000, 2),
            weight_surcharge_light: Decimal::new(1500, 2),
            weight_threshold_heavy: Decimal::new(2000, 2),
            weight_surcharge_heavy: Decimal::new(3000, 2),
            delivery_fee_per_km: Decimal::new(500, 2),
            multi_farm_consolidation_fee: Decimal::new(2500, 2),
            max_delivery_distance_km: Decimal::from(50),
        }
    }
}

impl DeliverySettings {
    /// Reads every delivery key, falling back to the shipped default for
    /// missing or malformed values. A store that cannot be read yields the
    /// full default snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSetting`] when a stored fee, rate or
    /// threshold is negative.
    pub async fn load(store: &dyn SettingsStore) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut snapshot = defaults.clone();

        for (key, slot) in snapshot.slots_mut() {
            match store.fetch(key).await {
                Ok(Some(record)) => match record.parse().map(|v| v.as_decimal()) {
                    Ok(Some(value)) => *slot = value.round_dp(2),
                    Ok(None) | Err(_) => {
                        tracing::warn!(
                            key,
                            raw = %record.raw_value,
                            "delivery setting is not numeric; using default"
                        );
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "settings store unavailable; using default delivery settings");
                    return Ok(defaults);
                }
            }
        }

        snapshot.validate()?;
        Ok(snapshot)
    }

    fn slots_mut(&mut self) -> [(&'static str, &mut Decimal); 9] {
        [
            (BASE_DELIVERY_FEE, &mut self.base_delivery_fee),
            (FREE_DELIVERY_THRESHOLD, &mut self.free_delivery_threshold),
            (WEIGHT_THRESHOLD_LIGHT, &mut self.weight_threshold_light),
            (WEIGHT_SURCHARGE_LIGHT, &mut self.weight_surcharge_light),
            (WEIGHT_THRESHOLD_HEAVY, &mut self.weight_threshold_heavy),
            (WEIGHT_SURCHARGE_HEAVY, &mut self.weight_surcharge_heavy),
            (DELIVERY_FEE_PER_KM, &mut self.delivery_fee_per_km),
            (
                MULTI_FARM_CONSOLIDATION_FEE,
                &mut self.multi_farm_consolidation_fee,
            ),
            (MAX_DELIVERY_DISTANCE_KM, &mut self.max_delivery_distance_km),
        ]
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        for (key, value) in self.slots_mut() {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(ConfigError::InvalidSetting {
                    key: key.to_string(),
                    reason: format!("must not be negative, got {value}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, raw: &str, ty: SettingType) -> SettingRecord {
        SettingRecord::new(key, raw, ty)
    }

    #[test]
    fn number_rounds_to_two_decimals() {
        let value = record("k", "12.345", SettingType::Number).parse().unwrap();
        assert_eq!(value, SettingValue::Number(Decimal::new(1234, 2)));
    }

    #[test]
    fn malformed_number_is_strict_error_and_lossy_zero() {
        let rec = record("k", "abc", SettingType::Number);
        assert!(matches!(
            rec.parse(),
            Err(ConfigError::MalformedSetting { ref key, .. }) if key == "k"
        ));
        assert_eq!(rec.typed_value_lossy(), SettingValue::Number(Decimal::ZERO));
    }

    #[test]
    fn boolean_is_case_insensitive_true() {
        assert_eq!(
            record("k", "TRUE", SettingType::Boolean).parse().unwrap(),
            SettingValue::Boolean(true)
        );
        assert_eq!(
            record("k", "yes", SettingType::Boolean).parse().unwrap(),
            SettingValue::Boolean(false)
        );
    }

    #[test]
    fn malformed_json_reads_empty_object_lossy() {
        let rec = record("k", "{not json", SettingType::Json);
        assert!(rec.parse().is_err());
        assert_eq!(
            rec.typed_value_lossy(),
            SettingValue::Json(serde_json::json!({}))
        );
    }

    #[test]
    fn setting_type_round_trips_text() {
        assert_eq!("Number".parse::<SettingType>().unwrap(), SettingType::Number);
        assert!("float".parse::<SettingType>().is_err());
    }

    #[tokio::test]
    async fn get_setting_missing_key_returns_default() {
        let store = InMemorySettings::new();
        let default = Some(SettingValue::Boolean(true));
        let value = get_setting(&store, "absent", default.clone()).await.unwrap();
        assert_eq!(value, default);
    }

    #[tokio::test]
    async fn get_setting_malformed_without_default_is_config_error() {
        let store = InMemorySettings::new();
        store
            .store(record("bad", "x", SettingType::Number))
            .await
            .unwrap();
        let err = get_setting(&store, "bad", None).await.unwrap_err();
        assert!(matches!(err, SettingsError::Config(_)));

        let fallback = Some(SettingValue::Number(Decimal::ONE));
        let value = get_setting(&store, "bad", fallback.clone()).await.unwrap();
        assert_eq!(value, fallback);
    }

    #[tokio::test]
    async fn store_then_get_returns_written_value() {
        let store = InMemorySettings::with_defaults();
        let before = get_setting(&store, BASE_DELIVERY_FEE, None).await.unwrap();
        assert_eq!(before, Some(SettingValue::Number(Decimal::new(5000, 2))));

        store
            .store(SettingRecord::number(BASE_DELIVERY_FEE, Decimal::from(80)))
            .await
            .unwrap();
        let after = get_setting(&store, BASE_DELIVERY_FEE, None).await.unwrap();
        assert_eq!(after, Some(SettingValue::Number(Decimal::from(80))));
    }

    #[tokio::test]
    async fn delivery_settings_defaults_when_store_empty() {
        let snapshot = DeliverySettings::load(&InMemorySettings::new()).await.unwrap();
        assert_eq!(snapshot, DeliverySettings::default());
    }

    #[tokio::test]
    async fn delivery_settings_ignores_malformed_override() {
        let store = InMemorySettings::new();
        store
            .store(record(DELIVERY_FEE_PER_KM, "five", SettingType::Number))
            .await
            .unwrap();
        store
            .store(record(BASE_DELIVERY_FEE, "70", SettingType::String))
            .await
            .unwrap();
        let snapshot = DeliverySettings::load(&store).await.unwrap();
        assert_eq!(snapshot.delivery_fee_per_km, Decimal::new(500, 2));
        assert_eq!(snapshot.base_delivery_fee, Decimal::from(70));
    }

    #[tokio::test]
    async fn delivery_settings_rejects_negative_fee() {
        let store = InMemorySettings::new();
        store
            .store(SettingRecord::number(BASE_DELIVERY_FEE, Decimal::from(-5)))
            .await
            .unwrap();
        let err = DeliverySettings::load(&store).await.unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { ref key, .. } if key == BASE_DELIVERY_FEE));
    }

    #[test]
    fn shipped_defaults_match_snapshot_defaults() {
        let mut snapshot = DeliverySettings::default();
        for (key, value) in snapshot.slots_mut() {
            let shipped = DEFAULT_DELIVERY_SETTINGS
                .iter()
                .find(|d| d.key == key)
                .unwrap();
            assert_eq!(Decimal::from_str(shipped.raw_value).unwrap(), *value, "{key}");
        }
    }
}
