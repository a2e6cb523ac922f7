//! Database operations for the `system_settings` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tunda_core::{SettingRecord, SettingType, SettingsError, SettingsStore};

use crate::DbError;

/// A row from the `system_settings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
    pub setting_type: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub updated_at: DateTime<Utc>,
}

impl SettingRow {
    /// The typed-settings view of this row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownSettingType`] when `setting_type` is not one
    /// of `string`, `number`, `boolean`, `json`.
    pub fn to_record(&self) -> Result<SettingRecord, DbError> {
        let setting_type =
            self.setting_type
                .parse::<SettingType>()
                .map_err(|_| DbError::UnknownSettingType {
                    key: self.key.clone(),
                    setting_type: self.setting_type.clone(),
                })?;
        Ok(SettingRecord::new(&self.key, &self.value, setting_type))
    }
}

/// Returns one setting row by key, or `None` if the key is not stored.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_setting_row(pool: &PgPool, key: &str) -> Result<Option<SettingRow>, DbError> {
    let row = sqlx::query_as::<_, SettingRow>(
        "SELECT key, value, setting_type, description, is_public, updated_at \
         FROM system_settings \
         WHERE key = $1",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns every setting row, ordered by key. `public_only` restricts the
/// list to rows flagged `is_public`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_settings(pool: &PgPool, public_only: bool) -> Result<Vec<SettingRow>, DbError> {
    let rows = sqlx::query_as::<_, SettingRow>(
        "SELECT key, value, setting_type, description, is_public, updated_at \
         FROM system_settings \
         WHERE ($1 = false OR is_public = true) \
         ORDER BY key",
    )
    .bind(public_only)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Inserts or replaces the value and type of one setting, leaving its
/// description and visibility alone.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn upsert_setting(pool: &PgPool, record: &SettingRecord) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO system_settings (key, value, setting_type) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (key) DO UPDATE SET \
             value = EXCLUDED.value, \
             setting_type = EXCLUDED.setting_type, \
             updated_at = NOW()",
    )
    .bind(&record.key)
    .bind(&record.raw_value)
    .bind(record.setting_type.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// [`SettingsStore`] over the `system_settings` table.
#[derive(Debug, Clone)]
pub struct PgSettingsStore {
    pool: PgPool,
}

impl PgSettingsStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<DbError> for SettingsError {
    fn from(err: DbError) -> Self {
        SettingsError::Backend(err.to_string())
    }
}

#[async_trait]
impl SettingsStore for PgSettingsStore {
    async fn fetch(&self, key: &str) -> Result<Option<SettingRecord>, SettingsError> {
        match get_setting_row(&self.pool, key).await? {
            Some(row) => Ok(Some(row.to_record()?)),
            None => Ok(None),
        }
    }

    async fn store(&self, record: SettingRecord) -> Result<(), SettingsError> {
        upsert_setting(&self.pool, &record).await?;
        Ok(())
    }
}
