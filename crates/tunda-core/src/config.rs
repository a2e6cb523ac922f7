use std::str::FromStr;

use crate::app_config::{AppConfig, Environment, GeocoderSettings};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("TUNDA_ENV", "development"))?;

    let bind_addr: SocketAddr = parse_var(
        "TUNDA_BIND_ADDR",
        &or_default("TUNDA_BIND_ADDR", "0.0.0.0:3000"),
    )?;
    let log_level = or_default("TUNDA_LOG_LEVEL", "info");
    let regions_path = PathBuf::from(or_default("TUNDA_REGIONS_PATH", "./config/regions.yaml"));
    let landmarks_path =
        PathBuf::from(or_default("TUNDA_LANDMARKS_PATH", "./config/landmarks.yaml"));

    let mut base_url = or_default(
        "TUNDA_GEOCODER_BASE_URL",
        "https://maps.googleapis.com/maps/api/",
    );
    if !base_url.ends_with('/') {
        base_url.push('/');
    }

    let geocoder = GeocoderSettings {
        api_key: optional("TUNDA_GEOCODER_API_KEY"),
        base_url,
        timeout_secs: positive(
            "TUNDA_GEOCODER_TIMEOUT_SECS",
            &or_default("TUNDA_GEOCODER_TIMEOUT_SECS", "10"),
        )?,
        retry_budget_secs: positive(
            "TUNDA_GEOCODER_RETRY_BUDGET_SECS",
            &or_default("TUNDA_GEOCODER_RETRY_BUDGET_SECS", "60"),
        )?,
        max_retries: parse_var(
            "TUNDA_GEOCODER_MAX_RETRIES",
            &or_default("TUNDA_GEOCODER_MAX_RETRIES", "3"),
        )?,
        backoff_base_ms: parse_var(
            "TUNDA_GEOCODER_BACKOFF_BASE_MS",
            &or_default("TUNDA_GEOCODER_BACKOFF_BASE_MS", "500"),
        )?,
        max_per_minute: positive(
            "TUNDA_GEOCODER_MAX_PER_MINUTE",
            &or_default("TUNDA_GEOCODER_MAX_PER_MINUTE", "50"),
        )?,
        max_per_hour: positive(
            "TUNDA_GEOCODER_MAX_PER_HOUR",
            &or_default("TUNDA_GEOCODER_MAX_PER_HOUR", "1000"),
        )?,
    };

    let geocoding_cache_ttl_secs = positive(
        "TUNDA_GEOCODING_CACHE_TTL_SECS",
        &or_default("TUNDA_GEOCODING_CACHE_TTL_SECS", "86400"),
    )?;
    let distance_cache_ttl_secs = positive(
        "TUNDA_DISTANCE_CACHE_TTL_SECS",
        &or_default("TUNDA_DISTANCE_CACHE_TTL_SECS", "3600"),
    )?;
    let cache_max_entries = positive(
        "TUNDA_CACHE_MAX_ENTRIES",
        &or_default("TUNDA_CACHE_MAX_ENTRIES", "100000"),
    )?;
    let request_deadline_ms = positive(
        "TUNDA_REQUEST_DEADLINE_MS",
        &or_default("TUNDA_REQUEST_DEADLINE_MS", "20000"),
    )?;

    let db_max_connections: u32 = parse_var(
        "TUNDA_DB_MAX_CONNECTIONS",
        &or_default("TUNDA_DB_MAX_CONNECTIONS", "10"),
    )?;
    let db_min_connections: u32 = parse_var(
        "TUNDA_DB_MIN_CONNECTIONS",
        &or_default("TUNDA_DB_MIN_CONNECTIONS", "1"),
    )?;
    let db_acquire_timeout_secs: u64 = parse_var(
        "TUNDA_DB_ACQUIRE_TIMEOUT_SECS",
        &or_default("TUNDA_DB_ACQUIRE_TIMEOUT_SECS", "10"),
    )?;

    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "TUNDA_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        regions_path,
        landmarks_path,
        geocoder,
        geocoding_cache_ttl_secs,
        distance_cache_ttl_secs,
        cache_max_entries,
        request_deadline_ms,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
    })
}

fn parse_var<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Like [`parse_var`] but rejects zero.
fn positive<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    let value: T = parse_var(var, raw)?;
    if value == T::default() {
        return Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TUNDA_ENV".to_string(),
            reason: format!("expected development, test or production, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
