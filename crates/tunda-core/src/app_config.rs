use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Outbound geocoder settings.
#[derive(Clone)]
pub struct GeocoderSettings {
    /// `None` disables the geocoder; every lookup degrades to the fallbacks.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry_budget_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub max_per_minute: usize,
    pub max_per_hour: usize,
}

impl std::fmt::Debug for GeocoderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocoderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry_budget_secs", &self.retry_budget_secs)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("max_per_minute", &self.max_per_minute)
            .field("max_per_hour", &self.max_per_hour)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub regions_path: PathBuf,
    pub landmarks_path: PathBuf,
    pub geocoder: GeocoderSettings,
    pub geocoding_cache_ttl_secs: u64,
    pub distance_cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub request_deadline_ms: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("regions_path", &self.regions_path)
            .field("landmarks_path", &self.landmarks_path)
            .field("database_url", &"[redacted]")
            .field("geocoder", &self.geocoder)
            .field("geocoding_cache_ttl_secs", &self.geocoding_cache_ttl_secs)
            .field("distance_cache_ttl_secs", &self.distance_cache_ttl_secs)
            .field("cache_max_entries", &self.cache_max_entries)
            .field("request_deadline_ms", &self.request_deadline_ms)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
