//! Engine wiring for the pricing commands.
//!
//! Online, regions, landmarks and settings come from Postgres. Offline,
//! they come from the YAML seed files and the shipped defaults; the
//! geocoder is used either way when an API key is configured.

use std::sync::Arc;

use sqlx::PgPool;
use tunda_core::{
    load_landmarks, load_regions, AppConfig, InMemorySettings, RegionDirectory, SettingsStore,
    KENYA,
};
use tunda_db::{PgLandmarkSource, PgSettingsStore};
use tunda_delivery::{DeliveryEngine, EngineConfig, LandmarkStore, StaticLandmarks};
use tunda_geocoder::{GeocoderClient, GeocoderConfig};

pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let pool_config = tunda_db::PoolConfig::from_app_config(config);
    let pool = tunda_db::connect_pool(&config.database_url, pool_config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to the database: {e}"))?;
    Ok(pool)
}

fn seed_regions(config: &AppConfig) -> anyhow::Result<RegionDirectory> {
    let file = load_regions(&config.regions_path)?;
    Ok(RegionDirectory::new(file.counties, file.sub_counties))
}

pub(crate) async fn build_engine(
    config: &AppConfig,
    offline: bool,
) -> anyhow::Result<DeliveryEngine> {
    let geocoder = GeocoderClient::connect(&GeocoderConfig::from(&config.geocoder))
        .await
        .map_err(|e| anyhow::anyhow!("failed to build geocoder client: {e}"))?;

    let (regions, settings, landmarks): (RegionDirectory, Arc<dyn SettingsStore>, LandmarkStore) =
        if offline {
            let file = load_landmarks(&config.landmarks_path)?;
            let landmarks = LandmarkStore::load(KENYA, &StaticLandmarks(file.landmarks)).await;
            let settings: Arc<dyn SettingsStore> = Arc::new(InMemorySettings::with_defaults());
            (seed_regions(config)?, settings, landmarks)
        } else {
            let pool = connect(config).await?;
            let mut regions = tunda_db::load_region_directory(&pool).await?;
            if regions.is_empty() {
                tracing::warn!(
                    path = %config.regions_path.display(),
                    "region tables are empty; using the seed file"
                );
                regions = seed_regions(config)?;
            }
            let landmarks = LandmarkStore::load(KENYA, &PgLandmarkSource::new(pool.clone())).await;
            let settings: Arc<dyn SettingsStore> = Arc::new(PgSettingsStore::new(pool));
            (regions, settings, landmarks)
        };

    Ok(DeliveryEngine::new(
        EngineConfig::from(config),
        KENYA,
        Arc::new(geocoder),
        settings,
        Arc::new(regions),
        Arc::new(landmarks),
    ))
}
