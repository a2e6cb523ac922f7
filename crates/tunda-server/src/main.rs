mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use sqlx::PgPool;
use tracing_subscriber::EnvFilter;
use tunda_core::{load_regions, AppConfig, Environment, RegionDirectory, KENYA};
use tunda_db::{PgLandmarkSource, PgSettingsStore};
use tunda_delivery::{DeliveryEngine, EngineConfig, LandmarkStore};
use tunda_geocoder::{GeocoderClient, GeocoderConfig};

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(tunda_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = tunda_db::PoolConfig::from_app_config(&config);
    let pool = tunda_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = tunda_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations up to date");

    let engine = Arc::new(build_engine(&config, &pool).await?);
    let _scheduler = scheduler::build_scheduler(Arc::clone(&engine), Some(pool.clone())).await?;

    let auth = AuthState::from_env(matches!(config.env, Environment::Development))?;
    let app = build_app(
        AppState {
            engine,
            pool: Some(pool),
        },
        auth,
        default_rate_limit_state(),
    );

    tracing::info!(bind_addr = %config.bind_addr, "tunda-server listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Wires the engine to Postgres and the geocoder. An empty region table
/// falls back to the seed file so a fresh database can still price orders.
async fn build_engine(config: &AppConfig, pool: &PgPool) -> anyhow::Result<DeliveryEngine> {
    let geocoder = GeocoderClient::connect(&GeocoderConfig::from(&config.geocoder)).await?;

    let mut regions = tunda_db::load_region_directory(pool).await?;
    if regions.is_empty() {
        tracing::warn!(
            path = %config.regions_path.display(),
            "region tables are empty; loading the seed file (run `tunda-cli seed --regions`)"
        );
        let file = load_regions(&config.regions_path)?;
        regions = RegionDirectory::new(file.counties, file.sub_counties);
    }

    let landmarks = LandmarkStore::load(KENYA, &PgLandmarkSource::new(pool.clone())).await;

    Ok(DeliveryEngine::new(
        EngineConfig::from(config),
        KENYA,
        Arc::new(geocoder),
        Arc::new(PgSettingsStore::new(pool.clone())),
        Arc::new(regions),
        Arc::new(landmarks),
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
