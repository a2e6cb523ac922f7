//! Background job scheduler.
//!
//! Registers the engine's maintenance jobs: an hourly landmark refresh from
//! the database and a ten-minute purge of expired cache entries.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tunda_db::PgLandmarkSource;
use tunda_delivery::DeliveryEngine;

const LANDMARK_REFRESH_SCHEDULE: &str = "0 0 * * * *";
const CACHE_PURGE_SCHEDULE: &str = "0 */10 * * * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
/// Without a pool the landmark refresh is not registered.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    engine: Arc<DeliveryEngine>,
    pool: Option<PgPool>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    if let Some(pool) = pool {
        register_landmark_refresh_job(&scheduler, Arc::clone(&engine), pool).await?;
    }
    register_cache_purge_job(&scheduler, engine).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Reloads verified landmarks at the top of every hour. A failed or empty
/// load keeps the previous snapshot.
async fn register_landmark_refresh_job(
    scheduler: &JobScheduler,
    engine: Arc<DeliveryEngine>,
    pool: PgPool,
) -> Result<(), JobSchedulerError> {
    let source = Arc::new(PgLandmarkSource::new(pool));

    let job = Job::new_async(LANDMARK_REFRESH_SCHEDULE, move |_uuid, _lock| {
        let engine = Arc::clone(&engine);
        let source = Arc::clone(&source);

        Box::pin(async move {
            let names = engine.refresh_landmarks(source.as_ref()).await;
            tracing::info!(names, "scheduler: landmark refresh complete");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn register_cache_purge_job(
    scheduler: &JobScheduler,
    engine: Arc<DeliveryEngine>,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(CACHE_PURGE_SCHEDULE, move |_uuid, _lock| {
        let engine = Arc::clone(&engine);

        Box::pin(async move {
            let purged = engine.purge_expired();
            tracing::debug!(purged, "scheduler: expired cache entries purged");
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
