//! Seed command handler: regions, then landmarks, then default settings.

use tunda_core::{load_landmarks, load_regions, AppConfig};

/// Which seed steps to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SeedTargets {
    pub regions: bool,
    pub landmarks: bool,
    pub settings: bool,
}

impl SeedTargets {
    /// No flags selects every step.
    pub(crate) fn from_flags(regions: bool, landmarks: bool, settings: bool) -> Self {
        if !regions && !landmarks && !settings {
            return Self {
                regions: true,
                landmarks: true,
                settings: true,
            };
        }
        Self {
            regions,
            landmarks,
            settings,
        }
    }
}

/// Seed the selected tables from the configured YAML files.
///
/// Regions run first because landmarks look their sub-county up by name.
///
/// # Errors
///
/// Returns an error if a seed file fails to load or validate, or if any
/// database write fails. Landmark seeding is all-or-nothing.
pub(crate) async fn run_seed(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    targets: SeedTargets,
) -> anyhow::Result<()> {
    let applied = tunda_db::run_migrations(pool).await?;
    if applied > 0 {
        tracing::info!(applied, "applied pending migrations before seeding");
    }

    if targets.regions {
        let file = load_regions(&config.regions_path)?;
        let count = tunda_db::seed_regions(pool, &file).await?;
        println!(
            "seeded {} counties and {} sub-counties from {}",
            count.counties,
            count.sub_counties,
            config.regions_path.display()
        );
    }

    if targets.landmarks {
        let file = load_landmarks(&config.landmarks_path)?;
        let count = tunda_db::seed_landmarks(pool, &file.landmarks).await?;
        println!(
            "seeded {count} landmarks from {}",
            config.landmarks_path.display()
        );
    }

    if targets.settings {
        let inserted = tunda_db::seed_default_settings(pool).await?;
        println!("inserted {inserted} default delivery settings");
    }

    Ok(())
}
