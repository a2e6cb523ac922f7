use sqlx::PgPool;
use tunda_core::{LandmarkEntry, RegionsFile, DEFAULT_DELIVERY_SETTINGS};

use crate::DbError;

/// Rows written by [`seed_regions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSeedCount {
    pub counties: usize,
    pub sub_counties: usize,
}

/// Upsert counties and sub-counties from the region seed file.
///
/// Ids come from the file so saved addresses keep pointing at the same
/// rows. All upserts run inside a single transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_regions(pool: &PgPool, regions: &RegionsFile) -> Result<RegionSeedCount, DbError> {
    let mut tx = pool.begin().await?;

    for county in &regions.counties {
        sqlx::query(
            "INSERT INTO counties (id, name, code, is_active) \
             VALUES ($1, $2, $3, true) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 code = EXCLUDED.code, \
                 updated_at = NOW()",
        )
        .bind(county.id)
        .bind(&county.name)
        .bind(&county.code)
        .execute(&mut *tx)
        .await?;
    }

    for sub in &regions.sub_counties {
        sqlx::query(
            "INSERT INTO sub_counties (id, county_id, name, code, is_active) \
             VALUES ($1, $2, $3, $4, true) \
             ON CONFLICT (id) DO UPDATE SET \
                 county_id = EXCLUDED.county_id, \
                 name = EXCLUDED.name, \
                 code = EXCLUDED.code, \
                 updated_at = NOW()",
        )
        .bind(sub.id)
        .bind(sub.county_id)
        .bind(&sub.name)
        .bind(&sub.code)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(RegionSeedCount {
        counties: regions.counties.len(),
        sub_counties: regions.sub_counties.len(),
    })
}

/// Upsert landmarks, keyed by name. Each landmark's sub-county is looked
/// up by name, case-insensitively, so regions must be seeded first.
///
/// # Errors
///
/// Returns [`DbError::UnknownSubCounty`] when a landmark names a sub-county
/// that is not in the table; the whole batch is rolled back.
pub async fn seed_landmarks(pool: &PgPool, landmarks: &[LandmarkEntry]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    for landmark in landmarks {
        let sub_county_id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM sub_counties WHERE LOWER(name) = LOWER($1) ORDER BY id LIMIT 1",
        )
        .bind(landmark.sub_county.trim())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(sub_county_id) = sub_county_id else {
            return Err(DbError::UnknownSubCounty {
                landmark: landmark.name.clone(),
                sub_county: landmark.sub_county.clone(),
            });
        };

        sqlx::query(
            "INSERT INTO popular_places \
                 (name, place_type, sub_county_id, alt_names, popularity_score, verified) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (name) DO UPDATE SET \
                 place_type = EXCLUDED.place_type, \
                 sub_county_id = EXCLUDED.sub_county_id, \
                 alt_names = EXCLUDED.alt_names, \
                 popularity_score = EXCLUDED.popularity_score, \
                 verified = EXCLUDED.verified, \
                 updated_at = NOW()",
        )
        .bind(&landmark.name)
        .bind(&landmark.place_type)
        .bind(sub_county_id)
        .bind(&landmark.alt_names)
        .bind(landmark.popularity_score)
        .bind(landmark.verified)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(landmarks.len())
}

/// Insert the shipped delivery settings that are not stored yet. Existing
/// values are never overwritten.
///
/// Returns the number of settings inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_default_settings(pool: &PgPool) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0usize;

    for setting in DEFAULT_DELIVERY_SETTINGS {
        let record = setting.record();
        let result = sqlx::query(
            "INSERT INTO system_settings (key, value, setting_type, description, is_public) \
             VALUES ($1, $2, $3, $4, true) \
             ON CONFLICT (key) DO NOTHING",
        )
        .bind(&record.key)
        .bind(&record.raw_value)
        .bind(record.setting_type.as_str())
        .bind(setting.description)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    tx.commit().await?;
    tracing::info!(inserted, "default delivery settings seeded");
    Ok(inserted)
}
