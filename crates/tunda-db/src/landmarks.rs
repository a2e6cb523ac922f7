//! Database operations for the `popular_places` table.

use async_trait::async_trait;
use sqlx::PgPool;
use tunda_core::LandmarkEntry;
use tunda_delivery::{LandmarkSource, LandmarkSourceError};

use crate::DbError;

/// A verified landmark joined with the name of its sub-county.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LandmarkRow {
    pub id: i64,
    pub name: String,
    pub place_type: Option<String>,
    pub sub_county: String,
    pub alt_names: Vec<String>,
    pub popularity_score: i32,
    pub verified: bool,
}

impl From<LandmarkRow> for LandmarkEntry {
    fn from(row: LandmarkRow) -> Self {
        LandmarkEntry {
            name: row.name,
            place_type: row.place_type,
            sub_county: row.sub_county,
            alt_names: row.alt_names,
            popularity_score: row.popularity_score,
            verified: row.verified,
        }
    }
}

/// Returns verified landmarks, most popular first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_verified_landmarks(pool: &PgPool) -> Result<Vec<LandmarkRow>, DbError> {
    let rows = sqlx::query_as::<_, LandmarkRow>(
        "SELECT p.id, p.name, p.place_type, s.name AS sub_county, p.alt_names, \
                p.popularity_score, p.verified \
         FROM popular_places p \
         JOIN sub_counties s ON s.id = p.sub_county_id \
         WHERE p.verified = true \
         ORDER BY p.popularity_score DESC, p.id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// [`LandmarkSource`] reading `popular_places`.
#[derive(Debug, Clone)]
pub struct PgLandmarkSource {
    pool: PgPool,
}

impl PgLandmarkSource {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LandmarkSource for PgLandmarkSource {
    async fn load_landmarks(&self) -> Result<Vec<LandmarkEntry>, LandmarkSourceError> {
        let rows = list_verified_landmarks(&self.pool)
            .await
            .map_err(|e| LandmarkSourceError(e.to_string()))?;
        Ok(rows.into_iter().map(LandmarkEntry::from).collect())
    }
}
