//! Database operations for the `counties` and `sub_counties` tables.

use sqlx::PgPool;
use tunda_core::{County, RegionDirectory, SubCounty};

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CountyRow {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubCountyRow {
    pub id: i64,
    pub county_id: i64,
    pub name: String,
    pub code: String,
    pub is_active: bool,
}

impl From<CountyRow> for County {
    fn from(row: CountyRow) -> Self {
        County {
            id: row.id,
            name: row.name,
            code: row.code,
        }
    }
}

impl From<SubCountyRow> for SubCounty {
    fn from(row: SubCountyRow) -> Self {
        SubCounty {
            id: row.id,
            county_id: row.county_id,
            name: row.name,
            code: row.code,
        }
    }
}

/// Returns active counties ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_counties(pool: &PgPool) -> Result<Vec<CountyRow>, DbError> {
    let rows = sqlx::query_as::<_, CountyRow>(
        "SELECT id, name, code, is_active \
         FROM counties \
         WHERE is_active = true \
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns active sub-counties of active counties, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sub_counties(pool: &PgPool) -> Result<Vec<SubCountyRow>, DbError> {
    let rows = sqlx::query_as::<_, SubCountyRow>(
        "SELECT s.id, s.county_id, s.name, s.code, s.is_active \
         FROM sub_counties s \
         JOIN counties c ON c.id = s.county_id \
         WHERE s.is_active = true AND c.is_active = true \
         ORDER BY s.id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Builds the in-memory [`RegionDirectory`] from the active rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn load_region_directory(pool: &PgPool) -> Result<RegionDirectory, DbError> {
    let counties = list_counties(pool).await?;
    let sub_counties = list_sub_counties(pool).await?;
    Ok(RegionDirectory::new(
        counties.into_iter().map(County::from).collect(),
        sub_counties.into_iter().map(SubCounty::from).collect(),
    ))
}
