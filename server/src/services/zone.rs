//! Zone service — CRUD over seating zones.
//!
//! DESIGN
//! ======
//! Zones are plain Postgres rows; they carry no live room state. Deleting a
//! zone relies on the schema to detach its tables (`ON DELETE SET NULL`) and
//! additionally scrubs the zone from the settings priority list so the
//! allocation order never references a ghost zone.

use sqlx::PgPool;
use uuid::Uuid;

#[cfg(test)]
#[path = "zone_test.rs"]
mod tests;

#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    #[error("zone not found: {0}")]
    NotFound(Uuid),
    #[error("invalid zone data: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for ZoneError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_ZONE_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// Row returned from zone queries.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ZoneRow {
    pub id: Uuid,
    pub name: String,
    pub priority: i32,
    pub is_active: bool,
    pub is_emergency: bool,
    pub version: i32,
}

/// Sparse update for a zone.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ZonePatch {
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
    pub is_emergency: Option<bool>,
}

type ZoneTuple = (Uuid, String, i32, bool, bool, i32);

fn row_to_zone(row: ZoneTuple) -> ZoneRow {
    let (id, name, priority, is_active, is_emergency, version) = row;
    ZoneRow { id, name, priority, is_active, is_emergency, version }
}

fn validate_name(name: &str) -> Result<(), ZoneError> {
    if name.trim().is_empty() {
        return Err(ZoneError::Validation("zone name must not be empty".into()));
    }
    Ok(())
}

/// Create a new zone.
///
/// # Errors
///
/// Returns `Validation` for empty names, otherwise database errors.
pub async fn create_zone(
    pool: &PgPool,
    name: &str,
    priority: i32,
    is_emergency: bool,
) -> Result<ZoneRow, ZoneError> {
    validate_name(name)?;

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO zones (id, name, priority, is_emergency) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(name)
        .bind(priority)
        .bind(is_emergency)
        .execute(pool)
        .await?;

    Ok(ZoneRow { id, name: name.to_string(), priority, is_active: true, is_emergency, version: 1 })
}

/// List all zones ordered by priority.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_zones(pool: &PgPool) -> Result<Vec<ZoneRow>, ZoneError> {
    let rows = sqlx::query_as::<_, ZoneTuple>(
        "SELECT id, name, priority, is_active, is_emergency, version
         FROM zones
         ORDER BY priority ASC, name ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_zone).collect())
}

/// Fetch one zone.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn get_zone(pool: &PgPool, zone_id: Uuid) -> Result<Option<ZoneRow>, ZoneError> {
    let row = sqlx::query_as::<_, ZoneTuple>(
        "SELECT id, name, priority, is_active, is_emergency, version FROM zones WHERE id = $1",
    )
    .bind(zone_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_zone))
}

/// Apply a sparse patch and bump the version.
///
/// # Errors
///
/// Returns `NotFound` for unknown zones and `Validation` for empty names.
pub async fn update_zone(pool: &PgPool, zone_id: Uuid, patch: ZonePatch) -> Result<ZoneRow, ZoneError> {
    let mut zone = get_zone(pool, zone_id)
        .await?
        .ok_or(ZoneError::NotFound(zone_id))?;

    if let Some(name) = patch.name {
        zone.name = name;
    }
    if let Some(priority) = patch.priority {
        zone.priority = priority;
    }
    if let Some(is_active) = patch.is_active {
        zone.is_active = is_active;
    }
    if let Some(is_emergency) = patch.is_emergency {
        zone.is_emergency = is_emergency;
    }
    validate_name(&zone.name)?;
    zone.version += 1;

    sqlx::query(
        "UPDATE zones
         SET name = $2, priority = $3, is_active = $4, is_emergency = $5, version = $6, updated_at = now()
         WHERE id = $1",
    )
    .bind(zone_id)
    .bind(&zone.name)
    .bind(zone.priority)
    .bind(zone.is_active)
    .bind(zone.is_emergency)
    .bind(zone.version)
    .execute(pool)
    .await?;

    Ok(zone)
}

/// Delete a zone. Tables detach via the schema; the settings priority list is
/// scrubbed here.
///
/// # Errors
///
/// Returns `NotFound` if nothing was deleted.
pub async fn delete_zone(pool: &PgPool, zone_id: Uuid) -> Result<(), ZoneError> {
    let result = sqlx::query("DELETE FROM zones WHERE id = $1")
        .bind(zone_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ZoneError::NotFound(zone_id));
    }

    sqlx::query(
        "UPDATE seating_settings
         SET zone_priority = array_remove(zone_priority, $1), updated_at = now()",
    )
    .bind(zone_id)
    .execute(pool)
    .await?;

    Ok(())
}
