//! Table service — create, update, delete with LWW versioning.
//!
//! DESIGN
//! ======
//! Table mutations update in-memory room state immediately, mark the table
//! as dirty for debounced persistence, and return the updated table for
//! broadcast. LWW conflict resolution: incoming version must be >= current
//! version, otherwise the update is rejected as stale.

use uuid::Uuid;

use crate::frame::Data;
use crate::state::{AppState, Table, TableShape};

#[cfg(test)]
#[path = "table_test.rs"]
mod tests;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("table not found: {0}")]
    NotFound(Uuid),
    #[error("floorplan not loaded: {0}")]
    PlanNotLoaded(Uuid),
    #[error("stale update: incoming version {incoming} < current {current}")]
    StaleUpdate { incoming: i32, current: i32 },
    #[error("invalid table data: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for TableError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_TABLE_NOT_FOUND",
            Self::PlanNotLoaded(_) => "E_PLAN_NOT_LOADED",
            Self::StaleUpdate { .. } => "E_STALE_UPDATE",
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// Fields accepted when creating a table.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewTable {
    pub name: String,
    pub zone_id: Option<Uuid>,
    #[serde(default = "default_min_covers")]
    pub min_covers: i32,
    #[serde(default = "default_max_covers")]
    pub max_covers: i32,
    #[serde(default = "default_shape")]
    pub shape: TableShape,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    pub radius: Option<f64>,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub props: Option<serde_json::Value>,
}

fn default_min_covers() -> i32 {
    1
}
fn default_max_covers() -> i32 {
    4
}
fn default_shape() -> TableShape {
    TableShape::Rect
}
fn default_width() -> f64 {
    100.0
}
fn default_height() -> f64 {
    80.0
}

fn validate_geometry(x: f64, y: f64, width: f64, height: f64, radius: Option<f64>, rotation: f64) -> Result<(), TableError> {
    let finite = x.is_finite()
        && y.is_finite()
        && width.is_finite()
        && height.is_finite()
        && rotation.is_finite()
        && radius.is_none_or(f64::is_finite);
    if !finite {
        return Err(TableError::Validation("geometry must be finite".into()));
    }
    if width <= 0.0 || height <= 0.0 || radius.is_some_and(|r| r <= 0.0) {
        return Err(TableError::Validation("table size must be positive".into()));
    }
    Ok(())
}

fn validate_covers(min_covers: i32, max_covers: i32) -> Result<(), TableError> {
    if min_covers < 1 || max_covers < min_covers {
        return Err(TableError::Validation(format!(
            "cover bounds {min_covers}..{max_covers} must satisfy 1 <= min <= max"
        )));
    }
    Ok(())
}

// =============================================================================
// CREATE
// =============================================================================

/// Create a new table on a floorplan.
///
/// # Errors
///
/// Returns `PlanNotLoaded` if the room isn't in memory and `Validation` for
/// bad geometry or cover bounds.
pub async fn create_table(state: &AppState, plan_id: Uuid, new: NewTable) -> Result<Table, TableError> {
    validate_geometry(new.x, new.y, new.width, new.height, new.radius, new.rotation)?;
    validate_covers(new.min_covers, new.max_covers)?;

    let mut plans = state.plans.write().await;
    let plan = plans
        .get_mut(&plan_id)
        .ok_or(TableError::PlanNotLoaded(plan_id))?;

    let z_index = plan
        .tables
        .values()
        .map(|t| t.z_index)
        .max()
        .unwrap_or(-1)
        + 1;

    // Round tables keep their bounding box tracking the radius.
    let (width, height, radius) = match (new.shape, new.radius) {
        (TableShape::Round, Some(r)) => (r * 2.0, r * 2.0, Some(r)),
        (TableShape::Round, None) => (new.width, new.height, Some(new.width * 0.5)),
        (TableShape::Rect, _) => (new.width, new.height, None),
    };

    let table = Table {
        id: Uuid::new_v4(),
        floorplan_id: plan_id,
        zone_id: new.zone_id,
        name: new.name,
        min_covers: new.min_covers,
        max_covers: new.max_covers,
        shape: new.shape,
        x: new.x,
        y: new.y,
        width,
        height,
        radius,
        rotation: new.rotation,
        locked: false,
        snap_to_grid: true,
        z_index,
        props: new.props.unwrap_or_else(|| serde_json::json!({})),
        version: 1,
    };

    let result = table.clone();
    plan.dirty.insert(table.id);
    plan.tables.insert(table.id, table);

    Ok(result)
}

// =============================================================================
// UPDATE
// =============================================================================

/// Update an existing table with LWW conflict resolution.
///
/// # Errors
///
/// Returns `StaleUpdate` if `incoming_version < current.version`.
pub async fn update_table(
    state: &AppState,
    plan_id: Uuid,
    table_id: Uuid,
    updates: &Data,
    incoming_version: i32,
) -> Result<Table, TableError> {
    let mut plans = state.plans.write().await;
    let plan = plans
        .get_mut(&plan_id)
        .ok_or(TableError::PlanNotLoaded(plan_id))?;
    let table = plan
        .tables
        .get_mut(&table_id)
        .ok_or(TableError::NotFound(table_id))?;

    // LWW: reject stale updates.
    if incoming_version < table.version {
        return Err(TableError::StaleUpdate { incoming: incoming_version, current: table.version });
    }

    let mut candidate = table.clone();

    // Apply updates from data map.
    if let Some(x) = updates.get("x").and_then(serde_json::Value::as_f64) {
        candidate.x = x;
    }
    if let Some(y) = updates.get("y").and_then(serde_json::Value::as_f64) {
        candidate.y = y;
    }
    if let Some(w) = updates.get("width").and_then(serde_json::Value::as_f64) {
        candidate.width = w;
    }
    if let Some(h) = updates.get("height").and_then(serde_json::Value::as_f64) {
        candidate.height = h;
    }
    if let Some(r) = updates.get("radius").and_then(serde_json::Value::as_f64) {
        candidate.radius = Some(r);
        if candidate.shape == TableShape::Round {
            candidate.width = r * 2.0;
            candidate.height = r * 2.0;
        }
    }
    if let Some(rot) = updates.get("rotation").and_then(serde_json::Value::as_f64) {
        candidate.rotation = rot;
    }
    if let Some(name) = updates.get("name").and_then(|v| v.as_str()) {
        candidate.name = name.to_string();
    }
    if let Some(zone) = updates.get("zone_id") {
        candidate.zone_id = zone.as_str().and_then(|s| s.parse().ok());
    }
    if let Some(min) = updates.get("min_covers").and_then(serde_json::Value::as_i64) {
        candidate.min_covers = i32::try_from(min).unwrap_or(candidate.min_covers);
    }
    if let Some(max) = updates.get("max_covers").and_then(serde_json::Value::as_i64) {
        candidate.max_covers = i32::try_from(max).unwrap_or(candidate.max_covers);
    }
    if let Some(locked) = updates.get("locked").and_then(serde_json::Value::as_bool) {
        candidate.locked = locked;
    }
    if let Some(snap) = updates.get("snap_to_grid").and_then(serde_json::Value::as_bool) {
        candidate.snap_to_grid = snap;
    }
    if let Some(z) = updates.get("z_index").and_then(serde_json::Value::as_i64) {
        candidate.z_index = i32::try_from(z).unwrap_or(candidate.z_index);
    }
    if let Some(p) = updates.get("props") {
        candidate.props = p.clone();
    }

    validate_geometry(candidate.x, candidate.y, candidate.width, candidate.height, candidate.radius, candidate.rotation)?;
    validate_covers(candidate.min_covers, candidate.max_covers)?;

    candidate.version = table.version + 1;
    *table = candidate;
    plan.dirty.insert(table_id);

    Ok(table.clone())
}

// =============================================================================
// DELETE
// =============================================================================

/// Delete a table from a floorplan. Removes from memory and Postgres
/// immediately, along with any combinations that referenced it.
///
/// # Errors
///
/// Returns `NotFound` if the table doesn't exist.
pub async fn delete_table(state: &AppState, plan_id: Uuid, table_id: Uuid) -> Result<(), TableError> {
    {
        let mut plans = state.plans.write().await;
        let plan = plans
            .get_mut(&plan_id)
            .ok_or(TableError::PlanNotLoaded(plan_id))?;

        if plan.tables.remove(&table_id).is_none() {
            return Err(TableError::NotFound(table_id));
        }
        plan.dirty.remove(&table_id);
    }

    // Delete from Postgres immediately (not deferred). Combinations holding
    // the table stop making sense without it.
    sqlx::query("DELETE FROM combinations WHERE $1 = ANY(table_ids)")
        .bind(table_id)
        .execute(&state.pool)
        .await?;
    sqlx::query("DELETE FROM tables WHERE id = $1")
        .bind(table_id)
        .execute(&state.pool)
        .await?;

    Ok(())
}
