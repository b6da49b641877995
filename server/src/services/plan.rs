//! Floorplan service — CRUD, join/part, and room hydration.
//!
//! DESIGN
//! ======
//! Floorplans are created and listed via REST; geometry mutations arrive over
//! WS frames. Room state is hydrated from Postgres on first join and kept in
//! memory while any editor client is connected.
//!
//! ERROR HANDLING
//! ==============
//! On last-client part, dirty tables are flushed before eviction. If that
//! flush fails, the room is intentionally kept in memory with dirty flags
//! intact so the persistence worker can retry instead of losing edits.

use std::collections::HashMap;

use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::frame::Frame;
use crate::state::{AppState, Obstacle, PlanState, Table};

#[cfg(test)]
#[path = "plan_test.rs"]
mod tests;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("floorplan not found: {0}")]
    NotFound(Uuid),
    #[error("invalid floorplan data: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for PlanError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PLAN_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// Row returned from floorplan queries.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlanRow {
    pub id: Uuid,
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub grid_size: f64,
    pub background_image_url: Option<String>,
    pub obstacles: Vec<Obstacle>,
    pub version: i32,
}

/// Sparse metadata update for a floorplan.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PlanPatch {
    pub name: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub grid_size: Option<f64>,
    pub background_image_url: Option<Option<String>>,
    pub obstacles: Option<Vec<Obstacle>>,
}

type PlanTuple = (Uuid, String, f64, f64, f64, Option<String>, serde_json::Value, i32);

fn row_to_plan(row: PlanTuple) -> PlanRow {
    let (id, name, width, height, grid_size, background_image_url, obstacles, version) = row;
    let obstacles: Vec<Obstacle> = serde_json::from_value(obstacles).unwrap_or_default();
    PlanRow { id, name, width, height, grid_size, background_image_url, obstacles, version }
}

fn validate_dimensions(width: f64, height: f64, grid_size: f64) -> Result<(), PlanError> {
    if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
        return Err(PlanError::Validation(format!("canvas size {width}x{height} must be positive")));
    }
    if !grid_size.is_finite() || grid_size < 0.0 {
        return Err(PlanError::Validation(format!("grid size {grid_size} must be non-negative")));
    }
    Ok(())
}

fn validate_obstacles(obstacles: &[Obstacle]) -> Result<(), PlanError> {
    for obstacle in obstacles {
        let finite = obstacle.x.is_finite()
            && obstacle.y.is_finite()
            && obstacle.width.is_finite()
            && obstacle.height.is_finite()
            && obstacle.rotation.is_finite();
        if !finite || obstacle.width < 0.0 || obstacle.height < 0.0 {
            return Err(PlanError::Validation(format!("obstacle '{}' has invalid geometry", obstacle.name)));
        }
    }
    Ok(())
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a new floorplan.
///
/// # Errors
///
/// Returns `Validation` for non-positive dimensions, otherwise database errors.
pub async fn create_plan(
    pool: &PgPool,
    name: &str,
    width: f64,
    height: f64,
    grid_size: f64,
) -> Result<PlanRow, PlanError> {
    validate_dimensions(width, height, grid_size)?;

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO floorplans (id, name, width, height, grid_size) VALUES ($1, $2, $3, $4, $5)")
        .bind(id)
        .bind(name)
        .bind(width)
        .bind(height)
        .bind(grid_size)
        .execute(pool)
        .await?;

    Ok(PlanRow {
        id,
        name: name.to_string(),
        width,
        height,
        grid_size,
        background_image_url: None,
        obstacles: Vec::new(),
        version: 1,
    })
}

/// List all floorplans.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_plans(pool: &PgPool) -> Result<Vec<PlanRow>, PlanError> {
    let rows = sqlx::query_as::<_, PlanTuple>(
        "SELECT id, name, width, height, grid_size, background_image_url, obstacles, version
         FROM floorplans
         ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_plan).collect())
}

/// Fetch one floorplan.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn get_plan(pool: &PgPool, plan_id: Uuid) -> Result<Option<PlanRow>, PlanError> {
    let row = sqlx::query_as::<_, PlanTuple>(
        "SELECT id, name, width, height, grid_size, background_image_url, obstacles, version
         FROM floorplans WHERE id = $1",
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_plan))
}

/// Apply a sparse metadata patch and bump the version.
///
/// # Errors
///
/// Returns `NotFound` for unknown plans and `Validation` for bad geometry.
pub async fn update_plan(pool: &PgPool, plan_id: Uuid, patch: PlanPatch) -> Result<PlanRow, PlanError> {
    let mut plan = get_plan(pool, plan_id)
        .await?
        .ok_or(PlanError::NotFound(plan_id))?;

    if let Some(name) = patch.name {
        plan.name = name;
    }
    if let Some(width) = patch.width {
        plan.width = width;
    }
    if let Some(height) = patch.height {
        plan.height = height;
    }
    if let Some(grid_size) = patch.grid_size {
        plan.grid_size = grid_size;
    }
    if let Some(background_image_url) = patch.background_image_url {
        plan.background_image_url = background_image_url;
    }
    if let Some(obstacles) = patch.obstacles {
        plan.obstacles = obstacles;
    }
    validate_dimensions(plan.width, plan.height, plan.grid_size)?;
    validate_obstacles(&plan.obstacles)?;
    plan.version += 1;

    let obstacles = serde_json::to_value(&plan.obstacles).unwrap_or_else(|_| serde_json::json!([]));
    sqlx::query(
        "UPDATE floorplans
         SET name = $2, width = $3, height = $4, grid_size = $5,
             background_image_url = $6, obstacles = $7, version = $8, updated_at = now()
         WHERE id = $1",
    )
    .bind(plan_id)
    .bind(&plan.name)
    .bind(plan.width)
    .bind(plan.height)
    .bind(plan.grid_size)
    .bind(&plan.background_image_url)
    .bind(&obstacles)
    .bind(plan.version)
    .execute(pool)
    .await?;

    Ok(plan)
}

/// Delete a floorplan. Tables and savepoints cascade in the schema.
///
/// # Errors
///
/// Returns `NotFound` if nothing was deleted.
pub async fn delete_plan(pool: &PgPool, plan_id: Uuid) -> Result<(), PlanError> {
    let result = sqlx::query("DELETE FROM floorplans WHERE id = $1")
        .bind(plan_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(PlanError::NotFound(plan_id));
    }
    Ok(())
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Join a floorplan room. Hydrates from Postgres if not already in memory.
/// Returns the plan metadata and the current list of tables.
///
/// # Errors
///
/// Returns `NotFound` for unknown plans, otherwise database errors.
pub async fn join_plan(
    state: &AppState,
    plan_id: Uuid,
    client_id: Uuid,
    tx: mpsc::Sender<Frame>,
) -> Result<(PlanRow, Vec<Table>), PlanError> {
    let plan = get_plan(&state.pool, plan_id)
        .await?
        .ok_or(PlanError::NotFound(plan_id))?;

    // Fetch table snapshot outside locks; we'll apply it only if needed.
    let hydration_snapshot = hydrate_tables(&state.pool, plan_id).await?;

    let mut plans = state.plans.write().await;
    let plan_state = plans.entry(plan_id).or_insert_with(PlanState::new);

    // Hydrate from Postgres if this is the first live client for this plan.
    if plan_state.clients.is_empty() {
        plan_state.tables = hydration_snapshot;
        info!(%plan_id, count = plan_state.tables.len(), "hydrated floorplan from database");
    }

    plan_state.clients.insert(client_id, tx);
    let mut tables: Vec<Table> = plan_state.tables.values().cloned().collect();
    tables.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));

    info!(%plan_id, %client_id, clients = plan_state.clients.len(), "client joined floorplan");
    Ok((plan, tables))
}

/// Leave a floorplan room. Removes the client sender. If last client, flushes
/// dirty tables and evicts the room state from memory.
pub async fn part_plan(state: &AppState, plan_id: Uuid, client_id: Uuid) {
    let mut plans = state.plans.write().await;
    let Some(plan_state) = plans.get_mut(&plan_id) else {
        return;
    };

    plan_state.clients.remove(&client_id);
    info!(%plan_id, %client_id, remaining = plan_state.clients.len(), "client left floorplan");

    if plan_state.clients.is_empty() {
        // PHASE: HANDLE CLEAN EVICTION FAST PATH
        // WHY: avoid unnecessary I/O when the room has no pending mutations.
        if plan_state.dirty.is_empty() {
            plans.remove(&plan_id);
            info!(%plan_id, "evicted floorplan from memory");
        } else {
            // PHASE: SNAPSHOT DIRTY TABLES FOR FINAL FLUSH
            // WHY: perform DB I/O outside the lock and keep dirty flags until
            // the write has actually succeeded.
            let dirty_tables = plan_state
                .dirty
                .iter()
                .filter_map(|id| plan_state.tables.get(id).cloned())
                .collect::<Vec<_>>();
            let dirty_versions = dirty_tables
                .iter()
                .map(|table| (table.id, table.version))
                .collect::<Vec<_>>();

            // Release lock before writing to Postgres.
            drop(plans);
            let flush_result = flush_tables(&state.pool, &dirty_tables).await;

            // PHASE: ACK OR RETAIN DIRTY FLAGS
            // WHY: clear dirties only when persisted. On error, retain state.
            let mut plans = state.plans.write().await;
            let Some(ps) = plans.get_mut(&plan_id) else {
                return;
            };
            if !ps.clients.is_empty() {
                return;
            }

            match flush_result {
                Ok(()) => {
                    clear_flushed_dirty_ids(ps, &dirty_versions);
                    if ps.dirty.is_empty() {
                        plans.remove(&plan_id);
                        info!(%plan_id, "evicted floorplan from memory");
                    } else {
                        tracing::warn!(
                            %plan_id,
                            remaining_dirty = ps.dirty.len(),
                            "retaining floorplan after final flush because newer dirty tables exist"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, %plan_id, "final flush failed; floorplan retained for retry");
                }
            }
        }
    }
}

pub(crate) fn clear_flushed_dirty_ids(plan_state: &mut PlanState, flushed_versions: &[(Uuid, i32)]) {
    for (table_id, flushed_version) in flushed_versions {
        // EDGE: keep dirty flag if the table was updated again after snapshot.
        let can_clear = match plan_state.tables.get(table_id) {
            Some(current) => current.version == *flushed_version,
            None => true,
        };
        if can_clear {
            plan_state.dirty.remove(table_id);
        }
    }
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Broadcast a frame to all clients in a floorplan room, optionally excluding one.
pub async fn broadcast(state: &AppState, plan_id: Uuid, frame: &Frame, exclude: Option<Uuid>) {
    let plans = state.plans.read().await;
    let Some(plan_state) = plans.get(&plan_id) else {
        return;
    };

    for (client_id, tx) in &plan_state.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        let _ = tx.try_send(frame.clone());
    }
}

// =============================================================================
// HELPERS
// =============================================================================

pub(crate) async fn hydrate_tables(pool: &PgPool, plan_id: Uuid) -> Result<HashMap<Uuid, Table>, sqlx::Error> {
    let rows = load_table_rows(pool, plan_id).await?;
    let mut tables = HashMap::new();
    for table in rows {
        tables.insert(table.id, table);
    }
    Ok(tables)
}

#[derive(sqlx::FromRow)]
struct TableTuple {
    id: Uuid,
    floorplan_id: Uuid,
    zone_id: Option<Uuid>,
    name: String,
    min_covers: i32,
    max_covers: i32,
    shape: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    radius: Option<f64>,
    rotation: f64,
    locked: bool,
    snap_to_grid: bool,
    z_index: i32,
    props: serde_json::Value,
    version: i32,
}

fn row_to_table(row: TableTuple) -> Table {
    let TableTuple {
        id,
        floorplan_id,
        zone_id,
        name,
        min_covers,
        max_covers,
        shape,
        x,
        y,
        width,
        height,
        radius,
        rotation,
        locked,
        snap_to_grid,
        z_index,
        props,
        version,
    } = row;
    let shape = serde_json::from_value(serde_json::Value::String(shape))
        .unwrap_or(crate::state::TableShape::Rect);
    Table {
        id,
        floorplan_id,
        zone_id,
        name,
        min_covers,
        max_covers,
        shape,
        x,
        y,
        width,
        height,
        radius,
        rotation,
        locked,
        snap_to_grid,
        z_index,
        props,
        version,
    }
}

pub(crate) async fn load_table_rows(pool: &PgPool, plan_id: Uuid) -> Result<Vec<Table>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TableTuple>(
        "SELECT id, floorplan_id, zone_id, name, min_covers, max_covers, shape, x, y, width, height, \
                radius, rotation, locked, snap_to_grid, z_index, props, version \
         FROM tables WHERE floorplan_id = $1 ORDER BY z_index ASC, id ASC",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_table).collect())
}

/// Batch upsert tables to Postgres.
///
/// # Errors
///
/// Returns a database error if any upsert fails.
pub async fn flush_tables(pool: &PgPool, tables: &[Table]) -> Result<(), sqlx::Error> {
    for table in tables {
        let shape = match table.shape {
            crate::state::TableShape::Rect => "rect",
            crate::state::TableShape::Round => "round",
        };
        sqlx::query(
            "INSERT INTO tables (id, floorplan_id, zone_id, name, min_covers, max_covers, shape, x, y, \
                                 width, height, radius, rotation, locked, snap_to_grid, z_index, props, version, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, now()) \
             ON CONFLICT (id) DO UPDATE SET \
                 zone_id = EXCLUDED.zone_id, name = EXCLUDED.name, \
                 min_covers = EXCLUDED.min_covers, max_covers = EXCLUDED.max_covers, \
                 shape = EXCLUDED.shape, x = EXCLUDED.x, y = EXCLUDED.y, \
                 width = EXCLUDED.width, height = EXCLUDED.height, radius = EXCLUDED.radius, \
                 rotation = EXCLUDED.rotation, locked = EXCLUDED.locked, \
                 snap_to_grid = EXCLUDED.snap_to_grid, z_index = EXCLUDED.z_index, \
                 props = EXCLUDED.props, version = EXCLUDED.version, updated_at = now()",
        )
        .bind(table.id)
        .bind(table.floorplan_id)
        .bind(table.zone_id)
        .bind(&table.name)
        .bind(table.min_covers)
        .bind(table.max_covers)
        .bind(shape)
        .bind(table.x)
        .bind(table.y)
        .bind(table.width)
        .bind(table.height)
        .bind(table.radius)
        .bind(table.rotation)
        .bind(table.locked)
        .bind(table.snap_to_grid)
        .bind(table.z_index)
        .bind(&table.props)
        .bind(table.version)
        .execute(pool)
        .await?;
    }
    Ok(())
}
