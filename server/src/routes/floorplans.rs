//! Floorplan and table management routes.
//!
//! Geometry-heavy interaction goes over the websocket; these REST endpoints
//! serve the settings forms (floorplan CRUD, table CRUD, savepoints) and the
//! initial snapshot fetch.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::frame::{Data, Frame, Status, now_ms};
use crate::routes::auth::AuthStaff;
use crate::services::persistence;
use crate::services::plan::{self, PlanPatch, PlanRow};
use crate::services::savepoint::{self, SavepointRow};
use crate::services::staff;
use crate::services::table::{self, NewTable};
use crate::state::{AppState, Table, TableShape};

#[cfg(test)]
#[path = "floorplans_test.rs"]
mod tests;

fn require_edit(auth: &AuthStaff) -> Result<(), StatusCode> {
    staff::ensure_can_edit(&auth.staff).map_err(|_| StatusCode::FORBIDDEN)
}

pub(crate) fn plan_error_to_status(err: plan::PlanError) -> StatusCode {
    match err {
        plan::PlanError::NotFound(_) => StatusCode::NOT_FOUND,
        plan::PlanError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        plan::PlanError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn table_error_to_status(err: table::TableError) -> StatusCode {
    match err {
        table::TableError::NotFound(_) => StatusCode::NOT_FOUND,
        table::TableError::PlanNotLoaded(_) => StatusCode::CONFLICT,
        table::TableError::StaleUpdate { .. } => StatusCode::CONFLICT,
        table::TableError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        table::TableError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// FLOORPLAN CRUD
// =============================================================================

#[derive(Deserialize)]
pub struct CreatePlanBody {
    pub name: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub grid_size: Option<f64>,
}

/// `POST /api/floorplans` — create a new floorplan.
pub async fn create_plan(
    State(state): State<AppState>,
    auth: AuthStaff,
    Json(body): Json<CreatePlanBody>,
) -> Result<(StatusCode, Json<PlanRow>), StatusCode> {
    require_edit(&auth)?;
    let name = body.name.as_deref().unwrap_or("Untitled floorplan");
    let row = plan::create_plan(
        &state.pool,
        name,
        body.width.unwrap_or(1000.0),
        body.height.unwrap_or(700.0),
        body.grid_size.unwrap_or(25.0),
    )
    .await
    .map_err(plan_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/floorplans` — list floorplans.
pub async fn list_plans(
    State(state): State<AppState>,
    _auth: AuthStaff,
) -> Result<Json<Vec<PlanRow>>, StatusCode> {
    let rows = plan::list_plans(&state.pool)
        .await
        .map_err(plan_error_to_status)?;
    Ok(Json(rows))
}

/// `GET /api/floorplans/{id}` — fetch one floorplan.
pub async fn get_plan(
    State(state): State<AppState>,
    _auth: AuthStaff,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<PlanRow>, StatusCode> {
    let row = plan::get_plan(&state.pool, plan_id)
        .await
        .map_err(plan_error_to_status)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(row))
}

/// `PATCH /api/floorplans/{id}` — update metadata and obstacles.
pub async fn update_plan(
    State(state): State<AppState>,
    auth: AuthStaff,
    Path(plan_id): Path<Uuid>,
    Json(patch): Json<PlanPatch>,
) -> Result<Json<PlanRow>, StatusCode> {
    require_edit(&auth)?;
    let row = plan::update_plan(&state.pool, plan_id, patch)
        .await
        .map_err(plan_error_to_status)?;

    broadcast_plan_frame(&state, plan_id, "floorplan:update", plan_to_data(&row)).await;
    Ok(Json(row))
}

/// `DELETE /api/floorplans/{id}` — delete a floorplan.
pub async fn delete_plan(
    State(state): State<AppState>,
    auth: AuthStaff,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_edit(&auth)?;
    plan::delete_plan(&state.pool, plan_id)
        .await
        .map_err(plan_error_to_status)?;

    {
        let mut plans = state.plans.write().await;
        plans.remove(&plan_id);
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

// =============================================================================
// TABLES (REST)
// =============================================================================

/// `GET /api/floorplans/{id}/tables` — list tables, live room first.
pub async fn list_tables(
    State(state): State<AppState>,
    _auth: AuthStaff,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<Vec<Table>>, StatusCode> {
    {
        let plans = state.plans.read().await;
        if let Some(plan_state) = plans.get(&plan_id) {
            let mut tables = plan_state.tables.values().cloned().collect::<Vec<_>>();
            tables.sort_by_key(|table| table.z_index);
            return Ok(Json(tables));
        }
    }

    let tables = plan::load_table_rows(&state.pool, plan_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(tables))
}

/// `POST /api/floorplans/{id}/tables` — create one table.
pub async fn create_table_rest(
    State(state): State<AppState>,
    auth: AuthStaff,
    Path(plan_id): Path<Uuid>,
    Json(body): Json<NewTable>,
) -> Result<(StatusCode, Json<Table>), StatusCode> {
    require_edit(&auth)?;
    plan::get_plan(&state.pool, plan_id)
        .await
        .map_err(plan_error_to_status)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let z_index = next_z_index(&state, plan_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let (width, height, radius) = match (body.shape, body.radius) {
        (TableShape::Round, Some(r)) => (r * 2.0, r * 2.0, Some(r)),
        (TableShape::Round, None) => (body.width, body.height, Some(body.width * 0.5)),
        (TableShape::Rect, _) => (body.width, body.height, None),
    };
    let table = Table {
        id: Uuid::new_v4(),
        floorplan_id: plan_id,
        zone_id: body.zone_id,
        name: body.name,
        min_covers: body.min_covers,
        max_covers: body.max_covers,
        shape: body.shape,
        x: body.x,
        y: body.y,
        width,
        height,
        radius,
        rotation: body.rotation,
        locked: false,
        snap_to_grid: true,
        z_index,
        props: body.props.unwrap_or_else(|| serde_json::json!({})),
        version: 1,
    };

    plan::flush_tables(&state.pool, &[table.clone()])
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    {
        let mut plans = state.plans.write().await;
        if let Some(plan_state) = plans.get_mut(&plan_id) {
            plan_state.tables.insert(table.id, table.clone());
            plan_state.dirty.remove(&table.id);
        }
    }

    broadcast_plan_frame(&state, plan_id, "table:create", table_to_data(&table)).await;
    Ok((StatusCode::CREATED, Json(table)))
}

/// `GET /api/floorplans/{id}/tables/{table_id}` — fetch one table.
pub async fn get_table(
    State(state): State<AppState>,
    _auth: AuthStaff,
    Path((plan_id, table_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Table>, StatusCode> {
    {
        let plans = state.plans.read().await;
        if let Some(plan_state) = plans.get(&plan_id)
            && let Some(table) = plan_state.tables.get(&table_id)
        {
            return Ok(Json(table.clone()));
        }
    }

    let tables = plan::load_table_rows(&state.pool, plan_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    tables
        .into_iter()
        .find(|table| table.id == table_id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// `PATCH /api/floorplans/{id}/tables/{table_id}` — update one table.
///
/// Accepts the same flat field map as the `table:update` syscall so form and
/// canvas edits share one validation path.
pub async fn patch_table(
    State(state): State<AppState>,
    auth: AuthStaff,
    Path((plan_id, table_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<Table>, StatusCode> {
    require_edit(&auth)?;
    let serde_json::Value::Object(map) = body else {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    };
    let updates: Data = map.into_iter().collect();

    // Make sure the room is loaded so the shared LWW path applies.
    let loaded = {
        let plans = state.plans.read().await;
        plans.contains_key(&plan_id)
    };
    if !loaded {
        let tables = plan::hydrate_tables(&state.pool, plan_id)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        let mut plans = state.plans.write().await;
        plans
            .entry(plan_id)
            .or_insert_with(crate::state::PlanState::new)
            .tables = tables;
    }

    let current_version = {
        let plans = state.plans.read().await;
        plans
            .get(&plan_id)
            .and_then(|plan_state| plan_state.tables.get(&table_id))
            .map(|table| table.version)
            .ok_or(StatusCode::NOT_FOUND)?
    };
    let incoming_version = updates
        .get("version")
        .and_then(serde_json::Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(current_version);

    let table = table::update_table(&state, plan_id, table_id, &updates, incoming_version)
        .await
        .map_err(table_error_to_status)?;

    plan::flush_tables(&state.pool, &[table.clone()])
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    {
        let mut plans = state.plans.write().await;
        if let Some(plan_state) = plans.get_mut(&plan_id) {
            plan_state.dirty.remove(&table_id);
        }
    }

    broadcast_plan_frame(&state, plan_id, "table:update", table_to_data(&table)).await;
    Ok(Json(table))
}

/// `DELETE /api/floorplans/{id}/tables/{table_id}` — delete one table.
pub async fn delete_table_rest(
    State(state): State<AppState>,
    auth: AuthStaff,
    Path((plan_id, table_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_edit(&auth)?;

    let result = sqlx::query("DELETE FROM tables WHERE floorplan_id = $1 AND id = $2")
        .bind(plan_id)
        .bind(table_id)
        .execute(&state.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if result.rows_affected() == 0 {
        return Err(StatusCode::NOT_FOUND);
    }
    sqlx::query("DELETE FROM combinations WHERE $1 = ANY(table_ids)")
        .bind(table_id)
        .execute(&state.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    {
        let mut plans = state.plans.write().await;
        if let Some(plan_state) = plans.get_mut(&plan_id) {
            plan_state.tables.remove(&table_id);
            plan_state.dirty.remove(&table_id);
        }
    }

    let mut data = Data::new();
    data.insert("id".into(), serde_json::json!(table_id));
    broadcast_plan_frame(&state, plan_id, "table:delete", data).await;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// =============================================================================
// SAVEPOINTS
// =============================================================================

pub(crate) fn savepoint_error_to_status(err: savepoint::SavepointError) -> StatusCode {
    match err {
        savepoint::SavepointError::PlanNotFound(_) => StatusCode::NOT_FOUND,
        savepoint::SavepointError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Deserialize)]
pub struct CreateSavepointBody {
    pub label: Option<String>,
    pub reason: Option<String>,
}

/// `POST /api/floorplans/{id}/savepoints` — snapshot the current layout.
pub async fn create_savepoint(
    State(state): State<AppState>,
    auth: AuthStaff,
    Path(plan_id): Path<Uuid>,
    Json(body): Json<CreateSavepointBody>,
) -> Result<(StatusCode, Json<SavepointRow>), StatusCode> {
    require_edit(&auth)?;
    let row = savepoint::create_savepoint(
        &state,
        plan_id,
        auth.staff.id,
        body.label.as_deref(),
        false,
        body.reason.as_deref().unwrap_or("manual"),
    )
    .await
    .map_err(savepoint_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/floorplans/{id}/savepoints` — list savepoints, newest first.
pub async fn list_savepoints(
    State(state): State<AppState>,
    _auth: AuthStaff,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<Vec<SavepointRow>>, StatusCode> {
    let rows = savepoint::list_savepoints(&state, plan_id)
        .await
        .map_err(savepoint_error_to_status)?;
    Ok(Json(rows))
}

// =============================================================================
// HELPERS
// =============================================================================

pub(crate) fn table_to_data(table: &Table) -> Data {
    match serde_json::to_value(table) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Data::new(),
    }
}

fn plan_to_data(plan: &PlanRow) -> Data {
    match serde_json::to_value(plan) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Data::new(),
    }
}

async fn broadcast_plan_frame(state: &AppState, plan_id: Uuid, syscall: &str, data: Data) {
    let frame = Frame {
        id: Uuid::new_v4(),
        parent_id: None,
        ts: now_ms(),
        floorplan_id: Some(plan_id),
        from: None,
        syscall: syscall.to_owned(),
        status: Status::Done,
        data,
    };
    persistence::enqueue_frame(state, &frame);
    plan::broadcast(state, plan_id, &frame, None).await;
}

async fn next_z_index(state: &AppState, plan_id: Uuid) -> Result<i32, sqlx::Error> {
    {
        let plans = state.plans.read().await;
        if let Some(plan_state) = plans.get(&plan_id) {
            return Ok(plan_state
                .tables
                .values()
                .map(|table| table.z_index)
                .max()
                .unwrap_or(-1)
                + 1);
        }
    }

    let max_z = sqlx::query_scalar::<_, Option<i32>>("SELECT MAX(z_index) FROM tables WHERE floorplan_id = $1")
        .bind(plan_id)
        .fetch_one(&state.pool)
        .await?;
    Ok(max_z.unwrap_or(-1) + 1)
}
