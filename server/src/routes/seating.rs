//! Seating configuration routes: zones, combinations, settings, and the
//! allocation-debug event endpoint.
//!
//! Mutations require the manager role; hosts get read-only access.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::frame::Data;
use crate::routes::auth::AuthStaff;
use crate::services::combination::{self, CombinationPatch, CombinationRow, NewCombination};
use crate::services::settings::{self, SeatingSettings, SettingsPatch};
use crate::services::staff;
use crate::services::zone::{self, ZonePatch, ZoneRow};
use crate::services::debug;
use crate::state::AppState;

#[cfg(test)]
#[path = "seating_test.rs"]
mod tests;

fn require_edit(auth: &AuthStaff) -> Result<(), StatusCode> {
    staff::ensure_can_edit(&auth.staff).map_err(|_| StatusCode::FORBIDDEN)
}

// =============================================================================
// ZONES
// =============================================================================

pub(crate) fn zone_error_to_status(err: zone::ZoneError) -> StatusCode {
    match err {
        zone::ZoneError::NotFound(_) => StatusCode::NOT_FOUND,
        zone::ZoneError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        zone::ZoneError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Deserialize)]
pub struct CreateZoneBody {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub is_emergency: bool,
}

/// `GET /api/zones` — list zones by priority.
pub async fn list_zones(
    State(state): State<AppState>,
    _auth: AuthStaff,
) -> Result<Json<Vec<ZoneRow>>, StatusCode> {
    let rows = zone::list_zones(&state.pool)
        .await
        .map_err(zone_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/zones` — create a zone.
pub async fn create_zone(
    State(state): State<AppState>,
    auth: AuthStaff,
    Json(body): Json<CreateZoneBody>,
) -> Result<(StatusCode, Json<ZoneRow>), StatusCode> {
    require_edit(&auth)?;
    let row = zone::create_zone(&state.pool, &body.name, body.priority, body.is_emergency)
        .await
        .map_err(zone_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/zones/{id}` — fetch one zone.
pub async fn get_zone(
    State(state): State<AppState>,
    _auth: AuthStaff,
    Path(zone_id): Path<Uuid>,
) -> Result<Json<ZoneRow>, StatusCode> {
    let row = zone::get_zone(&state.pool, zone_id)
        .await
        .map_err(zone_error_to_status)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(row))
}

/// `PATCH /api/zones/{id}` — update a zone.
pub async fn update_zone(
    State(state): State<AppState>,
    auth: AuthStaff,
    Path(zone_id): Path<Uuid>,
    Json(patch): Json<ZonePatch>,
) -> Result<Json<ZoneRow>, StatusCode> {
    require_edit(&auth)?;
    let row = zone::update_zone(&state.pool, zone_id, patch)
        .await
        .map_err(zone_error_to_status)?;
    Ok(Json(row))
}

/// `DELETE /api/zones/{id}` — delete a zone.
pub async fn delete_zone(
    State(state): State<AppState>,
    auth: AuthStaff,
    Path(zone_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_edit(&auth)?;
    zone::delete_zone(&state.pool, zone_id)
        .await
        .map_err(zone_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// =============================================================================
// COMBINATIONS
// =============================================================================

pub(crate) fn combination_error_to_status(err: combination::CombinationError) -> StatusCode {
    match err {
        combination::CombinationError::NotFound(_) => StatusCode::NOT_FOUND,
        combination::CombinationError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        combination::CombinationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Deserialize)]
pub struct ListCombinationsQuery {
    pub floorplan_id: Option<Uuid>,
}

/// `GET /api/combinations` — list combinations, optionally per floorplan.
pub async fn list_combinations(
    State(state): State<AppState>,
    _auth: AuthStaff,
    Query(query): Query<ListCombinationsQuery>,
) -> Result<Json<Vec<CombinationRow>>, StatusCode> {
    let rows = combination::list_combinations(&state.pool, query.floorplan_id)
        .await
        .map_err(combination_error_to_status)?;
    Ok(Json(rows))
}

/// `POST /api/combinations` — create a combination.
pub async fn create_combination(
    State(state): State<AppState>,
    auth: AuthStaff,
    Json(body): Json<NewCombination>,
) -> Result<(StatusCode, Json<CombinationRow>), StatusCode> {
    require_edit(&auth)?;
    let row = combination::create_combination(&state.pool, body)
        .await
        .map_err(combination_error_to_status)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/combinations/{id}` — fetch one combination.
pub async fn get_combination(
    State(state): State<AppState>,
    _auth: AuthStaff,
    Path(id): Path<Uuid>,
) -> Result<Json<CombinationRow>, StatusCode> {
    let row = combination::get_combination(&state.pool, id)
        .await
        .map_err(combination_error_to_status)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(row))
}

/// `PATCH /api/combinations/{id}` — update a combination.
pub async fn update_combination(
    State(state): State<AppState>,
    auth: AuthStaff,
    Path(id): Path<Uuid>,
    Json(patch): Json<CombinationPatch>,
) -> Result<Json<CombinationRow>, StatusCode> {
    require_edit(&auth)?;
    let row = combination::update_combination(&state.pool, id, patch)
        .await
        .map_err(combination_error_to_status)?;
    Ok(Json(row))
}

/// `DELETE /api/combinations/{id}` — delete a combination.
pub async fn delete_combination(
    State(state): State<AppState>,
    auth: AuthStaff,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_edit(&auth)?;
    combination::delete_combination(&state.pool, id)
        .await
        .map_err(combination_error_to_status)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// =============================================================================
// SETTINGS
// =============================================================================

pub(crate) fn settings_error_to_status(err: settings::SettingsError) -> StatusCode {
    match err {
        settings::SettingsError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        settings::SettingsError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `GET /api/settings` — read the seating settings.
pub async fn get_settings(
    State(state): State<AppState>,
    _auth: AuthStaff,
) -> Result<Json<SeatingSettings>, StatusCode> {
    let row = settings::get_settings(&state.pool)
        .await
        .map_err(settings_error_to_status)?;
    Ok(Json(row))
}

/// `PATCH /api/settings` — update the seating settings.
pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthStaff,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<SeatingSettings>, StatusCode> {
    require_edit(&auth)?;
    let row = settings::update_settings(&state.pool, patch)
        .await
        .map_err(settings_error_to_status)?;
    Ok(Json(row))
}

// =============================================================================
// ALLOCATION DEBUG EVENTS
// =============================================================================

#[derive(Deserialize)]
pub struct AllocationEventBody {
    pub event: String,
    pub floorplan_id: Option<Uuid>,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Deserialize)]
pub struct AllocationEventsQuery {
    pub limit: Option<i64>,
}

/// `POST /api/debug/allocation` — record an allocation-debug event.
pub async fn record_allocation_event(
    State(state): State<AppState>,
    auth: AuthStaff,
    Json(body): Json<AllocationEventBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), StatusCode> {
    let data: Data = match body.data {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        serde_json::Value::Null => Data::new(),
        _ => return Err(StatusCode::UNPROCESSABLE_ENTITY),
    };

    let frame = debug::record_allocation_event(&state, auth.staff.id, body.floorplan_id, &body.event, data)
        .map_err(|err| match err {
            debug::DebugError::EmptyEvent => StatusCode::UNPROCESSABLE_ENTITY,
            debug::DebugError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        })?;

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "id": frame.id }))))
}

/// `GET /api/debug/allocation` — recent allocation-debug events.
pub async fn list_allocation_events(
    State(state): State<AppState>,
    _auth: AuthStaff,
    Query(query): Query<AllocationEventsQuery>,
) -> Result<Json<Vec<crate::frame::Frame>>, StatusCode> {
    let rows = debug::recent_allocation_events(&state, query.limit.unwrap_or(100))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(rows))
}
