//! Savepoint service — point-in-time floorplan snapshots for rewind workflows.
//!
//! DESIGN
//! ======
//! Savepoints store a full table snapshot and the current global frame
//! sequence for the floorplan. This gives fast "rewind from checkpoint +
//! replay tail" later without turning every drag into a heavyweight snapshot
//! write.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::frame::now_ms;
use crate::services::plan;
use crate::state::{AppState, Table};

#[cfg(test)]
#[path = "savepoint_test.rs"]
mod tests;

const DEFAULT_AUTO_SAVEPOINT_DEBOUNCE_MS: i64 = 1500;

#[derive(Debug, thiserror::Error)]
pub enum SavepointError {
    #[error("floorplan not found: {0}")]
    PlanNotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for SavepointError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PlanNotFound(_) => "E_PLAN_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavepointRow {
    pub id: Uuid,
    pub floorplan_id: Uuid,
    pub seq: i64,
    pub ts: i64,
    pub created_by: Option<Uuid>,
    pub is_auto: bool,
    pub reason: String,
    pub label: Option<String>,
    pub snapshot: serde_json::Value,
}

fn auto_savepoint_debounce_ms() -> i64 {
    std::env::var("AUTO_SAVEPOINT_DEBOUNCE_MS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(DEFAULT_AUTO_SAVEPOINT_DEBOUNCE_MS)
}

async fn ensure_plan_exists(pool: &PgPool, plan_id: Uuid) -> Result<(), SavepointError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM floorplans WHERE id = $1)")
        .bind(plan_id)
        .fetch_one(pool)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(SavepointError::PlanNotFound(plan_id))
    }
}

/// Live room tables when loaded, otherwise straight from Postgres.
async fn snapshot_tables(state: &AppState, plan_id: Uuid) -> Result<Vec<Table>, SavepointError> {
    {
        let plans = state.plans.read().await;
        if let Some(plan_state) = plans.get(&plan_id) {
            return Ok(plan_state.tables.values().cloned().collect());
        }
    }

    Ok(plan::load_table_rows(&state.pool, plan_id).await?)
}

async fn current_plan_seq(pool: &PgPool, plan_id: Uuid) -> Result<i64, SavepointError> {
    let seq: Option<i64> = sqlx::query_scalar("SELECT MAX(seq) FROM frames WHERE floorplan_id = $1")
        .bind(plan_id)
        .fetch_one(pool)
        .await?;
    Ok(seq.unwrap_or(0))
}

/// Create a savepoint from the current floorplan state.
///
/// # Errors
///
/// Returns `PlanNotFound` for unknown floorplans, otherwise database errors.
pub async fn create_savepoint(
    state: &AppState,
    plan_id: Uuid,
    staff_id: Uuid,
    label: Option<&str>,
    is_auto: bool,
    reason: &str,
) -> Result<SavepointRow, SavepointError> {
    ensure_plan_exists(&state.pool, plan_id).await?;
    let tables = snapshot_tables(state, plan_id).await?;
    let snapshot = serde_json::to_value(tables).unwrap_or_else(|_| serde_json::json!([]));
    let seq = current_plan_seq(&state.pool, plan_id).await?;

    let row = SavepointRow {
        id: Uuid::new_v4(),
        floorplan_id: plan_id,
        seq,
        ts: now_ms(),
        created_by: Some(staff_id),
        is_auto,
        reason: reason.to_owned(),
        label: label.map(std::string::ToString::to_string),
        snapshot,
    };

    sqlx::query(
        "INSERT INTO plan_savepoints (id, floorplan_id, seq, ts, created_by, is_auto, reason, label, snapshot)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(row.id)
    .bind(row.floorplan_id)
    .bind(row.seq)
    .bind(row.ts)
    .bind(row.created_by)
    .bind(row.is_auto)
    .bind(&row.reason)
    .bind(&row.label)
    .bind(&row.snapshot)
    .execute(&state.pool)
    .await?;

    Ok(row)
}

/// List savepoints for a floorplan, newest first.
///
/// # Errors
///
/// Returns `PlanNotFound` for unknown floorplans, otherwise database errors.
pub async fn list_savepoints(state: &AppState, plan_id: Uuid) -> Result<Vec<SavepointRow>, SavepointError> {
    ensure_plan_exists(&state.pool, plan_id).await?;
    let rows = sqlx::query_as::<
        _,
        (
            Uuid,
            Uuid,
            i64,
            i64,
            Option<Uuid>,
            bool,
            String,
            Option<String>,
            serde_json::Value,
        ),
    >(
        "SELECT id, floorplan_id, seq, ts, created_by, is_auto, reason, label, snapshot
         FROM plan_savepoints
         WHERE floorplan_id = $1
         ORDER BY seq DESC
         LIMIT 200",
    )
    .bind(plan_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(
            |(id, floorplan_id, seq, ts, created_by, is_auto, reason, label, snapshot)| SavepointRow {
                id,
                floorplan_id,
                seq,
                ts,
                created_by,
                is_auto,
                reason,
                label,
                snapshot,
            },
        )
        .collect())
}

/// Create an auto savepoint unless one landed within the debounce window.
///
/// # Errors
///
/// Returns `PlanNotFound` for unknown floorplans, otherwise database errors.
pub async fn maybe_create_auto_savepoint(
    state: &AppState,
    plan_id: Uuid,
    staff_id: Uuid,
    reason: &str,
) -> Result<Option<SavepointRow>, SavepointError> {
    ensure_plan_exists(&state.pool, plan_id).await?;
    let latest_auto_ts: Option<i64> = sqlx::query_scalar(
        "SELECT ts
         FROM plan_savepoints
         WHERE floorplan_id = $1 AND is_auto = true
         ORDER BY seq DESC
         LIMIT 1",
    )
    .bind(plan_id)
    .fetch_optional(&state.pool)
    .await?
    .flatten();

    let now = now_ms();
    if let Some(ts) = latest_auto_ts
        && now.saturating_sub(ts) < auto_savepoint_debounce_ms()
    {
        return Ok(None);
    }

    let row = create_savepoint(state, plan_id, staff_id, Some("Auto savepoint"), true, reason).await?;
    Ok(Some(row))
}
