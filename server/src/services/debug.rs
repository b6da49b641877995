//! Allocation-debug event log.
//!
//! DESIGN
//! ======
//! The reservation engine (an external collaborator) and editor hosts post
//! allocation-debug events here. Events are ordinary frames with the
//! `debug:allocation` syscall, so they share the audit table's retention,
//! ordering, and batched writer instead of growing a second pipeline.

use uuid::Uuid;

use crate::frame::{Data, Frame, Status};
use crate::services::persistence;
use crate::state::AppState;

#[cfg(test)]
#[path = "debug_test.rs"]
mod tests;

/// Syscall under which allocation-debug events are filed.
pub const ALLOCATION_SYSCALL: &str = "debug:allocation";

#[derive(Debug, thiserror::Error)]
pub enum DebugError {
    #[error("event name must not be empty")]
    EmptyEvent,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for DebugError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyEvent => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// Build and enqueue an allocation-debug frame. Returns the frame so callers
/// can echo its id.
///
/// # Errors
///
/// Returns `EmptyEvent` when the event name is blank.
pub fn record_allocation_event(
    state: &AppState,
    staff_id: Uuid,
    floorplan_id: Option<Uuid>,
    event: &str,
    mut data: Data,
) -> Result<Frame, DebugError> {
    if event.trim().is_empty() {
        return Err(DebugError::EmptyEvent);
    }

    data.insert("event".into(), serde_json::Value::String(event.to_owned()));
    let mut frame = Frame::request(ALLOCATION_SYSCALL, data).with_from(staff_id.to_string());
    if let Some(plan_id) = floorplan_id {
        frame = frame.with_floorplan_id(plan_id);
    }
    // Debug events are terminal records, not requests awaiting a reply.
    frame.status = Status::Done;

    persistence::enqueue_frame(state, &frame);
    Ok(frame)
}

/// Recent allocation-debug events, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn recent_allocation_events(state: &AppState, limit: i64) -> Result<Vec<Frame>, DebugError> {
    let rows = sqlx::query_as::<_, (Uuid, Option<Uuid>, Option<Uuid>, Option<String>, serde_json::Value, i64)>(
        r#"SELECT id, parent_id, floorplan_id, "from", data, ts
           FROM frames
           WHERE syscall = $1
           ORDER BY ts DESC
           LIMIT $2"#,
    )
    .bind(ALLOCATION_SYSCALL)
    .bind(limit.clamp(1, 500))
    .fetch_all(&state.pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, parent_id, floorplan_id, from, data, ts)| Frame {
            id,
            parent_id,
            ts,
            floorplan_id,
            from,
            syscall: ALLOCATION_SYSCALL.to_owned(),
            status: Status::Done,
            data: match data {
                serde_json::Value::Object(map) => map.into_iter().collect(),
                _ => Data::new(),
            },
        })
        .collect())
}
