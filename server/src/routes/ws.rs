//! WebSocket handler — bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Broadcast frames from floorplan peers → forward to client
//!
//! Handler functions are pure business logic — they validate, mutate state,
//! and return an `Outcome`. The dispatch layer owns all outbound concerns:
//! persistence, reply to sender, and broadcast to peers.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch applies Outcome (reply / broadcast / both)
//! 4. Close → broadcast `floorplan:part` → cleanup

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame};
use crate::routes::floorplans::table_to_data;
use crate::services;
use crate::services::staff::StaffMember;
use crate::state::AppState;

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what — handlers never send frames directly.
enum Outcome {
    /// Broadcast done+data to ALL floorplan clients including sender.
    /// Sender's copy carries `parent_id` for correlation.
    Broadcast(Data),
    /// Send done+data to sender only.
    Reply(Data),
    /// Send empty done to sender only.
    Done,
    /// Reply to sender with one payload, broadcast different data to peers.
    ReplyAndBroadcast { reply: Data, broadcast: Data },
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return (StatusCode::UNAUTHORIZED, "ticket required").into_response();
    };

    let staff = match services::staff::consume_ws_ticket(&state.pool, ticket).await {
        Ok(Some(staff)) => staff,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ws ticket validation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, staff))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, staff: StaffMember) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for receiving broadcast frames from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);

    // Send session:connected with the staff identity.
    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("staff_id", staff.id.to_string())
        .with_data("role", staff.role.clone());
    if send_frame(&mut socket, &state, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, staff_id = %staff.id, "ws: client connected");

    // Track which floorplan this client has joined.
    let mut current_plan: Option<Uuid> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        dispatch_frame(&state, &mut socket, &mut current_plan, client_id, &staff, &client_tx, &text).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &state, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    // Broadcast floorplan:part to peers BEFORE cleanup (part_plan may evict state).
    if let Some(plan_id) = current_plan {
        let mut part_data = Data::new();
        part_data.insert("client_id".into(), serde_json::json!(client_id));
        part_data.insert("staff_id".into(), serde_json::json!(staff.id));
        let part_frame = Frame::request("floorplan:part", part_data).with_floorplan_id(plan_id);
        services::plan::broadcast(&state, plan_id, &part_frame, Some(client_id)).await;

        services::plan::part_plan(&state, plan_id, client_id).await;
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse an incoming JSON frame, dispatch to handler, apply outcome.
async fn dispatch_frame(
    state: &AppState,
    socket: &mut WebSocket,
    current_plan: &mut Option<Uuid>,
    client_id: Uuid,
    staff: &StaffMember,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) {
    let sender_frames = process_inbound_text(state, current_plan, client_id, staff, client_tx, text).await;
    for frame in sender_frames {
        let _ = send_frame(socket, state, &frame).await;
    }
}

/// Parse and process one inbound text frame and return frames for the sender.
///
/// This keeps the websocket transport concerns separate from frame handling,
/// so tests can exercise frame dispatch end-to-end without a socket.
async fn process_inbound_text(
    state: &AppState,
    current_plan: &mut Option<Uuid>,
    client_id: Uuid,
    staff: &StaffMember,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Stamp the authenticated staff id as `from`.
    req.from = Some(staff.id.to_string());

    info!(%client_id, id = %req.id, syscall = %req.syscall, status = ?req.status, "ws: recv frame");
    services::persistence::enqueue_frame(state, &req);

    // Dispatch to handler — returns Outcome or error Frame.
    let result = match req.prefix() {
        "floorplan" => handle_floorplan(state, current_plan, client_id, staff, client_tx, &req).await,
        "table" => handle_table(state, *current_plan, staff, &req).await,
        "debug" => handle_debug(state, *current_plan, staff, &req),
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    // Apply outcome — the dispatch layer owns all outbound logic.
    let plan_id = *current_plan;
    match result {
        Ok(Outcome::Broadcast(data)) => {
            let sender_frame = req.done_with(data);
            // Peers get a copy without parent_id (they didn't originate the request).
            let mut peer_frame = sender_frame.clone();
            peer_frame.id = Uuid::new_v4();
            peer_frame.parent_id = None;
            if let Some(pid) = plan_id {
                services::plan::broadcast(state, pid, &peer_frame, Some(client_id)).await;
            }
            vec![sender_frame]
        }
        Ok(Outcome::Reply(data)) => {
            vec![req.done_with(data)]
        }
        Ok(Outcome::Done) => {
            vec![req.done()]
        }
        Ok(Outcome::ReplyAndBroadcast { reply, broadcast }) => {
            let sender_frame = req.done_with(reply);
            if let Some(pid) = plan_id {
                let notif = Frame::request(&req.syscall, broadcast).with_floorplan_id(pid);
                services::plan::broadcast(state, pid, &notif, Some(client_id)).await;
            }
            vec![sender_frame]
        }
        Err(err_frame) => {
            vec![err_frame]
        }
    }
}

// =============================================================================
// FLOORPLAN HANDLERS
// =============================================================================

async fn handle_floorplan(
    state: &AppState,
    current_plan: &mut Option<Uuid>,
    client_id: Uuid,
    staff: &StaffMember,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let op = req.syscall.split_once(':').map_or("", |(_, op)| op);

    match op {
        "join" => {
            let Some(plan_id) = req.floorplan_id.or_else(|| {
                req.data
                    .get("floorplan_id")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok())
            }) else {
                return Err(req.error("floorplan_id required"));
            };

            // Part current floorplan if already joined.
            if let Some(old_plan) = current_plan.take() {
                services::plan::part_plan(state, old_plan, client_id).await;
            }

            match services::plan::join_plan(state, plan_id, client_id, client_tx.clone()).await {
                Ok((plan, tables)) => {
                    *current_plan = Some(plan_id);

                    let mut reply = Data::new();
                    reply.insert("floorplan".into(), serde_json::to_value(&plan).unwrap_or_default());
                    reply.insert("tables".into(), serde_json::to_value(&tables).unwrap_or_default());

                    let mut broadcast = Data::new();
                    broadcast.insert("client_id".into(), serde_json::json!(client_id));
                    broadcast.insert("staff_id".into(), serde_json::json!(staff.id));

                    Ok(Outcome::ReplyAndBroadcast { reply, broadcast })
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "part" => {
            if let Some(plan_id) = current_plan.take() {
                services::plan::part_plan(state, plan_id, client_id).await;
            }
            Ok(Outcome::Done)
        }
        "list" => match services::plan::list_plans(&state.pool).await {
            Ok(plans) => {
                let list: Vec<serde_json::Value> = plans
                    .iter()
                    .map(|p| serde_json::json!({"id": p.id, "name": p.name}))
                    .collect();
                let mut data = Data::new();
                data.insert("floorplans".into(), serde_json::json!(list));
                Ok(Outcome::Reply(data))
            }
            Err(e) => Err(req.error_from(&e)),
        },
        "obstacles" => {
            let Some(plan_id) = *current_plan else {
                return Err(req.error("must join a floorplan first"));
            };
            if let Err(e) = services::staff::ensure_can_edit(staff) {
                return Err(req.error_from(&e));
            }
            let Some(obstacles) = req.data.get("obstacles") else {
                return Err(req.error("obstacles required"));
            };
            let obstacles: Vec<crate::state::Obstacle> = match serde_json::from_value(obstacles.clone()) {
                Ok(parsed) => parsed,
                Err(e) => return Err(req.error(format!("invalid obstacles: {e}"))),
            };

            let patch = services::plan::PlanPatch { obstacles: Some(obstacles), ..Default::default() };
            match services::plan::update_plan(&state.pool, plan_id, patch).await {
                Ok(plan) => {
                    let mut data = Data::new();
                    data.insert("floorplan".into(), serde_json::to_value(&plan).unwrap_or_default());
                    Ok(Outcome::Broadcast(data))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        _ => Err(req.error(format!("unknown floorplan op: {op}"))),
    }
}

// =============================================================================
// TABLE HANDLERS
// =============================================================================

async fn handle_table(
    state: &AppState,
    current_plan: Option<Uuid>,
    staff: &StaffMember,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let Some(plan_id) = current_plan else {
        return Err(req.error("must join a floorplan first"));
    };
    if let Err(e) = services::staff::ensure_can_edit(staff) {
        return Err(req.error_from(&e));
    }

    let op = req.syscall.split_once(':').map_or("", |(_, op)| op);

    match op {
        "create" => {
            let new: services::table::NewTable =
                match serde_json::from_value(serde_json::to_value(&req.data).unwrap_or_default()) {
                    Ok(parsed) => parsed,
                    Err(e) => return Err(req.error(format!("invalid table: {e}"))),
                };

            if let Err(e) = services::savepoint::maybe_create_auto_savepoint(state, plan_id, staff.id, "table:create").await {
                warn!(error = %e, %plan_id, "auto savepoint failed");
            }

            match services::table::create_table(state, plan_id, new).await {
                Ok(table) => Ok(Outcome::Broadcast(table_to_data(&table))),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "update" => {
            let Some(table_id) = req
                .data
                .get("id")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
            else {
                return Err(req.error("id required"));
            };
            let version = req
                .data
                .get("version")
                .and_then(serde_json::Value::as_i64)
                .and_then(|v| i32::try_from(v).ok())
                .unwrap_or(0);

            match services::table::update_table(state, plan_id, table_id, &req.data, version).await {
                Ok(table) => Ok(Outcome::Broadcast(table_to_data(&table))),
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "delete" => {
            let Some(table_id) = req
                .data
                .get("id")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
            else {
                return Err(req.error("id required"));
            };

            if let Err(e) = services::savepoint::maybe_create_auto_savepoint(state, plan_id, staff.id, "table:delete").await {
                warn!(error = %e, %plan_id, "auto savepoint failed");
            }

            match services::table::delete_table(state, plan_id, table_id).await {
                Ok(()) => {
                    let mut data = Data::new();
                    data.insert("id".into(), serde_json::json!(table_id));
                    Ok(Outcome::Broadcast(data))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        _ => Err(req.error(format!("unknown table op: {op}"))),
    }
}

// =============================================================================
// DEBUG HANDLER
// =============================================================================

fn handle_debug(
    state: &AppState,
    current_plan: Option<Uuid>,
    staff: &StaffMember,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let op = req.syscall.split_once(':').map_or("", |(_, op)| op);
    if op != "allocation" {
        return Err(req.error(format!("unknown debug op: {op}")));
    }

    let event = req
        .data
        .get("event")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let mut data = req.data.clone();
    data.remove("event");

    match services::debug::record_allocation_event(state, staff.id, current_plan, event, data) {
        Ok(frame) => {
            let mut reply = Data::new();
            reply.insert("id".into(), serde_json::json!(frame.id));
            Ok(Outcome::Reply(reply))
        }
        Err(e) => Err(req.error_from(&e)),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, state: &AppState, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == crate::frame::Status::Error {
        let code = frame
            .data
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        let message = frame
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    let result = socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ());
    if result.is_ok() {
        services::persistence::enqueue_frame(state, frame);
    }
    result
}
