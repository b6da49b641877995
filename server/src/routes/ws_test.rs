use super::*;
use crate::frame::Status;
use crate::state::test_helpers;
use serde_json::json;

fn manager() -> StaffMember {
    StaffMember { id: Uuid::new_v4(), name: "sam".into(), role: "manager".into() }
}

fn host() -> StaffMember {
    StaffMember { id: Uuid::new_v4(), name: "kim".into(), role: "host".into() }
}

fn frame_json(syscall: &str, data: serde_json::Value) -> String {
    serde_json::to_string(&json!({
        "id": Uuid::new_v4(),
        "parent_id": null,
        "ts": 0,
        "from": null,
        "syscall": syscall,
        "status": "request",
        "data": data,
    }))
    .unwrap()
}

async fn dispatch(
    state: &AppState,
    current_plan: &mut Option<Uuid>,
    staff: &StaffMember,
    text: &str,
) -> Vec<Frame> {
    let (client_tx, _client_rx) = mpsc::channel(16);
    process_inbound_text(state, current_plan, Uuid::new_v4(), staff, &client_tx, text).await
}

#[tokio::test]
async fn invalid_json_returns_gateway_error() {
    let state = test_helpers::test_app_state();
    let mut current = None;
    let frames = dispatch(&state, &mut current, &manager(), "{not json").await;

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].syscall, "gateway:error");
    assert!(
        frames[0]
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap()
            .contains("invalid json")
    );
}

#[tokio::test]
async fn unknown_prefix_returns_error_frame() {
    let state = test_helpers::test_app_state();
    let mut current = None;
    let frames = dispatch(&state, &mut current, &manager(), &frame_json("cursor:moved", json!({}))).await;

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].status, Status::Error);
    assert!(
        frames[0]
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap()
            .contains("unknown prefix")
    );
}

#[tokio::test]
async fn table_ops_require_a_joined_floorplan() {
    let state = test_helpers::test_app_state();
    let mut current = None;
    let frames = dispatch(
        &state,
        &mut current,
        &manager(),
        &frame_json("table:update", json!({"id": Uuid::new_v4(), "x": 10.0})),
    )
    .await;

    assert_eq!(frames[0].status, Status::Error);
    assert!(
        frames[0]
            .data
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap()
            .contains("join a floorplan")
    );
}

#[tokio::test]
async fn hosts_cannot_mutate_tables() {
    let state = test_helpers::test_app_state();
    let table = test_helpers::dummy_table();
    let table_id = table.id;
    let plan_id = test_helpers::seed_plan_with_tables(&state, vec![table]).await;

    let mut current = Some(plan_id);
    let frames = dispatch(
        &state,
        &mut current,
        &host(),
        &frame_json("table:update", json!({"id": table_id, "x": 10.0, "version": 1})),
    )
    .await;

    assert_eq!(frames[0].status, Status::Error);
    assert_eq!(
        frames[0].data.get("code").and_then(|v| v.as_str()),
        Some("E_FORBIDDEN")
    );

    // The table is untouched.
    let plans = state.plans.read().await;
    let stored = plans.get(&plan_id).unwrap().tables.get(&table_id).unwrap();
    assert!((stored.x - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn manager_update_mutates_and_replies_done() {
    let state = test_helpers::test_app_state();
    let table = test_helpers::dummy_table();
    let table_id = table.id;
    let plan_id = test_helpers::seed_plan_with_tables(&state, vec![table]).await;

    let mut current = Some(plan_id);
    let frames = dispatch(
        &state,
        &mut current,
        &manager(),
        &frame_json("table:update", json!({"id": table_id, "x": 225.0, "version": 1})),
    )
    .await;

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].status, Status::Done);
    assert!(frames[0].parent_id.is_some());
    assert_eq!(
        frames[0].data.get("x").and_then(serde_json::Value::as_f64),
        Some(225.0)
    );
    assert_eq!(
        frames[0].data.get("version").and_then(serde_json::Value::as_i64),
        Some(2)
    );

    let plans = state.plans.read().await;
    let stored = plans.get(&plan_id).unwrap().tables.get(&table_id).unwrap();
    assert!((stored.x - 225.0).abs() < f64::EPSILON);
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn stale_update_returns_error_code() {
    let state = test_helpers::test_app_state();
    let mut table = test_helpers::dummy_table();
    table.version = 5;
    let table_id = table.id;
    let plan_id = test_helpers::seed_plan_with_tables(&state, vec![table]).await;

    let mut current = Some(plan_id);
    let frames = dispatch(
        &state,
        &mut current,
        &manager(),
        &frame_json("table:update", json!({"id": table_id, "x": 10.0, "version": 2})),
    )
    .await;

    assert_eq!(frames[0].status, Status::Error);
    assert_eq!(
        frames[0].data.get("code").and_then(|v| v.as_str()),
        Some("E_STALE_UPDATE")
    );
}

#[tokio::test]
async fn broadcast_reaches_floorplan_peers() {
    let state = test_helpers::test_app_state();
    let table = test_helpers::dummy_table();
    let table_id = table.id;
    let plan_id = test_helpers::seed_plan_with_tables(&state, vec![table]).await;

    // A peer client sits in the room.
    let (peer_tx, mut peer_rx) = mpsc::channel(16);
    let peer_id = Uuid::new_v4();
    {
        let mut plans = state.plans.write().await;
        plans
            .get_mut(&plan_id)
            .unwrap()
            .clients
            .insert(peer_id, peer_tx);
    }

    let mut current = Some(plan_id);
    dispatch(
        &state,
        &mut current,
        &manager(),
        &frame_json("table:update", json!({"id": table_id, "x": 300.0, "version": 1})),
    )
    .await;

    let peer_frame = peer_rx.try_recv().unwrap();
    assert_eq!(peer_frame.syscall, "table:update");
    // Peers didn't originate the request; no correlation id.
    assert!(peer_frame.parent_id.is_none());
}

#[tokio::test]
async fn part_without_join_is_done() {
    let state = test_helpers::test_app_state();
    let mut current = None;
    let frames = dispatch(&state, &mut current, &manager(), &frame_json("floorplan:part", json!({}))).await;
    assert_eq!(frames[0].status, Status::Done);
}

#[tokio::test]
async fn debug_allocation_replies_with_event_id() {
    let state = test_helpers::test_app_state();
    let mut current = None;
    let frames = dispatch(
        &state,
        &mut current,
        &host(),
        &frame_json("debug:allocation", json!({"event": "table_scored", "score": 0.8})),
    )
    .await;

    assert_eq!(frames[0].status, Status::Done);
    assert!(frames[0].data.contains_key("id"));
}
