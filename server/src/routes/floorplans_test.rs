use super::*;
use crate::services::plan::PlanError;
use crate::services::table::TableError;
use crate::state::test_helpers;

#[test]
fn plan_errors_map_to_http_status() {
    assert_eq!(plan_error_to_status(PlanError::NotFound(Uuid::new_v4())), StatusCode::NOT_FOUND);
    assert_eq!(
        plan_error_to_status(PlanError::Validation("bad".into())),
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[test]
fn table_errors_map_to_http_status() {
    assert_eq!(
        table_error_to_status(TableError::NotFound(Uuid::new_v4())),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        table_error_to_status(TableError::PlanNotLoaded(Uuid::new_v4())),
        StatusCode::CONFLICT
    );
    assert_eq!(
        table_error_to_status(TableError::StaleUpdate { incoming: 1, current: 2 }),
        StatusCode::CONFLICT
    );
    assert_eq!(
        table_error_to_status(TableError::Validation("bad".into())),
        StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[test]
fn table_to_data_flattens_every_field() {
    let table = test_helpers::dummy_table();
    let data = table_to_data(&table);
    assert_eq!(data.get("name").and_then(|v| v.as_str()), Some("T1"));
    assert_eq!(data.get("x").and_then(serde_json::Value::as_f64), Some(100.0));
    assert_eq!(data.get("version").and_then(serde_json::Value::as_i64), Some(1));
    assert!(data.contains_key("snap_to_grid"));
    assert!(data.contains_key("locked"));
}

#[test]
fn create_plan_body_accepts_partial_json() {
    let body: CreatePlanBody = serde_json::from_str(r#"{"name": "Terrace"}"#).unwrap();
    assert_eq!(body.name.as_deref(), Some("Terrace"));
    assert!(body.width.is_none());
}

#[tokio::test]
async fn next_z_index_uses_the_live_room() {
    let state = test_helpers::test_app_state();
    let mut table = test_helpers::dummy_table();
    table.z_index = 7;
    let plan_id = test_helpers::seed_plan_with_tables(&state, vec![table]).await;

    assert_eq!(next_z_index(&state, plan_id).await.unwrap(), 8);
}
