use super::*;
use crate::state::test_helpers;

fn new_table(name: &str) -> NewTable {
    NewTable {
        name: name.into(),
        zone_id: None,
        min_covers: 2,
        max_covers: 4,
        shape: TableShape::Rect,
        x: 10.0,
        y: 20.0,
        width: 100.0,
        height: 80.0,
        radius: None,
        rotation: 0.0,
        props: None,
    }
}

#[tokio::test]
async fn create_table_succeeds() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let table = create_table(&state, plan_id, new_table("T1")).await.unwrap();
    assert_eq!(table.name, "T1");
    assert!((table.x - 10.0).abs() < f64::EPSILON);
    assert!((table.y - 20.0).abs() < f64::EPSILON);
    assert_eq!(table.version, 1);
    assert!(table.snap_to_grid);
    assert!(!table.locked);

    // Verify in-memory state
    let plans = state.plans.read().await;
    let plan = plans.get(&plan_id).unwrap();
    assert!(plan.tables.contains_key(&table.id));
    assert!(plan.dirty.contains(&table.id));
}

#[tokio::test]
async fn create_table_plan_not_loaded() {
    let state = test_helpers::test_app_state();
    let fake_id = Uuid::new_v4();
    let result = create_table(&state, fake_id, new_table("T1")).await;
    assert!(matches!(result.unwrap_err(), TableError::PlanNotLoaded(_)));
}

#[tokio::test]
async fn create_table_assigns_increasing_z_index() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let first = create_table(&state, plan_id, new_table("T1")).await.unwrap();
    let second = create_table(&state, plan_id, new_table("T2")).await.unwrap();
    assert_eq!(first.z_index, 0);
    assert_eq!(second.z_index, 1);
}

#[tokio::test]
async fn create_round_table_tracks_radius() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let mut new = new_table("R1");
    new.shape = TableShape::Round;
    new.radius = Some(45.0);

    let table = create_table(&state, plan_id, new).await.unwrap();
    assert_eq!(table.radius, Some(45.0));
    assert!((table.width - 90.0).abs() < f64::EPSILON);
    assert!((table.height - 90.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn create_table_rejects_bad_geometry() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;

    let mut bad = new_table("T1");
    bad.width = 0.0;
    assert!(matches!(
        create_table(&state, plan_id, bad).await.unwrap_err(),
        TableError::Validation(_)
    ));

    let mut nan = new_table("T2");
    nan.x = f64::NAN;
    assert!(matches!(
        create_table(&state, plan_id, nan).await.unwrap_err(),
        TableError::Validation(_)
    ));
}

#[tokio::test]
async fn create_table_rejects_inverted_covers() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let mut bad = new_table("T1");
    bad.min_covers = 6;
    bad.max_covers = 2;
    assert!(matches!(
        create_table(&state, plan_id, bad).await.unwrap_err(),
        TableError::Validation(_)
    ));
}

#[tokio::test]
async fn update_table_succeeds() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let table = create_table(&state, plan_id, new_table("T1")).await.unwrap();

    let mut data = Data::new();
    data.insert("x".into(), serde_json::json!(50.0));
    data.insert("y".into(), serde_json::json!(75.0));
    let updated = update_table(&state, plan_id, table.id, &data, 1)
        .await
        .unwrap();
    assert!((updated.x - 50.0).abs() < f64::EPSILON);
    assert!((updated.y - 75.0).abs() < f64::EPSILON);
    assert_eq!(updated.version, 2);
}

#[tokio::test]
async fn update_table_lww_rejects_stale() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let table = create_table(&state, plan_id, new_table("T1")).await.unwrap();
    assert_eq!(table.version, 1);

    // Update with version 1 succeeds (incoming >= current)
    let mut data = Data::new();
    data.insert("x".into(), serde_json::json!(10.0));
    let updated = update_table(&state, plan_id, table.id, &data, 1)
        .await
        .unwrap();
    assert_eq!(updated.version, 2);

    // Update with version 0 fails (incoming < current)
    let result = update_table(&state, plan_id, table.id, &data, 0).await;
    assert!(matches!(
        result.unwrap_err(),
        TableError::StaleUpdate { incoming: 0, current: 2 }
    ));
}

#[tokio::test]
async fn update_table_not_found() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let data = Data::new();
    let result = update_table(&state, plan_id, Uuid::new_v4(), &data, 0).await;
    assert!(matches!(result.unwrap_err(), TableError::NotFound(_)));
}

#[tokio::test]
async fn update_table_partial_fields() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let table = create_table(&state, plan_id, new_table("T1")).await.unwrap();

    // Only update x, leave y unchanged
    let mut data = Data::new();
    data.insert("x".into(), serde_json::json!(99.0));
    let updated = update_table(&state, plan_id, table.id, &data, 1)
        .await
        .unwrap();
    assert!((updated.x - 99.0).abs() < f64::EPSILON);
    assert!((updated.y - 20.0).abs() < f64::EPSILON); // unchanged
}

#[tokio::test]
async fn update_table_geometry_fields() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let table = create_table(&state, plan_id, new_table("T1")).await.unwrap();

    let mut data = Data::new();
    data.insert("rotation".into(), serde_json::json!(90.0));
    data.insert("locked".into(), serde_json::json!(true));
    data.insert("snap_to_grid".into(), serde_json::json!(false));
    let updated = update_table(&state, plan_id, table.id, &data, 1)
        .await
        .unwrap();
    assert!((updated.rotation - 90.0).abs() < f64::EPSILON);
    assert!(updated.locked);
    assert!(!updated.snap_to_grid);
}

#[tokio::test]
async fn update_table_rejects_invalid_geometry() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let table = create_table(&state, plan_id, new_table("T1")).await.unwrap();

    let mut data = Data::new();
    data.insert("width".into(), serde_json::json!(-5.0));
    let result = update_table(&state, plan_id, table.id, &data, 1).await;
    assert!(matches!(result.unwrap_err(), TableError::Validation(_)));

    // The rejected update left the stored table untouched.
    let plans = state.plans.read().await;
    let stored = plans.get(&plan_id).unwrap().tables.get(&table.id).unwrap();
    assert!((stored.width - 100.0).abs() < f64::EPSILON);
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn update_round_table_radius_tracks_bounding_box() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let mut new = new_table("R1");
    new.shape = TableShape::Round;
    new.radius = Some(40.0);
    let table = create_table(&state, plan_id, new).await.unwrap();

    let mut data = Data::new();
    data.insert("radius".into(), serde_json::json!(55.0));
    let updated = update_table(&state, plan_id, table.id, &data, 1)
        .await
        .unwrap();
    assert_eq!(updated.radius, Some(55.0));
    assert!((updated.width - 110.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn update_table_marks_dirty() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let table = create_table(&state, plan_id, new_table("T1")).await.unwrap();

    let mut data = Data::new();
    data.insert("x".into(), serde_json::json!(1.0));
    update_table(&state, plan_id, table.id, &data, 1)
        .await
        .unwrap();

    let plans = state.plans.read().await;
    assert!(plans.get(&plan_id).unwrap().dirty.contains(&table.id));
}

#[tokio::test]
#[ignore = "delete_table hits Postgres via sqlx::query"]
async fn delete_table_removes_from_memory() {
    let state = test_helpers::test_app_state();
    let plan_id = test_helpers::seed_plan(&state).await;
    let table = create_table(&state, plan_id, new_table("T1")).await.unwrap();
    let _ = delete_table(&state, plan_id, table.id).await;
}
