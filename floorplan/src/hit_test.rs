#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use serde_json::json;
use uuid::Uuid;

use super::*;
use crate::doc::Table;

fn make_table(x: f64, y: f64, width: f64, height: f64, z: i32) -> Table {
    Table {
        id: Uuid::new_v4(),
        floorplan_id: Uuid::new_v4(),
        zone_id: None,
        name: "T1".into(),
        min_covers: 2,
        max_covers: 4,
        shape: TableShape::Rect,
        x,
        y,
        width,
        height,
        radius: None,
        rotation: 0.0,
        locked: false,
        snap_to_grid: true,
        z_index: z,
        props: json!({}),
        version: 1,
    }
}

fn make_round(x: f64, y: f64, radius: f64) -> Table {
    let mut table = make_table(x, y, radius * 2.0, radius * 2.0, 0);
    table.shape = TableShape::Round;
    table.radius = Some(radius);
    table
}

fn doc_with(tables: Vec<Table>) -> PlanDoc {
    let mut doc = PlanDoc::new();
    for table in tables {
        doc.insert(table);
    }
    doc
}

// --- Body hits ---

#[test]
fn body_hit_inside_rect() {
    let table = make_table(10.0, 10.0, 100.0, 80.0, 0);
    let id = table.id;
    let doc = doc_with(vec![table]);

    let hit = hit_test(Point::new(50.0, 50.0), &doc, &Camera::default(), None).unwrap();
    assert_eq!(hit.table_id, id);
    assert_eq!(hit.part, HitPart::Body);
}

#[test]
fn miss_outside_everything() {
    let doc = doc_with(vec![make_table(10.0, 10.0, 100.0, 80.0, 0)]);
    assert!(hit_test(Point::new(500.0, 500.0), &doc, &Camera::default(), None).is_none());
}

#[test]
fn topmost_z_wins_on_overlap() {
    let below = make_table(0.0, 0.0, 100.0, 100.0, 1);
    let above = make_table(50.0, 50.0, 100.0, 100.0, 2);
    let above_id = above.id;
    let doc = doc_with(vec![below, above]);

    let hit = hit_test(Point::new(75.0, 75.0), &doc, &Camera::default(), None).unwrap();
    assert_eq!(hit.table_id, above_id);
}

#[test]
fn body_hit_respects_rotation() {
    // 100×20 bar at the origin rotated 90°: occupies x ∈ [40, 60], y ∈ [-40, 60].
    let mut table = make_table(0.0, 0.0, 100.0, 20.0, 0);
    table.rotation = 90.0;
    let id = table.id;
    let doc = doc_with(vec![table]);

    let hit = hit_test(Point::new(50.0, 55.0), &doc, &Camera::default(), None);
    assert_eq!(hit.unwrap().table_id, id);
    // This point is inside the unrotated bounding box but not the rotated bar.
    assert!(hit_test(Point::new(95.0, 10.0), &doc, &Camera::default(), None).is_none());
}

#[test]
fn round_body_uses_radius_not_bounding_box() {
    let table = make_round(0.0, 0.0, 50.0);
    let id = table.id;
    let doc = doc_with(vec![table]);
    let camera = Camera::default();

    // Centre of the circle is (50, 50). The bounding-box corner is outside it.
    assert_eq!(hit_test(Point::new(50.0, 50.0), &doc, &camera, None).unwrap().table_id, id);
    assert!(hit_test(Point::new(3.0, 3.0), &doc, &camera, None).is_none());
}

// --- Handles ---

#[test]
fn selected_table_exposes_resize_handles() {
    let table = make_table(100.0, 100.0, 100.0, 80.0, 0);
    let id = table.id;
    let doc = doc_with(vec![table]);

    // South-east corner of the box is at (200, 180).
    let hit = hit_test(Point::new(200.0, 180.0), &doc, &Camera::default(), Some(id)).unwrap();
    assert_eq!(hit.table_id, id);
    assert_eq!(hit.part, HitPart::ResizeHandle(ResizeAnchor::Se));
}

#[test]
fn handles_need_selection() {
    let table = make_table(100.0, 100.0, 100.0, 80.0, 0);
    let doc = doc_with(vec![table]);

    // Same corner point, nothing selected: the corner itself is a body hit.
    let hit = hit_test(Point::new(200.0, 180.0), &doc, &Camera::default(), None).unwrap();
    assert_eq!(hit.part, HitPart::Body);
}

#[test]
fn rotate_handle_floats_above_the_table() {
    let table = make_table(100.0, 100.0, 100.0, 80.0, 0);
    let id = table.id;
    let doc = doc_with(vec![table]);

    // Top edge midpoint is (150, 100); the handle sits 24px above at zoom 1.
    let hit = hit_test(Point::new(150.0, 76.0), &doc, &Camera::default(), Some(id)).unwrap();
    assert_eq!(hit.part, HitPart::RotateHandle);
}

#[test]
fn handle_positions_follow_rotation() {
    let mut table = make_table(100.0, 100.0, 100.0, 80.0, 0);
    table.rotation = 90.0;
    let id = table.id;
    let doc = doc_with(vec![table.clone()]);

    // After a quarter turn the Se handle lands at centre + (-h/2, +w/2).
    let expected = handle_position(&table, ResizeAnchor::Se);
    assert!((expected.x - 110.0).abs() < 1e-9);
    assert!((expected.y - 190.0).abs() < 1e-9);

    let hit = hit_test(expected, &doc, &Camera::default(), Some(id)).unwrap();
    assert_eq!(hit.part, HitPart::ResizeHandle(ResizeAnchor::Se));
}

#[test]
fn handle_slop_shrinks_with_zoom() {
    let table = make_table(100.0, 100.0, 100.0, 80.0, 0);
    let id = table.id;
    let doc = doc_with(vec![table]);

    // 6 plan units from the Se corner: inside slop at zoom 1 (8 plan units),
    // outside at zoom 4 (2 plan units).
    let probe = Point::new(206.0, 180.0);
    let wide = hit_test(probe, &doc, &Camera::default(), Some(id)).unwrap();
    assert_eq!(wide.part, HitPart::ResizeHandle(ResizeAnchor::Se));

    let zoomed = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 4.0 };
    assert!(hit_test(probe, &doc, &zoomed, Some(id)).is_none());
}

#[test]
fn round_tables_only_expose_corner_handles() {
    let table = make_round(100.0, 100.0, 50.0);
    let id = table.id;
    let doc = doc_with(vec![table]);

    // Top edge midpoint (150, 100) would be the N handle on a rect table; on a
    // round table it falls through to the body (it lies on the circle).
    let hit = hit_test(Point::new(150.0, 101.0), &doc, &Camera::default(), Some(id)).unwrap();
    assert_eq!(hit.part, HitPart::Body);

    // The bounding-box corner is a resize handle even though it is outside
    // the circle itself.
    let corner = hit_test(Point::new(200.0, 200.0), &doc, &Camera::default(), Some(id)).unwrap();
    assert_eq!(corner.part, HitPart::ResizeHandle(ResizeAnchor::Se));
}
