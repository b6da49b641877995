#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use uuid::Uuid;

use super::*;

fn geometry() -> TableGeometry {
    TableGeometry { x: 0.0, y: 0.0, width: 100.0, height: 80.0, radius: None, rotation: 0.0, version: 1 }
}

#[test]
fn default_state_is_idle() {
    assert!(matches!(InputState::default(), InputState::Idle));
}

#[test]
fn default_modifiers_are_all_false() {
    let mods = Modifiers::default();
    assert!(!mods.shift && !mods.ctrl && !mods.alt && !mods.meta);
}

#[test]
fn gesture_table_for_table_gestures() {
    let id = Uuid::new_v4();
    let dragging = InputState::DraggingTable {
        id,
        start_plan: Point::new(0.0, 0.0),
        orig: geometry(),
        last_free_center: Point::new(50.0, 40.0),
        avoid_obstacles: true,
    };
    assert_eq!(dragging.gesture_table(), Some(id));

    let rotating = InputState::RotatingTable {
        id,
        pivot: Point::new(50.0, 40.0),
        orig: geometry(),
        pointer_start_deg: 12.0,
    };
    assert_eq!(rotating.gesture_table(), Some(id));
}

#[test]
fn gesture_table_none_for_idle_and_panning() {
    assert_eq!(InputState::Idle.gesture_table(), None);
    let panning = InputState::Panning { last_screen: Point::new(1.0, 2.0) };
    assert_eq!(panning.gesture_table(), None);
}

#[test]
fn key_wraps_host_key_names() {
    assert_eq!(Key("Escape".into()), Key("Escape".into()));
    assert_ne!(Key("Escape".into()), Key("Delete".into()));
}
