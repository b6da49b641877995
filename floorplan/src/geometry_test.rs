#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

// =============================================================
// Rect
// =============================================================

#[test]
fn rect_center() {
    let r = Rect::new(10.0, 20.0, 100.0, 40.0);
    let c = r.center();
    assert!(approx_eq(c.x, 60.0));
    assert!(approx_eq(c.y, 40.0));
}

#[test]
fn rect_from_center_round_trips() {
    let r = Rect::from_center(Point::new(60.0, 40.0), 100.0, 40.0);
    assert!(approx_eq(r.x, 10.0));
    assert!(approx_eq(r.y, 20.0));
}

#[test]
fn rect_contains_edges_inclusive() {
    let r = Rect::new(0.0, 0.0, 10.0, 10.0);
    assert!(r.contains(Point::new(0.0, 0.0)));
    assert!(r.contains(Point::new(10.0, 10.0)));
    assert!(!r.contains(Point::new(10.1, 5.0)));
}

#[test]
fn rect_intersects_overlap_but_not_touch() {
    let a = Rect::new(0.0, 0.0, 10.0, 10.0);
    assert!(a.intersects(&Rect::new(5.0, 5.0, 10.0, 10.0)));
    // Sharing an edge is not an overlap.
    assert!(!a.intersects(&Rect::new(10.0, 0.0, 10.0, 10.0)));
    assert!(!a.intersects(&Rect::new(20.0, 20.0, 5.0, 5.0)));
}

// =============================================================
// Rotated corners / AABB
// =============================================================

#[test]
fn corners_unrotated() {
    let c = rotated_corners(Point::new(50.0, 50.0), 20.0, 10.0, 0.0);
    assert!(approx_eq(c[0].x, 40.0) && approx_eq(c[0].y, 45.0));
    assert!(approx_eq(c[2].x, 60.0) && approx_eq(c[2].y, 55.0));
}

#[test]
fn corners_at_90_degrees_swap_extents() {
    let c = rotated_corners(Point::new(0.0, 0.0), 20.0, 10.0, 90.0);
    // Width lies along y after a quarter turn.
    let max_x = c.iter().map(|p| p.x.abs()).fold(0.0, f64::max);
    let max_y = c.iter().map(|p| p.y.abs()).fold(0.0, f64::max);
    assert!(approx_eq(max_x, 5.0));
    assert!(approx_eq(max_y, 10.0));
}

#[test]
fn aabb_unrotated_equals_rect() {
    let bb = rotated_aabb(Point::new(50.0, 50.0), 20.0, 10.0, 0.0);
    assert!(approx_eq(bb.x, 40.0));
    assert!(approx_eq(bb.y, 45.0));
    assert!(approx_eq(bb.width, 20.0));
    assert!(approx_eq(bb.height, 10.0));
}

#[test]
fn aabb_at_45_degrees_grows() {
    let bb = rotated_aabb(Point::new(0.0, 0.0), 10.0, 10.0, 45.0);
    let diagonal = 10.0 * std::f64::consts::SQRT_2;
    assert!(approx_eq(bb.width, diagonal));
    assert!(approx_eq(bb.height, diagonal));
}

#[test]
fn aabb_full_turn_matches_unrotated() {
    let a = rotated_aabb(Point::new(3.0, 4.0), 20.0, 10.0, 0.0);
    let b = rotated_aabb(Point::new(3.0, 4.0), 20.0, 10.0, 360.0);
    assert!(approx_eq(a.width, b.width));
    assert!(approx_eq(a.height, b.height));
}

// =============================================================
// Local frame
// =============================================================

#[test]
fn local_frame_round_trip() {
    let center = Point::new(100.0, 50.0);
    let pt = Point::new(130.0, 70.0);
    let local = to_local_frame(pt, center, 30.0);
    let back = from_local_frame(local, center, 30.0);
    assert!(approx_eq(back.x, pt.x));
    assert!(approx_eq(back.y, pt.y));
}

#[test]
fn point_in_rotated_rect_respects_rotation() {
    let center = Point::new(0.0, 0.0);
    // A thin 40×4 bar rotated 90° occupies x ∈ [-2, 2], y ∈ [-20, 20].
    assert!(point_in_rotated_rect(Point::new(0.0, 18.0), center, 40.0, 4.0, 90.0));
    assert!(!point_in_rotated_rect(Point::new(18.0, 0.0), center, 40.0, 4.0, 90.0));
    assert!(point_in_rotated_rect(Point::new(18.0, 0.0), center, 40.0, 4.0, 0.0));
}

// =============================================================
// Footprint intersection
// =============================================================

#[test]
fn rects_apart_do_not_intersect() {
    let a = Footprint::Rect { center: Point::new(0.0, 0.0), width: 10.0, height: 10.0, rotation: 0.0 };
    let b = Footprint::Rect { center: Point::new(20.0, 0.0), width: 10.0, height: 10.0, rotation: 0.0 };
    assert!(!a.intersects(&b));
}

#[test]
fn rects_overlapping_intersect() {
    let a = Footprint::Rect { center: Point::new(0.0, 0.0), width: 10.0, height: 10.0, rotation: 0.0 };
    let b = Footprint::Rect { center: Point::new(8.0, 0.0), width: 10.0, height: 10.0, rotation: 0.0 };
    assert!(a.intersects(&b));
}

#[test]
fn rotation_can_separate_rects() {
    // Two 20×2 bars crossing at the origin intersect; parallel far bars don't.
    let a = Footprint::Rect { center: Point::new(0.0, 0.0), width: 20.0, height: 2.0, rotation: 0.0 };
    let b = Footprint::Rect { center: Point::new(0.0, 0.0), width: 20.0, height: 2.0, rotation: 90.0 };
    assert!(a.intersects(&b));

    let c = Footprint::Rect { center: Point::new(0.0, 6.0), width: 20.0, height: 2.0, rotation: 0.0 };
    assert!(!a.intersects(&c));
}

#[test]
fn rotation_can_cause_intersection() {
    // Diagonal neighbours clear when axis-aligned, collide once one rotates 45°.
    let a = Footprint::Rect { center: Point::new(0.0, 0.0), width: 10.0, height: 10.0, rotation: 0.0 };
    let b = Footprint::Rect { center: Point::new(10.5, 0.0), width: 10.0, height: 10.0, rotation: 0.0 };
    assert!(!a.intersects(&b));

    let b_rotated = Footprint::Rect { center: Point::new(10.5, 0.0), width: 10.0, height: 10.0, rotation: 45.0 };
    assert!(a.intersects(&b_rotated));
}

#[test]
fn circle_rect_near_corner() {
    let rect = Footprint::Rect { center: Point::new(0.0, 0.0), width: 10.0, height: 10.0, rotation: 0.0 };
    // Corner at (5, 5); circle centred at (8, 8) with radius 4 reaches it.
    let close = Footprint::Circle { center: Point::new(8.0, 8.0), radius: 4.5 };
    let far = Footprint::Circle { center: Point::new(8.0, 8.0), radius: 4.0 };
    assert!(rect.intersects(&close));
    assert!(!rect.intersects(&far));
}

#[test]
fn circle_rect_respects_rect_rotation() {
    // Thin bar rotated to vertical: circle sitting beside it no longer touches.
    let bar = Footprint::Rect { center: Point::new(0.0, 0.0), width: 30.0, height: 2.0, rotation: 90.0 };
    let probe = Footprint::Circle { center: Point::new(10.0, 0.0), radius: 5.0 };
    assert!(!bar.intersects(&probe));

    let flat = Footprint::Rect { center: Point::new(0.0, 0.0), width: 30.0, height: 2.0, rotation: 0.0 };
    assert!(flat.intersects(&probe));
}

#[test]
fn circles_by_center_distance() {
    let a = Footprint::Circle { center: Point::new(0.0, 0.0), radius: 5.0 };
    assert!(a.intersects(&Footprint::Circle { center: Point::new(9.0, 0.0), radius: 5.0 }));
    assert!(!a.intersects(&Footprint::Circle { center: Point::new(10.0, 0.0), radius: 5.0 }));
}

#[test]
fn footprint_at_moves_the_center() {
    let a = Footprint::Circle { center: Point::new(0.0, 0.0), radius: 5.0 };
    let moved = a.at(Point::new(100.0, 50.0));
    assert!(approx_eq(moved.center().x, 100.0));
    assert!(approx_eq(moved.center().y, 50.0));
}

// =============================================================
// Snapping
// =============================================================

#[test]
fn snap_rounds_to_nearest_multiple() {
    assert!(approx_eq(snap_to_grid(12.0, 25.0), 0.0));
    assert!(approx_eq(snap_to_grid(13.0, 25.0), 25.0));
    assert!(approx_eq(snap_to_grid(-13.0, 25.0), -25.0));
}

#[test]
fn snap_halfway_rounds_up() {
    assert!(approx_eq(snap_to_grid(12.5, 25.0), 25.0));
}

#[test]
fn snap_zero_grid_is_identity() {
    assert!(approx_eq(snap_to_grid(13.7, 0.0), 13.7));
    assert!(approx_eq(snap_to_grid(13.7, -5.0), 13.7));
}

#[test]
fn snap_rotation_quantises() {
    assert!(approx_eq(snap_rotation(22.0, 15.0), 15.0));
    assert!(approx_eq(snap_rotation(23.0, 15.0), 30.0));
    assert!(approx_eq(snap_rotation(358.0, 15.0), 0.0));
}

// =============================================================
// Angles
// =============================================================

#[test]
fn normalize_wraps_both_directions() {
    assert!(approx_eq(normalize_deg(370.0), 10.0));
    assert!(approx_eq(normalize_deg(-10.0), 350.0));
    assert!(approx_eq(normalize_deg(720.0), 0.0));
    assert!(approx_eq(normalize_deg(0.0), 0.0));
}

// =============================================================
// Clamping
// =============================================================

#[test]
fn clamp_inside_is_zero() {
    let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
    let (dx, dy) = clamp_offset(&Rect::new(10.0, 10.0, 20.0, 20.0), &bounds);
    assert_eq!((dx, dy), (0.0, 0.0));
}

#[test]
fn clamp_pushes_back_inside() {
    let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
    let (dx, dy) = clamp_offset(&Rect::new(-5.0, 90.0, 20.0, 20.0), &bounds);
    assert!(approx_eq(dx, 5.0));
    assert!(approx_eq(dy, -10.0));
}

#[test]
fn clamp_oversized_pins_to_origin_edge() {
    let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
    let (dx, _) = clamp_offset(&Rect::new(50.0, 0.0, 200.0, 50.0), &bounds);
    assert!(approx_eq(dx, -50.0));
}
