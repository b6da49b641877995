#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-10;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

// --- Defaults ---

#[test]
fn camera_default_is_identity() {
    let cam = Camera::default();
    assert_eq!(cam.pan_x, 0.0);
    assert_eq!(cam.pan_y, 0.0);
    assert_eq!(cam.zoom, 1.0);
}

// --- screen_to_plan ---

#[test]
fn screen_to_plan_identity() {
    let cam = Camera::default();
    let plan = cam.screen_to_plan(Point::new(50.0, 75.0));
    assert!(point_approx_eq(plan, Point::new(50.0, 75.0)));
}

#[test]
fn screen_to_plan_with_zoom() {
    let cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 4.0 };
    let plan = cam.screen_to_plan(Point::new(40.0, 80.0));
    assert!(approx_eq(plan.x, 10.0));
    assert!(approx_eq(plan.y, 20.0));
}

#[test]
fn screen_to_plan_with_pan_and_zoom() {
    let cam = Camera { pan_x: 20.0, pan_y: 10.0, zoom: 2.0 };
    let plan = cam.screen_to_plan(Point::new(20.0, 10.0));
    assert!(point_approx_eq(plan, Point::new(0.0, 0.0)));
}

// --- plan_to_screen ---

#[test]
fn plan_to_screen_with_pan_and_zoom() {
    let cam = Camera { pan_x: 20.0, pan_y: 10.0, zoom: 3.0 };
    let screen = cam.plan_to_screen(Point::new(5.0, 5.0));
    assert!(approx_eq(screen.x, 35.0));
    assert!(approx_eq(screen.y, 25.0));
}

// --- Round trips ---

#[test]
fn round_trip_with_pan_and_zoom() {
    let cam = Camera { pan_x: 50.0, pan_y: -30.0, zoom: 2.0 };
    let plan = Point::new(100.0, 200.0);
    let back = cam.screen_to_plan(cam.plan_to_screen(plan));
    assert!(point_approx_eq(plan, back));
}

#[test]
fn round_trip_fractional_zoom() {
    let cam = Camera { pan_x: 13.7, pan_y: -42.3, zoom: 0.75 };
    let plan = Point::new(333.3, -999.9);
    let back = cam.screen_to_plan(cam.plan_to_screen(plan));
    assert!(point_approx_eq(plan, back));
}

// --- screen_dist_to_plan ---

#[test]
fn screen_dist_scales_with_zoom() {
    let cam = Camera { pan_x: 999.0, pan_y: -999.0, zoom: 4.0 };
    assert!(approx_eq(cam.screen_dist_to_plan(8.0), 2.0));
}

// --- fit_to_plan ---

#[test]
fn fit_centers_a_smaller_plan() {
    let mut cam = Camera::default();
    cam.fit_to_plan(1000.0, 800.0, 500.0, 400.0);
    assert!(approx_eq(cam.zoom, 2.0));
    assert!(approx_eq(cam.pan_x, 0.0));
    assert!(approx_eq(cam.pan_y, 0.0));
}

#[test]
fn fit_letterboxes_on_the_narrow_axis() {
    let mut cam = Camera::default();
    cam.fit_to_plan(1000.0, 500.0, 1000.0, 1000.0);
    assert!(approx_eq(cam.zoom, 0.5));
    // Plan is 500px wide on screen; centred horizontally.
    assert!(approx_eq(cam.pan_x, 250.0));
    assert!(approx_eq(cam.pan_y, 0.0));
}

#[test]
fn fit_clamps_to_zoom_limits() {
    let mut cam = Camera::default();
    cam.fit_to_plan(10.0, 10.0, 10_000.0, 10_000.0);
    assert!(approx_eq(cam.zoom, crate::consts::ZOOM_MIN));
}

#[test]
fn fit_ignores_degenerate_dimensions() {
    let mut cam = Camera { pan_x: 7.0, pan_y: 8.0, zoom: 3.0 };
    cam.fit_to_plan(1000.0, 800.0, 0.0, 400.0);
    assert!(approx_eq(cam.zoom, 3.0));
    assert!(approx_eq(cam.pan_x, 7.0));
}

// --- zoom_about ---

#[test]
fn zoom_about_keeps_anchor_fixed() {
    let mut cam = Camera { pan_x: 30.0, pan_y: -10.0, zoom: 1.0 };
    let anchor = Point::new(200.0, 150.0);
    let before = cam.screen_to_plan(anchor);
    cam.zoom_about(anchor, 2.0);
    let after = cam.screen_to_plan(anchor);
    assert!(point_approx_eq(before, after));
    assert!(approx_eq(cam.zoom, 2.0));
}

#[test]
fn zoom_about_clamps_at_max() {
    let mut cam = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 8.0 };
    cam.zoom_about(Point::new(0.0, 0.0), 100.0);
    assert!(approx_eq(cam.zoom, crate::consts::ZOOM_MAX));
}
