//! Shared numeric constants for the floorplan engine.

// ── Hit-testing ─────────────────────────────────────────────────

/// Screen-space hit slop in pixels for resize/rotate handles.
pub const HANDLE_RADIUS_PX: f64 = 8.0;

/// Distance from the bounding box edge to the rotate handle, in screen pixels.
pub const ROTATE_HANDLE_OFFSET_PX: f64 = 24.0;

// ── Geometry limits ─────────────────────────────────────────────

/// Smallest width/height a rectangular table can be resized to, in plan units.
pub const MIN_TABLE_SIZE: f64 = 20.0;

/// Smallest radius a round table can be resized to, in plan units.
pub const MIN_TABLE_RADIUS: f64 = 10.0;

/// Rotation quantum in degrees while Shift is held.
pub const ROTATION_STEP_DEG: f64 = 15.0;

// ── Camera ──────────────────────────────────────────────────────

/// Minimum camera zoom factor.
pub const ZOOM_MIN: f64 = 0.1;

/// Maximum camera zoom factor.
pub const ZOOM_MAX: f64 = 10.0;

/// Wheel-delta-to-zoom sensitivity (multiplier per scrolled pixel).
pub const WHEEL_ZOOM_RATE: f64 = 0.0015;

// ── Collision ───────────────────────────────────────────────────

/// Bisection steps when resolving a colliding drag position. Each step halves
/// the uncertain span, so 24 steps land within canvas-subpixel error.
pub const COLLISION_SEARCH_ITERS: u32 = 24;

// ── Undo ────────────────────────────────────────────────────────

/// Maximum committed gestures retained on the undo stack.
pub const UNDO_DEPTH: usize = 64;
