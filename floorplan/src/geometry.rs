//! Rotation-aware geometry kernel.
//!
//! Everything here is pure math over plan coordinates: axis-aligned rects,
//! rotated-rect and circle footprints, the separating-axis intersection test,
//! grid snapping, and canvas clamping. The engine and hit-tester compose these
//! primitives; no module in this crate does trigonometry anywhere else.
//!
//! Angles are degrees, clockwise on the y-down plan canvas, normalised to
//! `[0, 360)` at the doc boundary.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use crate::camera::Point;

/// An axis-aligned rectangle in plan coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Build a rect from its centre point and size.
    #[must_use]
    pub fn from_center(center: Point, width: f64, height: f64) -> Self {
        Self { x: center.x - width * 0.5, y: center.y - height * 0.5, width, height }
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    #[must_use]
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.x && pt.x <= self.x + self.width && pt.y >= self.y && pt.y <= self.y + self.height
    }

    /// Axis-aligned overlap test. Touching edges do not count as overlap.
    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// The collision outline of a table or obstacle.
///
/// Rect footprints carry their own rotation; circles are rotation-invariant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Footprint {
    Rect {
        center: Point,
        width: f64,
        height: f64,
        /// Clockwise rotation in degrees about `center`.
        rotation: f64,
    },
    Circle { center: Point, radius: f64 },
}

impl Footprint {
    /// The footprint translated so its centre lands at `center`.
    #[must_use]
    pub fn at(&self, center: Point) -> Self {
        match *self {
            Self::Rect { width, height, rotation, .. } => Self::Rect { center, width, height, rotation },
            Self::Circle { radius, .. } => Self::Circle { center, radius },
        }
    }

    #[must_use]
    pub fn center(&self) -> Point {
        match *self {
            Self::Rect { center, .. } | Self::Circle { center, .. } => center,
        }
    }

    /// Axis-aligned bounding box, accounting for rotation.
    #[must_use]
    pub fn aabb(&self) -> Rect {
        match *self {
            Self::Rect { center, width, height, rotation } => rotated_aabb(center, width, height, rotation),
            Self::Circle { center, radius } => Rect::from_center(center, radius * 2.0, radius * 2.0),
        }
    }

    /// True when the two footprints overlap.
    #[must_use]
    pub fn intersects(&self, other: &Footprint) -> bool {
        match (*self, *other) {
            (
                Self::Rect { center: ca, width: wa, height: ha, rotation: ra },
                Self::Rect { center: cb, width: wb, height: hb, rotation: rb },
            ) => rotated_rects_intersect(ca, wa, ha, ra, cb, wb, hb, rb),
            (Self::Rect { center, width, height, rotation }, Self::Circle { center: cc, radius })
            | (Self::Circle { center: cc, radius }, Self::Rect { center, width, height, rotation }) => {
                circle_intersects_rotated_rect(cc, radius, center, width, height, rotation)
            }
            (Self::Circle { center: ca, radius: ra }, Self::Circle { center: cb, radius: rb }) => {
                let dx = ca.x - cb.x;
                let dy = ca.y - cb.y;
                let reach = ra + rb;
                dx * dx + dy * dy < reach * reach
            }
        }
    }
}

/// Corners of a `width × height` rectangle rotated by `rotation` degrees
/// clockwise about `center`, in drawing order.
#[must_use]
pub fn rotated_corners(center: Point, width: f64, height: f64, rotation: f64) -> [Point; 4] {
    let (sin, cos) = rotation.to_radians().sin_cos();
    let hw = width * 0.5;
    let hh = height * 0.5;
    let rotate = |lx: f64, ly: f64| Point {
        x: center.x + lx * cos - ly * sin,
        y: center.y + lx * sin + ly * cos,
    };
    [rotate(-hw, -hh), rotate(hw, -hh), rotate(hw, hh), rotate(-hw, hh)]
}

/// Axis-aligned bounding box of a rotated rectangle.
#[must_use]
pub fn rotated_aabb(center: Point, width: f64, height: f64, rotation: f64) -> Rect {
    let (sin, cos) = rotation.to_radians().sin_cos();
    let half_w = (width * cos.abs() + height * sin.abs()) * 0.5;
    let half_h = (width * sin.abs() + height * cos.abs()) * 0.5;
    Rect::from_center(center, half_w * 2.0, half_h * 2.0)
}

/// Express `pt` in the local frame of a rectangle centred at `center` and
/// rotated by `rotation` degrees: translate to the centre, rotate back.
#[must_use]
pub fn to_local_frame(pt: Point, center: Point, rotation: f64) -> Point {
    let (sin, cos) = (-rotation).to_radians().sin_cos();
    let dx = pt.x - center.x;
    let dy = pt.y - center.y;
    Point {
        x: dx * cos - dy * sin,
        y: dx * sin + dy * cos,
    }
}

/// Map a point in a rectangle's local frame back to plan space.
#[must_use]
pub fn from_local_frame(local: Point, center: Point, rotation: f64) -> Point {
    let (sin, cos) = rotation.to_radians().sin_cos();
    Point {
        x: center.x + local.x * cos - local.y * sin,
        y: center.y + local.x * sin + local.y * cos,
    }
}

/// True when `pt` lies inside the rotated rectangle (inclusive of edges).
#[must_use]
pub fn point_in_rotated_rect(pt: Point, center: Point, width: f64, height: f64, rotation: f64) -> bool {
    let local = to_local_frame(pt, center, rotation);
    local.x.abs() <= width * 0.5 && local.y.abs() <= height * 0.5
}

/// Separating-axis test for two rotated rectangles.
///
/// Four candidate axes (two per rectangle). If any axis separates the corner
/// projections the rects do not overlap. Touching exactly counts as separate.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn rotated_rects_intersect(
    ca: Point,
    wa: f64,
    ha: f64,
    ra: f64,
    cb: Point,
    wb: f64,
    hb: f64,
    rb: f64,
) -> bool {
    let corners_a = rotated_corners(ca, wa, ha, ra);
    let corners_b = rotated_corners(cb, wb, hb, rb);
    let axes = [axes_of(ra), axes_of(rb)];

    for [u, v] in axes {
        for axis in [u, v] {
            let (min_a, max_a) = project(&corners_a, axis);
            let (min_b, max_b) = project(&corners_b, axis);
            if max_a <= min_b || max_b <= min_a {
                return false;
            }
        }
    }
    true
}

/// True when a circle overlaps a rotated rectangle.
///
/// Transforms the circle centre into the rect's local frame, clamps to the
/// half-extents to find the nearest rect point, and compares distances.
#[must_use]
pub fn circle_intersects_rotated_rect(
    circle_center: Point,
    radius: f64,
    rect_center: Point,
    width: f64,
    height: f64,
    rotation: f64,
) -> bool {
    let local = to_local_frame(circle_center, rect_center, rotation);
    let nearest_x = local.x.clamp(-width * 0.5, width * 0.5);
    let nearest_y = local.y.clamp(-height * 0.5, height * 0.5);
    let dx = local.x - nearest_x;
    let dy = local.y - nearest_y;
    dx * dx + dy * dy < radius * radius
}

/// Snap `value` to the nearest multiple of `grid`. Half-way rounds away from
/// zero. `grid <= 0` is the identity (snapping disabled).
#[must_use]
pub fn snap_to_grid(value: f64, grid: f64) -> f64 {
    if grid <= 0.0 {
        return value;
    }
    (value / grid).round() * grid
}

/// Normalise an angle in degrees to `[0, 360)`.
#[must_use]
pub fn normalize_deg(deg: f64) -> f64 {
    let wrapped = deg % 360.0;
    if wrapped < 0.0 { wrapped + 360.0 } else { wrapped }
}

/// Snap an angle to the nearest multiple of `step` degrees, normalised.
#[must_use]
pub fn snap_rotation(deg: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return normalize_deg(deg);
    }
    normalize_deg((deg / step).round() * step)
}

/// Offset `(dx, dy)` that moves `aabb` fully inside `bounds`.
///
/// When the box is wider/taller than the bounds it pins to the left/top edge,
/// keeping the result deterministic instead of oscillating.
#[must_use]
pub fn clamp_offset(aabb: &Rect, bounds: &Rect) -> (f64, f64) {
    let dx = if aabb.width > bounds.width {
        bounds.x - aabb.x
    } else if aabb.x < bounds.x {
        bounds.x - aabb.x
    } else if aabb.x + aabb.width > bounds.x + bounds.width {
        (bounds.x + bounds.width) - (aabb.x + aabb.width)
    } else {
        0.0
    };
    let dy = if aabb.height > bounds.height {
        bounds.y - aabb.y
    } else if aabb.y < bounds.y {
        bounds.y - aabb.y
    } else if aabb.y + aabb.height > bounds.y + bounds.height {
        (bounds.y + bounds.height) - (aabb.y + aabb.height)
    } else {
        0.0
    };
    (dx, dy)
}

fn axes_of(rotation: f64) -> [Point; 2] {
    let (sin, cos) = rotation.to_radians().sin_cos();
    [Point::new(cos, sin), Point::new(-sin, cos)]
}

fn project(corners: &[Point; 4], axis: Point) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for corner in corners {
        let d = corner.x * axis.x + corner.y * axis.y;
        min = min.min(d);
        max = max.max(d);
    }
    (min, max)
}
