#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::camera::{Camera, Point};
use crate::consts::{HANDLE_RADIUS_PX, ROTATE_HANDLE_OFFSET_PX};
use crate::doc::{PlanDoc, Table, TableId, TableShape};
use crate::geometry::{from_local_frame, point_in_rotated_rect};

/// Which part of a table was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    Body,
    ResizeHandle(ResizeAnchor),
    RotateHandle,
}

/// Anchor position for resize handles, named for compass directions in the
/// table's local (unrotated) frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAnchor {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl ResizeAnchor {
    /// All eight anchors, corners first (corner handles win ties on hit).
    pub const ALL: [Self; 8] = [
        Self::Ne,
        Self::Se,
        Self::Sw,
        Self::Nw,
        Self::N,
        Self::E,
        Self::S,
        Self::W,
    ];

    /// The four corner anchors. Round tables resize uniformly, so only these
    /// are exposed for them.
    pub const CORNERS: [Self; 4] = [Self::Ne, Self::Se, Self::Sw, Self::Nw];

    /// Direction of this anchor in the table's local frame, componentwise in
    /// `{-1, 0, 1}`. `x` grows rightward, `y` grows downward.
    #[must_use]
    pub fn local_sign(self) -> (f64, f64) {
        match self {
            Self::N => (0.0, -1.0),
            Self::Ne => (1.0, -1.0),
            Self::E => (1.0, 0.0),
            Self::Se => (1.0, 1.0),
            Self::S => (0.0, 1.0),
            Self::Sw => (-1.0, 1.0),
            Self::W => (-1.0, 0.0),
            Self::Nw => (-1.0, -1.0),
        }
    }
}

/// Result of a hit test.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub table_id: TableId,
    pub part: HitPart,
}

/// Plan-space position of a resize handle on a table's rotated outline.
#[must_use]
pub fn handle_position(table: &Table, anchor: ResizeAnchor) -> Point {
    let (sx, sy) = anchor.local_sign();
    let local = Point::new(sx * table.width * 0.5, sy * table.height * 0.5);
    from_local_frame(local, table.center(), table.rotation)
}

/// Plan-space position of the rotate handle: floating above the top edge
/// midpoint, at a fixed *screen* distance so it stays reachable at any zoom.
#[must_use]
pub fn rotate_handle_position(table: &Table, camera: &Camera) -> Point {
    let offset = camera.screen_dist_to_plan(ROTATE_HANDLE_OFFSET_PX);
    let local = Point::new(0.0, -table.height * 0.5 - offset);
    from_local_frame(local, table.center(), table.rotation)
}

/// Test which table (if any) is under `plan_pt`.
///
/// The selected table's handles are checked before any body so that grabbing
/// a handle wins even when another table overlaps it. Bodies are checked in
/// descending z-order (topmost first).
#[must_use]
pub fn hit_test(plan_pt: Point, doc: &PlanDoc, camera: &Camera, selected_id: Option<TableId>) -> Option<Hit> {
    let slop = camera.screen_dist_to_plan(HANDLE_RADIUS_PX);

    if let Some(selected) = selected_id.and_then(|id| doc.get(&id)) {
        if dist(plan_pt, rotate_handle_position(selected, camera)) <= slop {
            return Some(Hit { table_id: selected.id, part: HitPart::RotateHandle });
        }
        let anchors: &[ResizeAnchor] = match selected.shape {
            TableShape::Rect => &ResizeAnchor::ALL,
            TableShape::Round => &ResizeAnchor::CORNERS,
        };
        for &anchor in anchors {
            if dist(plan_pt, handle_position(selected, anchor)) <= slop {
                return Some(Hit { table_id: selected.id, part: HitPart::ResizeHandle(anchor) });
            }
        }
    }

    for table in doc.sorted_tables().into_iter().rev() {
        if table_body_contains(table, plan_pt) {
            return Some(Hit { table_id: table.id, part: HitPart::Body });
        }
    }
    None
}

fn table_body_contains(table: &Table, pt: Point) -> bool {
    match table.shape {
        TableShape::Rect => {
            point_in_rotated_rect(pt, table.center(), table.width, table.height, table.rotation)
        }
        TableShape::Round => {
            let radius = table.radius.unwrap_or(table.width * 0.5);
            dist(pt, table.center()) <= radius
        }
    }
}

fn dist(a: Point, b: Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}
