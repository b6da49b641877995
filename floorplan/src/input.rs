//! Input model: modifier keys, mouse buttons, and the gesture state machine.
//!
//! This module defines the types consumed by the input engine. `Modifiers`
//! captures the user's intent at the time of a pointer event. `InputState` is
//! the active gesture being tracked between pointer-down and pointer-up,
//! carrying all context needed to compute incremental deltas and emit the
//! final document mutation on release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::doc::{TableGeometry, TableId};
use crate::hit::ResizeAnchor;

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    /// Shift key is held (quantises rotation).
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held (suppresses grid snapping).
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

/// A keyboard key.
///
/// The inner string holds the key name as reported by the host (e.g.
/// `"Delete"`, `"Escape"`, `"z"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down).
    pub dy: f64,
}

/// Persistent UI state visible to the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct UiState {
    /// The id of the currently selected table, if any.
    pub selected_id: Option<TableId>,
}

/// Internal state for the input state machine.
///
/// Each active variant carries gesture context needed to compute deltas and
/// emit final actions on pointer-up.
#[derive(Debug, Clone)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    Idle,
    /// The user is panning the canvas by dragging empty space.
    Panning {
        /// Screen-space position of the previous pointer event, used to
        /// compute the pan delta.
        last_screen: Point,
    },
    /// The user is moving a table across the plan.
    DraggingTable {
        /// Id of the table being dragged.
        id: TableId,
        /// Plan-space pointer position at pointer-down.
        start_plan: Point,
        /// Geometry at the start of the drag, used to snap or revert.
        orig: TableGeometry,
        /// Last footprint centre known to be free of obstacles.
        last_free_center: Point,
        /// False when the table already overlapped an obstacle at gesture
        /// start; collision resolution is skipped so it is never trapped.
        avoid_obstacles: bool,
    },
    /// The user is resizing a table by dragging one of its handles.
    ResizingTable {
        /// Id of the table being resized.
        id: TableId,
        /// Which corner/edge handle is being dragged.
        anchor: ResizeAnchor,
        /// Geometry at the start of the resize.
        orig: TableGeometry,
    },
    /// The user is rotating a table by dragging the rotate handle.
    RotatingTable {
        /// Id of the table being rotated.
        id: TableId,
        /// Plan-space centre of the table; the rotation pivot.
        pivot: Point,
        /// Geometry (including rotation) at the start of the gesture.
        orig: TableGeometry,
        /// Angle in degrees from pivot to pointer at gesture start.
        pointer_start_deg: f64,
    },
}

impl InputState {
    /// The table a gesture is operating on, if any.
    #[must_use]
    pub fn gesture_table(&self) -> Option<TableId> {
        match self {
            Self::DraggingTable { id, .. }
            | Self::ResizingTable { id, .. }
            | Self::RotatingTable { id, .. } => Some(*id),
            Self::Idle | Self::Panning { .. } => None,
        }
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::Idle
    }
}
