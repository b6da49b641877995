use crate::camera::{Camera, Point};
use crate::collide;
use crate::consts::{
    MIN_TABLE_RADIUS, MIN_TABLE_SIZE, ROTATION_STEP_DEG, WHEEL_ZOOM_RATE,
};
use crate::doc::{Obstacle, PartialTable, PlanDoc, PlanMeta, Table, TableGeometry, TableId, TableShape};
use crate::geometry::{Footprint, clamp_offset, from_local_frame, snap_rotation, snap_to_grid, to_local_frame};
use crate::hit::{self, HitPart, ResizeAnchor};
use crate::input::{Button, InputState, Key, Modifiers, UiState, WheelDelta};
use crate::saves::{SaveError, SaveId, SaveLedger};
use crate::undo::{UndoEntry, UndoStack};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone)]
pub enum Action {
    /// A gesture committed; the host must persist `fields` and later call
    /// `commit_save` / `fail_save` with `save_id`.
    TableUpdated {
        id: TableId,
        fields: PartialTable,
        save_id: SaveId,
    },
    /// The selected table changed (or was cleared).
    SelectionChanged { id: Option<TableId> },
    /// The host should set the given CSS cursor on the canvas.
    SetCursor(String),
    /// The host should redraw the scene.
    RenderNeeded,
}

/// Core engine state for the floorplan editor.
///
/// Sans-IO by construction: the host feeds pointer/wheel/key events already
/// translated into plain types and ships the returned [`Action`]s to the
/// server. Everything here is testable without a UI runtime.
pub struct EngineCore {
    pub doc: PlanDoc,
    pub camera: Camera,
    pub ui: UiState,
    pub input: InputState,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub dpr: f64,
    saves: SaveLedger,
    undo: UndoStack,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self {
            doc: PlanDoc::new(),
            camera: Camera::default(),
            ui: UiState::default(),
            input: InputState::default(),
            viewport_width: 0.0,
            viewport_height: 0.0,
            dpr: 1.0,
            saves: SaveLedger::new(),
            undo: UndoStack::new(),
        }
    }
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Data inputs ---

    /// Hydrate the document from a server snapshot. Clears gesture state, the
    /// undo stack, and the save ledger; every table's geometry becomes the
    /// acknowledged rollback state.
    pub fn load_snapshot(&mut self, meta: PlanMeta, tables: Vec<Table>, obstacles: Vec<Obstacle>) {
        self.doc.load_snapshot(meta, tables, obstacles);
        self.input = InputState::Idle;
        self.undo.clear();
        self.saves.clear();
        let acked: Vec<(TableId, TableGeometry)> = self
            .doc
            .sorted_tables()
            .iter()
            .map(|t| (t.id, TableGeometry::of(t)))
            .collect();
        for (id, geometry) in acked {
            self.saves.ack(id, geometry);
        }
        if let Some(selected) = self.ui.selected_id {
            if self.doc.get(&selected).is_none() {
                self.ui.selected_id = None;
            }
        }
    }

    /// Apply a server broadcast: table created.
    pub fn apply_create(&mut self, table: Table) {
        self.saves.ack(table.id, TableGeometry::of(&table));
        self.doc.insert(table);
    }

    /// Apply a server broadcast: table updated.
    pub fn apply_update(&mut self, id: &TableId, fields: &PartialTable) {
        if self.doc.apply_partial(id, fields) {
            if let Some(table) = self.doc.get(id) {
                self.saves.ack(*id, TableGeometry::of(table));
            }
        }
    }

    /// Apply a server broadcast: table deleted.
    pub fn apply_delete(&mut self, id: &TableId) {
        self.doc.remove(id);
        self.saves.forget(id);
        self.undo.forget(id);
        if self.ui.selected_id.as_ref() == Some(id) {
            self.ui.selected_id = None;
        }
        if self.input.gesture_table().as_ref() == Some(id) {
            self.input = InputState::Idle;
        }
    }

    // --- Viewport ---

    /// Update viewport dimensions and device pixel ratio.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.viewport_width = width_css.max(1.0);
        self.viewport_height = height_css.max(1.0);
        self.dpr = dpr.max(1.0);
    }

    /// Centre the whole plan in the viewport at the largest zoom that fits.
    pub fn fit_view(&mut self) {
        let meta = self.doc.meta();
        let (plan_w, plan_h) = (meta.width, meta.height);
        self.camera
            .fit_to_plan(self.viewport_width, self.viewport_height, plan_w, plan_h);
    }

    // --- Selection ---

    /// Select a table (or clear the selection) from outside the canvas, e.g.
    /// from the table list form.
    pub fn select(&mut self, id: Option<TableId>) -> Vec<Action> {
        if self.ui.selected_id == id {
            return Vec::new();
        }
        self.ui.selected_id = id;
        vec![Action::SelectionChanged { id }, Action::RenderNeeded]
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, _modifiers: Modifiers) -> Vec<Action> {
        if button == Button::Middle {
            self.input = InputState::Panning { last_screen: screen_pt };
            return vec![Action::SetCursor("grabbing".into())];
        }
        if button != Button::Primary {
            return Vec::new();
        }

        let plan_pt = self.camera.screen_to_plan(screen_pt);
        let mut actions = Vec::new();

        let Some(hit) = hit::hit_test(plan_pt, &self.doc, &self.camera, self.ui.selected_id) else {
            if self.ui.selected_id.is_some() {
                self.ui.selected_id = None;
                actions.push(Action::SelectionChanged { id: None });
            }
            self.input = InputState::Panning { last_screen: screen_pt };
            actions.push(Action::SetCursor("grab".into()));
            actions.push(Action::RenderNeeded);
            return actions;
        };

        if self.ui.selected_id != Some(hit.table_id) {
            self.ui.selected_id = Some(hit.table_id);
            actions.push(Action::SelectionChanged { id: Some(hit.table_id) });
        }

        let Some(table) = self.doc.get(&hit.table_id) else {
            return actions;
        };

        if table.locked {
            // Locked tables can be selected but not manipulated.
            actions.push(Action::SetCursor("not-allowed".into()));
            actions.push(Action::RenderNeeded);
            return actions;
        }

        let orig = TableGeometry::of(table);
        match hit.part {
            HitPart::Body => {
                let avoid_obstacles = !collide::collides_any(&table.footprint(), self.doc.obstacles());
                self.input = InputState::DraggingTable {
                    id: hit.table_id,
                    start_plan: plan_pt,
                    orig,
                    last_free_center: table.center(),
                    avoid_obstacles,
                };
                actions.push(Action::SetCursor("grabbing".into()));
            }
            HitPart::ResizeHandle(anchor) => {
                self.input = InputState::ResizingTable { id: hit.table_id, anchor, orig };
                actions.push(Action::SetCursor(resize_cursor(anchor).into()));
            }
            HitPart::RotateHandle => {
                let pivot = table.center();
                self.input = InputState::RotatingTable {
                    id: hit.table_id,
                    pivot,
                    orig,
                    pointer_start_deg: angle_deg(pivot, plan_pt),
                };
                actions.push(Action::SetCursor("grabbing".into()));
            }
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point, modifiers: Modifiers) -> Vec<Action> {
        let state = std::mem::replace(&mut self.input, InputState::Idle);
        match state {
            InputState::Idle => Vec::new(),
            InputState::Panning { last_screen } => {
                self.camera.pan_x += screen_pt.x - last_screen.x;
                self.camera.pan_y += screen_pt.y - last_screen.y;
                self.input = InputState::Panning { last_screen: screen_pt };
                vec![Action::RenderNeeded]
            }
            InputState::DraggingTable { id, start_plan, orig, last_free_center, avoid_obstacles } => {
                let plan_pt = self.camera.screen_to_plan(screen_pt);
                let Some(table) = self.doc.get(&id) else {
                    return Vec::new();
                };
                let shape = table.shape;

                // 1. pointer delta, applied to the gesture-start geometry
                let mut x = orig.x + (plan_pt.x - start_plan.x);
                let mut y = orig.y + (plan_pt.y - start_plan.y);

                // 2. grid snap of the proposed top-left (Alt suppresses)
                let grid = self.doc.meta().grid_size;
                if table.snap_to_grid && !modifiers.alt {
                    x = snap_to_grid(x, grid);
                    y = snap_to_grid(y, grid);
                }

                // 3. rotation-aware clamp into the canvas
                let mut center = Point::new(x + orig.width * 0.5, y + orig.height * 0.5);
                let footprint = footprint_at(shape, &orig, center);
                let (dx, dy) = clamp_offset(&footprint.aabb(), &self.doc.bounds());
                center = Point::new(center.x + dx, center.y + dy);

                // 4. obstacle avoidance along the drag vector
                if avoid_obstacles {
                    center = collide::resolve_drag(
                        &footprint.at(center),
                        last_free_center,
                        center,
                        self.doc.obstacles(),
                    );
                }

                let geometry = TableGeometry {
                    x: center.x - orig.width * 0.5,
                    y: center.y - orig.height * 0.5,
                    ..orig
                };
                self.doc.set_geometry(&id, &geometry);
                self.input = InputState::DraggingTable {
                    id,
                    start_plan,
                    orig,
                    last_free_center: center,
                    avoid_obstacles,
                };
                vec![Action::RenderNeeded]
            }
            InputState::ResizingTable { id, anchor, orig } => {
                let plan_pt = self.camera.screen_to_plan(screen_pt);
                let Some(table) = self.doc.get(&id) else {
                    return Vec::new();
                };
                let shape = table.shape;
                let geometry = match shape {
                    TableShape::Rect => resize_rect(&orig, anchor, plan_pt),
                    TableShape::Round => resize_round(&orig, plan_pt),
                };

                // Clamp the resized footprint back into the canvas.
                let center = Point::new(geometry.x + geometry.width * 0.5, geometry.y + geometry.height * 0.5);
                let footprint = footprint_at(shape, &geometry, center);
                let (dx, dy) = clamp_offset(&footprint.aabb(), &self.doc.bounds());
                let geometry = TableGeometry { x: geometry.x + dx, y: geometry.y + dy, ..geometry };

                self.doc.set_geometry(&id, &geometry);
                self.input = InputState::ResizingTable { id, anchor, orig };
                vec![Action::RenderNeeded]
            }
            InputState::RotatingTable { id, pivot, orig, pointer_start_deg } => {
                let plan_pt = self.camera.screen_to_plan(screen_pt);
                let delta = angle_deg(pivot, plan_pt) - pointer_start_deg;
                let rotation = if modifiers.shift {
                    snap_rotation(orig.rotation + delta, ROTATION_STEP_DEG)
                } else {
                    orig.rotation + delta
                };

                let mut geometry = TableGeometry { rotation, ..orig };
                // Rotating near an edge can push the bounding box outside.
                if let Some(table) = self.doc.get(&id) {
                    let center = Point::new(geometry.x + geometry.width * 0.5, geometry.y + geometry.height * 0.5);
                    let footprint = footprint_at(table.shape, &geometry, center);
                    let (dx, dy) = clamp_offset(&footprint.aabb(), &self.doc.bounds());
                    geometry = TableGeometry { x: geometry.x + dx, y: geometry.y + dy, ..geometry };
                }

                self.doc.set_geometry(&id, &geometry);
                self.input = InputState::RotatingTable { id, pivot, orig, pointer_start_deg };
                vec![Action::RenderNeeded]
            }
        }
    }

    pub fn on_pointer_up(&mut self, _screen_pt: Point, _button: Button, _modifiers: Modifiers) -> Vec<Action> {
        let state = std::mem::replace(&mut self.input, InputState::Idle);
        match state {
            InputState::Idle => Vec::new(),
            InputState::Panning { .. } => {
                vec![Action::SetCursor("default".into())]
            }
            InputState::DraggingTable { id, orig, .. } => self.commit_gesture(id, orig, false),
            InputState::ResizingTable { id, orig, .. } | InputState::RotatingTable { id, orig, .. } => {
                // Resize/rotate reject a colliding end state instead of sliding.
                self.commit_gesture(id, orig, true)
            }
        }
    }

    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, _modifiers: Modifiers) -> Vec<Action> {
        let factor = (-delta.dy * WHEEL_ZOOM_RATE).exp();
        self.camera.zoom_about(screen_pt, factor);
        vec![Action::RenderNeeded]
    }

    pub fn on_key_down(&mut self, key: Key, modifiers: Modifiers) -> Vec<Action> {
        match key.0.as_str() {
            "Escape" => self.cancel_gesture(),
            "z" | "Z" if modifiers.ctrl || modifiers.meta => self.undo(),
            _ => Vec::new(),
        }
    }

    // --- Gestures ---

    /// Abort the active gesture, restoring the gesture-start geometry.
    pub fn cancel_gesture(&mut self) -> Vec<Action> {
        let state = std::mem::replace(&mut self.input, InputState::Idle);
        let (id, orig) = match state {
            InputState::DraggingTable { id, orig, .. }
            | InputState::ResizingTable { id, orig, .. }
            | InputState::RotatingTable { id, orig, .. } => (id, orig),
            InputState::Idle | InputState::Panning { .. } => return Vec::new(),
        };
        self.doc.set_geometry(&id, &orig);
        vec![Action::SetCursor("default".into()), Action::RenderNeeded]
    }

    /// Undo the most recent committed gesture. The revert is itself an
    /// optimistic save the host must persist.
    pub fn undo(&mut self) -> Vec<Action> {
        let Some(entry) = self.undo.pop() else {
            return Vec::new();
        };
        let Some(table) = self.doc.get(&entry.table_id) else {
            return Vec::new();
        };
        let current = TableGeometry::of(table);
        let restored = TableGeometry { version: current.version + 1, ..entry.before };
        self.doc.apply_partial(&entry.table_id, &restored.to_partial());
        let save_id = self.saves.begin(entry.table_id, current, restored);
        vec![
            Action::TableUpdated { id: entry.table_id, fields: restored.to_partial(), save_id },
            Action::RenderNeeded,
        ]
    }

    // --- Saves ---

    /// The server acknowledged an optimistic save. Returns false for unknown
    /// save ids.
    pub fn commit_save(&mut self, save_id: &SaveId) -> bool {
        self.saves.commit(save_id).is_some()
    }

    /// An optimistic save failed. Rolls the table back to the last
    /// acknowledged geometry and returns the classified error for display.
    pub fn fail_save(&mut self, save_id: &SaveId, code: Option<&str>) -> Option<SaveError> {
        let rollback = self.saves.fail(save_id, code)?;
        if self.input.gesture_table() == Some(rollback.table_id) {
            self.input = InputState::Idle;
        }
        self.doc
            .apply_partial(&rollback.table_id, &rollback.restore.to_partial());
        Some(rollback.error)
    }

    // --- Queries ---

    /// The currently selected table, if any.
    #[must_use]
    pub fn selection(&self) -> Option<TableId> {
        self.ui.selected_id
    }

    /// The current camera state.
    #[must_use]
    pub fn camera(&self) -> Camera {
        self.camera
    }

    /// Look up a table by ID.
    #[must_use]
    pub fn table(&self, id: &TableId) -> Option<&Table> {
        self.doc.get(id)
    }

    /// Number of saves awaiting a server response.
    #[must_use]
    pub fn saves_in_flight(&self) -> usize {
        self.saves.in_flight()
    }

    /// Number of gestures available to undo.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    // --- Internals ---

    fn commit_gesture(&mut self, id: TableId, orig: TableGeometry, reject_collision: bool) -> Vec<Action> {
        let mut actions = vec![Action::SetCursor("default".into()), Action::RenderNeeded];
        let Some(table) = self.doc.get(&id) else {
            return actions;
        };
        let shape = table.shape;
        let current = TableGeometry::of(table);

        if !geometry_differs(&current, &orig) {
            return actions;
        }

        if reject_collision {
            let center = Point::new(current.x + current.width * 0.5, current.y + current.height * 0.5);
            let ends_colliding = collide::collides_any(&footprint_at(shape, &current, center), self.doc.obstacles());
            let orig_center = Point::new(orig.x + orig.width * 0.5, orig.y + orig.height * 0.5);
            let started_colliding =
                collide::collides_any(&footprint_at(shape, &orig, orig_center), self.doc.obstacles());
            if ends_colliding && !started_colliding {
                self.doc.set_geometry(&id, &orig);
                return actions;
            }
        }

        let committed = TableGeometry { version: orig.version + 1, ..current };
        self.doc.apply_partial(&id, &committed.to_partial());
        self.undo.push(UndoEntry { table_id: id, before: orig });
        let save_id = self.saves.begin(id, orig, committed);
        actions.insert(0, Action::TableUpdated { id, fields: committed.to_partial(), save_id });
        actions
    }
}

/// Build a footprint for `shape` with `geometry`'s size at `center`.
fn footprint_at(shape: TableShape, geometry: &TableGeometry, center: Point) -> Footprint {
    match shape {
        TableShape::Rect => Footprint::Rect {
            center,
            width: geometry.width,
            height: geometry.height,
            rotation: geometry.rotation,
        },
        TableShape::Round => Footprint::Circle {
            center,
            radius: geometry.radius.unwrap_or(geometry.width * 0.5),
        },
    }
}

/// Anchor-opposite-corner resize in the table's local rotated frame.
///
/// The edge or corner under the pointer follows it; the opposite edge/corner
/// stays fixed. Axes the anchor does not touch keep their original extent.
fn resize_rect(orig: &TableGeometry, anchor: ResizeAnchor, plan_pt: Point) -> TableGeometry {
    let orig_center = Point::new(orig.x + orig.width * 0.5, orig.y + orig.height * 0.5);
    let local = to_local_frame(plan_pt, orig_center, orig.rotation);
    let (sx, sy) = anchor.local_sign();

    let (width, cx_local) = if sx == 0.0 {
        (orig.width, 0.0)
    } else {
        let fixed = -sx * orig.width * 0.5;
        let extent = ((local.x - fixed) * sx).max(MIN_TABLE_SIZE);
        (extent, fixed + sx * extent * 0.5)
    };
    let (height, cy_local) = if sy == 0.0 {
        (orig.height, 0.0)
    } else {
        let fixed = -sy * orig.height * 0.5;
        let extent = ((local.y - fixed) * sy).max(MIN_TABLE_SIZE);
        (extent, fixed + sy * extent * 0.5)
    };

    let center = from_local_frame(Point::new(cx_local, cy_local), orig_center, orig.rotation);
    TableGeometry {
        x: center.x - width * 0.5,
        y: center.y - height * 0.5,
        width,
        height,
        ..*orig
    }
}

/// Uniform radius resize for round tables; the centre stays put.
fn resize_round(orig: &TableGeometry, plan_pt: Point) -> TableGeometry {
    let center = Point::new(orig.x + orig.width * 0.5, orig.y + orig.height * 0.5);
    let local = to_local_frame(plan_pt, center, orig.rotation);
    let radius = local.x.abs().max(local.y.abs()).max(MIN_TABLE_RADIUS);
    TableGeometry {
        x: center.x - radius,
        y: center.y - radius,
        width: radius * 2.0,
        height: radius * 2.0,
        radius: Some(radius),
        ..*orig
    }
}

fn geometry_differs(a: &TableGeometry, b: &TableGeometry) -> bool {
    a.x != b.x
        || a.y != b.y
        || a.width != b.width
        || a.height != b.height
        || a.radius != b.radius
        || a.rotation != b.rotation
}

fn angle_deg(from: Point, to: Point) -> f64 {
    (to.y - from.y).atan2(to.x - from.x).to_degrees()
}

/// CSS cursor for a resize anchor, accounting for nothing fancier than the
/// four cardinal/diagonal pairs.
fn resize_cursor(anchor: ResizeAnchor) -> &'static str {
    match anchor {
        ResizeAnchor::N | ResizeAnchor::S => "ns-resize",
        ResizeAnchor::E | ResizeAnchor::W => "ew-resize",
        ResizeAnchor::Ne | ResizeAnchor::Sw => "nesw-resize",
        ResizeAnchor::Se | ResizeAnchor::Nw => "nwse-resize",
    }
}
