//! Document model: tables, obstacles, plan metadata, and the in-memory store.
//!
//! This module defines the core data types describing what is on the floorplan
//! (`Table`, `TableShape`, `Obstacle`), a sparse-update type for incremental
//! edits (`PartialTable`), a compact geometry snapshot used by the save ledger
//! and undo stack (`TableGeometry`), and the runtime store owning the active
//! plan (`PlanDoc`).
//!
//! Data flows into this layer from the network (JSON deserialization) and from
//! the input engine (mutations). Draw order comes from `sorted_tables`.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::camera::Point;
use crate::geometry::{Footprint, Rect, normalize_deg};

/// Unique identifier for a table.
pub type TableId = Uuid;

/// The shape of a table's collision footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableShape {
    /// Rectangle, possibly rotated about its centre.
    Rect,
    /// Circle; `radius` is authoritative and the bounding box tracks it.
    Round,
}

/// A table as stored in the document and on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Unique identifier for this table.
    pub id: TableId,
    /// The floorplan this table belongs to.
    pub floorplan_id: Uuid,
    /// Zone assignment, if any.
    pub zone_id: Option<Uuid>,
    /// Display name shown on the table ("T12", "Patio 3", ...).
    pub name: String,
    /// Smallest party this table seats.
    pub min_covers: i32,
    /// Largest party this table seats.
    pub max_covers: i32,
    /// Collision footprint shape.
    pub shape: TableShape,
    /// Left edge of the bounding box in plan coordinates.
    pub x: f64,
    /// Top edge of the bounding box in plan coordinates.
    pub y: f64,
    /// Width of the bounding box in plan units.
    pub width: f64,
    /// Height of the bounding box in plan units.
    pub height: f64,
    /// Radius in plan units. `Some` only for round tables.
    pub radius: Option<f64>,
    /// Clockwise rotation in degrees around the bounding-box centre.
    pub rotation: f64,
    /// Locked tables cannot be moved, resized, or rotated by drag.
    pub locked: bool,
    /// Whether drag positions snap to the floorplan grid.
    pub snap_to_grid: bool,
    /// Stacking order; lower values draw beneath higher values.
    pub z_index: i32,
    /// Open-ended styling bag (fill, stroke, seat markers, ...).
    pub props: serde_json::Value,
    /// Monotonically increasing edit counter used for conflict detection.
    pub version: i32,
}

impl Table {
    /// Centre of the bounding box.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// The collision footprint at the table's current position.
    #[must_use]
    pub fn footprint(&self) -> Footprint {
        match self.shape {
            TableShape::Rect => Footprint::Rect {
                center: self.center(),
                width: self.width,
                height: self.height,
                rotation: self.rotation,
            },
            TableShape::Round => Footprint::Circle {
                center: self.center(),
                radius: self.radius.unwrap_or(self.width * 0.5),
            },
        }
    }
}

/// A no-go zone on the floorplan. Tables may never come to rest overlapping one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: Uuid,
    /// Display name ("Bar", "Service corridor", ...).
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Clockwise rotation in degrees around the centre.
    pub rotation: f64,
}

impl Obstacle {
    #[must_use]
    pub fn footprint(&self) -> Footprint {
        Footprint::Rect {
            center: Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5),
            width: self.width,
            height: self.height,
            rotation: self.rotation,
        }
    }
}

/// Floorplan metadata the engine needs for clamping and snapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMeta {
    pub id: Uuid,
    pub name: String,
    /// Canvas width in plan units.
    pub width: f64,
    /// Canvas height in plan units.
    pub height: f64,
    /// Grid cell size in plan units. `0` disables snapping plan-wide.
    pub grid_size: f64,
    /// Optional background image the host draws beneath the plan.
    pub background_image_url: Option<String>,
}

impl Default for PlanMeta {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            name: String::new(),
            width: 1000.0,
            height: 700.0,
            grid_size: 25.0,
            background_image_url: None,
        }
    }
}

/// Sparse update for a table. Only present fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialTable {
    /// New x position, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// New y position, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// New width, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// New height, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// New radius, if being updated (round tables).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    /// New rotation in degrees, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    /// New display name, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New locked flag, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    /// New snap flag, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap_to_grid: Option<bool>,
    /// New z-index, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
    /// Props keys to merge or remove (null values delete keys).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<serde_json::Value>,
    /// New version counter, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

/// The geometry fields of a table, captured at a point in time.
///
/// Small enough to copy freely; the save ledger and undo stack store these
/// instead of whole tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub radius: Option<f64>,
    pub rotation: f64,
    pub version: i32,
}

impl TableGeometry {
    /// Capture the current geometry of a table.
    #[must_use]
    pub fn of(table: &Table) -> Self {
        Self {
            x: table.x,
            y: table.y,
            width: table.width,
            height: table.height,
            radius: table.radius,
            rotation: table.rotation,
            version: table.version,
        }
    }

    /// Sparse update carrying every geometry field of this snapshot.
    #[must_use]
    pub fn to_partial(self) -> PartialTable {
        PartialTable {
            x: Some(self.x),
            y: Some(self.y),
            width: Some(self.width),
            height: Some(self.height),
            radius: self.radius,
            rotation: Some(self.rotation),
            version: Some(self.version),
            ..PartialTable::default()
        }
    }
}

/// In-memory store for the active floorplan.
pub struct PlanDoc {
    meta: PlanMeta,
    tables: HashMap<TableId, Table>,
    obstacles: Vec<Obstacle>,
}

impl PlanDoc {
    /// Create an empty store with default plan metadata.
    #[must_use]
    pub fn new() -> Self {
        Self { meta: PlanMeta::default(), tables: HashMap::new(), obstacles: Vec::new() }
    }

    /// The active plan's metadata.
    #[must_use]
    pub fn meta(&self) -> &PlanMeta {
        &self.meta
    }

    /// The canvas as a rect at the plan origin.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.meta.width, self.meta.height)
    }

    /// Obstacles on the active plan.
    #[must_use]
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Insert or replace a table. An existing table with the same `id` is
    /// overwritten.
    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.id, table);
    }

    /// Remove a table by id, returning it if it was present.
    pub fn remove(&mut self, id: &TableId) -> Option<Table> {
        self.tables.remove(id)
    }

    /// Return a reference to a table by id.
    #[must_use]
    pub fn get(&self, id: &TableId) -> Option<&Table> {
        self.tables.get(id)
    }

    /// Overwrite a table's geometry in place, without touching the version.
    ///
    /// Gesture previews call this on every pointer-move; the version bump
    /// happens once, when the gesture commits.
    pub fn set_geometry(&mut self, id: &TableId, geometry: &TableGeometry) -> bool {
        let Some(table) = self.tables.get_mut(id) else {
            return false;
        };
        table.x = geometry.x;
        table.y = geometry.y;
        table.width = geometry.width;
        table.height = geometry.height;
        table.radius = geometry.radius;
        table.rotation = normalize_deg(geometry.rotation);
        true
    }

    /// Apply a partial update to an existing table. Returns false if the table
    /// doesn't exist or the props payload is not an object.
    pub fn apply_partial(&mut self, id: &TableId, partial: &PartialTable) -> bool {
        let Some(table) = self.tables.get_mut(id) else {
            return false;
        };
        if let Some(x) = partial.x {
            table.x = x;
        }
        if let Some(y) = partial.y {
            table.y = y;
        }
        if let Some(w) = partial.width {
            table.width = w;
        }
        if let Some(h) = partial.height {
            table.height = h;
        }
        if let Some(r) = partial.radius {
            table.radius = Some(r);
            // Round tables keep their bounding box tracking the radius.
            if table.shape == TableShape::Round {
                table.width = r * 2.0;
                table.height = r * 2.0;
            }
        }
        if let Some(rot) = partial.rotation {
            table.rotation = normalize_deg(rot);
        }
        if let Some(ref name) = partial.name {
            table.name = name.clone();
        }
        if let Some(locked) = partial.locked {
            table.locked = locked;
        }
        if let Some(snap) = partial.snap_to_grid {
            table.snap_to_grid = snap;
        }
        if let Some(z) = partial.z_index {
            table.z_index = z;
        }
        if let Some(v) = partial.version {
            table.version = v;
        }
        if let Some(ref props) = partial.props {
            let Some(incoming) = props.as_object() else {
                return false;
            };

            if !table.props.is_object() {
                table.props = serde_json::json!({});
            }

            if let Some(existing) = table.props.as_object_mut() {
                for (k, v) in incoming {
                    if v.is_null() {
                        existing.remove(k);
                    } else {
                        existing.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        true
    }

    /// Replace the whole document with a server snapshot.
    pub fn load_snapshot(&mut self, meta: PlanMeta, tables: Vec<Table>, obstacles: Vec<Obstacle>) {
        self.meta = meta;
        self.obstacles = obstacles;
        self.tables.clear();
        for table in tables {
            self.tables.insert(table.id, table);
        }
    }

    /// Return all tables sorted by `(z_index, id)` for draw order.
    #[must_use]
    pub fn sorted_tables(&self) -> Vec<&Table> {
        let mut tables: Vec<&Table> = self.tables.values().collect();
        tables.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));
        tables
    }

    /// Number of tables currently in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` if the store contains no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Default for PlanDoc {
    fn default() -> Self {
        Self::new()
    }
}
