//! Floorplan geometry and drag-interaction engine for the seating editor.
//!
//! This crate owns the interactive half of the floorplan editor: translating
//! pointer input into table mutations, maintaining camera state for pan/zoom,
//! hit-testing tables and their handles, snapping to the floorplan grid,
//! keeping dragged tables out of no-go zones, and tracking optimistic saves so
//! a failed persistence call rolls the document back to the last acknowledged
//! state. The embedding host is responsible only for wiring UI events to the
//! engine and shipping the resulting [`engine::Action`]s to the server.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level [`engine::EngineCore`] and the host-facing [`engine::Action`] type |
//! | [`doc`] | In-memory floorplan document: tables, obstacles, plan metadata |
//! | [`camera`] | Pan/zoom camera and coordinate conversions |
//! | [`geometry`] | Rotation-aware bounding boxes, footprints, snapping, clamping |
//! | [`collide`] | Obstacle avoidance along the drag vector |
//! | [`input`] | Input event types and the gesture state machine |
//! | [`hit`] | Hit-testing against tables and their handles |
//! | [`saves`] | Optimistic-save ledger, rollback, and error classification |
//! | [`undo`] | Bounded undo stack of committed geometry edits |
//! | [`consts`] | Shared numeric constants (zoom limits, minimum sizes, etc.) |

pub mod camera;
pub mod collide;
pub mod consts;
pub mod doc;
pub mod engine;
pub mod geometry;
pub mod hit;
pub mod input;
pub mod saves;
pub mod undo;
