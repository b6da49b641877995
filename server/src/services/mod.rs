//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.

pub mod combination;
pub mod debug;
pub mod persistence;
pub mod plan;
pub mod savepoint;
pub mod settings;
pub mod staff;
pub mod table;
pub mod zone;
