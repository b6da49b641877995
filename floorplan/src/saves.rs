//! Optimistic-save ledger: rollback state and failure classification.
//!
//! Geometry saves are optimistic — the document already shows the new
//! position while the network request is in flight. The ledger remembers, per
//! table, the last geometry the server acknowledged. When a save fails the
//! engine rolls the table back to that state; when it commits, the saved
//! geometry becomes the new acknowledged state.
//!
//! Failure classification lives here so every embedding host maps backend
//! errors to the same three user-facing outcomes.

#[cfg(test)]
#[path = "saves_test.rs"]
mod saves_test;

use std::collections::HashMap;

use uuid::Uuid;

use crate::doc::{TableGeometry, TableId};

/// Correlates an emitted save with its later commit/fail call.
pub type SaveId = Uuid;

/// How a failed save is presented to the user. The display string is the
/// user-facing message itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SaveErrorKind {
    /// The backend rejected the caller's credentials or role.
    #[error("You do not have permission to edit this floorplan.")]
    PermissionDenied,
    /// The request was cancelled before the backend stored it.
    #[error("Saving was interrupted. Your change was not stored.")]
    Aborted,
    /// Anything else: network failure, stale version, server error.
    #[error("The floorplan could not be saved. Please try again.")]
    Failed,
}

/// A classified save failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}")]
pub struct SaveError {
    pub kind: SaveErrorKind,
    /// The wire error code that produced this classification, if any.
    pub code: Option<String>,
}

impl SaveError {
    /// Classify a wire error code into a user-facing error kind.
    #[must_use]
    pub fn classify(code: Option<&str>) -> Self {
        let kind = match code {
            Some("E_FORBIDDEN" | "E_UNAUTHORIZED") => SaveErrorKind::PermissionDenied,
            Some("E_ABORTED") => SaveErrorKind::Aborted,
            _ => SaveErrorKind::Failed,
        };
        Self { kind, code: code.map(str::to_owned) }
    }

    /// The message shown to the user for this failure.
    #[must_use]
    pub fn user_message(&self) -> String {
        self.kind.to_string()
    }
}

/// What the engine must do after a failed save.
#[derive(Debug, Clone)]
pub struct Rollback {
    pub table_id: TableId,
    /// The last acknowledged geometry to restore.
    pub restore: TableGeometry,
    pub error: SaveError,
}

struct PendingSave {
    table_id: TableId,
    saved: TableGeometry,
}

/// Tracks in-flight saves and the last acknowledged geometry per table.
#[derive(Default)]
pub struct SaveLedger {
    last_acked: HashMap<TableId, TableGeometry>,
    pending: HashMap<SaveId, PendingSave>,
}

impl SaveLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a server-acknowledged geometry (snapshot load, server echo, or
    /// a committed save).
    pub fn ack(&mut self, table_id: TableId, geometry: TableGeometry) {
        self.last_acked.insert(table_id, geometry);
    }

    /// Drop all state for a deleted table.
    pub fn forget(&mut self, table_id: &TableId) {
        self.last_acked.remove(table_id);
        self.pending.retain(|_, p| p.table_id != *table_id);
    }

    /// Clear everything (snapshot reload).
    pub fn clear(&mut self) {
        self.last_acked.clear();
        self.pending.clear();
    }

    /// The last geometry the server acknowledged for a table, if known.
    #[must_use]
    pub fn acked(&self, table_id: &TableId) -> Option<TableGeometry> {
        self.last_acked.get(table_id).copied()
    }

    /// Number of saves currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Register an optimistic save.
    ///
    /// `fallback` is the pre-gesture geometry; it seeds the acknowledged state
    /// for tables the ledger has not seen yet, so the first failed save still
    /// has somewhere to roll back to. `saved` is the geometry being persisted.
    pub fn begin(&mut self, table_id: TableId, fallback: TableGeometry, saved: TableGeometry) -> SaveId {
        self.last_acked.entry(table_id).or_insert(fallback);
        let save_id = Uuid::new_v4();
        self.pending.insert(save_id, PendingSave { table_id, saved });
        save_id
    }

    /// Mark a save as acknowledged; its geometry becomes the rollback target
    /// for later failures. Returns the table id, or `None` for unknown saves.
    pub fn commit(&mut self, save_id: &SaveId) -> Option<TableId> {
        let entry = self.pending.remove(save_id)?;
        self.last_acked.insert(entry.table_id, entry.saved);
        Some(entry.table_id)
    }

    /// Mark a save as failed.
    ///
    /// Every other in-flight save for the same table is invalidated too — they
    /// were built on geometry the server never stored. Returns the rollback
    /// the engine must apply, or `None` for unknown saves.
    pub fn fail(&mut self, save_id: &SaveId, code: Option<&str>) -> Option<Rollback> {
        let entry = self.pending.remove(save_id)?;
        self.pending.retain(|_, p| p.table_id != entry.table_id);
        let restore = self.last_acked.get(&entry.table_id).copied()?;
        Some(Rollback {
            table_id: entry.table_id,
            restore,
            error: SaveError::classify(code),
        })
    }
}
