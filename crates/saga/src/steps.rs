//! Route assignment saga kinds and their ordered steps.

use serde::{Deserialize, Serialize};

/// The two sagas driven by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaKind {
    Assign,
    Unassign,
}

impl SagaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaKind::Assign => "assign",
            SagaKind::Unassign => "unassign",
        }
    }

    /// Returns the steps of this saga in execution order.
    pub fn steps(&self) -> &'static [SagaStep] {
        match self {
            SagaKind::Assign => &[
                SagaStep::SnapshotBookings,
                SagaStep::PersistAssignment,
                SagaStep::ConfirmBookings,
                SagaStep::RemovePoolEntry,
            ],
            SagaKind::Unassign => &[
                SagaStep::ReadAssignment,
                SagaStep::RestorePoolEntry,
                SagaStep::ResetBookings,
                SagaStep::DeleteAssignment,
            ],
        }
    }
}

impl std::fmt::Display for SagaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step of an assign or unassign saga.
///
/// Every step that writes is idempotent, so a saga can be resumed from the
/// step after the last one known to have completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStep {
    /// Assign 1: read the route's manifest bookings.
    SnapshotBookings,
    /// Assign 2: persist the assignment record.
    PersistAssignment,
    /// Assign 3: confirm and stamp the manifest bookings.
    ConfirmBookings,
    /// Assign 4: delete the pool entry; its absence marks completion.
    RemovePoolEntry,
    /// Unassign 1: read the assignment record.
    ReadAssignment,
    /// Unassign 2: restore the pool entry under the same route id.
    RestorePoolEntry,
    /// Unassign 3: reset confirmed bookings to pending.
    ResetBookings,
    /// Unassign 4: delete the assignment record.
    DeleteAssignment,
}

impl SagaStep {
    pub fn kind(&self) -> SagaKind {
        match self {
            SagaStep::SnapshotBookings
            | SagaStep::PersistAssignment
            | SagaStep::ConfirmBookings
            | SagaStep::RemovePoolEntry => SagaKind::Assign,
            SagaStep::ReadAssignment
            | SagaStep::RestorePoolEntry
            | SagaStep::ResetBookings
            | SagaStep::DeleteAssignment => SagaKind::Unassign,
        }
    }

    /// One-based position of the step within its saga.
    pub fn ordinal(&self) -> usize {
        self.kind()
            .steps()
            .iter()
            .position(|s| s == self)
            .map(|i| i + 1)
            .unwrap_or_default()
    }

    /// Returns the step that runs after this one, if any.
    pub fn next(&self) -> Option<SagaStep> {
        self.kind().steps().get(self.ordinal()).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::SnapshotBookings => "snapshot_bookings",
            SagaStep::PersistAssignment => "persist_assignment",
            SagaStep::ConfirmBookings => "confirm_bookings",
            SagaStep::RemovePoolEntry => "remove_pool_entry",
            SagaStep::ReadAssignment => "read_assignment",
            SagaStep::RestorePoolEntry => "restore_pool_entry",
            SagaStep::ResetBookings => "reset_bookings",
            SagaStep::DeleteAssignment => "delete_assignment",
        }
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
