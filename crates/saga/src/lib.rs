//! Saga pattern implementation for route assignment.
//!
//! Pairing a route with a driver and vehicle spans three stores with no
//! shared transaction. The assign saga runs:
//! 1. Snapshot the route's manifest bookings
//! 2. Persist the assignment
//! 3. Confirm and stamp the manifest bookings
//! 4. Remove the route from the pool
//!
//! Unassign mirrors it: read the assignment, restore the pool entry, reset
//! the bookings, delete the assignment. Failed sagas are never rolled back;
//! every step is idempotent and is finished by a retry or by the reconcile
//! sweep.

pub mod directory;
pub mod error;
pub mod orchestrator;
pub mod reconcile;
pub mod retry;
pub mod state;
pub mod steps;

pub use directory::{
    DirectoryError, DriverDirectory, InMemoryDriverDirectory, InMemoryVehicleDirectory,
    VehicleDirectory,
};
pub use error::{Result, SagaError};
pub use orchestrator::AssignmentOrchestrator;
pub use reconcile::{ReconcileFailure, ReconcileReport, spawn_reconciler};
pub use retry::{RetryPolicy, RetryableError};
pub use state::RouteState;
pub use steps::{SagaKind, SagaStep};
