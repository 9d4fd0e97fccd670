//! Read-only driver and vehicle directories with in-memory implementations.

pub mod driver;
pub mod vehicle;

use thiserror::Error;

pub use driver::{DriverDirectory, InMemoryDriverDirectory};
pub use vehicle::{InMemoryVehicleDirectory, VehicleDirectory};

/// Errors returned by a directory lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// No record exists for the id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The directory could not be reached.
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

impl DirectoryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DirectoryError::Unavailable(_))
    }
}
