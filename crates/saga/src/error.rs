//! Saga error types.

use common::{AssignmentId, RouteId};
use domain::DomainError;
use store::StoreError;
use thiserror::Error;

use crate::directory::DirectoryError;
use crate::steps::{SagaKind, SagaStep};

/// Errors returned by the assignment orchestrator.
///
/// Every variant except `PartialFailure` means no write was issued.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A route, driver, vehicle or assignment does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The request is missing a required selection.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The precondition changed between read and write. Re-fetch before retrying.
    #[error("Conflict on route {route_id}: {reason}")]
    Conflict { route_id: RouteId, reason: String },

    /// An I/O call kept failing or timing out after all retry attempts.
    #[error("Operation '{operation}' failed after {attempts} attempts: {reason}")]
    Transient {
        operation: &'static str,
        attempts: u32,
        reason: String,
    },

    /// Some saga steps committed and the rest did not. Resume from the step
    /// after `last_completed`.
    #[error(
        "{saga} saga for route {route_id} stopped after step '{last_completed}': {reason}"
    )]
    PartialFailure {
        saga: SagaKind,
        route_id: RouteId,
        assignment_id: AssignmentId,
        last_completed: SagaStep,
        reason: String,
    },

    /// A non-retryable store error.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl SagaError {
    /// Returns true if the caller can retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SagaError::Transient { .. } | SagaError::PartialFailure { .. }
        )
    }

    /// Returns the last completed step for a partial failure.
    pub fn last_completed_step(&self) -> Option<SagaStep> {
        match self {
            SagaError::PartialFailure { last_completed, .. } => Some(*last_completed),
            _ => None,
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        SagaError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(route_id: &RouteId, reason: impl Into<String>) -> Self {
        SagaError::Conflict {
            route_id: route_id.clone(),
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for SagaError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => SagaError::NotFound { kind, id },
            other => SagaError::Store(other),
        }
    }
}

impl From<DirectoryError> for SagaError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound { kind, id } => SagaError::NotFound { kind, id },
            DirectoryError::Unavailable(reason) => SagaError::Transient {
                operation: "directory_lookup",
                attempts: 1,
                reason,
            },
        }
    }
}

impl From<DomainError> for SagaError {
    fn from(err: DomainError) -> Self {
        SagaError::Validation(err.to_string())
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
