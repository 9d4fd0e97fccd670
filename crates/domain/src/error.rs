//! Domain error types.

use common::BookingId;
use thiserror::Error;

use crate::booking::BookingStatus;

/// Errors raised by record-level rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A booking cannot move between the given statuses.
    #[error("Invalid booking transition for {booking_id}: {from} -> {to}")]
    InvalidTransition {
        booking_id: BookingId,
        from: BookingStatus,
        to: BookingStatus,
    },

    /// A required selection (driver, vehicle, route) was not supplied.
    #[error("Missing required selection: {0}")]
    MissingSelection(&'static str),

    /// A status string could not be parsed.
    #[error("Unknown status: {0}")]
    UnknownStatus(String),
}
