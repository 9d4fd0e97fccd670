//! Rider booking records.

use chrono::{DateTime, Utc};
use common::{BookingId, DriverId, RouteId, UserId, VehicleId};
use serde::{Deserialize, Serialize};

use crate::assignment::Passenger;
use crate::error::DomainError;

/// Lifecycle status of a booking.
///
/// ```text
/// Pending ──► Confirmed ──► Pending (unassign)
///    └──────► Rejected (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
}

impl BookingStatus {
    /// Returns true if no further transition is allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Rejected)
    }

    /// Returns the status name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "rejected" => Ok(BookingStatus::Rejected),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// A rider's request to travel a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub route_id: RouteId,
    pub user_id: UserId,
    pub user_name: String,
    pub user_email: String,
    pub origin: String,
    pub destination: String,
    pub pickup_time: DateTime<Utc>,
    pub dropoff_time: DateTime<Utc>,
    pub booked_at: DateTime<Utc>,
    pub status: BookingStatus,
    #[serde(default)]
    pub assigned_driver_id: Option<DriverId>,
    #[serde(default)]
    pub assigned_vehicle_id: Option<VehicleId>,
}

impl Booking {
    /// Creates a pending booking picked up at `pickup_time`.
    ///
    /// Rider details and trip endpoints default to empty strings and the
    /// drop-off defaults to the pickup time; use the `with_*` methods to
    /// fill them in.
    pub fn pending(
        id: impl Into<BookingId>,
        route_id: impl Into<RouteId>,
        user_id: impl Into<UserId>,
        pickup_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            route_id: route_id.into(),
            user_id: user_id.into(),
            user_name: String::new(),
            user_email: String::new(),
            origin: String::new(),
            destination: String::new(),
            pickup_time,
            dropoff_time: pickup_time,
            booked_at: Utc::now(),
            status: BookingStatus::Pending,
            assigned_driver_id: None,
            assigned_vehicle_id: None,
        }
    }

    pub fn with_rider(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.user_name = name.into();
        self.user_email = email.into();
        self
    }

    pub fn with_trip(mut self, origin: impl Into<String>, destination: impl Into<String>) -> Self {
        self.origin = origin.into();
        self.destination = destination.into();
        self
    }

    pub fn with_dropoff(mut self, dropoff_time: DateTime<Utc>) -> Self {
        self.dropoff_time = dropoff_time;
        self
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == BookingStatus::Pending
    }

    /// Returns true if a driver and vehicle are stamped on the booking.
    pub fn is_stamped(&self) -> bool {
        self.assigned_driver_id.is_some()
    }

    /// Returns true if the booking was confirmed ahead of any driver choice.
    pub fn is_locked(&self) -> bool {
        self.status == BookingStatus::Confirmed && !self.is_stamped()
    }

    /// Returns true if the booking belongs in the manifest of a new assignment.
    pub fn is_manifest_candidate(&self) -> bool {
        self.is_pending() || self.is_locked()
    }

    /// Confirms a pending booking without stamping a driver.
    ///
    /// Returns `Ok(false)` if the booking was already confirmed.
    pub fn confirm(&mut self) -> Result<bool, DomainError> {
        match self.status {
            BookingStatus::Pending => {
                self.status = BookingStatus::Confirmed;
                Ok(true)
            }
            BookingStatus::Confirmed => Ok(false),
            BookingStatus::Rejected => Err(self.invalid(BookingStatus::Confirmed)),
        }
    }

    /// Confirms the booking and stamps the assigned driver and vehicle.
    ///
    /// Bookings already stamped are left untouched and yield `Ok(false)`.
    pub fn confirm_for(
        &mut self,
        driver_id: &DriverId,
        vehicle_id: &VehicleId,
    ) -> Result<bool, DomainError> {
        if self.status.is_terminal() {
            return Err(self.invalid(BookingStatus::Confirmed));
        }
        if self.is_stamped() {
            return Ok(false);
        }
        self.status = BookingStatus::Confirmed;
        self.assigned_driver_id = Some(driver_id.clone());
        self.assigned_vehicle_id = Some(vehicle_id.clone());
        Ok(true)
    }

    /// Moves a confirmed booking back to pending and clears the stamp.
    ///
    /// Returns false if the booking was not confirmed.
    pub fn reset(&mut self) -> bool {
        if self.status != BookingStatus::Confirmed {
            return false;
        }
        self.status = BookingStatus::Pending;
        self.assigned_driver_id = None;
        self.assigned_vehicle_id = None;
        true
    }

    /// Returns the passenger manifest line for this booking.
    pub fn passenger(&self) -> Passenger {
        Passenger {
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            user_email: self.user_email.clone(),
        }
    }

    fn invalid(&self, to: BookingStatus) -> DomainError {
        DomainError::InvalidTransition {
            booking_id: self.id.clone(),
            from: self.status,
            to,
        }
    }
}
