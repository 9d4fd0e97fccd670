//! Committed route assignments and their passenger manifest.

use chrono::{DateTime, Duration, Utc};
use common::{AssignmentId, DriverId, RouteId, UserId, VehicleId};
use serde::{Deserialize, Serialize};

use crate::directory::{DriverProfile, VehicleProfile};
use crate::error::DomainError;
use crate::route::{Itinerary, RoutePoolEntry, RouteStatus};

/// One line of an assignment's passenger manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    pub user_id: UserId,
    pub user_name: String,
    pub user_email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    #[default]
    Assigned,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
        }
    }
}

/// A route paired with a driver, a vehicle and a passenger manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: AssignmentId,
    pub route_id: RouteId,
    #[serde(flatten)]
    pub itinerary: Itinerary,
    pub assigned_driver_id: DriverId,
    pub assigned_driver_name: String,
    pub assigned_vehicle_id: VehicleId,
    pub assigned_vehicle_info: String,
    pub passengers: Vec<Passenger>,
    pub assigned_at: DateTime<Utc>,
    pub status: AssignmentStatus,
}

impl Assignment {
    /// Builds an assignment that replaces `entry`, keeping its route identity.
    pub fn for_route(
        id: AssignmentId,
        entry: &RoutePoolEntry,
        driver: &DriverProfile,
        vehicle: &VehicleProfile,
        passengers: Vec<Passenger>,
    ) -> Self {
        Self {
            id,
            route_id: entry.id.clone(),
            itinerary: entry.itinerary.clone(),
            assigned_driver_id: driver.id.clone(),
            assigned_driver_name: driver.display_name.clone(),
            assigned_vehicle_id: vehicle.id.clone(),
            assigned_vehicle_info: vehicle.info(),
            passengers,
            // Strictly after the pool entry's last update, so an interrupted
            // assign is never mistaken for an interrupted unassign.
            assigned_at: Utc::now().max(entry.updated_at + Duration::microseconds(1)),
            status: AssignmentStatus::Assigned,
        }
    }

    /// Returns true if this assignment pairs the route with the given driver and vehicle.
    pub fn assigned_to(&self, driver_id: &DriverId, vehicle_id: &VehicleId) -> bool {
        &self.assigned_driver_id == driver_id && &self.assigned_vehicle_id == vehicle_id
    }

    pub fn has_passenger(&self, user_id: &UserId) -> bool {
        self.passengers.iter().any(|p| &p.user_id == user_id)
    }

    /// Rebuilds the pool entry this assignment replaced, under the same route id.
    ///
    /// The restored entry is stamped strictly after `assigned_at`.
    pub fn restore_pool_entry(&self) -> RoutePoolEntry {
        let restored_at = Utc::now().max(self.assigned_at + Duration::microseconds(1));
        RoutePoolEntry {
            id: self.route_id.clone(),
            itinerary: self.itinerary.clone(),
            status: RouteStatus::Pending,
            created_at: restored_at,
            updated_at: restored_at,
        }
    }
}

/// An operator's request to pair a route with a driver and vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignRequest {
    pub route_id: RouteId,
    pub driver_id: DriverId,
    pub vehicle_id: VehicleId,
}

impl AssignRequest {
    /// Validates that every selection is present.
    pub fn new(
        route_id: Option<RouteId>,
        driver_id: Option<DriverId>,
        vehicle_id: Option<VehicleId>,
    ) -> Result<Self, DomainError> {
        let route_id = route_id
            .filter(|id| !id.is_blank())
            .ok_or(DomainError::MissingSelection("route"))?;
        let driver_id = driver_id
            .filter(|id| !id.is_blank())
            .ok_or(DomainError::MissingSelection("driver"))?;
        let vehicle_id = vehicle_id
            .filter(|id| !id.is_blank())
            .ok_or(DomainError::MissingSelection("vehicle"))?;
        Ok(Self {
            route_id,
            driver_id,
            vehicle_id,
        })
    }
}
