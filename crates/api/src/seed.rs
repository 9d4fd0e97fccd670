//! Startup data loaded from a JSON file.
//!
//! The file may hold any of `routes`, `bookings`, `drivers` and `vehicles`:
//!
//! ```json
//! {
//!   "routes": [{ "id": "R1", "name": "Loop", "origin": "Depot", "destination": "Campus", "waypoints": [] }],
//!   "drivers": [{ "id": "D1", "displayName": "Dana" }],
//!   "vehicles": [{ "id": "V1", "make": "Ford", "model": "Transit", "plateNumber": "XYZ-1" }],
//!   "bookings": []
//! }
//! ```

use std::path::Path;

use common::RouteId;
use domain::{Booking, DriverProfile, Itinerary, RoutePoolEntry, VehicleProfile};
use saga::{InMemoryDriverDirectory, InMemoryVehicleDirectory};
use serde::Deserialize;
use store::{BookingStore, RoutePool, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to store seed record: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Deserialize)]
pub struct SeedRoute {
    pub id: RouteId,
    #[serde(flatten)]
    pub itinerary: Itinerary,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub routes: Vec<SeedRoute>,
    pub bookings: Vec<Booking>,
    pub drivers: Vec<DriverProfile>,
    pub vehicles: Vec<VehicleProfile>,
}

/// Counts of records loaded; records that already existed are skipped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub routes: usize,
    pub bookings: usize,
    pub drivers: usize,
    pub vehicles: usize,
}

impl SeedData {
    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Loads the records into the stores and directories.
    pub async fn apply(
        self,
        bookings: &dyn BookingStore,
        pool: &dyn RoutePool,
        drivers: &InMemoryDriverDirectory,
        vehicles: &InMemoryVehicleDirectory,
    ) -> Result<SeedSummary, SeedError> {
        let mut summary = SeedSummary {
            drivers: self.drivers.len(),
            vehicles: self.vehicles.len(),
            ..SeedSummary::default()
        };
        for driver in self.drivers {
            drivers.register(driver);
        }
        for vehicle in self.vehicles {
            vehicles.register(vehicle);
        }

        for route in self.routes {
            if inserted(pool.insert(RoutePoolEntry::new(route.id, route.itinerary)).await)? {
                summary.routes += 1;
            }
        }
        for booking in self.bookings {
            if inserted(bookings.insert(booking).await)? {
                summary.bookings += 1;
            }
        }

        tracing::info!(?summary, "seed data loaded");
        Ok(summary)
    }
}

// Restarting against a persistent store re-applies the same seed.
fn inserted(result: store::Result<()>) -> Result<bool, SeedError> {
    match result {
        Ok(()) => Ok(true),
        Err(StoreError::Conflict { .. }) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
