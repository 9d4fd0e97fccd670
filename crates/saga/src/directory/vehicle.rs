//! Vehicle directory trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::VehicleId;
use domain::VehicleProfile;

use super::DirectoryError;

/// Lookup of vehicles by id.
#[async_trait]
pub trait VehicleDirectory: Send + Sync {
    async fn resolve_vehicle(&self, id: &VehicleId) -> Result<VehicleProfile, DirectoryError>;
}

#[async_trait]
impl<T: VehicleDirectory + ?Sized> VehicleDirectory for Arc<T> {
    async fn resolve_vehicle(&self, id: &VehicleId) -> Result<VehicleProfile, DirectoryError> {
        (**self).resolve_vehicle(id).await
    }
}

#[derive(Debug, Default)]
struct InMemoryVehicleState {
    vehicles: HashMap<VehicleId, VehicleProfile>,
    lookups: usize,
    unavailable: bool,
}

/// In-memory vehicle directory for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVehicleDirectory {
    state: Arc<RwLock<InMemoryVehicleState>>,
}

impl InMemoryVehicleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, vehicle: VehicleProfile) {
        self.state
            .write()
            .unwrap()
            .vehicles
            .insert(vehicle.id.clone(), vehicle);
    }

    pub fn deregister(&self, id: &VehicleId) {
        self.state.write().unwrap().vehicles.remove(id);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    pub fn lookup_count(&self) -> usize {
        self.state.read().unwrap().lookups
    }
}

#[async_trait]
impl VehicleDirectory for InMemoryVehicleDirectory {
    async fn resolve_vehicle(&self, id: &VehicleId) -> Result<VehicleProfile, DirectoryError> {
        let mut state = self.state.write().unwrap();
        state.lookups += 1;

        if state.unavailable {
            return Err(DirectoryError::Unavailable(
                "vehicle directory unreachable".to_string(),
            ));
        }

        state
            .vehicles
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound {
                kind: "Vehicle",
                id: id.to_string(),
            })
    }
}
