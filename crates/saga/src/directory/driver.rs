//! Driver directory trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::DriverId;
use domain::DriverProfile;

use super::DirectoryError;

/// Lookup of drivers by id.
///
/// Implementations must not cache: driver status can change between calls.
#[async_trait]
pub trait DriverDirectory: Send + Sync {
    async fn resolve_driver(&self, id: &DriverId) -> Result<DriverProfile, DirectoryError>;
}

#[async_trait]
impl<T: DriverDirectory + ?Sized> DriverDirectory for Arc<T> {
    async fn resolve_driver(&self, id: &DriverId) -> Result<DriverProfile, DirectoryError> {
        (**self).resolve_driver(id).await
    }
}

#[derive(Debug, Default)]
struct InMemoryDriverState {
    drivers: HashMap<DriverId, DriverProfile>,
    lookups: usize,
    unavailable: bool,
}

/// In-memory driver directory for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDriverDirectory {
    state: Arc<RwLock<InMemoryDriverState>>,
}

impl InMemoryDriverDirectory {
    /// Creates a new empty driver directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a driver.
    pub fn register(&self, driver: DriverProfile) {
        self.state
            .write()
            .unwrap()
            .drivers
            .insert(driver.id.clone(), driver);
    }

    /// Removes a driver, e.g. one who went off duty.
    pub fn deregister(&self, id: &DriverId) {
        self.state.write().unwrap().drivers.remove(id);
    }

    /// Configures every lookup to fail as unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Returns the number of lookups served so far.
    pub fn lookup_count(&self) -> usize {
        self.state.read().unwrap().lookups
    }
}

#[async_trait]
impl DriverDirectory for InMemoryDriverDirectory {
    async fn resolve_driver(&self, id: &DriverId) -> Result<DriverProfile, DirectoryError> {
        let mut state = self.state.write().unwrap();
        state.lookups += 1;

        if state.unavailable {
            return Err(DirectoryError::Unavailable(
                "driver directory unreachable".to_string(),
            ));
        }

        state
            .drivers
            .get(id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound {
                kind: "Driver",
                id: id.to_string(),
            })
    }
}
