//! Driver and vehicle metadata resolved from the external directories.

use common::{DriverId, VehicleId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverProfile {
    pub id: DriverId,
    pub display_name: String,
}

impl DriverProfile {
    pub fn new(id: impl Into<DriverId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleProfile {
    pub id: VehicleId,
    pub make: String,
    pub model: String,
    pub plate_number: String,
}

impl VehicleProfile {
    pub fn new(
        id: impl Into<VehicleId>,
        make: impl Into<String>,
        model: impl Into<String>,
        plate_number: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            make: make.into(),
            model: model.into(),
            plate_number: plate_number.into(),
        }
    }

    /// Human-readable summary stored on the assignment, e.g. `Toyota Hiace (ABC-123)`.
    pub fn info(&self) -> String {
        format!("{} {} ({})", self.make, self.model, self.plate_number)
    }
}
