//! Route pool entries and their itineraries.

use chrono::{DateTime, Utc};
use common::RouteId;
use serde::{Deserialize, Serialize};

/// The travel plan of a route, shared by its pool entry and its assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Itinerary {
    pub name: String,
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub waypoints: Vec<String>,
}

impl Itinerary {
    pub fn new(
        name: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            origin: origin.into(),
            destination: destination.into(),
            waypoints: Vec::new(),
        }
    }

    pub fn with_waypoints<I, S>(mut self, waypoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.waypoints = waypoints.into_iter().map(Into::into).collect();
        self
    }
}

/// Status carried by a pool entry; entries in the pool are always pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    #[default]
    Pending,
}

impl RouteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Pending => "pending",
        }
    }
}

/// A route waiting for a driver and vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePoolEntry {
    pub id: RouteId,
    #[serde(flatten)]
    pub itinerary: Itinerary,
    pub status: RouteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoutePoolEntry {
    /// Creates a fresh pool entry stamped with the current time.
    pub fn new(id: impl Into<RouteId>, itinerary: Itinerary) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            itinerary,
            status: RouteStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
