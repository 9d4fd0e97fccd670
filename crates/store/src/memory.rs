use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{AssignmentId, BookingId, DriverId, RouteId, VehicleId};
use domain::{Assignment, Booking, BookingStatus, RoutePoolEntry};
use tokio::sync::RwLock;

use crate::{
    FaultInjector, Result, StoreError,
    store::{AssignmentStore, BookingStore, RoutePool},
};

/// In-memory booking store.
///
/// Provides the same interface as the PostgreSQL implementation, plus a
/// [`FaultInjector`] for simulating outages in tests.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
    faults: FaultInjector,
}

impl InMemoryBookingStore {
    /// Creates a new empty booking store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Returns the total number of bookings stored.
    pub async fn booking_count(&self) -> usize {
        self.bookings.read().await.len()
    }
}

fn sort_bookings(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| {
        a.route_id
            .cmp(&b.route_id)
            .then(a.pickup_time.cmp(&b.pickup_time))
            .then(a.id.cmp(&b.id))
    });
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: Booking) -> Result<()> {
        self.faults.before_write("bookings").await?;
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(StoreError::conflict("Booking", &booking.id, "id already exists"));
        }
        bookings.insert(booking.id.clone(), booking);
        Ok(())
    }

    async fn get(&self, id: &BookingId) -> Result<Option<Booking>> {
        self.faults.before_read("bookings").await?;
        Ok(self.bookings.read().await.get(id).cloned())
    }

    async fn list_by_route(&self, route_id: &RouteId) -> Result<Vec<Booking>> {
        self.faults.before_read("bookings").await?;
        let mut bookings: Vec<_> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| &b.route_id == route_id)
            .cloned()
            .collect();
        sort_bookings(&mut bookings);
        Ok(bookings)
    }

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>> {
        self.faults.before_read("bookings").await?;
        let mut bookings: Vec<_> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.status == status)
            .cloned()
            .collect();
        sort_bookings(&mut bookings);
        Ok(bookings)
    }

    async fn confirm_pending(&self, route_id: &RouteId) -> Result<usize> {
        self.faults.before_write("bookings").await?;
        let mut bookings = self.bookings.write().await;
        let mut changed = 0;
        for booking in bookings
            .values_mut()
            .filter(|b| &b.route_id == route_id && b.is_pending())
        {
            if booking.confirm()? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn confirm_for_assignment(
        &self,
        ids: &[BookingId],
        driver_id: &DriverId,
        vehicle_id: &VehicleId,
    ) -> Result<usize> {
        self.faults.before_write("bookings").await?;
        let wanted: HashSet<&BookingId> = ids.iter().collect();
        let mut bookings = self.bookings.write().await;
        let mut changed = 0;
        for booking in bookings
            .values_mut()
            .filter(|b| wanted.contains(&b.id) && b.is_manifest_candidate())
        {
            if booking.confirm_for(driver_id, vehicle_id)? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn reset_confirmed(&self, route_id: &RouteId) -> Result<usize> {
        self.faults.before_write("bookings").await?;
        let mut bookings = self.bookings.write().await;
        let mut changed = 0;
        for booking in bookings.values_mut().filter(|b| &b.route_id == route_id) {
            if booking.reset() {
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// In-memory route pool.
#[derive(Clone, Default)]
pub struct InMemoryRoutePool {
    entries: Arc<RwLock<BTreeMap<RouteId, RoutePoolEntry>>>,
    faults: FaultInjector,
}

impl InMemoryRoutePool {
    /// Creates a new empty route pool.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl RoutePool for InMemoryRoutePool {
    async fn insert(&self, entry: RoutePoolEntry) -> Result<()> {
        self.faults.before_write("route pool").await?;
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.id) {
            return Err(StoreError::conflict("Route", &entry.id, "id already exists"));
        }
        entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn get(&self, id: &RouteId) -> Result<Option<RoutePoolEntry>> {
        self.faults.before_read("route pool").await?;
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<RoutePoolEntry>> {
        self.faults.before_read("route pool").await?;
        Ok(self.entries.read().await.values().cloned().collect())
    }

    async fn restore(&self, entry: RoutePoolEntry) -> Result<bool> {
        self.faults.before_write("route pool").await?;
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.id) {
            return Ok(false);
        }
        entries.insert(entry.id.clone(), entry);
        Ok(true)
    }

    async fn remove(&self, id: &RouteId) -> Result<bool> {
        self.faults.before_write("route pool").await?;
        Ok(self.entries.write().await.remove(id).is_some())
    }
}

/// In-memory assignment store.
#[derive(Clone, Default)]
pub struct InMemoryAssignmentStore {
    assignments: Arc<RwLock<HashMap<AssignmentId, Assignment>>>,
    faults: FaultInjector,
}

impl InMemoryAssignmentStore {
    /// Creates a new empty assignment store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    pub async fn assignment_count(&self) -> usize {
        self.assignments.read().await.len()
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn create(&self, assignment: Assignment) -> Result<()> {
        self.faults.before_write("assignments").await?;
        let mut assignments = self.assignments.write().await;
        if assignments.contains_key(&assignment.id) {
            return Err(StoreError::conflict(
                "Assignment",
                &assignment.id,
                "id already exists",
            ));
        }
        if let Some(existing) = assignments
            .values()
            .find(|a| a.route_id == assignment.route_id)
        {
            return Err(StoreError::conflict(
                "Route",
                &assignment.route_id,
                format!("already assigned by {}", existing.id),
            ));
        }
        assignments.insert(assignment.id.clone(), assignment);
        Ok(())
    }

    async fn get(&self, id: &AssignmentId) -> Result<Option<Assignment>> {
        self.faults.before_read("assignments").await?;
        Ok(self.assignments.read().await.get(id).cloned())
    }

    async fn find_by_route(&self, route_id: &RouteId) -> Result<Option<Assignment>> {
        self.faults.before_read("assignments").await?;
        Ok(self
            .assignments
            .read()
            .await
            .values()
            .find(|a| &a.route_id == route_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Assignment>> {
        self.faults.before_read("assignments").await?;
        let mut assignments: Vec<_> = self.assignments.read().await.values().cloned().collect();
        assignments.sort_by(|a, b| a.route_id.cmp(&b.route_id));
        Ok(assignments)
    }

    async fn remove(&self, id: &AssignmentId) -> Result<bool> {
        self.faults.before_write("assignments").await?;
        Ok(self.assignments.write().await.remove(id).is_some())
    }
}
