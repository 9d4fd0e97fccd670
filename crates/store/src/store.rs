use std::sync::Arc;

use async_trait::async_trait;
use common::{AssignmentId, BookingId, DriverId, RouteId, VehicleId};
use domain::{Assignment, Booking, BookingStatus, RoutePoolEntry};

use crate::Result;

/// Canonical store of rider bookings.
///
/// Every batch method is atomic within this store: either all matching
/// rows change or none do. Batch methods only touch rows still in their
/// source status, so re-running one after partial success is a no-op for
/// rows already moved.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts a new booking. Fails with `Conflict` if the id is taken.
    async fn insert(&self, booking: Booking) -> Result<()>;

    async fn get(&self, id: &BookingId) -> Result<Option<Booking>>;

    /// Lists bookings for a route ordered by pickup time, then id.
    async fn list_by_route(&self, route_id: &RouteId) -> Result<Vec<Booking>>;

    /// Lists bookings with the given status ordered by route, pickup time, then id.
    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>>;

    /// Confirms every pending booking on the route without stamping a driver.
    ///
    /// Returns the number of bookings that changed.
    async fn confirm_pending(&self, route_id: &RouteId) -> Result<usize>;

    /// Confirms the given bookings and stamps the driver and vehicle.
    ///
    /// Only bookings that are pending, or confirmed without a stamp, change.
    /// Returns the number of bookings that changed.
    async fn confirm_for_assignment(
        &self,
        ids: &[BookingId],
        driver_id: &DriverId,
        vehicle_id: &VehicleId,
    ) -> Result<usize>;

    /// Moves every confirmed booking on the route back to pending and clears
    /// the driver and vehicle stamps.
    ///
    /// Returns the number of bookings that changed.
    async fn reset_confirmed(&self, route_id: &RouteId) -> Result<usize>;
}

/// Store of routes waiting for a driver and vehicle.
#[async_trait]
pub trait RoutePool: Send + Sync {
    /// Inserts a new pool entry. Fails with `Conflict` if the id is taken.
    async fn insert(&self, entry: RoutePoolEntry) -> Result<()>;

    async fn get(&self, id: &RouteId) -> Result<Option<RoutePoolEntry>>;

    /// Lists all pool entries ordered by id.
    async fn list(&self) -> Result<Vec<RoutePoolEntry>>;

    /// Inserts the entry unless one with the same id already exists.
    ///
    /// Returns true if the entry was inserted.
    async fn restore(&self, entry: RoutePoolEntry) -> Result<bool>;

    /// Removes the entry. Returns false if it was already absent.
    async fn remove(&self, id: &RouteId) -> Result<bool>;
}

/// Store of committed route assignments.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Persists a new assignment.
    ///
    /// Fails with `Conflict` if the id is taken or the route already has an
    /// assignment; at most one assignment exists per route.
    async fn create(&self, assignment: Assignment) -> Result<()>;

    async fn get(&self, id: &AssignmentId) -> Result<Option<Assignment>>;

    async fn find_by_route(&self, route_id: &RouteId) -> Result<Option<Assignment>>;

    /// Lists all assignments ordered by route id.
    async fn list(&self) -> Result<Vec<Assignment>>;

    /// Removes the assignment. Returns false if it was already absent.
    async fn remove(&self, id: &AssignmentId) -> Result<bool>;
}

#[async_trait]
impl<T: BookingStore + ?Sized> BookingStore for Arc<T> {
    async fn insert(&self, booking: Booking) -> Result<()> {
        (**self).insert(booking).await
    }

    async fn get(&self, id: &BookingId) -> Result<Option<Booking>> {
        (**self).get(id).await
    }

    async fn list_by_route(&self, route_id: &RouteId) -> Result<Vec<Booking>> {
        (**self).list_by_route(route_id).await
    }

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>> {
        (**self).list_by_status(status).await
    }

    async fn confirm_pending(&self, route_id: &RouteId) -> Result<usize> {
        (**self).confirm_pending(route_id).await
    }

    async fn confirm_for_assignment(
        &self,
        ids: &[BookingId],
        driver_id: &DriverId,
        vehicle_id: &VehicleId,
    ) -> Result<usize> {
        (**self)
            .confirm_for_assignment(ids, driver_id, vehicle_id)
            .await
    }

    async fn reset_confirmed(&self, route_id: &RouteId) -> Result<usize> {
        (**self).reset_confirmed(route_id).await
    }
}

#[async_trait]
impl<T: RoutePool + ?Sized> RoutePool for Arc<T> {
    async fn insert(&self, entry: RoutePoolEntry) -> Result<()> {
        (**self).insert(entry).await
    }

    async fn get(&self, id: &RouteId) -> Result<Option<RoutePoolEntry>> {
        (**self).get(id).await
    }

    async fn list(&self) -> Result<Vec<RoutePoolEntry>> {
        (**self).list().await
    }

    async fn restore(&self, entry: RoutePoolEntry) -> Result<bool> {
        (**self).restore(entry).await
    }

    async fn remove(&self, id: &RouteId) -> Result<bool> {
        (**self).remove(id).await
    }
}

#[async_trait]
impl<T: AssignmentStore + ?Sized> AssignmentStore for Arc<T> {
    async fn create(&self, assignment: Assignment) -> Result<()> {
        (**self).create(assignment).await
    }

    async fn get(&self, id: &AssignmentId) -> Result<Option<Assignment>> {
        (**self).get(id).await
    }

    async fn find_by_route(&self, route_id: &RouteId) -> Result<Option<Assignment>> {
        (**self).find_by_route(route_id).await
    }

    async fn list(&self) -> Result<Vec<Assignment>> {
        (**self).list().await
    }

    async fn remove(&self, id: &AssignmentId) -> Result<bool> {
        (**self).remove(id).await
    }
}
