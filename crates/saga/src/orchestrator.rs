//! Assignment orchestrator driving the assign and unassign sagas.

use std::collections::HashSet;
use std::time::Instant;

use common::{AssignmentId, BookingId, DriverId, RouteId, VehicleId};
use domain::{AssignRequest, Assignment, Booking, BookingStatus, Passenger, RoutePoolEntry};
use projections::{GroupView, group_pending};
use store::{AssignmentStore, BookingStore, RoutePool, StoreError};

use crate::directory::{DriverDirectory, VehicleDirectory};
use crate::error::{Result, SagaError};
use crate::retry::RetryPolicy;
use crate::state::RouteState;
use crate::steps::{SagaKind, SagaStep};

/// The only component that writes to more than one store.
///
/// Assign runs: snapshot bookings, persist assignment, confirm bookings,
/// remove pool entry. Unassign runs: read assignment, restore pool entry,
/// reset bookings, delete assignment. There is no rollback; every write step
/// is idempotent and a failed saga is finished by calling it again or by
/// [`reconcile`](Self::reconcile).
pub struct AssignmentOrchestrator<B, P, A, D, V>
where
    B: BookingStore,
    P: RoutePool,
    A: AssignmentStore,
    D: DriverDirectory,
    V: VehicleDirectory,
{
    bookings: B,
    pool: P,
    assignments: A,
    drivers: D,
    vehicles: V,
    retry: RetryPolicy,
}

impl<B, P, A, D, V> AssignmentOrchestrator<B, P, A, D, V>
where
    B: BookingStore,
    P: RoutePool,
    A: AssignmentStore,
    D: DriverDirectory,
    V: VehicleDirectory,
{
    /// Creates an orchestrator with the default retry policy.
    pub fn new(bookings: B, pool: P, assignments: A, drivers: D, vehicles: V) -> Self {
        Self {
            bookings,
            pool,
            assignments,
            drivers,
            vehicles,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy applied to every store and directory call.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the retry policy in use.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Groups every pending booking by route.
    #[tracing::instrument(skip(self))]
    pub async fn group_pending(&self) -> Result<GroupView> {
        let pending = self
            .retry
            .run("list_pending_bookings", || {
                self.bookings.list_by_status(BookingStatus::Pending)
            })
            .await?;
        Ok(group_pending(&pending))
    }

    /// Returns the derived assignment state of a route.
    #[tracing::instrument(skip(self))]
    pub async fn route_state(&self, route_id: &RouteId) -> Result<RouteState> {
        let (entry, assignment) = self.load_route(route_id).await?;
        RouteState::derive(entry.as_ref(), assignment.as_ref())
            .ok_or_else(|| SagaError::not_found("Route", route_id))
    }

    /// Pairs a pooled route with a driver and vehicle.
    ///
    /// Re-running on a route whose assign was interrupted, with the same
    /// driver and vehicle, resumes the remaining steps. Re-running on an
    /// assigned route with the same driver and vehicle returns the existing
    /// assignment id. Any other existing assignment is a conflict.
    #[tracing::instrument(skip(self), fields(saga = "assign"))]
    pub async fn assign(
        &self,
        route_id: &RouteId,
        driver_id: &DriverId,
        vehicle_id: &VehicleId,
    ) -> Result<AssignmentId> {
        let started = Instant::now();
        let request = AssignRequest::new(
            Some(route_id.clone()),
            Some(driver_id.clone()),
            Some(vehicle_id.clone()),
        )?;

        let result = self.run_assign(&request).await;
        metrics::histogram!("route_assign_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(assignment_id) => {
                metrics::counter!("route_assignments_total").increment(1);
                tracing::info!(%assignment_id, "route assigned");
            }
            Err(SagaError::Conflict { reason, .. }) => {
                metrics::counter!("route_assign_conflicts_total").increment(1);
                tracing::info!(%reason, "assign rejected by conflict");
            }
            Err(e) => tracing::warn!(error = %e, "assign failed"),
        }
        result
    }

    async fn run_assign(&self, request: &AssignRequest) -> Result<AssignmentId> {
        let route_id = &request.route_id;

        let (entry, existing) = self.load_route(route_id).await?;
        let state = RouteState::derive(entry.as_ref(), existing.as_ref())
            .ok_or_else(|| SagaError::not_found("Route", route_id))?;

        if let Some(existing) = existing {
            let same_selection = existing.assigned_to(&request.driver_id, &request.vehicle_id);
            if same_selection && state == RouteState::Assigned {
                tracing::info!(assignment_id = %existing.id, "route already assigned");
                return Ok(existing.id);
            }
            if same_selection && state.can_assign() {
                tracing::info!(assignment_id = %existing.id, "resuming interrupted assign");
                self.resume_assign(&existing).await?;
                return Ok(existing.id);
            }
            return Err(SagaError::conflict(
                route_id,
                format!("route is {state} as {}", existing.id),
            ));
        }

        // Directory lookups happen on every call; no write has been issued yet.
        let driver = self
            .retry
            .run("resolve_driver", || {
                self.drivers.resolve_driver(&request.driver_id)
            })
            .await?;
        let vehicle = self
            .retry
            .run("resolve_vehicle", || {
                self.vehicles.resolve_vehicle(&request.vehicle_id)
            })
            .await?;

        let manifest = self.snapshot_manifest(route_id).await?;
        tracing::info!(
            step = %SagaStep::SnapshotBookings,
            bookings = manifest.len(),
            "saga step completed"
        );

        let entry = self.recheck_assignable(route_id).await?;
        let assignment = Assignment::for_route(
            AssignmentId::generate(),
            &entry,
            &driver,
            &vehicle,
            manifest_passengers(&manifest),
        );
        self.persist_assignment(&assignment).await?;
        tracing::info!(
            step = %SagaStep::PersistAssignment,
            assignment_id = %assignment.id,
            "saga step completed"
        );

        let booking_ids: Vec<BookingId> = manifest.into_iter().map(|b| b.id).collect();
        self.finish_assign(&assignment, &booking_ids).await?;
        Ok(assignment.id)
    }

    /// Confirms every pending booking on the route without choosing a driver.
    ///
    /// Touches no other store. Returns the number of bookings confirmed; an
    /// unknown route or a second call yields zero.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_all(&self, route_id: &RouteId) -> Result<usize> {
        if route_id.is_blank() {
            return Err(SagaError::Validation("route id is required".to_string()));
        }

        let confirmed = self
            .retry
            .run("confirm_pending_bookings", || {
                self.bookings.confirm_pending(route_id)
            })
            .await?;
        metrics::counter!("bookings_confirmed_total").increment(confirmed as u64);
        tracing::info!(confirmed, "pending bookings confirmed");
        Ok(confirmed)
    }

    /// Reverses an assignment and returns the route to the pool under its
    /// original id.
    ///
    /// Refused with a conflict while an assign of the route is still in
    /// flight; finish that saga first by re-running it or reconciling.
    #[tracing::instrument(skip(self), fields(saga = "unassign"))]
    pub async fn unassign(&self, assignment_id: &AssignmentId) -> Result<RouteId> {
        if assignment_id.is_blank() {
            return Err(SagaError::Validation(
                "assignment id is required".to_string(),
            ));
        }

        let listed = self
            .retry
            .run("read_assignment", || self.assignments.get(assignment_id))
            .await?
            .ok_or_else(|| SagaError::not_found("Assignment", assignment_id))?;
        let assignment = self.recheck_unassignable(&listed).await?;
        tracing::info!(
            step = %SagaStep::ReadAssignment,
            route_id = %assignment.route_id,
            "saga step completed"
        );

        // A failed restore leaves everything untouched.
        let restored = self
            .retry
            .run("restore_pool_entry", || {
                self.pool.restore(assignment.restore_pool_entry())
            })
            .await?;
        tracing::info!(
            step = %SagaStep::RestorePoolEntry,
            restored,
            "saga step completed"
        );

        self.finish_unassign(&assignment).await?;
        metrics::counter!("route_unassignments_total").increment(1);
        tracing::info!(route_id = %assignment.route_id, "route unassigned");
        Ok(assignment.route_id)
    }

    /// Runs assign steps 3 and 4 for an assignment whose pool entry still
    /// exists. The manifest bookings are recovered from the passenger list.
    pub(crate) async fn resume_assign(&self, assignment: &Assignment) -> Result<()> {
        let route_bookings = self
            .retry
            .run("list_route_bookings", || {
                self.bookings.list_by_route(&assignment.route_id)
            })
            .await
            .map_err(|e| {
                self.partial_failure(SagaKind::Assign, assignment, SagaStep::PersistAssignment, e)
            })?;

        let booking_ids: Vec<BookingId> = route_bookings
            .into_iter()
            .filter(|b| b.is_manifest_candidate() && assignment.has_passenger(&b.user_id))
            .map(|b| b.id)
            .collect();
        self.finish_assign(assignment, &booking_ids).await
    }

    /// Runs unassign steps 3 and 4 for an assignment whose pool entry has
    /// been restored.
    pub(crate) async fn resume_unassign(&self, assignment: &Assignment) -> Result<()> {
        self.finish_unassign(assignment).await
    }

    pub(crate) async fn load_route(
        &self,
        route_id: &RouteId,
    ) -> Result<(Option<RoutePoolEntry>, Option<Assignment>)> {
        let entry = self
            .retry
            .run("read_pool_entry", || self.pool.get(route_id))
            .await?;
        let assignment = self
            .retry
            .run("find_assignment", || self.assignments.find_by_route(route_id))
            .await?;
        Ok((entry, assignment))
    }

    pub(crate) async fn list_assignments(&self) -> Result<Vec<Assignment>> {
        self.retry
            .run("list_assignments", || self.assignments.list())
            .await
    }

    pub(crate) async fn read_assignment(&self, id: &AssignmentId) -> Result<Option<Assignment>> {
        self.retry
            .run("read_assignment", || self.assignments.get(id))
            .await
    }

    pub(crate) async fn read_pool_entry(&self, route_id: &RouteId) -> Result<Option<RoutePoolEntry>> {
        self.retry
            .run("read_pool_entry", || self.pool.get(route_id))
            .await
    }

    /// Pending bookings plus bookings locked by `confirm_all`.
    async fn snapshot_manifest(&self, route_id: &RouteId) -> Result<Vec<Booking>> {
        let bookings = self
            .retry
            .run("snapshot_bookings", || self.bookings.list_by_route(route_id))
            .await?;
        Ok(bookings
            .into_iter()
            .filter(Booking::is_manifest_candidate)
            .collect())
    }

    /// Re-reads the route right before the first write of an assign.
    async fn recheck_assignable(&self, route_id: &RouteId) -> Result<RoutePoolEntry> {
        match self.load_route(route_id).await? {
            (Some(entry), None) => Ok(entry),
            (None, None) => Err(SagaError::conflict(
                route_id,
                "route left the pool during assign",
            )),
            (_, Some(existing)) => Err(SagaError::conflict(
                route_id,
                format!("route was assigned concurrently as {}", existing.id),
            )),
        }
    }

    /// Re-reads the route right before the first write of an unassign.
    ///
    /// Refuses while an assign of the same route is still in flight, and when
    /// the route now carries a different assignment than the one requested.
    async fn recheck_unassignable(&self, listed: &Assignment) -> Result<Assignment> {
        let (entry, live) = self.load_route(&listed.route_id).await?;
        let Some(live) = live else {
            return Err(SagaError::not_found("Assignment", &listed.id));
        };
        if live.id != listed.id {
            return Err(SagaError::conflict(
                &listed.route_id,
                format!("route is now assigned as {}", live.id),
            ));
        }

        match RouteState::derive(entry.as_ref(), Some(&live)) {
            Some(state) if state.can_unassign() => Ok(live),
            state => Err(SagaError::conflict(
                &listed.route_id,
                format!(
                    "route is {} and cannot be unassigned yet",
                    state.map(|s| s.as_str()).unwrap_or("unknown")
                ),
            )),
        }
    }

    async fn persist_assignment(&self, assignment: &Assignment) -> Result<()> {
        let result = self
            .retry
            .run("persist_assignment", || {
                self.assignments.create(assignment.clone())
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(SagaError::Store(StoreError::Conflict { reason, .. })) => {
                // A timed-out attempt may have committed before the retry hit the guard.
                let current = self
                    .retry
                    .run("find_assignment", || {
                        self.assignments.find_by_route(&assignment.route_id)
                    })
                    .await?;
                match current {
                    Some(current) if current.id == assignment.id => Ok(()),
                    _ => Err(SagaError::conflict(&assignment.route_id, reason)),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn finish_assign(&self, assignment: &Assignment, booking_ids: &[BookingId]) -> Result<()> {
        let confirmed = self
            .retry
            .run("confirm_bookings", || {
                self.bookings.confirm_for_assignment(
                    booking_ids,
                    &assignment.assigned_driver_id,
                    &assignment.assigned_vehicle_id,
                )
            })
            .await
            .map_err(|e| {
                self.partial_failure(SagaKind::Assign, assignment, SagaStep::PersistAssignment, e)
            })?;
        tracing::info!(
            step = %SagaStep::ConfirmBookings,
            confirmed,
            "saga step completed"
        );

        // The pool entry is the route's only record once its assignment is gone.
        let still_assigned = self
            .read_assignment(&assignment.id)
            .await
            .map_err(|e| {
                self.partial_failure(SagaKind::Assign, assignment, SagaStep::ConfirmBookings, e)
            })?
            .is_some();
        if !still_assigned {
            return self.abandon_assign(assignment).await;
        }

        let removed = self
            .retry
            .run("remove_pool_entry", || self.pool.remove(&assignment.route_id))
            .await
            .map_err(|e| {
                self.partial_failure(SagaKind::Assign, assignment, SagaStep::ConfirmBookings, e)
            })?;
        tracing::info!(
            step = %SagaStep::RemovePoolEntry,
            removed,
            "saga step completed"
        );
        Ok(())
    }

    /// Undoes step 3 of an assign whose assignment was deleted underneath it,
    /// leaving the route unassigned in the pool.
    async fn abandon_assign(&self, assignment: &Assignment) -> Result<()> {
        let reset = self
            .retry
            .run("reset_bookings", || {
                self.bookings.reset_confirmed(&assignment.route_id)
            })
            .await
            .map_err(|e| {
                self.partial_failure(SagaKind::Assign, assignment, SagaStep::ConfirmBookings, e)
            })?;
        tracing::warn!(
            route_id = %assignment.route_id,
            assignment_id = %assignment.id,
            reset,
            "assignment removed before assign finished"
        );
        Err(SagaError::conflict(
            &assignment.route_id,
            format!("assignment {} was removed before assign finished", assignment.id),
        ))
    }

    async fn finish_unassign(&self, assignment: &Assignment) -> Result<()> {
        let reset = self
            .retry
            .run("reset_bookings", || {
                self.bookings.reset_confirmed(&assignment.route_id)
            })
            .await
            .map_err(|e| {
                self.partial_failure(SagaKind::Unassign, assignment, SagaStep::RestorePoolEntry, e)
            })?;
        tracing::info!(step = %SagaStep::ResetBookings, reset, "saga step completed");

        let removed = self
            .retry
            .run("delete_assignment", || self.assignments.remove(&assignment.id))
            .await
            .map_err(|e| {
                self.partial_failure(SagaKind::Unassign, assignment, SagaStep::ResetBookings, e)
            })?;
        tracing::info!(
            step = %SagaStep::DeleteAssignment,
            removed,
            "saga step completed"
        );
        Ok(())
    }

    fn partial_failure(
        &self,
        saga: SagaKind,
        assignment: &Assignment,
        last_completed: SagaStep,
        cause: SagaError,
    ) -> SagaError {
        metrics::counter!("saga_partial_failures_total", "saga" => saga.as_str()).increment(1);
        tracing::warn!(
            %saga,
            route_id = %assignment.route_id,
            assignment_id = %assignment.id,
            %last_completed,
            error = %cause,
            "saga stopped part way"
        );
        SagaError::PartialFailure {
            saga,
            route_id: assignment.route_id.clone(),
            assignment_id: assignment.id.clone(),
            last_completed,
            reason: cause.to_string(),
        }
    }
}

/// One passenger per rider, in manifest order.
fn manifest_passengers(manifest: &[Booking]) -> Vec<Passenger> {
    let mut seen = HashSet::new();
    manifest
        .iter()
        .filter(|b| seen.insert(b.user_id.clone()))
        .map(Booking::passenger)
        .collect()
}
