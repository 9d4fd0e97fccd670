//! Integration tests for the route assignment sagas.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use common::{AssignmentId, BookingId, DriverId, RouteId, VehicleId};
use domain::{Booking, BookingStatus, DriverProfile, Itinerary, RoutePoolEntry, VehicleProfile};
use saga::{
    AssignmentOrchestrator, InMemoryDriverDirectory, InMemoryVehicleDirectory, RetryPolicy,
    RouteState, SagaError, SagaKind, SagaStep,
};
use store::{
    AssignmentStore, BookingStore, InMemoryAssignmentStore, InMemoryBookingStore,
    InMemoryRoutePool, RoutePool,
};

type TestOrchestrator = AssignmentOrchestrator<
    InMemoryBookingStore,
    InMemoryRoutePool,
    InMemoryAssignmentStore,
    InMemoryDriverDirectory,
    InMemoryVehicleDirectory,
>;

struct TestHarness {
    orchestrator: TestOrchestrator,
    bookings: InMemoryBookingStore,
    pool: InMemoryRoutePool,
    assignments: InMemoryAssignmentStore,
    drivers: InMemoryDriverDirectory,
    vehicles: InMemoryVehicleDirectory,
}

fn pickup(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
}

impl TestHarness {
    fn new() -> Self {
        let bookings = InMemoryBookingStore::new();
        let pool = InMemoryRoutePool::new();
        let assignments = InMemoryAssignmentStore::new();
        let drivers = InMemoryDriverDirectory::new();
        let vehicles = InMemoryVehicleDirectory::new();

        drivers.register(DriverProfile::new("D1", "Dana"));
        drivers.register(DriverProfile::new("D2", "Eli"));
        vehicles.register(VehicleProfile::new("V1", "Ford", "Transit", "XYZ-1"));
        vehicles.register(VehicleProfile::new("V2", "Mercedes", "Sprinter", "ABC-2"));

        let orchestrator = AssignmentOrchestrator::new(
            bookings.clone(),
            pool.clone(),
            assignments.clone(),
            drivers.clone(),
            vehicles.clone(),
        )
        .with_retry_policy(
            RetryPolicy::default()
                .with_backoff(Duration::from_millis(1), Duration::from_millis(4))
                .with_timeout(Duration::from_millis(200)),
        );

        Self {
            orchestrator,
            bookings,
            pool,
            assignments,
            drivers,
            vehicles,
        }
    }

    async fn add_route(&self, id: &str) {
        let itinerary =
            Itinerary::new(format!("{id} line"), "Depot", "Campus").with_waypoints(["Mall"]);
        self.pool
            .insert(RoutePoolEntry::new(id, itinerary))
            .await
            .unwrap();
    }

    async fn add_booking(&self, id: &str, route: &str, user: &str, hour: u32) {
        let booking = Booking::pending(id, route, user, pickup(hour))
            .with_rider(format!("Rider {user}"), format!("{user}@example.com"))
            .with_trip("Depot", "Campus");
        self.bookings.insert(booking).await.unwrap();
    }

    async fn booking(&self, id: &str) -> Booking {
        self.bookings
            .get(&BookingId::new(id))
            .await
            .unwrap()
            .unwrap()
    }

    async fn assign(
        &self,
        route: &str,
        driver: &str,
        vehicle: &str,
    ) -> Result<AssignmentId, SagaError> {
        self.orchestrator
            .assign(
                &RouteId::new(route),
                &DriverId::new(driver),
                &VehicleId::new(vehicle),
            )
            .await
    }

    async fn state(&self, route: &str) -> RouteState {
        self.orchestrator
            .route_state(&RouteId::new(route))
            .await
            .unwrap()
    }

    fn reset_faults(&self) {
        self.bookings.faults().reset();
        self.pool.faults().reset();
        self.assignments.faults().reset();
    }

    /// Checks the cross-store invariants for every route at rest.
    async fn assert_invariants(&self) {
        let assignments = self.assignments.list().await.unwrap();
        for assignment in &assignments {
            let entry = self.pool.get(&assignment.route_id).await.unwrap();
            assert!(
                entry.is_none(),
                "route {} is both pooled and assigned",
                assignment.route_id
            );

            let users: HashSet<_> = assignment.passengers.iter().map(|p| &p.user_id).collect();
            assert_eq!(users.len(), assignment.passengers.len(), "duplicate passenger");
        }

        let confirmed = self
            .bookings
            .list_by_status(BookingStatus::Confirmed)
            .await
            .unwrap();
        for booking in confirmed.iter().filter(|b| b.is_stamped()) {
            let assignment = self
                .assignments
                .find_by_route(&booking.route_id)
                .await
                .unwrap()
                .unwrap_or_else(|| panic!("booking {} stamped without assignment", booking.id));
            assert!(assignment.has_passenger(&booking.user_id));
            assert_eq!(
                booking.assigned_driver_id.as_ref(),
                Some(&assignment.assigned_driver_id)
            );
        }

        for booking in self
            .bookings
            .list_by_status(BookingStatus::Pending)
            .await
            .unwrap()
        {
            assert!(!booking.is_stamped(), "pending booking {} is stamped", booking.id);
        }
    }
}

#[tokio::test]
async fn test_scenario_r1_assign_confirms_all_passengers() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    h.add_booking("B2", "R1", "U2", 7).await;
    h.add_booking("B3", "R1", "U3", 9).await;

    let assignment_id = h.assign("R1", "D1", "V1").await.unwrap();

    let assignment = h.assignments.get(&assignment_id).await.unwrap().unwrap();
    assert_eq!(assignment.route_id, RouteId::new("R1"));
    assert_eq!(assignment.itinerary.name, "R1 line");
    assert_eq!(assignment.itinerary.waypoints, vec!["Mall".to_string()]);
    assert_eq!(assignment.assigned_driver_name, "Dana");
    assert_eq!(assignment.assigned_vehicle_info, "Ford Transit (XYZ-1)");
    let users: Vec<&str> = assignment
        .passengers
        .iter()
        .map(|p| p.user_id.as_str())
        .collect();
    assert_eq!(users, vec!["U2", "U1", "U3"]);

    for id in ["B1", "B2", "B3"] {
        let booking = h.booking(id).await;
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.assigned_driver_id, Some(DriverId::new("D1")));
        assert_eq!(booking.assigned_vehicle_id, Some(VehicleId::new("V1")));
    }

    assert!(h.pool.get(&RouteId::new("R1")).await.unwrap().is_none());
    assert_eq!(h.state("R1").await, RouteState::Assigned);
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_scenario_r2_confirm_all_is_idempotent() {
    let h = TestHarness::new();
    h.add_route("R2").await;
    h.add_booking("B1", "R2", "U1", 8).await;
    h.add_booking("B2", "R2", "U2", 9).await;

    let route = RouteId::new("R2");
    assert_eq!(h.orchestrator.confirm_all(&route).await.unwrap(), 2);
    assert_eq!(h.orchestrator.confirm_all(&route).await.unwrap(), 0);

    for id in ["B1", "B2"] {
        let booking = h.booking(id).await;
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(!booking.is_stamped());
    }

    // Touches no other store.
    assert_eq!(h.assignments.assignment_count().await, 0);
    assert_eq!(h.state("R2").await, RouteState::Unassigned);
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_confirm_all_unknown_route_yields_zero() {
    let h = TestHarness::new();
    let confirmed = h
        .orchestrator
        .confirm_all(&RouteId::new("R404"))
        .await
        .unwrap();
    assert_eq!(confirmed, 0);
}

#[tokio::test]
async fn test_assign_includes_bookings_locked_by_confirm_all() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    h.orchestrator.confirm_all(&RouteId::new("R1")).await.unwrap();
    h.add_booking("B2", "R1", "U2", 9).await;

    let id = h.assign("R1", "D1", "V1").await.unwrap();

    let assignment = h.assignments.get(&id).await.unwrap().unwrap();
    assert_eq!(assignment.passengers.len(), 2);
    assert!(h.booking("B1").await.is_stamped());
    assert!(h.booking("B2").await.is_stamped());
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_assign_skips_rejected_bookings() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    h.bookings
        .insert(
            Booking::pending("B2", "R1", "U2", pickup(9)).with_status(BookingStatus::Rejected),
        )
        .await
        .unwrap();

    let id = h.assign("R1", "D1", "V1").await.unwrap();

    let assignment = h.assignments.get(&id).await.unwrap().unwrap();
    assert_eq!(assignment.passengers.len(), 1);
    let rejected = h.booking("B2").await;
    assert_eq!(rejected.status, BookingStatus::Rejected);
    assert!(!rejected.is_stamped());
}

#[tokio::test]
async fn test_rider_with_two_bookings_is_one_passenger() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    h.add_booking("B2", "R1", "U1", 17).await;
    h.add_booking("B3", "R1", "U2", 9).await;

    h.assign("R1", "D1", "V1").await.unwrap();

    let assignment = h
        .assignments
        .find_by_route(&RouteId::new("R1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(assignment.passengers.len(), 2);
    for id in ["B1", "B2", "B3"] {
        assert!(h.booking(id).await.is_stamped());
    }
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_assign_empty_route() {
    let h = TestHarness::new();
    h.add_route("R1").await;

    let id = h.assign("R1", "D1", "V1").await.unwrap();

    let assignment = h.assignments.get(&id).await.unwrap().unwrap();
    assert!(assignment.passengers.is_empty());
    assert_eq!(h.state("R1").await, RouteState::Assigned);
}

#[tokio::test]
async fn test_assign_unknown_route() {
    let h = TestHarness::new();
    let result = h.assign("R404", "D1", "V1").await;
    assert!(matches!(result, Err(SagaError::NotFound { kind: "Route", .. })));
}

#[tokio::test]
async fn test_unknown_driver_issues_no_writes() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;

    let result = h.assign("R1", "D9", "V1").await;

    assert!(matches!(result, Err(SagaError::NotFound { kind: "Driver", .. })));
    assert_eq!(h.vehicles.lookup_count(), 0);
    assert_eq!(h.assignments.assignment_count().await, 0);
    assert_eq!(h.pool.entry_count().await, 1);
    assert!(h.booking("B1").await.is_pending());
}

#[tokio::test]
async fn test_unknown_vehicle_issues_no_writes() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;

    let result = h.assign("R1", "D1", "V9").await;

    assert!(matches!(result, Err(SagaError::NotFound { kind: "Vehicle", .. })));
    assert_eq!(h.assignments.assignment_count().await, 0);
    assert_eq!(h.pool.entry_count().await, 1);
    assert!(h.booking("B1").await.is_pending());
}

#[tokio::test]
async fn test_directory_is_consulted_on_every_assign() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_route("R2").await;

    h.assign("R1", "D1", "V1").await.unwrap();
    h.drivers.deregister(&DriverId::new("D1"));

    let result = h.assign("R2", "D1", "V1").await;
    assert!(matches!(result, Err(SagaError::NotFound { kind: "Driver", .. })));
    assert_eq!(h.drivers.lookup_count(), 2);
}

#[tokio::test]
async fn test_directory_outage_is_transient() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.drivers.set_unavailable(true);

    let result = h.assign("R1", "D1", "V1").await;

    assert!(matches!(
        result,
        Err(SagaError::Transient {
            operation: "resolve_driver",
            attempts: 3,
            ..
        })
    ));
    assert_eq!(h.drivers.lookup_count(), 3);
    assert_eq!(h.assignments.assignment_count().await, 0);
}

#[tokio::test]
async fn test_assign_validation() {
    let h = TestHarness::new();
    h.add_route("R1").await;

    let result = h.assign("R1", "D1", "").await;
    assert!(matches!(result, Err(SagaError::Validation(_))));
    assert_eq!(h.drivers.lookup_count(), 0);
}

#[tokio::test]
async fn test_persist_failure_changes_nothing() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    h.assignments.faults().set_fail_writes(true);

    let result = h.assign("R1", "D1", "V1").await;

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        SagaError::Transient {
            operation: "persist_assignment",
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(h.assignments.assignment_count().await, 0);
    assert_eq!(h.pool.entry_count().await, 1);
    assert!(h.booking("B1").await.is_pending());
    assert_eq!(h.state("R1").await, RouteState::Unassigned);
}

#[tokio::test]
async fn test_transient_write_failure_is_retried() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    h.assignments.faults().fail_next_writes(1);
    h.bookings.faults().fail_next_writes(2);

    h.assign("R1", "D1", "V1").await.unwrap();

    assert_eq!(h.state("R1").await, RouteState::Assigned);
    assert!(h.booking("B1").await.is_stamped());
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_crash_after_persist_resumes_without_duplicate() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    h.add_booking("B2", "R1", "U2", 9).await;

    h.bookings.faults().set_fail_writes(true);
    let err = h.assign("R1", "D1", "V1").await.unwrap_err();
    let SagaError::PartialFailure {
        saga,
        last_completed,
        ref assignment_id,
        ..
    } = err
    else {
        panic!("expected partial failure, got {err:?}");
    };
    assert_eq!(saga, SagaKind::Assign);
    assert_eq!(last_completed, SagaStep::PersistAssignment);
    assert_eq!(err.last_completed_step(), Some(SagaStep::PersistAssignment));
    let first_id = assignment_id.clone();

    assert_eq!(h.state("R1").await, RouteState::Assigning);
    assert!(h.booking("B1").await.is_pending());

    h.reset_faults();
    let resumed_id = h.assign("R1", "D1", "V1").await.unwrap();

    assert_eq!(resumed_id, first_id);
    assert_eq!(h.assignments.assignment_count().await, 1);
    assert!(h.booking("B1").await.is_stamped());
    assert!(h.booking("B2").await.is_stamped());
    assert_eq!(h.state("R1").await, RouteState::Assigned);
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_crash_before_pool_removal_resumes() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;

    h.pool.faults().set_fail_writes(true);
    let err = h.assign("R1", "D1", "V1").await.unwrap_err();
    assert_eq!(err.last_completed_step(), Some(SagaStep::ConfirmBookings));
    assert!(h.booking("B1").await.is_stamped());
    assert_eq!(h.state("R1").await, RouteState::Assigning);

    h.reset_faults();
    let id = h.assign("R1", "D1", "V1").await.unwrap();
    assert_eq!(h.assignments.assignment_count().await, 1);
    assert_eq!(
        h.assignments.find_by_route(&RouteId::new("R1")).await.unwrap().unwrap().id,
        id
    );
    assert_eq!(h.state("R1").await, RouteState::Assigned);
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_resume_with_other_driver_is_conflict() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;

    h.bookings.faults().set_fail_writes(true);
    h.assign("R1", "D1", "V1").await.unwrap_err();
    h.reset_faults();

    let result = h.assign("R1", "D2", "V2").await;
    assert!(matches!(result, Err(SagaError::Conflict { .. })));
    assert_eq!(h.assignments.assignment_count().await, 1);
    assert!(h.booking("B1").await.is_pending());
}

#[tokio::test]
async fn test_reassign_same_selection_returns_existing_id() {
    let h = TestHarness::new();
    h.add_route("R1").await;

    let first = h.assign("R1", "D1", "V1").await.unwrap();
    let second = h.assign("R1", "D1", "V1").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.assignments.assignment_count().await, 1);
}

#[tokio::test]
async fn test_assign_assigned_route_with_other_driver_is_conflict() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.assign("R1", "D1", "V1").await.unwrap();

    let result = h.assign("R1", "D2", "V2").await;
    let err = result.unwrap_err();
    assert!(matches!(err, SagaError::Conflict { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_concurrent_assign_one_wins() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    h.pool.faults().set_delay(Some(Duration::from_millis(2)));

    let (first, second) = tokio::join!(h.assign("R1", "D1", "V1"), h.assign("R1", "D2", "V2"));

    let outcomes = [first, second];
    let successes = outcomes.iter().filter(|r| r.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(SagaError::Conflict { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);

    h.pool.faults().reset();
    assert_eq!(h.assignments.assignment_count().await, 1);
    assert_eq!(h.state("R1").await, RouteState::Assigned);
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_independent_routes_assign_concurrently() {
    let h = TestHarness::new();
    for route in ["R1", "R2", "R3"] {
        h.add_route(route).await;
        h.add_booking(&format!("{route}-B1"), route, "U1", 8).await;
    }

    let results = futures_util::future::join_all(
        ["R1", "R2", "R3"]
            .into_iter()
            .map(|route| h.assign(route, "D1", "V1")),
    )
    .await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(h.assignments.assignment_count().await, 3);
    assert_eq!(h.pool.entry_count().await, 0);
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_unassign_while_assign_in_flight_is_conflict() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    h.add_booking("B2", "R1", "U2", 9).await;
    h.bookings.faults().set_delay(Some(Duration::from_millis(100)));

    let unassign_once_persisted = async {
        let route = RouteId::new("R1");
        let id = loop {
            if let Some(assignment) = h.assignments.find_by_route(&route).await.unwrap() {
                break assignment.id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        let result = h.orchestrator.unassign(&id).await;
        (id, result)
    };
    let (assigned, (id, unassigned)) =
        tokio::join!(h.assign("R1", "D1", "V1"), unassign_once_persisted);

    assert_eq!(assigned.unwrap(), id);
    assert!(matches!(unassigned, Err(SagaError::Conflict { .. })));

    h.reset_faults();
    assert_eq!(h.state("R1").await, RouteState::Assigned);
    assert!(h.booking("B1").await.is_stamped());
    assert!(h.booking("B2").await.is_stamped());
    h.assert_invariants().await;

    h.orchestrator.unassign(&id).await.unwrap();
    assert_eq!(h.state("R1").await, RouteState::Unassigned);
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_assign_keeps_pool_entry_when_assignment_removed() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    h.bookings.faults().set_delay(Some(Duration::from_millis(100)));

    let remove_once_persisted = async {
        let route = RouteId::new("R1");
        loop {
            if let Some(assignment) = h.assignments.find_by_route(&route).await.unwrap() {
                assert!(h.assignments.remove(&assignment.id).await.unwrap());
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    let (assigned, ()) = tokio::join!(h.assign("R1", "D1", "V1"), remove_once_persisted);

    assert!(matches!(assigned, Err(SagaError::Conflict { .. })));
    h.reset_faults();
    assert!(h.pool.get(&RouteId::new("R1")).await.unwrap().is_some());
    assert_eq!(h.state("R1").await, RouteState::Unassigned);
    assert!(h.booking("B1").await.is_pending());
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_unassign_races_reconcile() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    let id = h.assign("R1", "D1", "V1").await.unwrap();
    h.bookings.faults().set_delay(Some(Duration::from_millis(50)));

    let reconcile_once_restored = async {
        let route = RouteId::new("R1");
        while h.pool.get(&route).await.unwrap().is_none() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        h.orchestrator.reconcile().await
    };
    let (unassigned, report) =
        tokio::join!(h.orchestrator.unassign(&id), reconcile_once_restored);

    assert_eq!(unassigned.unwrap(), RouteId::new("R1"));
    let report = report.unwrap();
    assert_eq!(report.resumed_unassignments, vec![RouteId::new("R1")]);
    assert!(report.failures.is_empty());

    h.reset_faults();
    assert_eq!(h.state("R1").await, RouteState::Unassigned);
    assert_eq!(h.assignments.assignment_count().await, 0);
    assert!(h.booking("B1").await.is_pending());
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_stale_unassign_leaves_newer_assignment() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    let first = h.assign("R1", "D1", "V1").await.unwrap();
    h.orchestrator.unassign(&first).await.unwrap();
    let second = h.assign("R1", "D2", "V2").await.unwrap();

    let stale = h.orchestrator.unassign(&first).await;

    assert!(matches!(stale, Err(SagaError::NotFound { kind: "Assignment", .. })));
    assert_eq!(
        h.booking("B1").await.assigned_driver_id,
        Some(DriverId::new("D2"))
    );
    assert_eq!(
        h.assignments.find_by_route(&RouteId::new("R1")).await.unwrap().unwrap().id,
        second
    );
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_assign_unassign_round_trip() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    h.add_booking("B2", "R1", "U2", 9).await;
    let original = h.pool.get(&RouteId::new("R1")).await.unwrap().unwrap();

    let id = h.assign("R1", "D1", "V1").await.unwrap();
    let route_id = h.orchestrator.unassign(&id).await.unwrap();

    assert_eq!(route_id, RouteId::new("R1"));
    let restored = h.pool.get(&route_id).await.unwrap().unwrap();
    assert_eq!(restored.id, original.id);
    assert_eq!(restored.itinerary, original.itinerary);
    assert!(h.assignments.get(&id).await.unwrap().is_none());
    for id in ["B1", "B2"] {
        let booking = h.booking(id).await;
        assert!(booking.is_pending());
        assert!(!booking.is_stamped());
    }
    assert_eq!(h.state("R1").await, RouteState::Unassigned);

    let view = h.orchestrator.group_pending().await.unwrap();
    assert_eq!(view.get(&route_id).map(|g| g.count), Some(2));

    // The restored route can be assigned again.
    let again = h.assign("R1", "D2", "V2").await.unwrap();
    assert_ne!(again, id);
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_unassign_unknown_and_repeated() {
    let h = TestHarness::new();
    h.add_route("R1").await;

    let missing = h.orchestrator.unassign(&AssignmentId::new("A404")).await;
    assert!(matches!(
        missing,
        Err(SagaError::NotFound {
            kind: "Assignment",
            ..
        })
    ));

    let id = h.assign("R1", "D1", "V1").await.unwrap();
    h.orchestrator.unassign(&id).await.unwrap();
    let repeated = h.orchestrator.unassign(&id).await;
    assert!(matches!(repeated, Err(SagaError::NotFound { .. })));
    assert_eq!(h.pool.entry_count().await, 1);
}

#[tokio::test]
async fn test_unassign_restore_failure_changes_nothing() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    let id = h.assign("R1", "D1", "V1").await.unwrap();

    h.pool.faults().set_fail_writes(true);
    let err = h.orchestrator.unassign(&id).await.unwrap_err();
    assert!(matches!(err, SagaError::Transient { .. }));

    h.reset_faults();
    assert_eq!(h.state("R1").await, RouteState::Assigned);
    assert!(h.booking("B1").await.is_stamped());
}

#[tokio::test]
async fn test_unassign_partial_failure_then_retry() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    let id = h.assign("R1", "D1", "V1").await.unwrap();

    h.bookings.faults().set_fail_writes(true);
    let err = h.orchestrator.unassign(&id).await.unwrap_err();
    assert!(matches!(
        err,
        SagaError::PartialFailure {
            saga: SagaKind::Unassign,
            last_completed: SagaStep::RestorePoolEntry,
            ..
        }
    ));
    assert_eq!(h.state("R1").await, RouteState::Unassigning);

    // An assign while the unassign is in flight is refused.
    h.reset_faults();
    let blocked = h.assign("R1", "D1", "V1").await;
    assert!(matches!(blocked, Err(SagaError::Conflict { .. })));

    h.orchestrator.unassign(&id).await.unwrap();
    assert_eq!(h.state("R1").await, RouteState::Unassigned);
    assert!(h.booking("B1").await.is_pending());
    h.assert_invariants().await;
}

#[tokio::test]
async fn test_unassign_fails_at_delete() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    let id = h.assign("R1", "D1", "V1").await.unwrap();

    h.assignments.faults().set_fail_writes(true);
    let err = h.orchestrator.unassign(&id).await.unwrap_err();
    assert_eq!(err.last_completed_step(), Some(SagaStep::ResetBookings));
    assert!(h.booking("B1").await.is_pending());
    assert_eq!(h.state("R1").await, RouteState::Unassigning);

    h.reset_faults();
    h.orchestrator.unassign(&id).await.unwrap();
    assert_eq!(h.assignments.assignment_count().await, 0);
}

#[tokio::test]
async fn test_reconcile_finishes_interrupted_sagas() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_route("R2").await;
    h.add_route("R3").await;
    h.add_booking("B1", "R1", "U1", 8).await;
    h.add_booking("B2", "R2", "U2", 8).await;

    // R1: assign stopped after persisting the assignment.
    h.bookings.faults().set_fail_writes(true);
    h.assign("R1", "D1", "V1").await.unwrap_err();
    h.reset_faults();

    // R2: unassign stopped after restoring the pool entry.
    let r2 = h.assign("R2", "D2", "V2").await.unwrap();
    h.bookings.faults().set_fail_writes(true);
    h.orchestrator.unassign(&r2).await.unwrap_err();
    h.reset_faults();

    // R3: at rest.
    h.assign("R3", "D1", "V1").await.unwrap();

    let report = h.orchestrator.reconcile().await.unwrap();

    assert_eq!(report.scanned, 3);
    assert_eq!(report.resumed_assignments, vec![RouteId::new("R1")]);
    assert_eq!(report.resumed_unassignments, vec![RouteId::new("R2")]);
    assert!(report.failures.is_empty());

    assert_eq!(h.state("R1").await, RouteState::Assigned);
    assert_eq!(h.state("R2").await, RouteState::Unassigned);
    assert_eq!(h.state("R3").await, RouteState::Assigned);
    assert!(h.booking("B1").await.is_stamped());
    assert!(h.booking("B2").await.is_pending());
    h.assert_invariants().await;

    let second = h.orchestrator.reconcile().await.unwrap();
    assert!(second.is_clean());
}

#[tokio::test]
async fn test_reconcile_reports_failures() {
    let h = TestHarness::new();
    h.add_route("R1").await;
    h.add_booking("B1", "R1", "U1", 8).await;

    h.bookings.faults().set_fail_writes(true);
    h.assign("R1", "D1", "V1").await.unwrap_err();

    let report = h.orchestrator.reconcile().await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].route_id, RouteId::new("R1"));
    assert_eq!(h.state("R1").await, RouteState::Assigning);
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let h = TestHarness::new();
    h.add_route("R1").await;

    let orchestrator = AssignmentOrchestrator::new(
        h.bookings.clone(),
        h.pool.clone(),
        h.assignments.clone(),
        h.drivers.clone(),
        h.vehicles.clone(),
    )
    .with_retry_policy(
        RetryPolicy::no_retry().with_timeout(Duration::from_millis(10)),
    );
    h.pool.faults().set_delay(Some(Duration::from_millis(100)));

    let result = orchestrator
        .assign(&RouteId::new("R1"), &DriverId::new("D1"), &VehicleId::new("V1"))
        .await;

    assert!(matches!(result, Err(SagaError::Transient { attempts: 1, .. })));
    h.pool.faults().reset();
    assert_eq!(h.assignments.assignment_count().await, 0);
    assert_eq!(h.state("R1").await, RouteState::Unassigned);
}
