//! Background sweep that finishes interrupted sagas.

use std::sync::Arc;
use std::time::Duration;

use common::{AssignmentId, RouteId};
use domain::Assignment;
use serde::Serialize;
use store::{AssignmentStore, BookingStore, RoutePool};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::directory::{DriverDirectory, VehicleDirectory};
use crate::error::Result;
use crate::orchestrator::AssignmentOrchestrator;
use crate::state::RouteState;

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Assignments inspected.
    pub scanned: usize,
    pub resumed_assignments: Vec<RouteId>,
    pub resumed_unassignments: Vec<RouteId>,
    pub failures: Vec<ReconcileFailure>,
}

impl ReconcileReport {
    /// Number of sagas finished by this pass.
    pub fn resumed(&self) -> usize {
        self.resumed_assignments.len() + self.resumed_unassignments.len()
    }

    pub fn is_clean(&self) -> bool {
        self.resumed() == 0 && self.failures.is_empty()
    }
}

/// A route the pass could not finish; the next pass tries again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileFailure {
    pub route_id: RouteId,
    pub assignment_id: AssignmentId,
    pub error: String,
}

impl<B, P, A, D, V> AssignmentOrchestrator<B, P, A, D, V>
where
    B: BookingStore,
    P: RoutePool,
    A: AssignmentStore,
    D: DriverDirectory,
    V: VehicleDirectory,
{
    /// Scans every assignment and finishes the sagas left in flight.
    ///
    /// Stateless: the work list is derived from the records each time.
    /// Safe to run alongside operator calls since every resumed step is
    /// idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let assignments = self.list_assignments().await?;
        let mut report = ReconcileReport {
            scanned: assignments.len(),
            ..ReconcileReport::default()
        };

        for assignment in assignments {
            let route_id = assignment.route_id.clone();
            match self.reconcile_assignment(assignment.clone()).await {
                Ok(Some(RouteState::Assigning)) => report.resumed_assignments.push(route_id),
                Ok(Some(RouteState::Unassigning)) => report.resumed_unassignments.push(route_id),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(%route_id, error = %e, "reconcile could not finish route");
                    report.failures.push(ReconcileFailure {
                        route_id,
                        assignment_id: assignment.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        metrics::counter!("saga_reconciled_total").increment(report.resumed() as u64);
        if !report.is_clean() {
            tracing::info!(
                scanned = report.scanned,
                resumed = report.resumed(),
                failures = report.failures.len(),
                "reconcile pass finished"
            );
        }
        Ok(report)
    }

    /// Re-derives the route's state from fresh reads and resumes it if needed.
    ///
    /// Returns the state acted on, or `None` if the assignment vanished.
    async fn reconcile_assignment(&self, listed: Assignment) -> Result<Option<RouteState>> {
        let Some(assignment) = self.read_assignment(&listed.id).await? else {
            return Ok(None);
        };
        let entry = self.read_pool_entry(&assignment.route_id).await?;

        let state = RouteState::derive(entry.as_ref(), Some(&assignment));
        let Some(state) = state.filter(RouteState::is_in_flight) else {
            return Ok(state);
        };

        if state == RouteState::Assigning {
            tracing::info!(route_id = %assignment.route_id, "resuming interrupted assign");
            self.resume_assign(&assignment).await?;
        } else {
            tracing::info!(route_id = %assignment.route_id, "resuming interrupted unassign");
            self.resume_unassign(&assignment).await?;
        }
        Ok(Some(state))
    }
}

/// Runs [`AssignmentOrchestrator::reconcile`] every `period` until the task is aborted.
pub fn spawn_reconciler<B, P, A, D, V>(
    orchestrator: Arc<AssignmentOrchestrator<B, P, A, D, V>>,
    period: Duration,
) -> JoinHandle<()>
where
    B: BookingStore + 'static,
    P: RoutePool + 'static,
    A: AssignmentStore + 'static,
    D: DriverDirectory + 'static,
    V: VehicleDirectory + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = orchestrator.reconcile().await {
                tracing::warn!(error = %e, "reconcile pass failed");
            }
        }
    })
}
