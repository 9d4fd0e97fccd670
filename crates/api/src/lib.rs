//! HTTP API server for the route assignment workflow.
//!
//! Exposes pending-booking groups, assign / confirm-all / unassign and the
//! reconcile sweep over REST, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    AssignmentOrchestrator, DriverDirectory, InMemoryDriverDirectory, InMemoryVehicleDirectory,
    RetryPolicy, VehicleDirectory,
};
use store::{
    AssignmentStore, BookingStore, InMemoryAssignmentStore, InMemoryBookingStore,
    InMemoryRoutePool, RoutePool,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::assignments::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route(
            "/routes/pending-groups",
            get(routes::assignments::pending_groups),
        )
        .route("/routes/{id}/state", get(routes::assignments::route_state))
        .route("/routes/{id}/assign", post(routes::assignments::assign))
        .route(
            "/routes/{id}/confirm-all",
            post(routes::assignments::confirm_all),
        )
        .route(
            "/assignments/{id}/unassign",
            post(routes::assignments::unassign),
        )
        .route("/reconcile", post(routes::assignments::reconcile))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the application state over any store and directory backends.
pub fn create_state(
    bookings: Arc<dyn BookingStore>,
    pool: Arc<dyn RoutePool>,
    assignments: Arc<dyn AssignmentStore>,
    drivers: Arc<dyn DriverDirectory>,
    vehicles: Arc<dyn VehicleDirectory>,
    retry: RetryPolicy,
) -> Arc<AppState> {
    let orchestrator =
        AssignmentOrchestrator::new(bookings, pool, assignments, drivers, vehicles)
            .with_retry_policy(retry);
    Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
    })
}

/// Handles to the in-memory backends behind a default state.
///
/// Clones share records with the orchestrator, so seeding and fault
/// injection through these handles is visible to the API.
#[derive(Clone, Default)]
pub struct InMemoryBackends {
    pub bookings: InMemoryBookingStore,
    pub pool: InMemoryRoutePool,
    pub assignments: InMemoryAssignmentStore,
    pub drivers: InMemoryDriverDirectory,
    pub vehicles: InMemoryVehicleDirectory,
}

/// Creates application state backed entirely by in-memory stores.
pub fn create_default_state(retry: RetryPolicy) -> (Arc<AppState>, InMemoryBackends) {
    let backends = InMemoryBackends::default();
    let state = create_state(
        Arc::new(backends.bookings.clone()),
        Arc::new(backends.pool.clone()),
        Arc::new(backends.assignments.clone()),
        Arc::new(backends.drivers.clone()),
        Arc::new(backends.vehicles.clone()),
        retry,
    );
    (state, backends)
}
