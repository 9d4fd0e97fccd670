//! Route grouping, assignment and reconcile endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{AssignmentId, DriverId, RouteId, VehicleId};
use domain::AssignRequest;
use projections::RouteGroup;
use saga::{
    AssignmentOrchestrator, DriverDirectory, ReconcileReport, RouteState, VehicleDirectory,
};
use serde::{Deserialize, Serialize};
use store::{AssignmentStore, BookingStore, RoutePool};

use crate::error::ApiError;

/// Orchestrator over type-erased stores, so one router serves every backend.
pub type DynOrchestrator = AssignmentOrchestrator<
    Arc<dyn BookingStore>,
    Arc<dyn RoutePool>,
    Arc<dyn AssignmentStore>,
    Arc<dyn DriverDirectory>,
    Arc<dyn VehicleDirectory>,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: Arc<DynOrchestrator>,
}

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct AssignBody {
    pub driver_id: Option<String>,
    pub vehicle_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct PendingGroupsResponse {
    pub route_count: usize,
    pub booking_count: usize,
    /// Ordered by earliest pickup, then route id.
    pub groups: Vec<RouteGroup>,
}

#[derive(Serialize)]
pub struct RouteStateResponse {
    pub route_id: RouteId,
    pub state: RouteState,
}

#[derive(Serialize)]
pub struct AssignResponse {
    pub assignment_id: AssignmentId,
    pub route_id: RouteId,
}

#[derive(Serialize)]
pub struct ConfirmAllResponse {
    pub route_id: RouteId,
    pub confirmed: usize,
}

#[derive(Serialize)]
pub struct UnassignResponse {
    pub route_id: RouteId,
}

// -- Handlers --

/// GET /routes/pending-groups
#[tracing::instrument(skip(state))]
pub async fn pending_groups(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PendingGroupsResponse>, ApiError> {
    let view = state.orchestrator.group_pending().await?;
    Ok(Json(PendingGroupsResponse {
        route_count: view.len(),
        booking_count: view.booking_count(),
        groups: view.by_earliest_pickup().into_iter().cloned().collect(),
    }))
}

/// GET /routes/{id}/state
#[tracing::instrument(skip(state))]
pub async fn route_state(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RouteStateResponse>, ApiError> {
    let route_id = RouteId::new(id);
    let route_state = state.orchestrator.route_state(&route_id).await?;
    Ok(Json(RouteStateResponse {
        route_id,
        state: route_state,
    }))
}

/// POST /routes/{id}/assign
#[tracing::instrument(skip(state, body))]
pub async fn assign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AssignBody>,
) -> Result<(StatusCode, Json<AssignResponse>), ApiError> {
    let request = AssignRequest::new(
        Some(RouteId::new(id)),
        body.driver_id.map(DriverId::new),
        body.vehicle_id.map(VehicleId::new),
    )?;

    let assignment_id = state
        .orchestrator
        .assign(&request.route_id, &request.driver_id, &request.vehicle_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AssignResponse {
            assignment_id,
            route_id: request.route_id,
        }),
    ))
}

/// POST /routes/{id}/confirm-all
#[tracing::instrument(skip(state))]
pub async fn confirm_all(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ConfirmAllResponse>, ApiError> {
    let route_id = RouteId::new(id);
    let confirmed = state.orchestrator.confirm_all(&route_id).await?;
    Ok(Json(ConfirmAllResponse {
        route_id,
        confirmed,
    }))
}

/// POST /assignments/{id}/unassign
#[tracing::instrument(skip(state))]
pub async fn unassign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UnassignResponse>, ApiError> {
    let route_id = state
        .orchestrator
        .unassign(&AssignmentId::new(id))
        .await?;
    Ok(Json(UnassignResponse { route_id }))
}

/// POST /reconcile
#[tracing::instrument(skip(state))]
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReconcileReport>, ApiError> {
    Ok(Json(state.orchestrator.reconcile().await?))
}
