//! Circuit handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use sdntrace_core::CircuitEndpoints;

use crate::error::ApiError;
use crate::schema::circuits::{
    CircuitLookupResponse, DiscoverResponse, ListCircuitsResponse, ReconcileResponse,
};
use crate::state::AppState;

/// Lists the known circuits.
///
/// `GET /circuits`
pub async fn list_circuits(State(state): State<AppState>) -> Json<ListCircuitsResponse> {
    let circuits = state.engine.circuits().await;
    Json(ListCircuitsResponse {
        total: circuits.len(),
        circuits,
    })
}

/// Runs discovery now and alerts on asymmetric circuits.
///
/// `POST /circuits/discover`
pub async fn discover(State(state): State<AppState>) -> Result<Json<DiscoverResponse>, ApiError> {
    let discovery = state.engine.find_circuits().await?;
    let asymmetric = state.engine.check_circuits().await;
    Ok(Json(DiscoverResponse {
        total: discovery.circuits.len(),
        asymmetric,
        failed: discovery.failed,
    }))
}

/// Finds the known circuit between two endpoints.
///
/// `POST /circuits/lookup`
pub async fn lookup(
    State(state): State<AppState>,
    endpoints: Result<Json<CircuitEndpoints>, JsonRejection>,
) -> Result<Json<CircuitLookupResponse>, ApiError> {
    let Json(endpoints) = endpoints?;
    let circuit = state.engine.get_circuit(&endpoints).await.ok_or_else(|| {
        ApiError::NotFound(format!(
            "no circuit from {}:{} to {}:{}",
            endpoints.dpid_a, endpoints.port_a, endpoints.dpid_z, endpoints.port_z
        ))
    })?;
    Ok(Json(CircuitLookupResponse { circuit }))
}

/// Replays the known circuits and reports the changed ones.
///
/// `POST /circuits/reconcile`
pub async fn reconcile(
    State(state): State<AppState>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let report = state.engine.run_traces().await?;
    Ok(Json(ReconcileResponse {
        changed: report.changed,
        failed: report.failed,
    }))
}
