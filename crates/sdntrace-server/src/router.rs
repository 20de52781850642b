//! Router assembly for the trace API.
//!
//! [`build_router`] wires all handler functions to their routes with
//! CORS and tracing middleware layers.

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Traces
        .route("/trace", put(handlers::trace::put_trace))
        .route("/trace/{id}", get(handlers::trace::get_trace))
        .route(
            "/traces",
            get(handlers::trace::list_traces).put(handlers::trace::put_traces),
        )
        // Circuits
        .route("/circuits", get(handlers::circuits::list_circuits))
        .route("/circuits/discover", post(handlers::circuits::discover))
        .route("/circuits/lookup", post(handlers::circuits::lookup))
        .route("/circuits/reconcile", post(handlers::circuits::reconcile))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
