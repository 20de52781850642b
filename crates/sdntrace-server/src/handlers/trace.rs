//! Trace handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use crate::error::ApiError;
use crate::schema::trace::{BatchTraceResponse, ListTracesResponse, TraceResponse};
use crate::store::TraceRecord;
use crate::state::AppState;

/// Traces one request.
///
/// `PUT /trace`
pub async fn put_trace(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<TraceResponse>, ApiError> {
    let Json(body) = body?;
    let record = state.service.trace(body).await?;
    Ok(Json(TraceResponse {
        request_id: record.request_id,
        result: record.result,
    }))
}

/// Traces a list of requests.
///
/// `PUT /traces`
pub async fn put_traces(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BatchTraceResponse>, ApiError> {
    let Json(body) = body?;
    let Value::Array(entries) = body else {
        return Err(ApiError::BadRequest(
            "expected a list of trace requests".to_string(),
        ));
    };
    let result = state.service.traces(entries).await?;
    Ok(Json(BatchTraceResponse { result }))
}

/// Returns a stored trace.
///
/// `GET /trace/{id}`
pub async fn get_trace(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<TraceRecord>, ApiError> {
    Ok(Json(state.service.get_result(id)?))
}

/// Lists stored traces.
///
/// `GET /traces`
pub async fn list_traces(State(state): State<AppState>) -> Json<ListTracesResponse> {
    let traces = state.service.list();
    Json(ListTracesResponse {
        total: traces.len(),
        traces,
    })
}
