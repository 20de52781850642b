//! Trace request/response types.

use serde::{Serialize, Serializer};

use sdntrace_core::{render_hops, HopView, TraceResult};

use crate::store::TraceRecord;

pub(crate) fn serialize_hops<S: Serializer>(
    result: &TraceResult,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    render_hops(result).serialize(serializer)
}

fn serialize_batch<S: Serializer>(
    results: &[TraceResult],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let rendered: Vec<Vec<HopView<'_>>> = results.iter().map(|r| render_hops(r)).collect();
    rendered.serialize(serializer)
}

/// Response for `PUT /trace`.
#[derive(Debug, Clone, Serialize)]
pub struct TraceResponse {
    /// Id under which the record can be fetched again.
    pub request_id: u64,
    #[serde(serialize_with = "serialize_hops")]
    pub result: TraceResult,
}

/// Response for `PUT /traces`: one hop list per request, in request order.
/// Malformed entries yield an empty list.
#[derive(Debug, Clone, Serialize)]
pub struct BatchTraceResponse {
    #[serde(serialize_with = "serialize_batch")]
    pub result: Vec<TraceResult>,
}

/// Response for `GET /traces`.
#[derive(Debug, Clone, Serialize)]
pub struct ListTracesResponse {
    pub traces: Vec<TraceRecord>,
    pub total: usize,
}
