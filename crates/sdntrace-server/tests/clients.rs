//! HTTP collaborator clients against throwaway axum servers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use sdntrace_core::{Dpid, Topology, TopologySnapshot, TraceRequest};
use sdntrace_server::clients::memory::{MemoryAlertSink, MemoryLiveTrace, MemoryTopology};
use sdntrace_server::clients::{
    CollaboratorError, FlowSource, FlowStoreClient, LiveTraceClient, LiveTraceSource,
    TopologyClient, TopologySource,
};
use sdntrace_server::config::Settings;
use sdntrace_server::router::build_router;
use sdntrace_server::state::{AppState, Collaborators};

const S1: &str = "00:00:00:00:00:00:00:01";

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn stored_flows_body() -> Value {
    json!({
        S1: [
            {"flow": {"priority": 10, "match": {"in_port": 1}, "actions": [{"action_type": "output", "port": 2}]}, "state": "installed"},
            {"flow": {"priority": 20, "match": {"in_port": 3}, "actions": [{"action_type": "output", "port": 4}]}, "state": "installed"}
        ]
    })
}

/// A flow store that fails with `status` for the first `failures` requests.
async fn flaky_flow_store(failures: usize, status: StatusCode) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/stored_flows",
            get(
                move |State(hits): State<Arc<AtomicUsize>>,
                      Query(query): Query<HashMap<String, String>>| async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    if n < failures {
                        return status.into_response();
                    }
                    if query.get("state").map(String::as_str) != Some("installed") {
                        return StatusCode::BAD_REQUEST.into_response();
                    }
                    Json(stored_flows_body()).into_response()
                },
            ),
        )
        .with_state(hits.clone());
    (serve(router).await, hits)
}

fn flow_client(url: String, retries: u32) -> FlowStoreClient {
    FlowStoreClient::new(
        url,
        Duration::from_secs(5),
        retries,
        Duration::from_millis(10),
        Duration::from_millis(20),
    )
    .unwrap()
}

#[tokio::test]
async fn flow_store_retries_transient_failures() {
    let (url, hits) = flaky_flow_store(2, StatusCode::SERVICE_UNAVAILABLE).await;
    let client = flow_client(url, 3);

    let tables = client.stored_flows(None).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    let ports: Vec<_> = tables
        .table(&Dpid::from(S1))
        .iter()
        .map(|flow| flow.in_port())
        .collect();
    assert_eq!(ports, vec![Some(3), Some(1)]);
}

#[tokio::test]
async fn flow_store_gives_up_after_retries() {
    let (url, hits) = flaky_flow_store(usize::MAX, StatusCode::SERVICE_UNAVAILABLE).await;
    let client = flow_client(url, 2);

    let err = client.stored_flows(None).await.unwrap_err();
    assert!(matches!(err, CollaboratorError::Unavailable { .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn flow_store_rejection_is_not_retried() {
    let (url, hits) = flaky_flow_store(usize::MAX, StatusCode::NOT_FOUND).await;
    let client = flow_client(url, 3);

    let err = client.stored_flows(None).await.unwrap_err();
    assert!(matches!(err, CollaboratorError::Rejected { .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn flow_store_passes_dpid_filter() {
    let router = Router::new().route(
        "/stored_flows",
        get(|Query(query): Query<Vec<(String, String)>>| async move {
            let dpids: Vec<String> = query
                .into_iter()
                .filter(|(key, _)| key == "dpid")
                .map(|(_, value)| value)
                .collect();
            assert_eq!(dpids, vec![S1.to_string()]);
            Json(stored_flows_body())
        }),
    );
    let client = flow_client(serve(router).await, 0);
    let tables = client.stored_flows(Some(&[Dpid::from(S1)])).await.unwrap();
    assert_eq!(tables.len(), 1);
}

#[tokio::test]
async fn unreachable_flow_store_is_failed_dependency() {
    let (url, _) = flaky_flow_store(usize::MAX, StatusCode::INTERNAL_SERVER_ERROR).await;
    let collaborators = Collaborators {
        flows: Arc::new(flow_client(url, 1)),
        topology: Arc::new(MemoryTopology::new(TopologySnapshot::new())),
        live: Arc::new(MemoryLiveTrace::new()),
        alerts: Arc::new(MemoryAlertSink::new()),
    };
    let app = build_router(AppState::new(collaborators, Settings::default()));

    let body = serde_json::to_vec(&TraceRequest::new(&Dpid::from(S1), 1, None)).unwrap();
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/trace")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FAILED_DEPENDENCY);
}

#[tokio::test]
async fn topology_client_builds_snapshot() {
    let router = Router::new()
        .route(
            "/switches",
            get(|| async {
                Json(json!({"switches": {
                    S1: {"dpid": S1, "ofp_version": "0x04"},
                    "00:00:00:00:00:00:00:02": {"dpid": "00:00:00:00:00:00:00:02", "ofp_version": "0x04"}
                }}))
            }),
        )
        .route(
            "/links",
            get(|| async {
                Json(json!({"links": {"abc": {
                    "endpoint_a": {"switch": S1, "port_number": 2},
                    "endpoint_b": {"switch": "00:00:00:00:00:00:00:02", "port_number": 1},
                    "active": true
                }}}))
            }),
        );
    let client = TopologyClient::new(serve(router).await, Duration::from_secs(5)).unwrap();

    let snapshot = client.topology().await.unwrap();
    assert_eq!(snapshot.switches().count(), 2);
    let neighbor = snapshot.neighbor(&Dpid::from(S1), 2).unwrap();
    assert_eq!(neighbor.dpid.as_str(), "00:00:00:00:00:00:00:02");
    assert_eq!(neighbor.port, 1);
}

async fn trace_progress(State(polls): State<Arc<AtomicUsize>>, Path(id): Path<u64>) -> Response {
    if id != 30001 {
        return (StatusCode::OK, Json(json!({}))).into_response();
    }
    let n = polls.fetch_add(1, Ordering::SeqCst);
    let mut hops = vec![json!({"dpid": S1, "port": 1, "type": "starting"})];
    if n > 0 {
        hops.push(json!({"type": "last", "reason": "done"}));
    }
    Json(json!({"request_id": id, "result": hops})).into_response()
}

#[tokio::test]
async fn live_trace_client_starts_and_polls() {
    let polls = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/trace",
            put(|Json(body): Json<Value>| async move {
                assert_eq!(body["trace"]["switch"]["dpid"], json!(S1));
                Json(json!({"result": {"trace_id": 30001}}))
            }),
        )
        .route("/trace/{id}", get(trace_progress))
        .with_state(polls.clone());
    let client = LiveTraceClient::new(serve(router).await, Duration::from_secs(5)).unwrap();

    let id = client
        .start_trace(&TraceRequest::new(&Dpid::from(S1), 1, None))
        .await
        .unwrap();
    assert_eq!(id, 30001);

    let first = client.trace_result(id).await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(!first[0].is_terminal());

    let second = client.trace_result(id).await.unwrap();
    assert_eq!(second.len(), 2);
    assert!(second[1].is_terminal());

    assert!(client.trace_result(7).await.unwrap().is_empty());
}
