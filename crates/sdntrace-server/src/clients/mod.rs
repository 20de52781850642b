//! External collaborators the server depends on.
//!
//! Each collaborator sits behind an async trait so the trace service and the
//! circuit engine can run against HTTP clients in production and against the
//! in-memory doubles in [`memory`] under test.

pub mod alert;
pub mod flow_store;
pub mod live_trace;
pub mod memory;
pub mod topology;

use async_trait::async_trait;
use serde::Serialize;

use sdntrace_core::{DataPlaneHop, Dpid, FlowTables, TopologySnapshot, TraceRequest};

pub use alert::{HttpAlertSink, LogAlertSink};
pub use flow_store::FlowStoreClient;
pub use live_trace::LiveTraceClient;
pub use topology::TopologyClient;

/// Failure talking to a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// Connection failure, timeout or server-side error.
    #[error("{service} unavailable: {reason}")]
    Unavailable { service: &'static str, reason: String },

    /// The collaborator answered with a body we could not interpret.
    #[error("{service} returned an unexpected response: {reason}")]
    BadResponse { service: &'static str, reason: String },

    /// The collaborator refused the request.
    #[error("{service} rejected the request: {reason}")]
    Rejected { service: &'static str, reason: String },
}

impl CollaboratorError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CollaboratorError::Unavailable { .. })
    }

    pub(crate) fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            CollaboratorError::BadResponse {
                service,
                reason: err.to_string(),
            }
        } else {
            CollaboratorError::Unavailable {
                service,
                reason: err.to_string(),
            }
        }
    }

    pub(crate) fn from_status(service: &'static str, status: reqwest::StatusCode) -> Self {
        if status.is_server_error() {
            CollaboratorError::Unavailable {
                service,
                reason: format!("status {}", status),
            }
        } else {
            CollaboratorError::Rejected {
                service,
                reason: format!("status {}", status),
            }
        }
    }
}

/// Installed flow tables.
#[async_trait]
pub trait FlowSource: Send + Sync {
    /// Flows per switch, highest priority first. `None` asks for every
    /// switch.
    async fn stored_flows(&self, dpids: Option<&[Dpid]>) -> Result<FlowTables, CollaboratorError>;
}

#[async_trait]
pub trait TopologySource: Send + Sync {
    async fn topology(&self) -> Result<TopologySnapshot, CollaboratorError>;
}

/// The data-plane trace service.
#[async_trait]
pub trait LiveTraceSource: Send + Sync {
    /// Starts a trace and returns its id.
    async fn start_trace(&self, request: &TraceRequest) -> Result<u64, CollaboratorError>;

    /// The hops recorded so far for trace `id`.
    async fn trace_result(&self, id: u64) -> Result<Vec<DataPlaneHop>, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub channel: String,
    pub source: String,
    pub message: String,
}

/// Fire-and-forget alert delivery. Delivery failures are logged, never
/// returned.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: Alert);
}

/// Fetches flows and topology concurrently.
pub async fn fetch_snapshot(
    flows: &dyn FlowSource,
    topology: &dyn TopologySource,
) -> Result<(FlowTables, TopologySnapshot), CollaboratorError> {
    tokio::try_join!(flows.stored_flows(None), topology.topology())
}
