//! In-memory collaborators for offline use and tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use sdntrace_core::{DataPlaneHop, Dpid, FlowTables, PortNo, TopologySnapshot, TraceRequest};

use super::{Alert, AlertSink, CollaboratorError, FlowSource, LiveTraceSource, TopologySource};

/// A flow store that serves a replaceable snapshot.
#[derive(Default)]
pub struct MemoryFlowStore {
    tables: RwLock<FlowTables>,
    unavailable: RwLock<bool>,
}

impl MemoryFlowStore {
    pub fn new(tables: FlowTables) -> Self {
        MemoryFlowStore {
            tables: RwLock::new(tables),
            unavailable: RwLock::new(false),
        }
    }

    pub async fn replace(&self, tables: FlowTables) {
        *self.tables.write().await = tables;
    }

    /// Makes every following request fail as if the store were down.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }
}

#[async_trait]
impl FlowSource for MemoryFlowStore {
    async fn stored_flows(&self, dpids: Option<&[Dpid]>) -> Result<FlowTables, CollaboratorError> {
        if *self.unavailable.read().await {
            return Err(CollaboratorError::Unavailable {
                service: "flow store",
                reason: "connection refused".to_string(),
            });
        }
        let tables = self.tables.read().await;
        Ok(match dpids {
            None => tables.clone(),
            Some(dpids) => tables
                .iter()
                .filter(|(dpid, _)| dpids.contains(*dpid))
                .map(|(dpid, flows)| (dpid.clone(), flows.clone()))
                .collect(),
        })
    }
}

#[derive(Default)]
pub struct MemoryTopology {
    snapshot: RwLock<TopologySnapshot>,
}

impl MemoryTopology {
    pub fn new(snapshot: TopologySnapshot) -> Self {
        MemoryTopology {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub async fn replace(&self, snapshot: TopologySnapshot) {
        *self.snapshot.write().await = snapshot;
    }
}

#[async_trait]
impl TopologySource for MemoryTopology {
    async fn topology(&self) -> Result<TopologySnapshot, CollaboratorError> {
        Ok(self.snapshot.read().await.clone())
    }
}

/// A data-plane trace service answering from scripted polls.
///
/// Each script is the sequence of hop lists successive polls return for a
/// trace entering `(dpid, in_port)`. Once the last list has been answered
/// the trace id is forgotten.
#[derive(Default)]
pub struct MemoryLiveTrace {
    scripts: DashMap<(Dpid, PortNo), Vec<Vec<DataPlaneHop>>>,
    running: DashMap<u64, VecDeque<Vec<DataPlaneHop>>>,
    next_id: AtomicU64,
}

impl MemoryLiveTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, dpid: Dpid, in_port: PortNo, polls: Vec<Vec<DataPlaneHop>>) {
        self.scripts.insert((dpid, in_port), polls);
    }
}

#[async_trait]
impl LiveTraceSource for MemoryLiveTrace {
    async fn start_trace(&self, request: &TraceRequest) -> Result<u64, CollaboratorError> {
        let fields = request.to_fields().map_err(|err| CollaboratorError::Rejected {
            service: "live trace",
            reason: err.to_string(),
        })?;
        let polls = self
            .scripts
            .get(&(fields.dpid, fields.in_port))
            .map(|script| script.value().clone())
            .unwrap_or_default();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.running.insert(id, polls.into());
        Ok(id)
    }

    async fn trace_result(&self, id: u64) -> Result<Vec<DataPlaneHop>, CollaboratorError> {
        let last = {
            let mut polls = self
                .running
                .get_mut(&id)
                .ok_or_else(|| CollaboratorError::Rejected {
                    service: "live trace",
                    reason: format!("unknown trace id {}", id),
                })?;
            if polls.len() > 1 {
                return Ok(polls.pop_front().unwrap_or_default());
            }
            polls.pop_front().unwrap_or_default()
        };
        self.running.remove(&id);
        Ok(last)
    }
}

/// Records every alert it receives.
#[derive(Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().await.clone()
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn send(&self, alert: Alert) {
        self.alerts.lock().await.push(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hop(hop_type: &str) -> DataPlaneHop {
        DataPlaneHop {
            dpid: Some(Dpid::from("00:00:00:00:00:00:00:01")),
            port: Some(1),
            hop_type: hop_type.to_string(),
        }
    }

    #[tokio::test]
    async fn finished_traces_are_forgotten() {
        let live = MemoryLiveTrace::new();
        let dpid = Dpid::from("00:00:00:00:00:00:00:01");
        live.script(
            dpid.clone(),
            1,
            vec![vec![hop("starting")], vec![hop("starting"), hop("last")]],
        );

        let id = live.start_trace(&TraceRequest::new(&dpid, 1, None)).await.unwrap();
        assert_eq!(live.trace_result(id).await.unwrap().len(), 1);
        assert_eq!(live.trace_result(id).await.unwrap().len(), 2);
        assert!(live.running.is_empty());
        assert!(matches!(
            live.trace_result(id).await,
            Err(CollaboratorError::Rejected { .. })
        ));
    }
}
