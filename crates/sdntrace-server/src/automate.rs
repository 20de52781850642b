//! Circuit engine: discovery, symmetry alerts, reconciliation and the live
//! data-plane cross-check of important circuits.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;

use sdntrace_core::circuit::{asymmetric_circuits, check_trace, get_circuit, CircuitStep};
use sdntrace_core::discovery::trace_circuit;
use sdntrace_core::{
    discover_circuits, reconcile, Circuit, CircuitEndpoints, DataPlaneHop, Discovery,
    Reconciliation, TraceWalker,
};

use crate::clients::{
    fetch_snapshot, Alert, AlertSink, CollaboratorError, FlowSource, LiveTraceSource,
    TopologySource,
};
use crate::config::Settings;
use crate::scheduler::Scheduler;

/// Outcome of cross-checking one important circuit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportantCheck {
    pub endpoints: CircuitEndpoints,
    pub consistent: bool,
    /// Why the check could not run to completion, if it did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct CircuitEngine {
    flows: Arc<dyn FlowSource>,
    topology: Arc<dyn TopologySource>,
    live: Arc<dyn LiveTraceSource>,
    alerts: Arc<dyn AlertSink>,
    circuits: RwLock<Vec<Circuit>>,
    important: Vec<CircuitEndpoints>,
    poll_interval: Duration,
    alert_channel: String,
    alert_source: String,
}

impl CircuitEngine {
    pub fn new(
        flows: Arc<dyn FlowSource>,
        topology: Arc<dyn TopologySource>,
        live: Arc<dyn LiveTraceSource>,
        alerts: Arc<dyn AlertSink>,
        settings: &Settings,
    ) -> Self {
        CircuitEngine {
            flows,
            topology,
            live,
            alerts,
            circuits: RwLock::new(Vec::new()),
            important: settings.important_circuits.clone(),
            poll_interval: settings.live_trace_poll,
            alert_channel: settings.alert_channel.clone(),
            alert_source: settings.alert_source.clone(),
        }
    }

    pub async fn circuits(&self) -> Vec<Circuit> {
        self.circuits.read().await.clone()
    }

    async fn alert(&self, message: String) {
        self.alerts
            .send(Alert {
                channel: self.alert_channel.clone(),
                source: self.alert_source.clone(),
                message,
            })
            .await;
    }

    /// Rediscovers every circuit from the installed flows and replaces the
    /// known set.
    pub async fn find_circuits(&self) -> Result<Discovery, CollaboratorError> {
        let (flows, topology) = fetch_snapshot(self.flows.as_ref(), self.topology.as_ref()).await?;
        let discovery = discover_circuits(&flows, &topology);
        tracing::info!(
            circuits = discovery.circuits.len(),
            failed = discovery.failed.len(),
            "circuit discovery finished"
        );
        *self.circuits.write().await = discovery.circuits.clone();
        Ok(discovery)
    }

    /// Alerts on every known circuit lacking a symmetric return circuit and
    /// returns those circuits.
    pub async fn check_circuits(&self) -> Vec<Circuit> {
        let circuits = self.circuits().await;
        let asymmetric: Vec<Circuit> = asymmetric_circuits(&circuits).into_iter().cloned().collect();
        for circuit in &asymmetric {
            self.alert(format!("Circuit {} has no symmetric return circuit", circuit))
                .await;
        }
        asymmetric
    }

    pub async fn get_circuit(&self, endpoints: &CircuitEndpoints) -> Option<Vec<CircuitStep>> {
        let circuits = self.circuits.read().await;
        get_circuit(&circuits, endpoints).map(|steps| steps.to_vec())
    }

    /// Replays every known circuit against the current flows and returns
    /// those whose path changed.
    pub async fn run_traces(&self) -> Result<Reconciliation, CollaboratorError> {
        let (flows, topology) = fetch_snapshot(self.flows.as_ref(), self.topology.as_ref()).await?;
        let circuits = self.circuits().await;
        let report = reconcile(&circuits, &flows, &topology);
        if !report.changed.is_empty() {
            tracing::info!(changed = report.changed.len(), "circuits changed");
        }
        Ok(report)
    }

    /// Polls a live trace until its last hop is terminal.
    async fn live_trace(&self, endpoints: &CircuitEndpoints) -> Result<Vec<DataPlaneHop>, CollaboratorError> {
        let id = self.live.start_trace(&endpoints.request()).await?;
        loop {
            let hops = self.live.trace_result(id).await?;
            if hops.last().is_some_and(DataPlaneHop::is_terminal) {
                return Ok(hops);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Compares the data-plane path of every important circuit with the
    /// control-plane circuit computed for the same endpoints. Mismatches are
    /// alerted.
    pub async fn run_important_traces(&self) -> Result<Vec<ImportantCheck>, CollaboratorError> {
        if self.important.is_empty() {
            return Ok(Vec::new());
        }
        let (flows, topology) = fetch_snapshot(self.flows.as_ref(), self.topology.as_ref()).await?;

        let mut checks = Vec::with_capacity(self.important.len());
        for endpoints in &self.important {
            let control_plane = {
                let walker = TraceWalker::new(&topology, &flows);
                trace_circuit(&walker, &endpoints.request())
            };
            let control_plane = match control_plane {
                Ok(steps) => vec![Circuit {
                    circuit: steps,
                    entries: endpoints.request(),
                }],
                Err(err) => {
                    tracing::warn!(error = %err, "control plane trace failed");
                    Vec::new()
                }
            };

            let data_plane = match self.live_trace(endpoints).await {
                Ok(hops) => hops,
                Err(err) => {
                    tracing::warn!(error = %err, dpid = %endpoints.dpid_a, "live trace failed");
                    checks.push(ImportantCheck {
                        endpoints: endpoints.clone(),
                        consistent: false,
                        error: Some(err.to_string()),
                    });
                    continue;
                }
            };

            let consistent = check_trace(get_circuit(&control_plane, endpoints), &data_plane);
            if !consistent {
                self.alert(format!(
                    "Trace in data plane different from trace in control plane for circuit {}",
                    endpoints
                ))
                .await;
            }
            checks.push(ImportantCheck {
                endpoints: endpoints.clone(),
                consistent,
                error: None,
            });
        }
        Ok(checks)
    }

    /// Registers the periodic jobs enabled in `settings`.
    pub fn schedule(self: &Arc<Self>, scheduler: &Scheduler, settings: &Settings) {
        if let Some(every) = settings.schedule_traces {
            let engine = Arc::clone(self);
            scheduler.add_job("circuits", every, move || {
                let engine = Arc::clone(&engine);
                async move { engine.refresh().await }
            });
        }
        if let Some(every) = settings.schedule_important {
            let engine = Arc::clone(self);
            scheduler.add_job("important_circuits", every, move || {
                let engine = Arc::clone(&engine);
                async move {
                    // A run that outlives its interval is abandoned.
                    match tokio::time::timeout(every, engine.run_important_traces()).await {
                        Ok(Ok(checks)) => {
                            let inconsistent = checks.iter().filter(|c| !c.consistent).count();
                            tracing::info!(checked = checks.len(), inconsistent, "important circuits checked");
                        }
                        Ok(Err(err)) => tracing::warn!(error = %err, "important circuit check failed"),
                        Err(_) => tracing::warn!("important circuit check timed out"),
                    }
                }
            });
        }
    }

    /// Reconciles, rediscovers and checks symmetry in one pass.
    pub async fn refresh(&self) {
        match self.run_traces().await {
            Ok(report) => {
                for change in &report.changed {
                    tracing::info!(
                        previous = change.previous.len(),
                        current = change.current.len(),
                        "circuit path changed"
                    );
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "circuit reconciliation failed");
                return;
            }
        }
        if let Err(err) = self.find_circuits().await {
            tracing::warn!(error = %err, "circuit discovery failed");
            return;
        }
        self.check_circuits().await;
    }
}
