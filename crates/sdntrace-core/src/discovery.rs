//! Circuit discovery and reconciliation over a flow/topology snapshot.

use serde::Serialize;

use crate::circuit::{clean_circuits, format_result, Circuit, CircuitStep};
use crate::entries::TraceRequest;
use crate::error::TraceError;
use crate::flow::{FlowEntry, FlowTables};
use crate::id::{PortNo, VlanId};
use crate::matchers::VlanSpec;
use crate::topology::Topology;
use crate::walker::TraceWalker;

/// A request that could not be traced, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedTrace {
    pub entries: TraceRequest,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Discovery {
    pub circuits: Vec<Circuit>,
    pub failed: Vec<FailedTrace>,
}

/// A stored circuit whose replayed path no longer matches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitChange {
    pub entries: TraceRequest,
    pub previous: Vec<CircuitStep>,
    pub current: Vec<CircuitStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub changed: Vec<CircuitChange>,
    pub failed: Vec<FailedTrace>,
}

fn seed_vlan(flow: &FlowEntry) -> Option<VlanId> {
    let value = flow
        .match_fields
        .get("dl_vlan")
        .or_else(|| flow.match_fields.get("vlan_vid"))?;
    match VlanSpec::parse(value)? {
        VlanSpec::Exact(vlan) if vlan > 0 => VlanId::try_from(vlan).ok(),
        _ => None,
    }
}

fn forwards(flow: &FlowEntry, controller_port: PortNo) -> bool {
    flow.output_ports().iter().any(|port| *port != controller_port)
}

/// One request per flow that takes traffic in on a real port and forwards
/// it somewhere other than the controller. Duplicates collapse.
pub fn discovery_seeds<T: Topology + ?Sized>(flows: &FlowTables, topology: &T) -> Vec<TraceRequest> {
    let mut seeds: Vec<TraceRequest> = Vec::new();
    for (dpid, table) in flows.iter() {
        let Some(switch) = topology.switch(dpid) else {
            continue;
        };
        let controller_port = switch.ofp_version.controller_port();
        for flow in table {
            let Some(in_port) = flow.in_port().filter(|port| *port != 0) else {
                continue;
            };
            if !forwards(flow, controller_port) {
                continue;
            }
            let seed = TraceRequest::new(dpid, in_port, seed_vlan(flow));
            if !seeds.contains(&seed) {
                seeds.push(seed);
            }
        }
    }
    seeds
}

/// Traces the stored request of a circuit and reduces it to steps.
pub fn trace_circuit<T: Topology + ?Sized>(
    walker: &TraceWalker<'_, T>,
    entries: &TraceRequest,
) -> Result<Vec<CircuitStep>, TraceError> {
    let fields = entries.to_fields()?;
    let result = walker.tracepath(fields)?;
    Ok(format_result(&result))
}

/// Traces every seed and keeps the circuits no other circuit subsumes.
///
/// A seed that fails to trace is reported in `failed` and never affects
/// the other seeds.
pub fn discover_circuits<T: Topology + ?Sized>(flows: &FlowTables, topology: &T) -> Discovery {
    let walker = TraceWalker::new(topology, flows);
    let mut circuits = Vec::new();
    let mut failed = Vec::new();

    for entries in discovery_seeds(flows, topology) {
        match trace_circuit(&walker, &entries) {
            Ok(circuit) => circuits.push(Circuit { circuit, entries }),
            Err(err) => {
                tracing::warn!(error = %err, "discovery trace failed");
                failed.push(FailedTrace {
                    entries,
                    error: err.to_string(),
                });
            }
        }
    }

    let found = circuits.len();
    let circuits = clean_circuits(circuits);
    tracing::debug!(found, kept = circuits.len(), "circuits cleaned");
    Discovery { circuits, failed }
}

/// Replays every known circuit and reports those whose path changed.
pub fn reconcile<T: Topology + ?Sized>(
    circuits: &[Circuit],
    flows: &FlowTables,
    topology: &T,
) -> Reconciliation {
    let walker = TraceWalker::new(topology, flows);
    let mut report = Reconciliation::default();

    for known in circuits {
        match trace_circuit(&walker, &known.entries) {
            Ok(current) if current != known.circuit => report.changed.push(CircuitChange {
                entries: known.entries.clone(),
                previous: known.circuit.clone(),
                current,
            }),
            Ok(_) => {}
            Err(err) => report.failed.push(FailedTrace {
                entries: known.entries.clone(),
                error: err.to_string(),
            }),
        }
    }
    report
}
