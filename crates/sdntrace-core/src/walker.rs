//! Hop-by-hop trace walk.
//!
//! The walker is a small state machine: the first step is `Starting`, later
//! steps are `Intermediary`, and the walk ends on the first step classified
//! `Last`, `Loop` or `Incomplete`. Each continued hop enters a `(dpid, port)`
//! pair no earlier step entered, so a walk never takes more steps than there
//! are distinct pairs in the topology.

use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::flow::FlowTables;
use crate::id::{Dpid, PortNo, VlanId};
use crate::packet::PacketFields;
use crate::pipeline::match_and_apply;
use crate::topology::{resolve_hop, Endpoint, Hop, Topology};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Starting,
    Intermediary,
    Last,
    Loop,
    Incomplete,
}

impl StepType {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepType::Last | StepType::Loop | StepType::Incomplete)
    }
}

/// Where and how the packet entered a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepIn {
    pub dpid: Dpid,
    pub port: PortNo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<VlanId>,
    /// Informational wall-clock time the step was computed.
    pub time: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
}

/// Where and how the packet left a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOut {
    pub port: PortNo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<VlanId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    #[serde(rename = "in")]
    pub inbound: StepIn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out: Option<StepOut>,
}

impl TraceStep {
    fn entering(packet: &PacketFields, step_type: StepType) -> Self {
        TraceStep {
            inbound: StepIn {
                dpid: packet.dpid.clone(),
                port: packet.in_port,
                vlan: packet.current_vlan(),
                time: timestamp(),
                step_type,
            },
            out: None,
        }
    }

    pub fn step_type(&self) -> StepType {
        self.inbound.step_type
    }

    fn enters(&self, endpoint: &Endpoint) -> bool {
        self.inbound.dpid == endpoint.dpid && self.inbound.port == endpoint.port
    }
}

/// Ordered steps of one trace. Never empty once produced by the walker.
pub type TraceResult = Vec<TraceStep>;

fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.6f")
        .to_string()
}

/// Walks packets through a flow-table and topology snapshot.
///
/// Both snapshots are only read, so one walker can serve many traces.
pub struct TraceWalker<'a, T: Topology + ?Sized> {
    topology: &'a T,
    flows: &'a FlowTables,
}

impl<'a, T: Topology + ?Sized> TraceWalker<'a, T> {
    pub fn new(topology: &'a T, flows: &'a FlowTables) -> Self {
        TraceWalker { topology, flows }
    }

    /// Traces `start` until it leaves the network, loops, or stops matching.
    pub fn tracepath(&self, start: PacketFields) -> Result<TraceResult, TraceError> {
        let mut result: TraceResult = Vec::new();
        let mut step_type = StepType::Starting;
        let mut packet = start;

        loop {
            let mut step = TraceStep::entering(&packet, step_type);

            let Some(switch) = self.topology.switch(&packet.dpid) else {
                step.inbound.step_type = StepType::Last;
                result.push(step);
                break;
            };

            let outcome = match_and_apply(switch, packet.clone(), self.flows.table(&packet.dpid))?;
            let Some(port) = outcome.egress else {
                step.inbound.step_type = StepType::Incomplete;
                result.push(step);
                break;
            };

            step.out = Some(StepOut {
                port,
                vlan: outcome.fields.current_vlan(),
            });

            let mut next = None;
            match resolve_hop(self.topology, &packet.dpid, port) {
                Hop::EdgeOfNetwork => step.inbound.step_type = StepType::Last,
                Hop::Neighbor(endpoint) => {
                    let revisits = step.enters(&endpoint)
                        || result.iter().any(|previous| previous.enters(&endpoint));
                    if revisits {
                        step.inbound.step_type = StepType::Loop;
                    } else {
                        next = Some(outcome.fields.arrive_at(endpoint.dpid, endpoint.port));
                    }
                }
            }

            if returns_to_origin(&step, &result) {
                step.inbound.step_type = StepType::Loop;
                next = None;
            }

            tracing::debug!(
                dpid = %step.inbound.dpid,
                port = step.inbound.port,
                out_port = port,
                step_type = ?step.inbound.step_type,
                "trace step"
            );
            result.push(step);

            match next {
                Some(fields) => {
                    packet = fields;
                    step_type = StepType::Intermediary;
                }
                None => break,
            }
        }

        if let [only] = result.as_mut_slice() {
            if only.inbound.step_type == StepType::Starting {
                only.inbound.step_type = StepType::Last;
            }
        }

        Ok(result)
    }
}

/// Any step sending the packet back out of the port the trace started on,
/// including a hairpin on the first switch whether or not that port is linked.
fn returns_to_origin(step: &TraceStep, previous: &[TraceStep]) -> bool {
    let Some(out) = &step.out else {
        return false;
    };
    let origin = previous.first().unwrap_or(step);
    step.inbound.dpid == origin.inbound.dpid && out.port == origin.inbound.port
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowEntry;
    use crate::id::OfpVersion;
    use crate::topology::TopologySnapshot;
    use proptest::prelude::*;
    use serde_json::json;

    const S1: &str = "00:00:00:00:00:00:00:01";
    const S2: &str = "00:00:00:00:00:00:00:02";
    const S3: &str = "00:00:00:00:00:00:00:03";

    fn endpoint(dpid: &str, port: PortNo) -> Endpoint {
        Endpoint {
            dpid: Dpid::from(dpid),
            port,
        }
    }

    fn topology(switches: &[&str], links: &[((&str, PortNo), (&str, PortNo))]) -> TopologySnapshot {
        let mut topo = TopologySnapshot::new();
        for dpid in switches {
            topo.add_switch(Dpid::from(*dpid), OfpVersion::V13);
        }
        for ((a, pa), (b, pb)) in links {
            topo.add_link(endpoint(a, *pa), endpoint(b, *pb));
        }
        topo
    }

    fn tables(value: serde_json::Value) -> FlowTables {
        serde_json::from_value(value).unwrap()
    }

    fn scenario_flows() -> FlowTables {
        tables(json!({
            S1: [{
                "match": {"in_port": 1, "dl_vlan": 100},
                "actions": [
                    {"action_type": "push_vlan"},
                    {"action_type": "set_vlan", "vlan_id": 200},
                    {"action_type": "output", "port": 2}
                ]
            }]
        }))
    }

    fn start(dpid: &str, port: PortNo, vlan: Option<VlanId>) -> PacketFields {
        let packet = PacketFields::new(Dpid::from(dpid), port);
        match vlan {
            Some(v) => packet.with_vlan(v),
            None => packet,
        }
    }

    fn types(result: &TraceResult) -> Vec<StepType> {
        result.iter().map(TraceStep::step_type).collect()
    }

    #[test]
    fn unconnected_egress_is_last() {
        let topo = topology(&[S1], &[]);
        let flows = scenario_flows();
        let result = TraceWalker::new(&topo, &flows)
            .tracepath(start(S1, 1, Some(100)))
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].step_type(), StepType::Last);
        assert_eq!(result[0].inbound.vlan, Some(100));
        assert_eq!(result[0].out, Some(StepOut { port: 2, vlan: Some(200) }));
    }

    #[test]
    fn egress_wired_back_to_ingress_is_loop() {
        let topo = topology(&[S1], &[((S1, 2), (S1, 1))]);
        let flows = scenario_flows();
        let result = TraceWalker::new(&topo, &flows)
            .tracepath(start(S1, 1, Some(100)))
            .unwrap();

        assert_eq!(types(&result), vec![StepType::Loop]);
        assert_eq!(result[0].out, Some(StepOut { port: 2, vlan: Some(200) }));
    }

    #[test]
    fn no_matching_flow_is_incomplete() {
        let topo = topology(&[S1], &[]);
        let flows = scenario_flows();
        let result = TraceWalker::new(&topo, &flows)
            .tracepath(start(S1, 2, Some(100)))
            .unwrap();

        assert_eq!(types(&result), vec![StepType::Incomplete]);
        assert!(result[0].out.is_none());
    }

    #[test]
    fn unknown_switch_is_last() {
        let topo = topology(&[S1], &[]);
        let flows = scenario_flows();
        let result = TraceWalker::new(&topo, &flows)
            .tracepath(start(S3, 1, None))
            .unwrap();

        assert_eq!(types(&result), vec![StepType::Last]);
        assert!(result[0].out.is_none());
    }

    #[test]
    fn multi_hop_path_with_vlan_translation() {
        let topo = topology(&[S1, S2, S3], &[((S1, 2), (S2, 1)), ((S2, 2), (S3, 1))]);
        let flows = tables(json!({
            S1: [{"match": {"in_port": 1, "dl_vlan": 100}, "actions": [
                {"action_type": "set_vlan", "vlan_id": 200},
                {"action_type": "output", "port": 2}
            ]}],
            S2: [{"match": {"in_port": 1, "dl_vlan": 200}, "actions": [
                {"action_type": "set_vlan", "vlan_id": 300},
                {"action_type": "output", "port": 2}
            ]}],
            S3: [{"match": {"in_port": 1, "dl_vlan": 300}, "actions": [
                {"action_type": "pop_vlan"},
                {"action_type": "output", "port": 5}
            ]}]
        }));

        let result = TraceWalker::new(&topo, &flows)
            .tracepath(start(S1, 1, Some(100)))
            .unwrap();

        assert_eq!(
            types(&result),
            vec![StepType::Starting, StepType::Intermediary, StepType::Last]
        );
        assert_eq!(result[1].inbound.dpid, Dpid::from(S2));
        assert_eq!(result[1].inbound.vlan, Some(200));
        assert_eq!(result[2].inbound.vlan, Some(300));
        assert_eq!(result[2].out, Some(StepOut { port: 5, vlan: None }));
    }

    #[test]
    fn returning_to_origin_port_is_loop() {
        let topo = topology(&[S1, S2], &[((S1, 2), (S2, 1)), ((S2, 2), (S1, 3))]);
        let flows = tables(json!({
            S1: [
                {"match": {"in_port": 1}, "actions": [{"action_type": "output", "port": 2}]},
                {"match": {"in_port": 3}, "actions": [{"action_type": "output", "port": 1}]}
            ],
            S2: [{"match": {"in_port": 1}, "actions": [{"action_type": "output", "port": 2}]}]
        }));

        let result = TraceWalker::new(&topo, &flows)
            .tracepath(start(S1, 1, None))
            .unwrap();

        assert_eq!(
            types(&result),
            vec![StepType::Starting, StepType::Intermediary, StepType::Loop]
        );
        assert_eq!(result[2].inbound.port, 3);
    }

    #[test]
    fn hairpin_at_origin_is_loop() {
        let topo = topology(&[S1], &[]);
        let flows = tables(json!({
            S1: [{"match": {"in_port": 1}, "actions": [{"action_type": "output", "port": 1}]}]
        }));
        let result = TraceWalker::new(&topo, &flows)
            .tracepath(start(S1, 1, None))
            .unwrap();
        assert_eq!(types(&result), vec![StepType::Loop]);
    }

    #[test]
    fn hairpin_onto_linked_ingress_is_loop() {
        let topo = topology(&[S1, S2], &[((S1, 1), (S2, 1))]);
        let flows = tables(json!({
            S1: [{"match": {"in_port": 1}, "actions": [{"action_type": "output", "port": 1}]}],
            S2: [{"match": {"in_port": 1}, "actions": [{"action_type": "output", "port": 4}]}]
        }));
        let result = TraceWalker::new(&topo, &flows)
            .tracepath(start(S1, 1, None))
            .unwrap();

        assert_eq!(types(&result), vec![StepType::Loop]);
        assert_eq!(result[0].inbound.dpid, Dpid::from(S1));
        assert_eq!(result[0].out, Some(StepOut { port: 1, vlan: None }));
    }

    #[test]
    fn regression_propagates() {
        let topo = topology(&[S1], &[]);
        let flows = tables(json!({
            S1: [
                {"table_id": 0, "match": {"in_port": 1}, "instructions": [
                    {"instruction_type": "goto_table", "table_id": 2}
                ]},
                {"table_id": 2, "match": {"in_port": 1}, "instructions": [
                    {"instruction_type": "goto_table", "table_id": 1}
                ]}
            ]
        }));
        let err = TraceWalker::new(&topo, &flows)
            .tracepath(start(S1, 1, None))
            .unwrap_err();
        assert!(matches!(err, TraceError::PipelineRegression { .. }));
    }

    #[test]
    fn repeated_traces_are_identical_except_time() {
        let topo = topology(&[S1, S2], &[((S1, 2), (S2, 1))]);
        let flows = tables(json!({
            S1: [{"match": {"in_port": 1}, "actions": [{"action_type": "output", "port": 2}]}],
            S2: [{"match": {"in_port": 1}, "actions": [{"action_type": "output", "port": 4}]}]
        }));
        let walker = TraceWalker::new(&topo, &flows);

        let strip = |mut result: TraceResult| {
            for step in &mut result {
                step.inbound.time.clear();
            }
            result
        };
        let first = strip(walker.tracepath(start(S1, 1, None)).unwrap());
        let second = strip(walker.tracepath(start(S1, 1, None)).unwrap());
        assert_eq!(first, second);
    }

    proptest! {
        // A ring where every switch forwards port 1 -> port 2 and port 2 of
        // switch i is wired to port 1 of switch i+1 always ends in a loop.
        #[test]
        fn rings_terminate_with_loop(size in 1usize..12, entry in 0usize..12) {
            let names: Vec<String> = (0..size).map(|i| format!("00:00:00:00:00:00:01:{:02x}", i)).collect();
            let mut topo = TopologySnapshot::new();
            let mut flows = FlowTables::new();
            let forward: Vec<FlowEntry> = serde_json::from_value(json!([
                {"match": {"in_port": 1}, "actions": [{"action_type": "output", "port": 2}]}
            ])).unwrap();
            for (i, name) in names.iter().enumerate() {
                topo.add_switch(Dpid::new(name.clone()), OfpVersion::V13);
                flows.insert(Dpid::new(name.clone()), forward.clone());
                let next = &names[(i + 1) % size];
                topo.add_link(
                    Endpoint { dpid: Dpid::new(name.clone()), port: 2 },
                    Endpoint { dpid: Dpid::new(next.clone()), port: 1 },
                );
            }

            let first = &names[entry % size];
            let result = TraceWalker::new(&topo, &flows)
                .tracepath(PacketFields::new(Dpid::new(first.clone()), 1))
                .unwrap();

            prop_assert_eq!(result.last().map(TraceStep::step_type), Some(StepType::Loop));
            prop_assert!(result.len() <= topo.linked_ports());
            let mut seen = std::collections::HashSet::new();
            for step in &result {
                prop_assert!(seen.insert((step.inbound.dpid.clone(), step.inbound.port)));
            }
        }
    }
}
