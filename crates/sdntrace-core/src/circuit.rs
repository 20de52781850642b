//! Circuits: compact end-to-end paths inferred from installed flows.
//!
//! A circuit is the endpoint sequence of a control-plane trace, one
//! [`CircuitStep`] per switch, paired with the request that produced it.
//! This module holds the pure algorithms the circuit engine runs over them:
//! sub-path elimination, return-path symmetry, lookup by endpoints and
//! comparison against a data-plane trace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entries::TraceRequest;
use crate::id::{Dpid, PortNo, VlanId};
use crate::walker::TraceStep;

/// One switch traversal of a circuit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CircuitStep {
    pub dpid: Dpid,
    pub in_port: PortNo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_vlan: Option<VlanId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_port: Option<PortNo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_vlan: Option<VlanId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    pub circuit: Vec<CircuitStep>,
    /// The request that discovered this circuit, replayed on reconciliation.
    pub entries: TraceRequest,
}

impl Circuit {
    pub fn first(&self) -> Option<&CircuitStep> {
        self.circuit.first()
    }

    pub fn last(&self) -> Option<&CircuitStep> {
        self.circuit.last()
    }

    /// Where the circuit enters and leaves. `None` when the last step has
    /// no egress port.
    pub fn endpoints(&self) -> Option<CircuitEndpoints> {
        let (first, last) = (self.first()?, self.last()?);
        Some(CircuitEndpoints {
            dpid_a: first.dpid.clone(),
            port_a: first.in_port,
            vlan_a: first.in_vlan,
            dpid_z: last.dpid.clone(),
            port_z: last.out_port?,
            vlan_z: last.out_vlan,
        })
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(endpoints) = self.endpoints() {
            return fmt::Display::fmt(&endpoints, f);
        }
        for (i, step) in self.circuit.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}:{}", step.dpid, step.in_port)?;
        }
        Ok(())
    }
}

/// Reduces a trace to its endpoint sequence.
pub fn format_result(trace: &[TraceStep]) -> Vec<CircuitStep> {
    trace
        .iter()
        .map(|step| CircuitStep {
            dpid: step.inbound.dpid.clone(),
            in_port: step.inbound.port,
            in_vlan: step.inbound.vlan,
            out_port: step.out.as_ref().map(|out| out.port),
            out_vlan: step.out.as_ref().and_then(|out| out.vlan),
        })
        .collect()
}

fn is_covered_by(steps: &[CircuitStep], other: &[CircuitStep]) -> bool {
    steps.iter().all(|step| other.contains(step))
}

/// Drops every circuit whose steps all appear in another circuit.
///
/// Circuits with identical step sets keep only their first occurrence.
pub fn clean_circuits(circuits: Vec<Circuit>) -> Vec<Circuit> {
    let subsumed: Vec<bool> = circuits
        .iter()
        .enumerate()
        .map(|(i, circuit)| {
            circuits.iter().enumerate().any(|(j, other)| {
                if i == j || !is_covered_by(&circuit.circuit, &other.circuit) {
                    return false;
                }
                if is_covered_by(&other.circuit, &circuit.circuit) {
                    j < i
                } else {
                    true
                }
            })
        })
        .collect();

    circuits
        .into_iter()
        .zip(subsumed)
        .filter_map(|(circuit, subsumed)| (!subsumed).then_some(circuit))
        .collect()
}

/// Whether `entry` (the head of one circuit) mirrors `exit` (the tail of
/// another): same switch, the entry port is the exit port, and VLANs agree
/// in both directions. A VLAN present on only one side is a mismatch.
pub fn compare_endpoints(entry: &CircuitStep, exit: &CircuitStep) -> bool {
    entry.dpid == exit.dpid
        && exit.out_port == Some(entry.in_port)
        && entry.in_vlan == exit.out_vlan
        && entry.out_vlan == exit.in_vlan
}

/// Whether `a` and `b` are each other's return path.
pub fn is_return_circuit(a: &Circuit, b: &Circuit) -> bool {
    match (a.first(), a.last(), b.first(), b.last()) {
        (Some(a_first), Some(a_last), Some(b_first), Some(b_last)) => {
            compare_endpoints(a_first, b_last) && compare_endpoints(b_first, a_last)
        }
        _ => false,
    }
}

/// Circuits for which no other circuit is a symmetric return path.
pub fn asymmetric_circuits(circuits: &[Circuit]) -> Vec<&Circuit> {
    circuits
        .iter()
        .enumerate()
        .filter(|(i, circuit)| {
            !circuits
                .iter()
                .enumerate()
                .any(|(j, other)| *i != j && is_return_circuit(circuit, other))
        })
        .map(|(_, circuit)| circuit)
        .collect()
}

/// A circuit identified by where it enters (`a`) and leaves (`z`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitEndpoints {
    pub dpid_a: Dpid,
    pub port_a: PortNo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_a: Option<VlanId>,
    pub dpid_z: Dpid,
    pub port_z: PortNo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_z: Option<VlanId>,
}

fn write_endpoint(
    f: &mut fmt::Formatter<'_>,
    dpid: &Dpid,
    port: PortNo,
    vlan: Option<VlanId>,
) -> fmt::Result {
    write!(f, "{}:{}", dpid, port)?;
    match vlan {
        Some(vlan) => write!(f, " vlan {}", vlan),
        None => Ok(()),
    }
}

impl fmt::Display for CircuitEndpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_endpoint(f, &self.dpid_a, self.port_a, self.vlan_a)?;
        f.write_str(" -> ")?;
        write_endpoint(f, &self.dpid_z, self.port_z, self.vlan_z)
    }
}

impl CircuitEndpoints {
    /// The request that traces this circuit from its `a` side.
    pub fn request(&self) -> TraceRequest {
        TraceRequest::new(&self.dpid_a, self.port_a, self.vlan_a)
    }
}

/// The steps of the circuit running from `endpoints.a` to `endpoints.z`.
pub fn get_circuit<'a>(
    circuits: &'a [Circuit],
    endpoints: &CircuitEndpoints,
) -> Option<&'a [CircuitStep]> {
    circuits
        .iter()
        .find(|circuit| match (circuit.first(), circuit.last()) {
            (Some(first), Some(last)) => {
                first.dpid == endpoints.dpid_a
                    && first.in_port == endpoints.port_a
                    && first.in_vlan == endpoints.vlan_a
                    && last.dpid == endpoints.dpid_z
                    && last.out_port == Some(endpoints.port_z)
                    && last.out_vlan == endpoints.vlan_z
            }
            _ => false,
        })
        .map(|circuit| circuit.circuit.as_slice())
}

/// One hop reported by the live data-plane trace service. The final
/// terminal marker carries no switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPlaneHop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpid: Option<Dpid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortNo>,
    #[serde(rename = "type", default)]
    pub hop_type: String,
}

impl DataPlaneHop {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.hop_type.as_str(),
            "last" | "loop" | "incomplete" | "error"
        )
    }
}

/// A control-plane step and a data-plane hop agree on switch and ingress.
pub fn check_step(step: &CircuitStep, hop: &DataPlaneHop) -> bool {
    hop.dpid.as_ref() == Some(&step.dpid) && hop.port == Some(step.in_port)
}

/// Compares control-plane steps with a finished data-plane trace.
///
/// The data-plane trace reports one hop per switch plus its terminal
/// marker, so it must be exactly one hop longer than the circuit.
pub fn check_trace(steps: Option<&[CircuitStep]>, data_plane: &[DataPlaneHop]) -> bool {
    let Some(steps) = steps.filter(|steps| !steps.is_empty()) else {
        return false;
    };
    if data_plane.len() != steps.len() + 1 {
        return false;
    }
    steps
        .iter()
        .zip(data_plane)
        .all(|(step, hop)| check_step(step, hop))
}
