//! Topology lookups used to move a packet from one switch to the next.
//!
//! The engine only reads topology through the [`Topology`] trait. The
//! in-memory [`TopologySnapshot`] is what the server builds from the
//! topology service and what the CLI loads from disk.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::id::{Dpid, OfpVersion, PortNo};

/// A switch as seen by the topology collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchInfo {
    pub dpid: Dpid,
    #[serde(default)]
    pub ofp_version: OfpVersion,
}

/// One side of a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub dpid: Dpid,
    pub port: PortNo,
}

/// Where a packet leaving `(dpid, port)` ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hop {
    Neighbor(Endpoint),
    EdgeOfNetwork,
}

/// Read-only view of switches and links.
pub trait Topology {
    fn switch(&self, dpid: &Dpid) -> Option<&SwitchInfo>;

    /// The interface directly connected to `(dpid, port)`, if any.
    fn neighbor(&self, dpid: &Dpid, port: PortNo) -> Option<Endpoint>;
}

/// Resolves the next hop of a packet leaving `dpid` on `port`.
pub fn resolve_hop<T: Topology + ?Sized>(topology: &T, dpid: &Dpid, port: PortNo) -> Hop {
    match topology.neighbor(dpid, port) {
        Some(endpoint) => Hop::Neighbor(endpoint),
        None => Hop::EdgeOfNetwork,
    }
}

/// A bidirectional link between two endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub endpoint_a: Endpoint,
    pub endpoint_b: Endpoint,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TopologyDocument {
    #[serde(default)]
    switches: Vec<SwitchInfo>,
    #[serde(default)]
    links: Vec<Link>,
}

/// Immutable in-memory topology.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "TopologyDocument")]
pub struct TopologySnapshot {
    switches: BTreeMap<Dpid, SwitchInfo>,
    links: HashMap<(Dpid, PortNo), Endpoint>,
}

impl TopologySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_switch(&mut self, dpid: Dpid, ofp_version: OfpVersion) {
        self.switches
            .insert(dpid.clone(), SwitchInfo { dpid, ofp_version });
    }

    /// Connects two endpoints in both directions.
    pub fn add_link(&mut self, a: Endpoint, b: Endpoint) {
        self.links.insert((a.dpid.clone(), a.port), b.clone());
        self.links.insert((b.dpid.clone(), b.port), a);
    }

    pub fn switches(&self) -> impl Iterator<Item = &SwitchInfo> {
        self.switches.values()
    }

    /// Number of distinct linked `(dpid, port)` pairs.
    pub fn linked_ports(&self) -> usize {
        self.links.len()
    }
}

impl Topology for TopologySnapshot {
    fn switch(&self, dpid: &Dpid) -> Option<&SwitchInfo> {
        self.switches.get(dpid)
    }

    fn neighbor(&self, dpid: &Dpid, port: PortNo) -> Option<Endpoint> {
        self.links.get(&(dpid.clone(), port)).cloned()
    }
}

impl From<TopologyDocument> for TopologySnapshot {
    fn from(doc: TopologyDocument) -> Self {
        let mut snapshot = TopologySnapshot::new();
        for switch in doc.switches {
            snapshot.add_switch(switch.dpid, switch.ofp_version);
        }
        for link in doc.links {
            snapshot.add_link(link.endpoint_a, link.endpoint_b);
        }
        snapshot
    }
}
