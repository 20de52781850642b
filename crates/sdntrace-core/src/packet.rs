//! The simulated packet threaded through a trace.
//!
//! [`PacketFields`] holds the header values the flow matcher inspects. The
//! VLAN stack is ordered innermost first: the last element is the current
//! (outermost) tag. Fields without dedicated matching semantics live in
//! `other` and are compared by exact equality.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::{Dpid, PortNo, VlanId};

/// Header fields of the simulated packet at one hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketFields {
    pub dpid: Dpid,
    pub in_port: PortNo,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub vlan_stack: SmallVec<[VlanId; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_src: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_dst: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_src: Option<Ipv6Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_dst: Option<Ipv6Addr>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// Which address field an IP matcher reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpField {
    Ipv4Src,
    Ipv4Dst,
    Ipv6Src,
    Ipv6Dst,
}

impl PacketFields {
    /// An untagged packet entering `dpid` on `in_port`.
    pub fn new(dpid: Dpid, in_port: PortNo) -> Self {
        PacketFields {
            dpid,
            in_port,
            vlan_stack: SmallVec::new(),
            ipv4_src: None,
            ipv4_dst: None,
            ipv6_src: None,
            ipv6_dst: None,
            other: BTreeMap::new(),
        }
    }

    pub fn with_vlan(mut self, vlan: VlanId) -> Self {
        self.vlan_stack.push(vlan);
        self
    }

    /// The current (outermost) VLAN tag.
    pub fn current_vlan(&self) -> Option<VlanId> {
        self.vlan_stack.last().copied()
    }

    pub fn ip(&self, field: IpField) -> Option<IpAddr> {
        match field {
            IpField::Ipv4Src => self.ipv4_src.map(IpAddr::V4),
            IpField::Ipv4Dst => self.ipv4_dst.map(IpAddr::V4),
            IpField::Ipv6Src => self.ipv6_src.map(IpAddr::V6),
            IpField::Ipv6Dst => self.ipv6_dst.map(IpAddr::V6),
        }
    }

    pub fn push_vlan(&mut self) {
        self.vlan_stack.push(0);
    }

    /// Removes the outermost tag. Popping an untagged packet leaves it
    /// untagged.
    pub fn pop_vlan(&mut self) {
        if self.vlan_stack.pop().is_none() {
            tracing::warn!(dpid = %self.dpid, "pop_vlan on untagged packet ignored");
        }
    }

    /// Rewrites the outermost tag. Untagged packets are left untouched.
    pub fn set_vlan(&mut self, vlan: VlanId) {
        match self.vlan_stack.last_mut() {
            Some(tag) => *tag = vlan,
            None => {
                tracing::warn!(dpid = %self.dpid, vlan, "set_vlan on untagged packet ignored");
            }
        }
    }

    /// Moves the packet to the neighbor's ingress, keeping every rewritten
    /// header field.
    pub fn arrive_at(mut self, dpid: Dpid, in_port: PortNo) -> Self {
        self.dpid = dpid;
        self.in_port = in_port;
        self
    }
}
