//! Single-field match predicates.
//!
//! Flow-match field names dispatch through [`FieldMatcher`]: VLAN and IP
//! fields have dedicated masked/CIDR semantics, `in_port` compares ports and
//! everything else is exact JSON equality against the packet's extra fields.

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use serde_json::Value;

use crate::id::VlanId;
use crate::packet::{IpField, PacketFields};

/// Bits of a VLAN spec compared against a tag. Bit 4096 (`OFPVID_PRESENT`)
/// is never part of the comparison.
const VLAN_VID_MASK: u32 = 0x0fff;

/// A decoded VLAN match value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VlanSpec {
    Exact(u32),
    Masked { value: u32, mask: u32 },
}

impl VlanSpec {
    /// Decodes an integer (`100`) or a `value/mask` string (`"4096/4096"`).
    pub fn parse(value: &Value) -> Option<VlanSpec> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(VlanSpec::Exact),
            Value::String(s) => match s.split_once('/') {
                Some((value, mask)) => Some(VlanSpec::Masked {
                    value: value.trim().parse().ok()?,
                    mask: mask.trim().parse().ok()?,
                }),
                None => s.trim().parse().ok().map(VlanSpec::Exact),
            },
            _ => None,
        }
    }

    /// The `(value, mask)` pair; exact values use the full 12-bit mask.
    pub fn value_mask(self) -> (u32, u32) {
        match self {
            VlanSpec::Exact(value) => (value, VLAN_VID_MASK),
            VlanSpec::Masked { value, mask } => (value, mask),
        }
    }
}

/// Matches the packet's current VLAN tag against a flow's VLAN predicate.
///
/// An untagged packet only matches the exact value `0`.
pub fn match_vlan(vlan_stack: &[VlanId], flow_value: &Value) -> bool {
    let Some(spec) = VlanSpec::parse(flow_value) else {
        tracing::debug!(%flow_value, "unparseable vlan match value");
        return false;
    };

    let Some(&tag) = vlan_stack.last() else {
        return spec == VlanSpec::Exact(0);
    };

    let (value, mask) = spec.value_mask();
    let mask = mask & VLAN_VID_MASK;
    u32::from(tag) & mask == value & mask
}

/// Parses `addr`, `addr/prefix_len` or `addr/netmask` into a network.
pub fn parse_network(spec: &str) -> Option<IpNetwork> {
    let (addr, prefix) = match spec.split_once('/') {
        Some((addr, suffix)) => {
            let addr: IpAddr = addr.trim().parse().ok()?;
            let suffix = suffix.trim();
            let prefix = match suffix.parse::<u8>() {
                Ok(prefix) => prefix,
                Err(_) => {
                    let netmask: IpAddr = suffix.parse().ok()?;
                    ipnetwork::ip_mask_to_prefix(netmask).ok()?
                }
            };
            (addr, prefix)
        }
        None => {
            let addr: IpAddr = spec.trim().parse().ok()?;
            let full = if addr.is_ipv4() { 32 } else { 128 };
            (addr, full)
        }
    };
    IpNetwork::new(addr, prefix).ok()
}

/// True iff `address` belongs to the network described by `flow_spec`.
/// Address families must agree.
pub fn match_ip(address: IpAddr, flow_spec: &str) -> bool {
    match parse_network(flow_spec) {
        Some(network) => {
            network.is_ipv4() == address.is_ipv4() && network.contains(address)
        }
        None => {
            tracing::debug!(flow_spec, "unparseable ip match value");
            false
        }
    }
}

/// Match strategy for one flow-match field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatcher {
    Vlan,
    Ip(IpField),
    InPort,
    Exact(String),
}

impl FieldMatcher {
    pub fn for_field(name: &str) -> FieldMatcher {
        match name {
            "dl_vlan" | "vlan_vid" => FieldMatcher::Vlan,
            "nw_src" | "ipv4_src" => FieldMatcher::Ip(IpField::Ipv4Src),
            "nw_dst" | "ipv4_dst" => FieldMatcher::Ip(IpField::Ipv4Dst),
            "ipv6_src" => FieldMatcher::Ip(IpField::Ipv6Src),
            "ipv6_dst" => FieldMatcher::Ip(IpField::Ipv6Dst),
            "in_port" => FieldMatcher::InPort,
            other => FieldMatcher::Exact(other.to_string()),
        }
    }

    /// Evaluates this matcher against the packet. The VLAN predicate is
    /// always evaluated; every other field fails when the packet lacks it.
    pub fn matches(&self, packet: &PacketFields, flow_value: &Value) -> bool {
        match self {
            FieldMatcher::Vlan => match_vlan(&packet.vlan_stack, flow_value),
            FieldMatcher::Ip(field) => match (packet.ip(*field), flow_value.as_str()) {
                (Some(address), Some(spec)) => match_ip(address, spec),
                _ => false,
            },
            FieldMatcher::InPort => flow_value.as_u64() == Some(u64::from(packet.in_port)),
            FieldMatcher::Exact(name) => packet.other.get(name) == Some(flow_value),
        }
    }
}
