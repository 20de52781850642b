//! Identifier types for switches, ports and VLAN tags.
//!
//! Switch ids are kept in their textual colon-separated form, since that is
//! how both the flow store and the topology service key them. Ports and VLAN
//! ids are plain integers with aliases so signatures read in network terms.

use std::fmt;

use serde::{Deserialize, Serialize};

/// OpenFlow port number. 32 bits wide to cover OpenFlow 1.3 reserved ports.
pub type PortNo = u32;

/// 802.1Q VLAN id.
pub type VlanId = u16;

/// OpenFlow table id.
pub type TableId = u8;

/// Unique switch identifier (datapath id), e.g. `00:00:00:00:00:00:00:01`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dpid(pub String);

impl Dpid {
    pub fn new(id: impl Into<String>) -> Self {
        Dpid(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Dpid {
    fn from(id: &str) -> Self {
        Dpid(id.to_string())
    }
}

/// OpenFlow protocol version negotiated with a switch.
///
/// Only OpenFlow 1.3 switches are simulated through instruction pipelines
/// and action application; OpenFlow 1.0 switches always end a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfpVersion {
    #[serde(rename = "0x01")]
    V10,
    #[serde(rename = "0x04")]
    V13,
}

impl OfpVersion {
    /// The reserved `OFPP_CONTROLLER` port for this protocol version.
    pub fn controller_port(self) -> PortNo {
        match self {
            OfpVersion::V10 => 0xfffd,
            OfpVersion::V13 => 0xffff_fffd,
        }
    }

    /// Whether the switch runs multi-table pipelines with action lists.
    pub fn supports_pipeline(self) -> bool {
        matches!(self, OfpVersion::V13)
    }
}

impl Default for OfpVersion {
    fn default() -> Self {
        OfpVersion::V13
    }
}
