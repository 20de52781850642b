//! Flow entries as installed on switches.
//!
//! A [`FlowEntry`] carries its match predicates as an insertion-ordered map
//! of field name to raw JSON value, plus either a flat action list (single
//! table switches) or an instruction list (multi-table pipelines).
//!
//! [`Action`] and [`Instruction`] are closed tagged unions keyed by the
//! `action_type` / `instruction_type` fields used by the flow store. Kinds
//! this engine does not simulate deserialize into a catch-all variant so new
//! switch features never make a flow table unreadable.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::{Dpid, PortNo, TableId, VlanId};

/// A single action inside a flow's action list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum Action {
    /// Forward the packet out of `port`.
    Output { port: PortNo },
    /// Push a new (zero) VLAN tag.
    PushVlan {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag_type: Option<String>,
    },
    /// Remove the outermost VLAN tag.
    PopVlan,
    /// Rewrite the outermost VLAN tag.
    SetVlan { vlan_id: VlanId },
    /// Any action kind the engine does not simulate.
    #[serde(other)]
    Unknown,
}

/// A single instruction inside a flow's instruction list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "instruction_type", rename_all = "snake_case")]
pub enum Instruction {
    ApplyActions {
        #[serde(default)]
        actions: Vec<Action>,
    },
    GotoTable { table_id: TableId },
    /// Write/clear actions, meters and other instructions that do not
    /// influence the simulated path.
    #[serde(other)]
    Unsupported,
}

/// A rule in a switch flow table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEntry {
    #[serde(default)]
    pub table_id: TableId,
    #[serde(default)]
    pub priority: u16,
    #[serde(default, rename = "match")]
    pub match_fields: IndexMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Vec<Instruction>>,
}

impl FlowEntry {
    /// The `in_port` predicate, if the flow matches on one.
    pub fn in_port(&self) -> Option<PortNo> {
        self.match_fields
            .get("in_port")
            .and_then(|value| value.as_u64())
            .and_then(|port| PortNo::try_from(port).ok())
    }

    /// Every `Output` port named by the flow, from flat actions and from
    /// `apply_actions` instructions alike.
    pub fn output_ports(&self) -> Vec<PortNo> {
        let flat = self.actions.iter().flatten();
        let applied = self
            .instructions
            .iter()
            .flatten()
            .filter_map(|instruction| match instruction {
                Instruction::ApplyActions { actions } => Some(actions.iter()),
                Instruction::GotoTable { .. } | Instruction::Unsupported => None,
            })
            .flatten();

        flat.chain(applied)
            .filter_map(|action| match action {
                Action::Output { port } => Some(*port),
                _ => None,
            })
            .collect()
    }
}

/// Installed flow tables for every switch, keyed by dpid.
///
/// Each table keeps the order supplied by the flow store, which must already
/// be priority ordered: the flow matcher selects the first matching entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowTables(BTreeMap<Dpid, Vec<FlowEntry>>);

impl FlowTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries installed on `dpid`; empty when the switch has none.
    pub fn table(&self, dpid: &Dpid) -> &[FlowEntry] {
        self.0.get(dpid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn insert(&mut self, dpid: Dpid, flows: Vec<FlowEntry>) {
        self.0.insert(dpid, flows);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Dpid, &Vec<FlowEntry>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Dpid, Vec<FlowEntry>)> for FlowTables {
    fn from_iter<I: IntoIterator<Item = (Dpid, Vec<FlowEntry>)>>(iter: I) -> Self {
        FlowTables(iter.into_iter().collect())
    }
}
