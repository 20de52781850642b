//! Flow-table lookup for a simulated packet.

use crate::flow::FlowEntry;
use crate::id::TableId;
use crate::matchers::FieldMatcher;
use crate::packet::PacketFields;

/// Whether `match_flows` stops at the first hit or collects all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    First,
    All,
}

/// Tests one flow against the packet in table `table_id`.
///
/// Flows without match predicates never match, nor do flows installed in a
/// different table.
pub fn match_flow(flow: &FlowEntry, packet: &PacketFields, table_id: TableId) -> bool {
    if flow.match_fields.is_empty() || flow.table_id != table_id {
        return false;
    }
    flow.match_fields
        .iter()
        .all(|(name, value)| FieldMatcher::for_field(name).matches(packet, value))
}

/// Matching flows of `table_id`, in table order.
pub fn match_flows<'a>(
    flows: &'a [FlowEntry],
    packet: &PacketFields,
    table_id: TableId,
    mode: MatchMode,
) -> Vec<&'a FlowEntry> {
    let matching = flows
        .iter()
        .filter(|flow| match_flow(flow, packet, table_id));
    match mode {
        MatchMode::First => matching.take(1).collect(),
        MatchMode::All => matching.collect(),
    }
}

/// The selected (first matching) flow of `table_id`.
pub fn first_match<'a>(
    flows: &'a [FlowEntry],
    packet: &PacketFields,
    table_id: TableId,
) -> Option<&'a FlowEntry> {
    flows.iter().find(|flow| match_flow(flow, packet, table_id))
}
