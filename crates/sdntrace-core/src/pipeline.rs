//! Multi-table pipeline resolution and action application.
//!
//! [`match_and_apply`] walks a switch's tables starting at table 0, following
//! `goto_table` instructions and accumulating actions, then applies those
//! actions to the packet to obtain its egress port.

use crate::error::TraceError;
use crate::flow::{Action, FlowEntry, Instruction};
use crate::flow_match::first_match;
use crate::id::{PortNo, TableId};
use crate::packet::PacketFields;
use crate::topology::SwitchInfo;

/// Result of running a packet through one switch.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome<'a> {
    /// The flow selected in the last table visited, if any matched.
    pub flow: Option<&'a FlowEntry>,
    /// The packet after action application.
    pub fields: PacketFields,
    /// Where the packet leaves the switch. `None` ends the trace.
    pub egress: Option<PortNo>,
}

/// Follows the pipeline from table 0 and collects the actions to apply.
///
/// Returns `Ok(None)` when some table has no matching flow. A `goto_table`
/// that does not move strictly forward is a [`TraceError::PipelineRegression`].
pub fn resolve_pipeline<'a>(
    switch: &SwitchInfo,
    packet: &PacketFields,
    flows: &'a [FlowEntry],
) -> Result<Option<(&'a FlowEntry, Vec<Action>)>, TraceError> {
    let mut table_id: TableId = 0;
    let mut actions = Vec::new();

    loop {
        let Some(flow) = first_match(flows, packet, table_id) else {
            tracing::debug!(dpid = %switch.dpid, table_id, "no flow matched");
            return Ok(None);
        };

        if let Some(flat) = &flow.actions {
            actions.extend(flat.iter().cloned());
            return Ok(Some((flow, actions)));
        }

        let mut next_table = None;
        for instruction in flow.instructions.iter().flatten() {
            match instruction {
                Instruction::ApplyActions { actions: applied } => {
                    actions.extend(applied.iter().cloned());
                }
                Instruction::GotoTable { table_id: target } => {
                    if *target <= table_id {
                        return Err(TraceError::PipelineRegression {
                            dpid: switch.dpid.clone(),
                            from: table_id,
                            to: *target,
                        });
                    }
                    next_table = Some(*target);
                }
                Instruction::Unsupported => {}
            }
        }

        match next_table {
            Some(target) => table_id = target,
            None => return Ok(Some((flow, actions))),
        }
    }
}

/// Applies `actions` in order. The last `Output` wins.
pub fn apply_actions(packet: &mut PacketFields, actions: &[Action]) -> Option<PortNo> {
    let mut egress = None;
    for action in actions {
        match action {
            Action::Output { port } => egress = Some(*port),
            Action::PushVlan { .. } => packet.push_vlan(),
            Action::PopVlan => packet.pop_vlan(),
            Action::SetVlan { vlan_id } => packet.set_vlan(*vlan_id),
            Action::Unknown => {}
        }
    }
    egress
}

/// Runs `packet` through `switch`'s flow table.
///
/// Legacy switches, and packets no flow matches, come back with no egress
/// port and the packet untouched.
pub fn match_and_apply<'a>(
    switch: &SwitchInfo,
    packet: PacketFields,
    flows: &'a [FlowEntry],
) -> Result<PipelineOutcome<'a>, TraceError> {
    let resolved = resolve_pipeline(switch, &packet, flows)?;

    match resolved {
        Some((flow, actions)) if switch.ofp_version.supports_pipeline() => {
            let mut fields = packet;
            let egress = apply_actions(&mut fields, &actions);
            Ok(PipelineOutcome {
                flow: Some(flow),
                fields,
                egress,
            })
        }
        resolved => Ok(PipelineOutcome {
            flow: resolved.map(|(flow, _)| flow),
            fields: packet,
            egress: None,
        }),
    }
}
