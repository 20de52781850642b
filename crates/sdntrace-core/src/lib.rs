//! Control-plane trace engine.
//!
//! Simulates how a packet would traverse an OpenFlow network using only the
//! installed flow tables and the topology, and infers end-to-end circuits
//! from those flows. Everything here is synchronous and side-effect free;
//! the server crate supplies the data and the I/O.

pub mod id;
pub mod error;
pub mod flow;
pub mod packet;
pub mod matchers;
pub mod flow_match;
pub mod pipeline;
pub mod topology;
pub mod walker;
pub mod entries;
pub mod render;
pub mod circuit;
pub mod discovery;

// Re-export commonly used types
pub use id::{Dpid, OfpVersion, PortNo, TableId, VlanId};
pub use error::TraceError;
pub use flow::{Action, FlowEntry, FlowTables, Instruction};
pub use packet::PacketFields;
pub use topology::{Endpoint, SwitchInfo, Topology, TopologySnapshot};
pub use walker::{StepType, TraceResult, TraceStep, TraceWalker};
pub use entries::TraceRequest;
pub use render::{render_hops, HopView};
pub use circuit::{Circuit, CircuitEndpoints, CircuitStep, DataPlaneHop};
pub use discovery::{discover_circuits, reconcile, Discovery, Reconciliation};
