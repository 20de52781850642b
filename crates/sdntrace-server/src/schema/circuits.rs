//! Circuit engine request/response types.

use serde::Serialize;

use sdntrace_core::circuit::CircuitStep;
use sdntrace_core::discovery::{CircuitChange, FailedTrace};
use sdntrace_core::Circuit;

#[derive(Debug, Clone, Serialize)]
pub struct ListCircuitsResponse {
    pub circuits: Vec<Circuit>,
    pub total: usize,
}

/// Summary of an on-demand discovery pass.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoverResponse {
    pub total: usize,
    /// Circuits without a symmetric return circuit.
    pub asymmetric: Vec<Circuit>,
    pub failed: Vec<FailedTrace>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitLookupResponse {
    pub circuit: Vec<CircuitStep>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileResponse {
    pub changed: Vec<CircuitChange>,
    pub failed: Vec<FailedTrace>,
}
