//! Error types for sdntrace-core.
//!
//! Benign trace endings (no matching flow, unknown switch, loops) are not
//! errors: they are reported as step types in the trace result. Only input
//! that cannot be traced at all and inconsistent pipelines are errors.

use thiserror::Error;

use crate::id::{Dpid, TableId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    /// The trace request lacks a required field or has a mistyped one.
    #[error("malformed trace request: {reason}")]
    Malformed { reason: String },

    /// A `goto_table` instruction pointed at the current or an earlier table.
    #[error("pipeline regression on {dpid}: goto_table({to}) from table {from}")]
    PipelineRegression { dpid: Dpid, from: TableId, to: TableId },
}

impl TraceError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        TraceError::Malformed {
            reason: reason.into(),
        }
    }
}
