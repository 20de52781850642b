//! API schema types for request/response definitions.
//!
//! Each sub-module defines the request and response types for one group of
//! routes. Trace results are always rendered through
//! [`sdntrace_core::render_hops`].

pub mod circuits;
pub mod trace;
