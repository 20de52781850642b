//! HTTP handler modules.
//!
//! Handlers parse requests, delegate to the trace service or the circuit
//! engine, and return JSON responses. No business logic lives here.

pub mod circuits;
pub mod trace;
