//! HTTP service around the control-plane trace engine.
//!
//! Fetches installed flows and topology from their collaborators, serves
//! on-demand traces, keeps the inferred circuit set current and cross-checks
//! important circuits against the data plane.

pub mod automate;
pub mod clients;
pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod scheduler;
pub mod schema;
pub mod service;
pub mod state;
pub mod store;
