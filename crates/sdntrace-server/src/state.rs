//! Application state shared by every handler.
//!
//! [`AppState`] is cheap to clone: every field is an `Arc`. The trace store
//! and the circuit set are internally synchronized, so handlers never take a
//! global lock.

use std::sync::Arc;
use std::time::Duration;

use crate::automate::CircuitEngine;
use crate::clients::{
    AlertSink, CollaboratorError, FlowSource, FlowStoreClient, HttpAlertSink, LiveTraceClient,
    LiveTraceSource, LogAlertSink, TopologyClient, TopologySource,
};
use crate::config::Settings;
use crate::scheduler::Scheduler;
use crate::service::TraceService;
use crate::store::TraceStore;

const COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(20);

/// The external services the server talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub flows: Arc<dyn FlowSource>,
    pub topology: Arc<dyn TopologySource>,
    pub live: Arc<dyn LiveTraceSource>,
    pub alerts: Arc<dyn AlertSink>,
}

impl Collaborators {
    /// HTTP clients for every collaborator named in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, CollaboratorError> {
        let alerts: Arc<dyn AlertSink> = match &settings.alert_url {
            Some(url) => Arc::new(HttpAlertSink::new(url.clone(), COLLABORATOR_TIMEOUT)?),
            None => Arc::new(LogAlertSink),
        };
        Ok(Collaborators {
            flows: Arc::new(FlowStoreClient::from_settings(settings)?),
            topology: Arc::new(TopologyClient::new(
                settings.topology_url.clone(),
                COLLABORATOR_TIMEOUT,
            )?),
            live: Arc::new(LiveTraceClient::new(
                settings.sdntrace_url.clone(),
                COLLABORATOR_TIMEOUT,
            )?),
            alerts,
        })
    }
}

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TraceService>,
    pub engine: Arc<CircuitEngine>,
    pub scheduler: Arc<Scheduler>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(collaborators: Collaborators, settings: Settings) -> Self {
        let store = Arc::new(TraceStore::new());
        let service = Arc::new(TraceService::new(
            Arc::clone(&collaborators.flows),
            Arc::clone(&collaborators.topology),
            store,
        ));
        let engine = Arc::new(CircuitEngine::new(
            collaborators.flows,
            collaborators.topology,
            collaborators.live,
            collaborators.alerts,
            &settings,
        ));

        AppState {
            service,
            engine,
            scheduler: Arc::new(Scheduler::new()),
            settings: Arc::new(settings),
        }
    }

    /// State wired to the HTTP collaborators of `settings`.
    pub fn from_settings(settings: Settings) -> Result<Self, CollaboratorError> {
        let collaborators = Collaborators::from_settings(&settings)?;
        Ok(Self::new(collaborators, settings))
    }

    /// Starts the periodic jobs enabled in the settings.
    pub fn start_jobs(&self) {
        self.engine.schedule(&self.scheduler, &self.settings);
    }
}
