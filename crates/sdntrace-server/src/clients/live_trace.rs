//! Client for the data-plane trace service.
//!
//! `PUT {base}/trace` with a trace request answers
//! `{"result": {"trace_id": N}}`; `GET {base}/trace/{N}` answers the record
//! of that trace, whose `result` lists the hops seen so far.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use sdntrace_core::{DataPlaneHop, TraceRequest};

use super::{CollaboratorError, LiveTraceSource};

const SERVICE: &str = "live trace";

#[derive(Debug, Deserialize)]
struct StartedTrace {
    result: TraceHandle,
}

#[derive(Debug, Deserialize)]
struct TraceHandle {
    trace_id: u64,
}

/// A trace that has not produced any hop yet carries no `result`.
#[derive(Debug, Default, Deserialize)]
struct TraceProgress {
    #[serde(default)]
    result: Vec<DataPlaneHop>,
}

pub struct LiveTraceClient {
    http: reqwest::Client,
    base_url: String,
}

impl LiveTraceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        Ok(LiveTraceClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, CollaboratorError> {
    let status = response.status();
    if !status.is_success() {
        return Err(CollaboratorError::from_status(SERVICE, status));
    }
    response.json().await.map_err(|err| CollaboratorError::BadResponse {
        service: SERVICE,
        reason: err.to_string(),
    })
}

#[async_trait]
impl LiveTraceSource for LiveTraceClient {
    async fn start_trace(&self, request: &TraceRequest) -> Result<u64, CollaboratorError> {
        let response = self
            .http
            .put(format!("{}/trace", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        let started: StartedTrace = read_json(response).await?;
        Ok(started.result.trace_id)
    }

    async fn trace_result(&self, id: u64) -> Result<Vec<DataPlaneHop>, CollaboratorError> {
        let response = self
            .http
            .get(format!("{}/trace/{}", self.base_url, id))
            .send()
            .await
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        let progress: TraceProgress = read_json(response).await?;
        Ok(progress.result)
    }
}
