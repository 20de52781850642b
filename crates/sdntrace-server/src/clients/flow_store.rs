//! Flow-store client.
//!
//! Reads `GET {base}/stored_flows?state=installed[&dpid=..]`, whose body maps
//! each dpid to its stored flows: `{dpid: [{"flow": {...}, "state": ".."}]}`.
//! Transient failures are retried with exponential backoff up to a fixed
//! number of attempts.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoff::future::retry_notify;
use backoff::ExponentialBackoff;
use serde::Deserialize;

use sdntrace_core::{Dpid, FlowEntry, FlowTables};

use super::{CollaboratorError, FlowSource};
use crate::config::Settings;

const SERVICE: &str = "flow store";

#[derive(Debug, Deserialize)]
struct StoredFlow {
    flow: FlowEntry,
    #[serde(default)]
    state: Option<String>,
}

pub struct FlowStoreClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
    retry_min: Duration,
    retry_max: Duration,
}

impl FlowStoreClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retries: u32,
        retry_min: Duration,
        retry_max: Duration,
    ) -> Result<Self, CollaboratorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        Ok(FlowStoreClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retries,
            retry_min,
            retry_max,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, CollaboratorError> {
        Self::new(
            settings.flow_manager_url.clone(),
            settings.flow_store_timeout,
            settings.flow_store_retries,
            settings.flow_store_retry_min,
            settings.flow_store_retry_max,
        )
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.retry_min,
            initial_interval: self.retry_min,
            multiplier: 2.0,
            max_interval: self.retry_max,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    async fn fetch_once(&self, dpids: Option<&[Dpid]>) -> Result<FlowTables, CollaboratorError> {
        let mut query = vec![("state", "installed")];
        for dpid in dpids.into_iter().flatten() {
            query.push(("dpid", dpid.as_str()));
        }

        let response = self
            .http
            .get(format!("{}/stored_flows", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::from_status(SERVICE, status));
        }

        let stored: BTreeMap<Dpid, Vec<StoredFlow>> = response
            .json()
            .await
            .map_err(|err| CollaboratorError::BadResponse {
                service: SERVICE,
                reason: err.to_string(),
            })?;

        Ok(installed_tables(stored))
    }
}

fn installed_tables(stored: BTreeMap<Dpid, Vec<StoredFlow>>) -> FlowTables {
    stored
        .into_iter()
        .map(|(dpid, flows)| {
            let mut table: Vec<FlowEntry> = flows
                .into_iter()
                .filter(|stored| stored.state.as_deref().map_or(true, |s| s == "installed"))
                .map(|stored| stored.flow)
                .collect();
            table.sort_by(|a, b| b.priority.cmp(&a.priority));
            (dpid, table)
        })
        .collect()
}

#[async_trait]
impl FlowSource for FlowStoreClient {
    async fn stored_flows(&self, dpids: Option<&[Dpid]>) -> Result<FlowTables, CollaboratorError> {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let retries = self.retries;

        let fetch = move || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed);
            match self.fetch_once(dpids).await {
                Ok(tables) => Ok(tables),
                Err(err) if err.is_transient() && attempt < retries => {
                    Err(backoff::Error::transient(err))
                }
                Err(err) => Err(backoff::Error::permanent(err)),
            }
        };
        let log_failure = |err: CollaboratorError, wait: Duration| {
            tracing::warn!(error = %err, ?wait, "flow store request failed, retrying");
        };

        let tables = retry_notify(self.retry_policy(), fetch, log_failure).await?;
        tracing::debug!(switches = tables.len(), "fetched stored flows");
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_installed_flows_by_descending_priority() {
        let stored: BTreeMap<Dpid, Vec<StoredFlow>> = serde_json::from_value(json!({
            "00:00:00:00:00:00:00:01": [
                {"flow": {"priority": 10, "match": {"in_port": 1}}, "state": "installed"},
                {"flow": {"priority": 30, "match": {"in_port": 2}}, "state": "pending"},
                {"flow": {"priority": 20, "match": {"in_port": 3}}, "state": "installed"},
                {"flow": {"priority": 20, "match": {"in_port": 4}}}
            ]
        }))
        .unwrap();

        let tables = installed_tables(stored);
        let ports: Vec<_> = tables
            .table(&Dpid::from("00:00:00:00:00:00:00:01"))
            .iter()
            .map(|flow| flow.in_port())
            .collect();
        assert_eq!(ports, vec![Some(3), Some(4), Some(1)]);
    }

    #[test]
    fn retry_policy_uses_configured_bounds() {
        let client = FlowStoreClient::new(
            "http://flows.local/",
            Duration::from_secs(1),
            2,
            Duration::from_millis(100),
            Duration::from_millis(400),
        )
        .unwrap();
        let policy = client.retry_policy();
        assert_eq!(policy.initial_interval, Duration::from_millis(100));
        assert_eq!(policy.max_interval, Duration::from_millis(400));
        assert_eq!(policy.max_elapsed_time, None);
        assert_eq!(client.base_url, "http://flows.local");
    }
}
