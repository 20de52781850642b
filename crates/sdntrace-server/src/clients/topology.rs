//! Topology client.
//!
//! Builds a [`TopologySnapshot`] from `GET {base}/switches` and
//! `GET {base}/links`. Inactive links are left out.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use sdntrace_core::topology::Endpoint;
use sdntrace_core::{Dpid, OfpVersion, PortNo, TopologySnapshot};

use super::{CollaboratorError, TopologySource};

const SERVICE: &str = "topology";

#[derive(Debug, Deserialize)]
struct SwitchesDocument {
    switches: BTreeMap<String, SwitchDocument>,
}

#[derive(Debug, Deserialize)]
struct SwitchDocument {
    dpid: Dpid,
    #[serde(default)]
    ofp_version: Option<OfpVersion>,
}

#[derive(Debug, Deserialize)]
struct LinksDocument {
    links: BTreeMap<String, LinkDocument>,
}

#[derive(Debug, Deserialize)]
struct LinkDocument {
    endpoint_a: InterfaceDocument,
    endpoint_b: InterfaceDocument,
    #[serde(default = "active_by_default")]
    active: bool,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct InterfaceDocument {
    switch: Dpid,
    port_number: PortNo,
}

impl From<InterfaceDocument> for Endpoint {
    fn from(interface: InterfaceDocument) -> Self {
        Endpoint {
            dpid: interface.switch,
            port: interface.port_number,
        }
    }
}

pub struct TopologyClient {
    http: reqwest::Client,
    base_url: String,
}

impl TopologyClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        Ok(TopologyClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, CollaboratorError> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, path))
            .send()
            .await
            .map_err(|err| CollaboratorError::from_reqwest(SERVICE, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::from_status(SERVICE, status));
        }
        response.json().await.map_err(|err| CollaboratorError::BadResponse {
            service: SERVICE,
            reason: err.to_string(),
        })
    }
}

fn build_snapshot(switches: SwitchesDocument, links: LinksDocument) -> TopologySnapshot {
    let mut snapshot = TopologySnapshot::new();
    for switch in switches.switches.into_values() {
        snapshot.add_switch(switch.dpid, switch.ofp_version.unwrap_or_default());
    }
    for link in links.links.into_values().filter(|link| link.active) {
        snapshot.add_link(link.endpoint_a.into(), link.endpoint_b.into());
    }
    snapshot
}

#[async_trait]
impl TopologySource for TopologyClient {
    async fn topology(&self) -> Result<TopologySnapshot, CollaboratorError> {
        let switches: SwitchesDocument = self.get("switches").await?;
        let links: LinksDocument = self.get("links").await?;
        let snapshot = build_snapshot(switches, links);
        tracing::debug!(
            switches = snapshot.switches().count(),
            linked_ports = snapshot.linked_ports(),
            "fetched topology"
        );
        Ok(snapshot)
    }
}
