//! Alert sinks.

use std::time::Duration;

use async_trait::async_trait;

use super::{Alert, AlertSink, CollaboratorError};

/// Writes alerts to the log only.
#[derive(Debug, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn send(&self, alert: Alert) {
        tracing::warn!(
            channel = %alert.channel,
            source = %alert.source,
            "{}",
            alert.message
        );
    }
}

/// Posts alerts as JSON to an external notification endpoint.
pub struct HttpAlertSink {
    http: reqwest::Client,
    url: String,
}

impl HttpAlertSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| CollaboratorError::from_reqwest("alert sink", err))?;
        Ok(HttpAlertSink {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for HttpAlertSink {
    async fn send(&self, alert: Alert) {
        tracing::warn!(channel = %alert.channel, "{}", alert.message);
        match self.http.post(&self.url).json(&alert).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::error!(status = %response.status(), "alert sink rejected alert");
            }
            Err(err) => tracing::error!(error = %err, "failed to deliver alert"),
        }
    }
}
