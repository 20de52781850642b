//! Server settings read from environment variables.
//!
//! Every variable has a default except the alert URL and the two schedule
//! intervals, which disable their feature when unset. A value that is set
//! but cannot be parsed is a [`ConfigError`].

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use sdntrace_core::CircuitEndpoints;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub flow_manager_url: String,
    pub topology_url: String,
    pub sdntrace_url: String,
    /// Where alerts are posted. Alerts only go to the log when unset.
    pub alert_url: Option<String>,
    pub alert_channel: String,
    pub alert_source: String,
    pub flow_store_timeout: Duration,
    /// Retries after the first failed flow-store request.
    pub flow_store_retries: u32,
    pub flow_store_retry_min: Duration,
    pub flow_store_retry_max: Duration,
    pub live_trace_poll: Duration,
    pub important_circuits: Vec<CircuitEndpoints>,
    pub schedule_traces: Option<Duration>,
    pub schedule_important: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind: "0.0.0.0".to_string(),
            port: 8181,
            flow_manager_url: "http://localhost:8181/api/kytos/flow_manager/v2".to_string(),
            topology_url: "http://localhost:8181/api/kytos/topology/v3".to_string(),
            sdntrace_url: "http://localhost:8181/api/amlight/sdntrace".to_string(),
            alert_url: None,
            alert_channel: "sdntrace_cp.alerts".to_string(),
            alert_source: "amlight/sdntrace_cp".to_string(),
            flow_store_timeout: Duration::from_secs(20),
            flow_store_retries: 3,
            flow_store_retry_min: Duration::from_millis(500),
            flow_store_retry_max: Duration::from_millis(5000),
            live_trace_poll: Duration::from_millis(1000),
            important_circuits: Vec::new(),
            schedule_traces: None,
            schedule_important: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let text = |name: &str, default: String| lookup(name).unwrap_or(default);

        let important_circuits = match lookup("IMPORTANT_CIRCUITS") {
            Some(raw) => serde_json::from_str(&raw).map_err(|err| ConfigError::Invalid {
                name: "IMPORTANT_CIRCUITS",
                reason: err.to_string(),
            })?,
            None => Vec::new(),
        };

        let settings = Settings {
            bind: text("SDNTRACE_CP_BIND", defaults.bind),
            port: parse(&lookup, "SDNTRACE_CP_PORT")?.unwrap_or(defaults.port),
            flow_manager_url: text("FLOW_MANAGER_URL", defaults.flow_manager_url),
            topology_url: text("TOPOLOGY_URL", defaults.topology_url),
            sdntrace_url: text("SDNTRACE_URL", defaults.sdntrace_url),
            alert_url: lookup("ALERT_URL").filter(|url| !url.is_empty()),
            alert_channel: text("ALERT_CHANNEL", defaults.alert_channel),
            alert_source: text("ALERT_SOURCE", defaults.alert_source),
            flow_store_timeout: parse(&lookup, "FLOW_STORE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.flow_store_timeout),
            flow_store_retries: parse(&lookup, "FLOW_STORE_RETRIES")?
                .unwrap_or(defaults.flow_store_retries),
            flow_store_retry_min: parse(&lookup, "FLOW_STORE_RETRY_MIN_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.flow_store_retry_min),
            flow_store_retry_max: parse(&lookup, "FLOW_STORE_RETRY_MAX_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.flow_store_retry_max),
            live_trace_poll: parse(&lookup, "LIVE_TRACE_POLL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.live_trace_poll),
            important_circuits,
            schedule_traces: parse(&lookup, "SCHEDULE_TRACES_SECS")?.map(Duration::from_secs),
            schedule_important: parse(&lookup, "SCHEDULE_IMPORTANT_SECS")?.map(Duration::from_secs),
        };

        if settings.flow_store_retry_min > settings.flow_store_retry_max {
            return Err(ConfigError::Invalid {
                name: "FLOW_STORE_RETRY_MIN_MS",
                reason: "must not exceed FLOW_STORE_RETRY_MAX_MS".to_string(),
            });
        }
        for (name, interval) in [
            ("SCHEDULE_TRACES_SECS", settings.schedule_traces),
            ("SCHEDULE_IMPORTANT_SECS", settings.schedule_important),
        ] {
            if interval == Some(Duration::ZERO) {
                return Err(ConfigError::Invalid {
                    name,
                    reason: "interval must be positive".to_string(),
                });
            }
        }

        Ok(settings)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
                name,
                reason: err.to_string(),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.listen_addr(), "0.0.0.0:8181");
        assert_eq!(settings.flow_store_timeout, Duration::from_secs(20));
        assert_eq!(settings.flow_store_retries, 3);
        assert_eq!(settings.alert_source, "amlight/sdntrace_cp");
        assert!(settings.alert_url.is_none());
        assert!(settings.important_circuits.is_empty());
        assert!(settings.schedule_traces.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let settings = settings(&[
            ("SDNTRACE_CP_PORT", "9000"),
            ("FLOW_STORE_RETRIES", "5"),
            ("LIVE_TRACE_POLL_MS", "250"),
            ("SCHEDULE_TRACES_SECS", "60"),
            ("ALERT_URL", "http://alerts.local/notify"),
            (
                "IMPORTANT_CIRCUITS",
                r#"[{"dpid_a": "00:00:00:00:00:00:00:01", "port_a": 1, "vlan_a": 100,
                     "dpid_z": "00:00:00:00:00:00:00:02", "port_z": 2}]"#,
            ),
        ])
        .unwrap();

        assert_eq!(settings.port, 9000);
        assert_eq!(settings.flow_store_retries, 5);
        assert_eq!(settings.live_trace_poll, Duration::from_millis(250));
        assert_eq!(settings.schedule_traces, Some(Duration::from_secs(60)));
        assert_eq!(settings.alert_url.as_deref(), Some("http://alerts.local/notify"));
        assert_eq!(settings.important_circuits.len(), 1);
        assert_eq!(settings.important_circuits[0].vlan_a, Some(100));
        assert_eq!(settings.important_circuits[0].vlan_z, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            settings(&[("SDNTRACE_CP_PORT", "not-a-port")]),
            Err(ConfigError::Invalid { name: "SDNTRACE_CP_PORT", .. })
        ));
        assert!(matches!(
            settings(&[("IMPORTANT_CIRCUITS", "{")]),
            Err(ConfigError::Invalid { name: "IMPORTANT_CIRCUITS", .. })
        ));
        assert!(matches!(
            settings(&[("FLOW_STORE_RETRY_MIN_MS", "9000")]),
            Err(ConfigError::Invalid { name: "FLOW_STORE_RETRY_MIN_MS", .. })
        ));
        assert!(matches!(
            settings(&[("SCHEDULE_IMPORTANT_SECS", "0")]),
            Err(ConfigError::Invalid { name: "SCHEDULE_IMPORTANT_SECS", .. })
        ));
    }
}
