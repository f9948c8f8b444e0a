//! Dashboard configuration

use anyhow::{Context, Result};
use dashboard_lib::control_plane::ClientSettings;
use dashboard_lib::monitor::MonitorConfig;
use serde::Deserialize;
use std::time::Duration;

/// Dashboard configuration, read from `DASHBOARD_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// HTTP listen port
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Chat webhook for monitor alerts; alerts are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Health monitor interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Control-plane connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Control-plane read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Webhook request timeout in seconds
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,

    /// Trailing log lines fetched per pod
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: i64,

    /// Whether monitor alerting starts enabled
    #[serde(default = "default_alerts_enabled")]
    pub alerts_enabled: bool,
}

fn default_listen_port() -> u16 {
    8080
}

fn default_poll_interval() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    1000
}

fn default_read_timeout() -> u64 {
    2000
}

fn default_webhook_timeout() -> u64 {
    5
}

fn default_log_tail_lines() -> i64 {
    100
}

fn default_alerts_enabled() -> bool {
    true
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            webhook_url: None,
            poll_interval_secs: default_poll_interval(),
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_read_timeout(),
            webhook_timeout_secs: default_webhook_timeout(),
            log_tail_lines: default_log_tail_lines(),
            alerts_enabled: default_alerts_enabled(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("DASHBOARD").try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read dashboard configuration")?;

        let parsed: Self = config
            .try_deserialize()
            .context("Invalid dashboard configuration")?;

        if parsed.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }

        Ok(parsed)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            log_tail_lines: self.log_tail_lines,
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_secs(self.poll_interval_secs),
            ..MonitorConfig::default()
        }
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix("DASHBOARD")
            .try_parsing(true)
            .source(Some(map))
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = DashboardConfig::from_source(env(&[])).unwrap();

        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.poll_interval_secs, 60);
        assert!(config.webhook_url.is_none());
        assert!(config.alerts_enabled);
        assert_eq!(
            config.client_settings().connect_timeout,
            Duration::from_secs(1)
        );
        assert_eq!(config.client_settings().read_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_environment_overrides() {
        let config = DashboardConfig::from_source(env(&[
            ("DASHBOARD_LISTEN_PORT", "9090"),
            ("DASHBOARD_WEBHOOK_URL", "https://chat.example.com/hook"),
            ("DASHBOARD_POLL_INTERVAL_SECS", "15"),
            ("DASHBOARD_ALERTS_ENABLED", "false"),
        ]))
        .unwrap();

        assert_eq!(config.listen_port, 9090);
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://chat.example.com/hook")
        );
        assert_eq!(config.monitor_config().interval, Duration::from_secs(15));
        assert!(!config.alerts_enabled);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = DashboardConfig::from_source(env(&[("DASHBOARD_POLL_INTERVAL_SECS", "0")]));
        tokio_test::assert_err!(result);
    }
}
