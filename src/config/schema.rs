//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the registry daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the registry daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RegistryConfig {
    /// Gateway listener configuration.
    pub listener: ListenerConfig,

    /// Process-wide liveness defaults and sweep cadence.
    pub registry: RegistrySettings,

    /// Lifecycle state machine settings.
    pub lifecycle: LifecycleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7070").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted body size for heartbeats and RPC calls.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7070".to_string(),
            request_timeout_secs: 10,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// Liveness defaults applied to reports that leave the values unset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Default heartbeat interval in seconds.
    pub check_interval_secs: u64,

    /// Number of missed intervals tolerated before forcing a service offline.
    pub allow_failures: u64,

    /// Number of intervals an offline service is kept around for revival.
    pub purge_delay: u64,

    /// Period of the timeout sweep in milliseconds.
    pub sweep_period_ms: u64,
}

impl RegistrySettings {
    /// Default heartbeat interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.check_interval_secs.saturating_mul(1000)
    }

    pub fn sweep_period(&self) -> Duration {
        Duration::from_millis(self.sweep_period_ms)
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            check_interval_secs: 5,
            allow_failures: 3,
            purge_delay: 3,
            sweep_period_ms: 5000,
        }
    }
}

/// Lifecycle state machine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Trigger precision in milliseconds.
    pub precision_ms: u64,

    /// Upper bound on the wait for the stopping state. Unset waits forever.
    pub stop_timeout_secs: Option<u64>,
}

impl LifecycleConfig {
    pub fn precision(&self) -> Duration {
        Duration::from_millis(self.precision_ms)
    }

    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            precision_ms: 100,
            stop_timeout_secs: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9091".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RegistryConfig = toml::from_str(
            r#"
            [registry]
            allow_failures = 5

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.registry.allow_failures, 5);
        assert_eq!(config.registry.check_interval_secs, 5);
        assert_eq!(config.registry.sweep_period(), Duration::from_secs(5));
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.listener.bind_address, "0.0.0.0:7070");
        assert!(config.lifecycle.stop_timeout().is_none());
    }

    #[test]
    fn test_interval_is_converted_to_millis() {
        let settings = RegistrySettings {
            check_interval_secs: 2,
            ..Default::default()
        };
        assert_eq!(settings.interval_ms(), 2000);
    }
}
