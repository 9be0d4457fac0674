//! Runtime configuration
//!
//! Every section has defaults, so an empty YAML document is a valid configuration.
//!
//! ```rust
//! use racecontrol::{Flag, RaceControlConfig};
//!
//! let config = RaceControlConfig::from_yaml_str(
//!     r#"
//! scheduler:
//!   grace_delay_ms: 120000
//! arbiter:
//!   initial_flag: Clear
//! "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.scheduler.grace_delay().as_secs(), 120);
//! assert_eq!(config.arbiter.initial_flag, Flag::Clear);
//! assert_eq!(config.transport.reconnect_base_ms, 500);
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::{Category, Flag, RaceControlError, Result, Session};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RaceControlConfig {
    pub transport: TransportConfig,
    pub scheduler: SchedulerConfig,
    pub endpoints: EndpointConfig,
    pub arbiter: ArbiterConfig,
    pub fanout: FanoutConfig,
    pub logging: LoggingConfig,
    /// Seeds the in-memory session store.
    pub sessions: Vec<Session>,
}

impl RaceControlConfig {
    /// Parse configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| RaceControlError::parse("configuration", e.to_string()))
    }

    /// Read and parse a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RaceControlError::config_file(path, e))?;
        serde_yaml_ng::from_str(&text).map_err(|e| RaceControlError::config_file(path, e))
    }
}

/// Connection and reconnect tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Upper bound on negotiate + connect + subscribe.
    pub connect_timeout_secs: u64,
    /// How long an adapter start waits for the subscription to go out.
    pub start_timeout_secs: u64,
    /// First reconnect delay; doubles per consecutive failure.
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.reconnect_base_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.reconnect_max_ms))
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            start_timeout_secs: 30,
            reconnect_base_ms: 500,
            reconnect_max_ms: 30_000,
        }
    }
}

/// Session activation and teardown.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Wait after a session finished before the adapter is stopped, so trailing
    /// messages still reach the arbiter.
    pub grace_delay_ms: u64,
    /// How far ahead of the scheduled time a session is picked up.
    pub look_ahead_secs: u64,
}

impl SchedulerConfig {
    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }

    pub fn look_ahead(&self) -> Duration {
        Duration::from_secs(self.look_ahead_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { grace_delay_ms: 60_000, look_ahead_secs: 300 }
    }
}

/// Per-category base URL overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub overrides: HashMap<Category, String>,
}

impl EndpointConfig {
    pub fn endpoint(&self, category: Category) -> &str {
        self.overrides
            .get(&category)
            .map(String::as_str)
            .unwrap_or_else(|| category.default_endpoint())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// Stored flag before any report arrives.
    pub initial_flag: Flag,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self { initial_flag: Flag::Chequered }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Queued events per client before the client is considered stalled.
    pub client_buffer: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self { client_buffer: 32 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RaceControlConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.scheduler.grace_delay(), Duration::from_secs(60));
        assert_eq!(config.scheduler.look_ahead(), Duration::from_secs(300));
        assert_eq!(config.arbiter.initial_flag, Flag::Chequered);
        assert_eq!(config.fanout.client_buffer, 32);
        assert!(config.sessions.is_empty());
    }

    #[test]
    fn reconnect_delay_doubles_up_to_cap() {
        let transport = TransportConfig { reconnect_base_ms: 100, reconnect_max_ms: 1_000, ..Default::default() };
        assert_eq!(transport.reconnect_delay(1), Duration::from_millis(100));
        assert_eq!(transport.reconnect_delay(2), Duration::from_millis(200));
        assert_eq!(transport.reconnect_delay(4), Duration::from_millis(800));
        assert_eq!(transport.reconnect_delay(5), Duration::from_millis(1_000));
        assert_eq!(transport.reconnect_delay(u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn endpoint_overrides() {
        let config = RaceControlConfig::from_yaml_str(
            r#"
endpoints:
  overrides:
    f2: "http://127.0.0.1:8080"
"#,
        )
        .unwrap();
        assert_eq!(config.endpoints.endpoint(Category::Formula2), "http://127.0.0.1:8080");
        assert_eq!(config.endpoints.endpoint(Category::Formula1), "https://livetiming.formula1.com");
    }

    #[test]
    fn sessions_section_parses() {
        let config = RaceControlConfig::from_yaml_str(
            r#"
sessions:
  - categoryKey: f1
    sessionKey: qualifying
    scheduledTime: 2025-07-05T14:00:00Z
  - categoryKey: f2
    sessionKey: feature
    scheduledTime: 2025-07-06T09:25:00Z
    chequeredThreshold: 1
"#,
        )
        .unwrap();
        assert_eq!(config.sessions.len(), 2);
        assert_eq!(config.sessions[0].effective_chequered_threshold(), Some(3));
        assert_eq!(config.sessions[1].chequered_threshold, Some(1));
    }

    #[test]
    fn load_reports_path_on_failure() {
        let err = RaceControlConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, RaceControlError::Config { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scheduler:\n  grace_delay_ms: 30000").unwrap();
        let config = RaceControlConfig::load(file.path()).unwrap();
        assert_eq!(config.scheduler.grace_delay_ms, 30_000);
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let err = RaceControlConfig::from_yaml_str("scheduler: [").unwrap_err();
        assert!(matches!(err, RaceControlError::Parse { .. }));
    }
}
