//! Client configuration.
//!
//! Loaded from YAML. Every field has a default matching the host SDK's sample client, so
//! an empty document is a valid configuration. Durations are written in milliseconds.
//!
//! ```rust
//! use corelink::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::from_yaml_str(
//!     r#"
//! startup_mode: Networked
//! auto_pick_first_host: true
//! retry_discovery_after_ms: 1000
//! reconnect:
//!   max_attempts: 5
//! "#,
//! )?;
//!
//! assert_eq!(config.tick_interval(), Duration::from_millis(20));
//! assert_eq!(config.reconnect.max_attempts, 5);
//! assert_eq!(config.reconnect.interval(), Duration::from_millis(100));
//! # Ok::<(), corelink::ClientError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::lifecycle::ConnectionMode;
use crate::sdk::{CoordinateSystem, SessionKind};
use crate::{ClientError, Result};

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub session_kind: SessionKind,
    pub coordinate_system: CoordinateSystem,
    /// Consumer tick period.
    pub tick_interval_ms: u64,
    pub discovery: DiscoveryConfig,
    /// Connection mode chosen without operator input when set.
    pub startup_mode: Option<ConnectionMode>,
    /// Pick the first discovered host without operator input.
    pub auto_pick_first_host: bool,
    /// Leave `NoHostsFound` automatically after this long.
    pub retry_discovery_after_ms: Option<u64>,
    /// Budget for automatic reconnection (local and direct modes).
    pub reconnect: ReconnectPolicy,
    /// Budget for operator-requested reconnection.
    pub manual_reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session_kind: SessionKind::CoreSdk,
            coordinate_system: CoordinateSystem::default(),
            tick_interval_ms: 20,
            discovery: DiscoveryConfig::default(),
            startup_mode: None,
            auto_pick_first_host: false,
            retry_discovery_after_ms: None,
            reconnect: ReconnectPolicy::automatic(),
            manual_reconnect: ReconnectPolicy::manual(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// How long a host lookup waits for answers.
    pub timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { timeout_ms: 2000 }
    }
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Reconnection budget.
///
/// A zero `max_attempts` or zero `max_duration_ms` means that budget is unbounded. With
/// both at zero the client retries until it reconnects or is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub max_duration_ms: u64,
    /// Pause after each failed attempt.
    pub interval_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::automatic()
    }
}

impl ReconnectPolicy {
    /// Unbounded retries every 100 ms.
    pub const fn automatic() -> Self {
        Self { max_attempts: 0, max_duration_ms: 0, interval_ms: 100 }
    }

    /// Ten attempts within a minute, every 100 ms.
    pub const fn manual() -> Self {
        Self { max_attempts: 10, max_duration_ms: 60_000, interval_ms: 100 }
    }

    pub fn max_attempts(&self) -> Option<u32> {
        (self.max_attempts > 0).then_some(self.max_attempts)
    }

    pub fn max_duration(&self) -> Option<Duration> {
        (self.max_duration_ms > 0).then(|| Duration::from_millis(self.max_duration_ms))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_attempts().is_none() && self.max_duration().is_none()
    }
}

impl ClientConfig {
    /// Settings for an unattended client: networked discovery, first host, retry every
    /// second until a host answers.
    pub fn headless() -> Self {
        Self {
            startup_mode: Some(ConnectionMode::Networked),
            auto_pick_first_host: true,
            retry_discovery_after_ms: Some(1000),
            ..Self::default()
        }
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: ClientConfig = serde_yaml_ng::from_str(yaml).map_err(|e| {
            ClientError::config_error_with_source("invalid client configuration", Box::new(e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config_error_with_source(
                format!("cannot read {}", path.display()),
                Box::new(e),
            )
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| {
            ClientError::config_error_with_source(
                "cannot serialize client configuration",
                Box::new(e),
            )
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(ClientError::config_error("tick_interval_ms must be greater than zero"));
        }
        if self.reconnect.interval_ms == 0 || self.manual_reconnect.interval_ms == 0 {
            return Err(ClientError::config_error(
                "reconnect interval_ms must be greater than zero",
            ));
        }
        if self.discovery.timeout_ms == 0 {
            return Err(ClientError::config_error("discovery timeout_ms must be greater than zero"));
        }
        let scale = self.coordinate_system.unit_scale;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ClientError::config_error(format!(
                "coordinate_system.unit_scale must be a positive number, got {scale}"
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn retry_discovery_after(&self) -> Option<Duration> {
        self.retry_discovery_after_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::{AxisPolarity, Handedness};

    #[test]
    fn empty_document_uses_sample_client_defaults() {
        let config = ClientConfig::from_yaml_str("{}").expect("empty config is valid");

        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.tick_interval(), Duration::from_millis(20));
        assert_eq!(config.discovery.timeout(), Duration::from_secs(2));
        assert!(config.reconnect.is_unbounded());
        assert_eq!(config.manual_reconnect.max_attempts(), Some(10));
        assert_eq!(config.manual_reconnect.max_duration(), Some(Duration::from_secs(60)));
        assert_eq!(config.coordinate_system.handedness, Handedness::Right);
        assert_eq!(config.coordinate_system.up_axis, AxisPolarity::PositiveZ);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let yaml = "\
manual_reconnect:
  max_attempts: 3
coordinate_system:
  handedness: Left
  up_axis: PositiveY
  view_axis: ZFromViewer
  unit_scale: 0.01
  world_space: false
";
        let config = ClientConfig::from_yaml_str(yaml).expect("valid config");

        assert_eq!(config.manual_reconnect.max_attempts, 3);
        assert_eq!(config.manual_reconnect.max_duration_ms, 60_000);
        assert_eq!(config.manual_reconnect.interval_ms, 100);
        assert_eq!(config.coordinate_system.handedness, Handedness::Left);
        assert!((config.coordinate_system.unit_scale - 0.01).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let err = ClientConfig::from_yaml_str("tick_interval_ms: 0").unwrap_err();
        assert!(matches!(err, ClientError::Config { .. }));
        assert!(err.to_string().contains("tick_interval_ms"));
    }

    #[test]
    fn zero_reconnect_interval_is_rejected() {
        let err = ClientConfig::from_yaml_str("reconnect:\n  interval_ms: 0").unwrap_err();
        assert!(matches!(err, ClientError::Config { .. }));
    }

    #[test]
    fn malformed_yaml_keeps_parser_error_as_source() {
        let err = ClientConfig::from_yaml_str("tick_interval_ms: [not, a, number]").unwrap_err();
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn headless_preset_round_trips_through_yaml() {
        let config = ClientConfig::headless();
        let yaml = config.to_yaml_string().expect("serializable");
        let parsed = ClientConfig::from_yaml_str(&yaml).expect("parsable");

        assert_eq!(parsed, config);
        assert_eq!(parsed.startup_mode, Some(ConnectionMode::Networked));
        assert_eq!(parsed.retry_discovery_after(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ClientConfig::load("/nonexistent/corelink.yaml").unwrap_err();
        assert!(matches!(err, ClientError::Config { .. }));
        assert!(err.to_string().contains("cannot read"));
    }
}
