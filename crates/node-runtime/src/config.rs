//! # Node Configuration
//!
//! One document for the whole process: gateway settings, history capacity and
//! the demo ticker. Loaded from an optional JSON file, then overridden by
//! environment variables.

use event_gateway::domain::config::humantime_serde;
use event_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};
use shared_bus::DEFAULT_HISTORY_CAPACITY;
use shared_types::DEMO_TARGET;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP gateway configuration.
    pub gateway: GatewayConfig,
    /// Events retained for point queries and stream backlogs.
    pub history_capacity: usize,
    /// Demo ticker configuration.
    pub demo_ticker: DemoTickerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            demo_ticker: DemoTickerConfig::default(),
        }
    }
}

/// Periodic heartbeat events about one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoTickerConfig {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub entity_ref: String,
}

impl Default for DemoTickerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(60),
            entity_ref: DEMO_TARGET.to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum NodeConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl NodeConfig {
    /// Load from `EVT_CONFIG_FILE` (if set), then apply environment overrides.
    pub fn load() -> Result<Self, NodeConfigError> {
        let mut config = match std::env::var("EVT_CONFIG_FILE") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file; missing sections keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NodeConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| NodeConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| NodeConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply `EVT_*` overrides read through `lookup`.
    ///
    /// - `EVT_HTTP_HOST`, `EVT_HTTP_PORT`
    /// - `EVT_HEARTBEAT_MS`
    /// - `EVT_HISTORY_CAPACITY`
    /// - `EVT_DEMO_TICKER` (`true`/`1`), `EVT_DEMO_INTERVAL_SECS`
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), NodeConfigError> {
        if let Some(host) = parse_var::<IpAddr>(&lookup, "EVT_HTTP_HOST")? {
            self.gateway.http.host = host;
        }
        if let Some(port) = parse_var::<u16>(&lookup, "EVT_HTTP_PORT")? {
            self.gateway.http.port = port;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "EVT_HEARTBEAT_MS")? {
            self.gateway.stream.heartbeat_interval = Duration::from_millis(ms);
        }
        if let Some(capacity) = parse_var::<usize>(&lookup, "EVT_HISTORY_CAPACITY")? {
            self.history_capacity = capacity;
        }
        if let Some(flag) = lookup("EVT_DEMO_TICKER") {
            self.demo_ticker.enabled = flag.eq_ignore_ascii_case("true") || flag == "1";
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "EVT_DEMO_INTERVAL_SECS")? {
            self.demo_ticker.interval = Duration::from_secs(secs);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), NodeConfigError> {
        self.gateway
            .validate()
            .map_err(|e| NodeConfigError::Invalid(e.to_string()))?;
        if self.history_capacity == 0 {
            return Err(NodeConfigError::Invalid(
                "history_capacity cannot be 0".into(),
            ));
        }
        if self.demo_ticker.enabled {
            if self.demo_ticker.interval.is_zero() {
                return Err(NodeConfigError::Invalid(
                    "demo_ticker.interval cannot be 0".into(),
                ));
            }
            if self.demo_ticker.entity_ref.trim().is_empty() {
                return Err(NodeConfigError::Invalid(
                    "demo_ticker.entity_ref cannot be blank".into(),
                ));
            }
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, NodeConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| NodeConfigError::InvalidEnv { var, value }),
    }
}
