//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Filter directive (trace, debug, info, warn, error, or `target=level` lists)
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,

    /// Include module targets in each line
    pub with_targets: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "event-gateway".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            with_targets: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `EVT_SERVICE_NAME`: Service name (default: event-gateway)
    /// - `EVT_LOG_LEVEL` or `RUST_LOG`: Filter directive (default: info)
    /// - `EVT_JSON_LOGS`: JSON output (default: false, true in containers)
    /// - `EVT_LOG_TARGETS`: Include module targets (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let is_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();
        let defaults = Self::default();

        Self {
            service_name: lookup("EVT_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: lookup("EVT_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            json_logs: lookup("EVT_JSON_LOGS")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(is_container),

            with_targets: lookup("EVT_LOG_TARGETS")
                .map(|v| !v.eq_ignore_ascii_case("false") && v != "0")
                .unwrap_or(defaults.with_targets),
        }
    }
}
