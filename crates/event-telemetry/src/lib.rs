//! # Event Telemetry
//!
//! Structured logging for the event distribution services.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use event_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&TelemetryConfig::from_env())?;
//!     // ...
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `EVT_SERVICE_NAME` | `event-gateway` | Service name in the startup line |
//! | `EVT_LOG_LEVEL` / `RUST_LOG` | `info` | Filter directive |
//! | `EVT_JSON_LOGS` | `false` (`true` in containers) | JSON lines output |
//! | `EVT_LOG_TARGETS` | `true` | Include module targets |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging, TelemetryGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(String),
}
