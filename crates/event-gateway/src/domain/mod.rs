//! Domain types for the gateway: configuration, errors and query validation.

pub mod config;
pub mod error;
pub mod query;

// Re-exports for convenience
pub use config::{ConfigError, CorsConfig, GatewayConfig, HttpConfig, LimitsConfig, StreamConfig};
pub use error::{ApiError, ApiResult, GatewayError};
pub use query::{EventsQuery, EventsQueryParams};
