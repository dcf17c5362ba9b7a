//! CORS middleware.
//!
//! Wrapper around tower-http CORS with gateway configuration. Browser
//! dashboards open `/events/stream` cross-origin, so GET must be allowed.

use crate::domain::config::CorsConfig;
use axum::http::{HeaderName, Method};
use std::str::FromStr;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// Create CORS layer from gateway config.
///
/// Every route is a read, so `GET` is always allowed whatever the method
/// list says. Entries that do not parse are skipped with a warning.
pub fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    if !config.enabled {
        // No CORS headers at all; same-origin clients only.
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(origins(&config.allowed_origins))
        .allow_methods(methods(&config.allowed_methods))
        .allow_headers(headers(&config.allowed_headers))
        .max_age(Duration::from_secs(config.max_age))
}

fn origins(configured: &[String]) -> AllowOrigin {
    if configured.iter().any(|o| o == "*") {
        return AllowOrigin::any();
    }
    AllowOrigin::list(parse_all(configured, "origin"))
}

fn methods(configured: &[String]) -> Vec<Method> {
    let mut methods: Vec<Method> = parse_all(configured, "method");
    if !methods.contains(&Method::GET) {
        methods.push(Method::GET);
    }
    methods
}

fn headers(configured: &[String]) -> AllowHeaders {
    if configured.iter().any(|h| h == "*") {
        return AllowHeaders::from(Any);
    }
    AllowHeaders::list(parse_all::<HeaderName>(configured, "header"))
}

fn parse_all<T: FromStr>(raw: &[String], what: &str) -> Vec<T> {
    raw.iter()
        .filter_map(|value| match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(value = %value, "Ignoring unparseable CORS {what}");
                None
            }
        })
        .collect()
}
