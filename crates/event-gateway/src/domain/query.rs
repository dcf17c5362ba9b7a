//! Query parameters shared by `/events` and `/events/stream`.

use crate::domain::config::LimitsConfig;
use crate::domain::error::ApiError;
use serde::Deserialize;
use shared_types::{coerce_since, normalize};
use tracing::debug;

/// Raw query string, as sent by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQueryParams {
    #[serde(rename = "entityRef")]
    pub entity_ref: Option<String>,
    pub since: Option<String>,
}

/// Validated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsQuery {
    /// Subject as the client sent it, trimmed.
    pub entity_ref: String,
    /// Canonical subject.
    pub subject: String,
    /// Inclusive lower bound; `None` replays everything retained.
    pub since: Option<String>,
}

impl EventsQueryParams {
    /// Validate against `limits`.
    ///
    /// `entityRef` is required. `since` never fails validation: placeholders
    /// and unparseable values are dropped.
    pub fn validate(self, limits: &LimitsConfig) -> Result<EventsQuery, ApiError> {
        let entity_ref = self
            .entity_ref
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("entityRef is required"))?;

        if entity_ref.len() > limits.max_entity_ref_len {
            return Err(ApiError::bad_request(format!(
                "entityRef exceeds {} bytes",
                limits.max_entity_ref_len
            )));
        }

        let since = coerce_since(self.since.as_deref());
        if since.is_none() {
            if let Some(raw) = self.since.as_deref().filter(|s| !s.trim().is_empty()) {
                debug!(since = %raw, "Ignoring unusable since parameter");
            }
        }

        Ok(EventsQuery {
            entity_ref: entity_ref.to_string(),
            subject: normalize(entity_ref),
            since,
        })
    }
}
