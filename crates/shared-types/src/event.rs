//! # Bus Event Envelope
//!
//! Strongly typed envelope, loosely typed payload. The core only ever reads
//! `payload.entityRef`; every other payload field belongs to the producer.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cursor::parse_instant;
use crate::errors::EventError;

/// Payload key holding the subject of an event.
pub const ENTITY_REF_KEY: &str = "entityRef";

/// Event type emitted when a scorecard evaluation finishes.
pub const EVALUATION_COMPLETED: &str = "scorecards.evaluate.completed";

/// Event type emitted by the demo ticker.
pub const DEMO_TICK: &str = "demo.tick";

/// A published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    /// Producer-assigned identifier. Empty means absent.
    #[serde(default)]
    pub id: String,
    /// ISO-8601 instant, used for ordering and as the cursor.
    pub timestamp: String,
    /// Dot-namespaced category, opaque to the core.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Open payload; must carry `entityRef`.
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl BusEvent {
    /// Create an event about `entity_ref` with an otherwise empty payload.
    pub fn new(
        id: impl Into<String>,
        timestamp: impl Into<String>,
        event_type: impl Into<String>,
        entity_ref: impl Into<String>,
    ) -> Self {
        let mut payload = Map::new();
        payload.insert(ENTITY_REF_KEY.to_string(), Value::String(entity_ref.into()));
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            event_type: event_type.into(),
            payload,
        }
    }

    /// Create an event stamped with the current time and an id of the form
    /// `<prefix>-<epoch-ms>`.
    pub fn now(id_prefix: &str, event_type: impl Into<String>, entity_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self::new(
            format!("{id_prefix}-{}", now.timestamp_millis()),
            format_instant(now),
            event_type,
            entity_ref,
        )
    }

    /// Add a payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// The raw subject of this event, if the payload carries one.
    pub fn entity_ref(&self) -> Option<&str> {
        self.payload.get(ENTITY_REF_KEY).and_then(Value::as_str)
    }

    /// Parsed timestamp.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        parse_instant(&self.timestamp)
    }

    /// Identity used to suppress duplicates: the id, or `timestamp:type`.
    pub fn dedup_key(&self) -> String {
        if self.id.is_empty() {
            format!("{}:{}", self.timestamp, self.event_type)
        } else {
            self.id.clone()
        }
    }

    /// Check the only fields the core reads.
    pub fn validate(&self) -> Result<(), EventError> {
        match self.entity_ref() {
            Some(r) if !r.trim().is_empty() => {}
            Some(_) => return Err(EventError::BlankEntityRef),
            None => return Err(EventError::MissingEntityRef),
        }
        if self.instant().is_none() {
            return Err(EventError::InvalidTimestamp(self.timestamp.clone()));
        }
        Ok(())
    }
}

/// Format an instant the way producers stamp events (`...T..:..:..mmmZ`).
pub fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build the event a scoring run publishes when it completes.
pub fn evaluation_completed(
    entity_ref: &str,
    scorecard_id: &str,
    score: f64,
    rag: &str,
) -> BusEvent {
    BusEvent::now("eval", EVALUATION_COMPLETED, entity_ref)
        .with_field("scorecardId", scorecard_id)
        .with_field("score", score)
        .with_field("rag", rag)
}
