//! # Error Types

use thiserror::Error;

/// Shape problems in a published event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The payload has no `entityRef` string.
    #[error("event payload has no entityRef")]
    MissingEntityRef,

    /// The payload's `entityRef` is empty after trimming.
    #[error("event payload has a blank entityRef")]
    BlankEntityRef,

    /// The timestamp is not an ISO-8601 instant.
    #[error("invalid event timestamp: {0}")]
    InvalidTimestamp(String),
}
