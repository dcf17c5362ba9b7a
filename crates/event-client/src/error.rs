//! Client error types.

use thiserror::Error;

/// Everything a subscriber can report through its error callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The connection could not be made.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The connection broke mid-stream.
    #[error("stream interrupted: {0}")]
    Stream(String),

    /// The server closed the stream.
    #[error("stream ended by server")]
    StreamEnded,

    /// A frame or response body was not valid event JSON.
    #[error("undecodable frame: {0}")]
    Decode(String),

    /// The server refused the request itself (bad subject).
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The server answered but does not serve an event stream there.
    #[error("endpoint does not serve an event stream: {0}")]
    NotStreaming(String),

    /// Unexpected HTTP status on a point query.
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },

    /// Invalid subscriber configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Config(_))
    }
}
