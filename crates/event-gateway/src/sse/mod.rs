//! Server-sent event streams.
//!
//! `GET /events/stream` replays the retained backlog for a subject, then
//! forwards live bus events for it until the connection ends.

pub mod registry;
pub mod session;

pub use registry::{SessionInfo, SessionRegistry};
pub use session::{open_stream, CloseReason};
