//! # Shared Bus - In-Process Event Distribution
//!
//! The publish/subscribe bus, the bounded event history fed by it, and the
//! cancellable interval used for every periodic job.
//!
//! ## Fan-out
//!
//! ```text
//! ┌──────────────┐
//! │  Producer    │    publish()
//! │ (ticker,     │ ──────┐
//! │  scoring)    │       │
//! └──────────────┘       ▼
//!                  ┌──────────────┐   handler 1 ──→ HistoryStore::append
//!                  │  EventBus    │ ─ handler 2 ──→ StreamSession A (bounded buffer)
//!                  │              │   handler 3 ──→ StreamSession B (bounded buffer)
//!                  └──────────────┘
//! ```
//!
//! Handlers run synchronously on the publisher's thread in registration
//! order. A failing or panicking handler is logged and skipped; it never
//! affects the other handlers or the publisher.
//!
//! ## Ownership
//!
//! There is no global bus. The process entry point constructs one
//! [`EventBus`] and one [`HistoryStore`] and hands clones/`Arc`s to whoever
//! needs them.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod history;
pub mod interval;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use history::{HistoryStore, DEFAULT_HISTORY_CAPACITY};
pub use interval::{spawn_periodic, CancellableInterval};
pub use publisher::{EventBus, EventPublisher};
pub use subscriber::{EventHandler, HandlerError, Subscription};
pub use tokio_util::sync::CancellationToken;
