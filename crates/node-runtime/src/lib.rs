//! # Node Runtime Library
//!
//! Wires the event distribution core into one process. The entry point is
//! the `main.rs` binary; the pieces are exposed here for tests.
//!
//! ```text
//!   producers ──publish──► EventBus ──► HistoryStore (bounded)
//!                             │               │
//!   DemoTicker ──publish──────┤               │ backlog
//!                             ▼               ▼
//!                      EventGatewayService: /events, /events/stream
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod runtime;
pub mod ticker;

pub use config::{DemoTickerConfig, NodeConfig, NodeConfigError};
pub use runtime::NodeRuntime;
pub use ticker::{demo_tick, DemoTicker};
