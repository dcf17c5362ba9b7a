//! # Event Gateway
//!
//! HTTP surface of the event distribution core.
//!
//! ## Routes
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /events?entityRef=&since=` | JSON array of retained events, oldest first |
//! | `GET /events/stream?entityRef=&since=` | SSE: backlog, then live events, `: ping` heartbeats |
//! | `GET /health` | liveness |
//! | `GET /metrics` | JSON counters |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Event Gateway                       │
//! ├─────────────────────────────────────────────────────────┤
//! │   CORS → Tracing/metrics → Router                       │
//! │                              │                          │
//! │            ┌─────────────────┼──────────────┐           │
//! │            ▼                 ▼              ▼           │
//! │       /events          /events/stream   /health,/metrics│
//! │            │                 │                          │
//! │            ▼                 ▼                          │
//! │      HistoryStore     StreamSession ◄── EventBus        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The gateway never owns the bus or the history; the hosting process
//! constructs both and passes them in.

pub mod domain;
pub mod middleware;
pub mod service;
pub mod sse;

pub use domain::{ApiError, ApiResult, ConfigError, GatewayConfig, GatewayError};
pub use middleware::GatewayMetrics;
pub use service::{build_router, EventGatewayService, GatewayState};
pub use sse::{CloseReason, SessionInfo, SessionRegistry};
