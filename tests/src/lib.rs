//! # Event Distribution Test Suite
//!
//! End-to-end scenarios over real sockets.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs            # TestNode on 127.0.0.1:0, SSE frame reader
//! └── integration/
//!     ├── point_query.rs    # GET /events
//!     ├── streaming.rs      # GET /events/stream, raw frames
//!     └── subscriber.rs     # ReconnectingSubscriber against live and stub servers
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p event-tests
//! cargo test -p event-tests integration::streaming::
//! ```

pub mod harness;
pub mod integration;
