//! # Event Client
//!
//! Client side of the event distribution core: a subscriber that keeps a
//! subject's events flowing across disconnects.
//!
//! ```text
//!   EventsClient ──/events/stream──► SseDecoder ──► SeenWindow ──► on_event
//!        │                                              ▲
//!        └──────────/events (poll, refresh)─────────────┘
//! ```
//!
//! ```ignore
//! let subscriber = ReconnectingSubscriber::new(SubscriberConfig::for_url("http://localhost:7007"))?;
//! let handle = subscriber.subscribe(
//!     "component:default/example-website",
//!     None,
//!     |event| println!("{}", event.event_type),
//!     |err| eprintln!("{err}"),
//! );
//! // ...
//! handle.unsubscribe();
//! ```

pub mod backoff;
pub mod config;
pub mod decoder;
pub mod dedup;
pub mod error;
pub mod subscriber;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use config::SubscriberConfig;
pub use decoder::{decode_events, SseDecoder, SseFrame, DEFAULT_MAX_PENDING};
pub use dedup::SeenWindow;
pub use error::ClientError;
pub use subscriber::{ReconnectingSubscriber, SubscriberStatus, SubscriptionHandle};
pub use transport::{ByteStream, EventTransport, EventsClient};
