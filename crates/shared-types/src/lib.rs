//! # Shared Types Crate
//!
//! Types shared by every part of the event distribution core:
//!
//! - [`BusEvent`]: the `{id, timestamp, type, payload}` envelope.
//! - [`entity_ref`]: subject normalization, the filter key used by history
//!   queries, live stream matching and clients alike.
//! - [`cursor`]: instant parsing and the inclusive resume cursor.

pub mod cursor;
pub mod entity_ref;
pub mod errors;
pub mod event;

pub use cursor::{coerce_since, later_cursor, parse_instant};
pub use entity_ref::{is_demo_target, normalize, same_subject, DEMO_TARGET};
pub use errors::EventError;
pub use event::{evaluation_completed, format_instant, BusEvent, DEMO_TICK, EVALUATION_COMPLETED};
