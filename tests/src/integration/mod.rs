//! Cross-crate scenarios: runtime, gateway and client together.

mod point_query;
mod streaming;
mod subscriber;
