//! # Event Subscriber
//!
//! Defines the consuming side of the event bus: the handler trait and the
//! subscription handle returned by [`EventBus::subscribe`](crate::EventBus::subscribe).

use crate::publisher::BusInner;
use shared_types::BusEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::debug;

/// Errors a handler may report back to the bus.
///
/// The bus logs and counts them; they never reach the publisher.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The handler could not process the event.
    #[error("handler failed: {0}")]
    Failed(String),

    /// The handler's downstream consumer is gone or saturated.
    #[error("handler closed: {0}")]
    Closed(String),
}

/// Receives every event published after registration.
///
/// Called synchronously on the publisher's thread, so implementations must
/// not block; hand work off to a channel instead.
pub trait EventHandler: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &BusEvent) -> Result<(), HandlerError>;
}

impl<F> EventHandler for F
where
    F: Fn(&BusEvent) -> Result<(), HandlerError> + Send + Sync,
{
    fn on_event(&self, event: &BusEvent) -> Result<(), HandlerError> {
        self(event)
    }
}

/// A registered handler.
pub(crate) struct HandlerEntry {
    pub(crate) name: String,
    pub(crate) active: AtomicBool,
    pub(crate) handler: Box<dyn EventHandler>,
}

impl HandlerEntry {
    pub(crate) fn new(name: String, handler: Box<dyn EventHandler>) -> Self {
        Self {
            name,
            active: AtomicBool::new(true),
            handler,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Handle for a registered handler.
///
/// `unsubscribe` is idempotent and also runs on drop. The handle holds the
/// bus weakly, so it never keeps a dropped bus alive.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    id: u64,
    entry: Arc<HandlerEntry>,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub(crate) fn new(id: u64, entry: Arc<HandlerEntry>, bus: Weak<BusInner>) -> Self {
        Self { id, entry, bus }
    }

    /// Registration id, unique per bus.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the handler is still registered.
    pub fn is_active(&self) -> bool {
        self.entry.is_active()
    }

    /// Remove the handler. Later calls are no-ops.
    pub fn unsubscribe(&self) {
        if !self.entry.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
        debug!(subscription = self.id, handler = %self.entry.name, "Handler unsubscribed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("handler", &self.entry.name)
            .field("active", &self.is_active())
            .finish()
    }
}
