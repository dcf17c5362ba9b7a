//! # Event Publisher
//!
//! Defines the publishing side of the event bus and the in-process bus
//! itself.

use crate::subscriber::{EventHandler, HandlerEntry, Subscription};
use parking_lot::RwLock;
use shared_types::BusEvent;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Trait for publishing events to the bus.
///
/// Producers (a finished scoring run, the demo ticker) depend on this rather
/// than on the concrete bus.
pub trait EventPublisher: Send + Sync {
    /// Publish an event.
    ///
    /// # Returns
    ///
    /// The number of handlers the event was delivered to.
    fn publish(&self, event: BusEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// Shared state behind every clone of an [`EventBus`].
pub(crate) struct BusInner {
    /// Registered handlers in registration order.
    handlers: RwLock<BTreeMap<u64, Arc<HandlerEntry>>>,
    next_id: AtomicU64,
    events_published: AtomicU64,
    handler_failures: AtomicU64,
}

impl BusInner {
    pub(crate) fn remove(&self, id: u64) {
        self.handlers.write().remove(&id);
    }
}

/// In-process publish/subscribe bus.
///
/// `publish` runs every handler synchronously on the caller's thread, in
/// registration order, against a snapshot of the handler set. Failures and
/// panics are contained per handler. Cloning is cheap and every clone
/// addresses the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: RwLock::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
                events_published: AtomicU64::new(0),
                handler_failures: AtomicU64::new(0),
            }),
        }
    }

    /// Register a handler for every event published from now on.
    pub fn subscribe<H>(&self, handler: H) -> Subscription
    where
        H: EventHandler + 'static,
    {
        self.subscribe_named("anonymous", handler)
    }

    /// Register a handler under a name used in logs.
    pub fn subscribe_named<H>(&self, name: impl Into<String>, handler: H) -> Subscription
    where
        H: EventHandler + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(HandlerEntry::new(name.into(), Box::new(handler)));
        self.inner.handlers.write().insert(id, Arc::clone(&entry));

        debug!(subscription = id, handler = %entry.name, "Handler subscribed");

        Subscription::new(id, entry, Arc::downgrade(&self.inner))
    }

    /// Deliver `event` to every registered handler.
    ///
    /// Returns the number of handlers invoked, failed ones included.
    pub fn publish(&self, event: BusEvent) -> usize {
        self.inner.events_published.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = event.validate() {
            warn!(event_id = %event.id, event_type = %event.event_type, error = %e, "Publishing malformed event");
        }

        let snapshot: Vec<Arc<HandlerEntry>> =
            self.inner.handlers.read().values().cloned().collect();

        let mut delivered = 0;
        for entry in snapshot {
            // Removed after the snapshot was taken.
            if !entry.is_active() {
                continue;
            }
            delivered += 1;

            match catch_unwind(AssertUnwindSafe(|| entry.handler.on_event(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.inner.handler_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(handler = %entry.name, event_id = %event.id, error = %e, "Event handler failed");
                }
                Err(_) => {
                    self.inner.handler_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(handler = %entry.name, event_id = %event.id, "Event handler panicked");
                }
            }
        }

        trace!(event_id = %event.id, event_type = %event.event_type, delivered, "Event published");
        delivered
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.read().len()
    }

    /// Total failed or panicked handler invocations.
    #[must_use]
    pub fn handler_failures(&self) -> u64 {
        self.inner.handler_failures.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: BusEvent) -> usize {
        EventBus::publish(self, event)
    }

    fn events_published(&self) -> u64 {
        self.inner.events_published.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .field("events_published", &self.events_published())
            .finish()
    }
}
