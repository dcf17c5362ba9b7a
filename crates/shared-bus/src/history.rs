//! # Event History
//!
//! Bounded, replayable mirror of everything published on a bus. Backs the
//! point query and the backlog phase of every stream session.
//!
//! ```text
//!  publish ──→ EventBus ──→ HistoryStore::append ──→ [oldest … newest]  (≤ capacity)
//!                                                        │
//!                      query(subject, since) ←── snapshot┘ filter outside the lock
//! ```

use crate::publisher::EventBus;
use crate::subscriber::{HandlerError, Subscription};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shared_types::{normalize, parse_instant, BusEvent};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Events retained when no capacity is configured.
pub const DEFAULT_HISTORY_CAPACITY: usize = 5000;

/// One retained event with its filter keys precomputed.
struct StoredEvent {
    subject: String,
    at: Option<DateTime<Utc>>,
    event: BusEvent,
}

struct HistoryBuffer {
    entries: RwLock<VecDeque<Arc<StoredEvent>>>,
    capacity: usize,
    evicted: AtomicU64,
}

impl HistoryBuffer {
    fn append(&self, event: &BusEvent) {
        let stored = Arc::new(StoredEvent {
            subject: normalize(event.entity_ref().unwrap_or_default()),
            at: event.instant(),
            event: event.clone(),
        });

        let mut entries = self.entries.write();
        entries.push_back(stored);
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
            self.evicted.fetch_add(excess as u64, Ordering::Relaxed);
        }
    }
}

/// Size-bounded history of published events, oldest first.
///
/// Subscribes to the bus on construction and detaches when dropped.
pub struct HistoryStore {
    buffer: Arc<HistoryBuffer>,
    _subscription: Subscription,
}

impl HistoryStore {
    /// Attach a history with the default capacity.
    pub fn new(bus: &EventBus) -> Self {
        Self::attach(bus, DEFAULT_HISTORY_CAPACITY)
    }

    /// Attach a history that keeps at most `capacity` events (minimum 1).
    pub fn attach(bus: &EventBus, capacity: usize) -> Self {
        let buffer = Arc::new(HistoryBuffer {
            entries: RwLock::new(VecDeque::with_capacity(capacity.clamp(1, 1024))),
            capacity: capacity.max(1),
            evicted: AtomicU64::new(0),
        });

        let sink = Arc::clone(&buffer);
        let subscription = bus.subscribe_named("history", move |event: &BusEvent| -> Result<(), HandlerError> {
            sink.append(event);
            Ok(())
        });

        info!(capacity = buffer.capacity, "Event history attached");

        Self {
            buffer,
            _subscription: subscription,
        }
    }

    /// Events about `subject` with `timestamp >= since`, in publish order.
    ///
    /// An absent or unparseable `since` starts at the epoch. Events whose own
    /// timestamp cannot be parsed never match.
    pub fn query(&self, subject: &str, since: Option<&str>) -> Vec<BusEvent> {
        let subject = normalize(subject);
        let since = since
            .and_then(parse_instant)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        let snapshot: Vec<Arc<StoredEvent>> = self.buffer.entries.read().iter().cloned().collect();

        let matched: Vec<BusEvent> = snapshot
            .iter()
            .filter(|stored| stored.subject == subject)
            .filter(|stored| stored.at.is_some_and(|at| at >= since))
            .map(|stored| stored.event.clone())
            .collect();

        debug!(entity_ref = %subject, since = %since, scanned = snapshot.len(), matched = matched.len(), "History query");
        matched
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.buffer.entries.read().len()
    }

    /// Whether nothing has been retained yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of retained events.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity
    }

    /// Total events evicted so far.
    pub fn evicted(&self) -> u64 {
        self.buffer.evicted.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("evicted", &self.evicted())
            .finish()
    }
}
