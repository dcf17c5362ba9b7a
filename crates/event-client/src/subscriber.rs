//! # Reconnecting Subscriber
//!
//! Keeps one subject's events flowing to a callback across disconnects.
//!
//! ```text
//!   Connecting ──ok──► Live ──fault──► Reconnecting{attempt, delay}
//!       │                ▲                      │
//!       │                └──────── sleep ◄──────┘
//!       ├── 400 ─────────────────────────────► Closed
//!       └── not an event stream (first attempt) ──► Polling
//! ```
//!
//! Every delivery goes through one gate: drop it if its identity is in the
//! seen window, otherwise call `on_event`, remember it and advance the
//! cursor. Reconnects and polls resume from the cursor, and the inclusive
//! bound means the boundary event comes back; the seen window absorbs it.

use crate::backoff::BackoffPolicy;
use crate::config::SubscriberConfig;
use crate::decoder::{decode_events, SseDecoder, SseFrame};
use crate::dedup::SeenWindow;
use crate::error::ClientError;
use crate::transport::{ByteStream, EventTransport, EventsClient};
use futures::StreamExt;
use parking_lot::Mutex;
use shared_bus::CancellableInterval;
use shared_types::{later_cursor, BusEvent};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

type EventCallback = Box<dyn Fn(&BusEvent) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&ClientError) + Send + Sync>;

/// Where a subscription currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberStatus {
    Connecting,
    Live,
    Reconnecting { attempt: u32, delay: Duration },
    Polling,
    Closed,
}

impl SubscriberStatus {
    /// Events are arriving, by stream or by polling.
    pub fn is_receiving(&self) -> bool {
        matches!(self, Self::Live | Self::Polling)
    }
}

/// Factory for subscriptions sharing one transport and configuration.
#[derive(Clone)]
pub struct ReconnectingSubscriber {
    transport: Arc<dyn EventTransport>,
    config: SubscriberConfig,
}

impl fmt::Debug for ReconnectingSubscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectingSubscriber")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReconnectingSubscriber {
    /// Subscriber over HTTP to `config.base_url`.
    pub fn new(config: SubscriberConfig) -> Result<Self, ClientError> {
        let transport = EventsClient::new(&config)?;
        Ok(Self {
            transport: Arc::new(transport),
            config,
        })
    }

    /// Subscriber over any transport.
    pub fn with_transport(
        transport: Arc<dyn EventTransport>,
        config: SubscriberConfig,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        Ok(Self { transport, config })
    }

    pub fn config(&self) -> &SubscriberConfig {
        &self.config
    }

    /// Start receiving events about `entity_ref` after `initial_cursor`.
    ///
    /// Must be called inside a tokio runtime. The subscription runs until the
    /// returned handle is unsubscribed or dropped, or the server rejects the
    /// subject.
    pub fn subscribe<F, E>(
        &self,
        entity_ref: impl Into<String>,
        initial_cursor: Option<String>,
        on_event: F,
        on_error: E,
    ) -> SubscriptionHandle
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
        E: Fn(&ClientError) + Send + Sync + 'static,
    {
        let (status, _) = watch::channel(SubscriberStatus::Connecting);
        let shared = Arc::new(Shared {
            entity_ref: entity_ref.into(),
            initial_cursor: initial_cursor.clone(),
            cursor: Mutex::new(initial_cursor),
            seen: Mutex::new(SeenWindow::new(self.config.dedup_window)),
            closed: AtomicBool::new(false),
            on_event: Box::new(on_event),
            on_error: Box::new(on_error),
            status,
        });
        let token = CancellationToken::new();

        info!(entity_ref = %shared.entity_ref, "Subscribing to events");
        let task = tokio::spawn(run(
            Arc::clone(&self.transport),
            Arc::clone(&shared),
            self.config.clone(),
            token.clone(),
        ));

        SubscriptionHandle {
            shared,
            token,
            task: Mutex::new(Some(task)),
            transport: Arc::clone(&self.transport),
        }
    }
}

/// State shared between a handle and its background task.
struct Shared {
    entity_ref: String,
    initial_cursor: Option<String>,
    cursor: Mutex<Option<String>>,
    seen: Mutex<SeenWindow>,
    closed: AtomicBool,
    on_event: EventCallback,
    on_error: ErrorCallback,
    status: watch::Sender<SubscriberStatus>,
}

impl Shared {
    /// The single delivery gate. Returns whether `event` was new.
    fn deliver(&self, event: &BusEvent) -> bool {
        if self.is_closed() {
            return false;
        }
        if !self.seen.lock().insert(event.dedup_key()) {
            trace!(id = %event.id, "Dropping duplicate event");
            return false;
        }
        {
            let mut cursor = self.cursor.lock();
            let next = later_cursor(cursor.as_deref(), &event.timestamp).to_string();
            *cursor = Some(next);
        }
        (self.on_event)(event);
        true
    }

    fn report(&self, err: &ClientError) {
        if !self.is_closed() {
            (self.on_error)(err);
        }
    }

    fn cursor(&self) -> Option<String> {
        self.cursor.lock().clone()
    }

    fn set_status(&self, status: SubscriberStatus) {
        if self.is_closed() && status != SubscriberStatus::Closed {
            return;
        }
        self.status.send_replace(status);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Owner of a running subscription. Dropping it unsubscribes.
pub struct SubscriptionHandle {
    shared: Arc<Shared>,
    token: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    transport: Arc<dyn EventTransport>,
}

impl SubscriptionHandle {
    /// Stop receiving. Idempotent; no callback starts once this returns.
    pub fn unsubscribe(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.token.cancel();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.shared.set_status(SubscriberStatus::Closed);
        debug!(entity_ref = %self.shared.entity_ref, "Unsubscribed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn entity_ref(&self) -> &str {
        &self.shared.entity_ref
    }

    /// Timestamp of the newest delivered event, or the initial cursor.
    pub fn cursor(&self) -> Option<String> {
        self.shared.cursor()
    }

    pub fn status(&self) -> SubscriberStatus {
        self.shared.status.borrow().clone()
    }

    /// Watch status transitions.
    pub fn status_watch(&self) -> watch::Receiver<SubscriberStatus> {
        self.shared.status.subscribe()
    }

    /// Pull anything missed since the cursor through a point query.
    /// Returns the number of new events delivered.
    pub async fn refresh(&self) -> Result<usize, ClientError> {
        let since = self.shared.cursor();
        let events = self
            .transport
            .fetch(&self.shared.entity_ref, since.as_deref())
            .await?;
        Ok(events.iter().filter(|e| self.shared.deliver(e)).count())
    }

    /// Forget delivered events and rewind the cursor to its initial value.
    /// The next reconnect or poll replays from there.
    pub fn clear(&self) {
        self.shared.seen.lock().clear();
        *self.shared.cursor.lock() = self.shared.initial_cursor.clone();
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("entity_ref", &self.shared.entity_ref)
            .field("cursor", &self.shared.cursor())
            .field("status", &self.status())
            .finish()
    }
}

enum StreamEnd {
    Cancelled,
    Fault(ClientError),
}

async fn run(
    transport: Arc<dyn EventTransport>,
    shared: Arc<Shared>,
    config: SubscriberConfig,
    token: CancellationToken,
) {
    let backoff = BackoffPolicy::new(config.base_delay, config.max_delay);
    let mut failures: u32 = 0;
    let mut ever_connected = false;

    loop {
        let since = shared.cursor();
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            opened = transport.open_stream(&shared.entity_ref, since.as_deref()) => opened,
        };

        let fault = match opened {
            Ok(stream) => {
                failures = 0;
                ever_connected = true;
                shared.set_status(SubscriberStatus::Live);
                info!(entity_ref = %shared.entity_ref, since = ?since, "Event stream connected");
                match pump(stream, &shared, &token).await {
                    StreamEnd::Cancelled => break,
                    StreamEnd::Fault(err) => err,
                }
            }
            Err(err) if err.is_fatal() => {
                error!(entity_ref = %shared.entity_ref, error = %err, "Subscription rejected");
                shared.report(&err);
                shared.closed.store(true, Ordering::Release);
                break;
            }
            Err(ClientError::NotStreaming(reason)) if !ever_connected => {
                warn!(
                    entity_ref = %shared.entity_ref,
                    reason = %reason,
                    interval_ms = config.poll_interval.as_millis() as u64,
                    "Event stream unavailable, falling back to polling"
                );
                poll(transport.as_ref(), &shared, config.poll_interval, &token).await;
                break;
            }
            Err(err) => err,
        };

        shared.report(&fault);
        let delay = backoff.delay(failures);
        failures = failures.saturating_add(1);
        shared.set_status(SubscriberStatus::Reconnecting {
            attempt: failures,
            delay,
        });
        warn!(
            entity_ref = %shared.entity_ref,
            attempt = failures,
            delay_ms = delay.as_millis() as u64,
            error = %fault,
            "Event stream fault, reconnecting"
        );
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    shared.set_status(SubscriberStatus::Closed);
}

/// Read frames until the stream faults or the subscription is cancelled.
async fn pump(mut stream: ByteStream, shared: &Shared, token: &CancellationToken) -> StreamEnd {
    let mut decoder = SseDecoder::new();
    loop {
        let chunk = tokio::select! {
            biased;
            _ = token.cancelled() => return StreamEnd::Cancelled,
            chunk = stream.next() => chunk,
        };
        let bytes = match chunk {
            Some(Ok(bytes)) => bytes,
            Some(Err(err)) => return StreamEnd::Fault(err),
            None => return StreamEnd::Fault(ClientError::StreamEnded),
        };
        let frames = match decoder.push(&bytes) {
            Ok(frames) => frames,
            Err(err) => return StreamEnd::Fault(err),
        };
        for frame in frames {
            match frame {
                SseFrame::Comment(_) => trace!("Heartbeat"),
                SseFrame::Message { data, .. } => match decode_events(&data) {
                    Ok(events) => {
                        for event in &events {
                            shared.deliver(event);
                        }
                    }
                    Err(err) => return StreamEnd::Fault(err),
                },
            }
        }
    }
}

/// Point-query the cursor every `interval` until cancelled or rejected.
async fn poll(
    transport: &dyn EventTransport,
    shared: &Shared,
    interval: Duration,
    token: &CancellationToken,
) {
    shared.set_status(SubscriberStatus::Polling);
    let mut ticks = CancellableInterval::new(interval, token.child_token());
    loop {
        let since = shared.cursor();
        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            fetched = transport.fetch(&shared.entity_ref, since.as_deref()) => fetched,
        };
        match fetched {
            Ok(events) => {
                for event in &events {
                    shared.deliver(event);
                }
            }
            Err(err) if err.is_fatal() => {
                error!(entity_ref = %shared.entity_ref, error = %err, "Polling rejected");
                shared.report(&err);
                shared.closed.store(true, Ordering::Release);
                return;
            }
            Err(err) => {
                debug!(entity_ref = %shared.entity_ref, error = %err, "Poll failed");
                shared.report(&err);
            }
        }
        if ticks.tick().await.is_none() {
            return;
        }
    }
}
