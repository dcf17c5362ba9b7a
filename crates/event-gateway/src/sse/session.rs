//! Per-connection stream session.
//!
//! ```text
//! Opening ──(query valid, headers sent)──→ Streaming ──(disconnect | shutdown | overflow)──→ Closed
//!    │
//!    └──(invalid query)──→ 400, never streams
//! ```
//!
//! While streaming, the output is the full backlog followed by live events,
//! with `: ping` comments on every heartbeat tick. The live handler is
//! registered before the backlog is read so nothing published in between is
//! lost; events that show up in both are emitted once, from the backlog.
//!
//! Everything the session holds lives in a [`SessionGuard`] owned by the
//! response stream. Dropping the stream (client gone) or leaving the loop
//! (shutdown, overflow) closes the guard exactly once.

use crate::domain::error::{ApiError, ApiResult};
use crate::domain::query::EventsQuery;
use crate::middleware::metrics::GatewayMetrics;
use crate::service::GatewayState;
use crate::sse::registry::{SessionInfo, SessionRegistry};
use axum::http::{header, HeaderName};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures::Stream;
use shared_bus::{CancellableInterval, EventHandler, HandlerError, Subscription};
use shared_types::{normalize, BusEvent};
use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Nginx honours this and stops buffering the response.
const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client went away and the response stream was dropped.
    ClientGone,
    /// The gateway is shutting down.
    Shutdown,
    /// The client fell too far behind; it resumes from its cursor.
    Overflow,
    /// The bus dropped the live handler.
    BusGone,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ClientGone => "client gone",
            Self::Shutdown => "shutdown",
            Self::Overflow => "overflow",
            Self::BusGone => "bus gone",
        };
        f.write_str(s)
    }
}

/// Resources held by one session.
struct SessionGuard {
    id: Uuid,
    subject: String,
    subscription: Option<Subscription>,
    sessions: Arc<SessionRegistry>,
    metrics: Arc<GatewayMetrics>,
    closed: bool,
}

impl SessionGuard {
    fn open(id: Uuid, query: &EventsQuery, sessions: Arc<SessionRegistry>, metrics: Arc<GatewayMetrics>) -> Self {
        sessions.register(SessionInfo {
            id,
            subject: query.subject.clone(),
            since: query.since.clone(),
            opened_at: Utc::now(),
        });
        metrics.record_session_open();
        Self {
            id,
            subject: query.subject.clone(),
            subscription: None,
            sessions,
            metrics,
            closed: false,
        }
    }

    fn close(&mut self, reason: CloseReason) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.sessions.remove(&self.id);
        self.metrics.record_session_close();
        if reason == CloseReason::Overflow {
            self.metrics.record_session_overflow();
            warn!(session_id = %self.id, entity_ref = %self.subject, "Stream session closed: client too slow");
        } else {
            info!(session_id = %self.id, entity_ref = %self.subject, %reason, "Stream session closed");
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.close(CloseReason::ClientGone);
    }
}

/// Open a stream session for an already validated query.
pub fn open_stream(state: &GatewayState, query: EventsQuery) -> ApiResult<Response> {
    if state.shutdown.is_cancelled() {
        return Err(ApiError::unavailable("gateway is shutting down"));
    }

    let id = Uuid::new_v4();
    let stream_config = &state.config.stream;
    let (tx, rx) = mpsc::channel(stream_config.session_buffer);
    let overflowed = Arc::new(AtomicBool::new(false));

    let mut guard = SessionGuard::open(id, &query, Arc::clone(&state.sessions), Arc::clone(&state.metrics));
    guard.subscription = Some(state.bus.subscribe_named(
        format!("stream-session {id}"),
        live_forwarder(query.subject.clone(), tx, Arc::clone(&overflowed)),
    ));

    let backlog = state.history.query(&query.subject, query.since.as_deref());
    info!(
        session_id = %id,
        entity_ref = %query.subject,
        since = ?query.since,
        backlog = backlog.len(),
        "Stream session opened"
    );

    let heartbeat = CancellableInterval::new(stream_config.heartbeat_interval, state.shutdown.child_token());
    let stream = session_stream(guard, backlog, rx, overflowed, heartbeat);

    let headers = [
        (header::CACHE_CONTROL, "no-cache, no-transform"),
        (X_ACCEL_BUFFERING, "no"),
    ];
    Ok((headers, Sse::new(stream)).into_response())
}

/// Bus handler forwarding matching events into the session buffer.
///
/// Never blocks: a full buffer marks the session overflowed and later events
/// are dropped until the session notices and closes.
fn live_forwarder(
    subject: String,
    tx: mpsc::Sender<BusEvent>,
    overflowed: Arc<AtomicBool>,
) -> impl EventHandler {
    move |event: &BusEvent| -> Result<(), HandlerError> {
        if overflowed.load(Ordering::Acquire) {
            return Ok(());
        }
        if normalize(event.entity_ref().unwrap_or_default()) != subject {
            return Ok(());
        }
        match tx.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                overflowed.store(true, Ordering::Release);
                Err(HandlerError::Closed(format!("session buffer full for {subject}")))
            }
            // Session already finished; its guard is unsubscribing.
            Err(TrySendError::Closed(_)) => Ok(()),
        }
    }
}

enum Step {
    Live(BusEvent),
    Heartbeat,
    Close(CloseReason),
}

fn session_stream(
    mut guard: SessionGuard,
    backlog: Vec<BusEvent>,
    mut live: mpsc::Receiver<BusEvent>,
    overflowed: Arc<AtomicBool>,
    mut heartbeat: CancellableInterval,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    async_stream::stream! {
        let metrics = Arc::clone(&guard.metrics);
        let mut replayed: HashSet<String> = backlog.iter().map(BusEvent::dedup_key).collect();
        let newest_replayed = backlog.iter().filter_map(BusEvent::instant).max();

        for event in &backlog {
            if let Some(frame) = data_frame(event, &guard.id) {
                metrics.record_backlog_frame();
                yield Ok(frame);
            }
        }
        drop(backlog);
        debug!(session_id = %guard.id, "Backlog replayed, streaming live events");

        let reason = loop {
            let step = tokio::select! {
                received = live.recv() => match received {
                    Some(event) => Step::Live(event),
                    None => Step::Close(CloseReason::BusGone),
                },
                tick = heartbeat.tick() => match tick {
                    Some(_) => Step::Heartbeat,
                    None => Step::Close(CloseReason::Shutdown),
                },
            };

            match step {
                Step::Live(event) => {
                    if overflowed.load(Ordering::Acquire) {
                        break CloseReason::Overflow;
                    }
                    if !replayed.is_empty() {
                        if replayed.remove(&event.dedup_key()) {
                            continue;
                        }
                        // Past the backlog: no later live event can be a replay.
                        let past_backlog = match (event.instant(), newest_replayed) {
                            (Some(at), Some(newest)) => at > newest,
                            _ => false,
                        };
                        if past_backlog {
                            replayed = HashSet::new();
                        }
                    }
                    if let Some(frame) = data_frame(&event, &guard.id) {
                        metrics.record_live_frame();
                        yield Ok(frame);
                    }
                }
                Step::Heartbeat => {
                    metrics.record_heartbeat();
                    yield Ok(Event::default().comment("ping"));
                }
                Step::Close(reason) => break reason,
            }
        };

        guard.close(reason);
    }
}

fn data_frame(event: &BusEvent, session_id: &Uuid) -> Option<Event> {
    match Event::default().json_data(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(session_id = %session_id, event_id = %event.id, error = %e, "Skipping unencodable event");
            None
        }
    }
}
