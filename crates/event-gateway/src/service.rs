//! Gateway service - main entry point.
//!
//! Serves the point query, the event stream, health and metrics over one
//! HTTP listener.

use crate::domain::config::GatewayConfig;
use crate::domain::error::{ApiError, ApiResult, GatewayError};
use crate::domain::query::EventsQueryParams;
use crate::middleware::{create_cors_layer, GatewayMetrics, TracingLayer};
use crate::sse::{open_stream, SessionRegistry};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use shared_bus::{EventBus, HistoryStore};
use shared_types::BusEvent;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::{debug, info};

/// Application state shared across handlers
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub bus: EventBus,
    pub history: Arc<HistoryStore>,
    pub metrics: Arc<GatewayMetrics>,
    pub sessions: Arc<SessionRegistry>,
    /// Cancelled on shutdown; every session's heartbeat is a child of it.
    pub shutdown: CancellationToken,
}

impl GatewayState {
    pub fn new(
        config: GatewayConfig,
        bus: EventBus,
        history: Arc<HistoryStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            bus,
            history,
            metrics: Arc::new(GatewayMetrics::new()),
            sessions: Arc::new(SessionRegistry::new()),
            shutdown,
        }
    }
}

/// Event gateway service
pub struct EventGatewayService {
    state: GatewayState,
}

impl EventGatewayService {
    /// Create a new gateway over an existing bus and history.
    ///
    /// `shutdown` is usually a child of the process-wide token.
    pub fn new(
        config: GatewayConfig,
        bus: EventBus,
        history: Arc<HistoryStore>,
        shutdown: CancellationToken,
    ) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(Self {
            state: GatewayState::new(config, bus, history, shutdown),
        })
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Bind the configured address without serving yet.
    pub async fn bind(&self) -> Result<TcpListener, GatewayError> {
        let addr = self.state.config.http_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        if self.state.shutdown.is_cancelled() {
            return Err(GatewayError::ShuttingDown);
        }

        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;
        info!(addr = %local_addr, "Starting event gateway");

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        info!("Event gateway stopped");
        Ok(())
    }

    /// Trigger graceful shutdown: open sessions end, then the listener stops.
    pub fn shutdown(&self) {
        self.state.shutdown.cancel();
    }

    /// Shared handler state.
    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.state.metrics)
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

/// Router over the given state.
pub fn build_router(state: GatewayState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(create_cors_layer(&state.config.cors))
        .layer(TracingLayer::new(Arc::clone(&state.metrics)));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/events", get(list_events))
        .route("/events/stream", get(stream_events))
        .layer(middleware)
        .with_state(state)
}

/// Unwrap the query string, turning extractor failures into a JSON 400.
fn query_params(
    params: Result<Query<EventsQueryParams>, QueryRejection>,
) -> ApiResult<EventsQueryParams> {
    params
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// `GET /events`: retained events for a subject, oldest first.
async fn list_events(
    State(state): State<GatewayState>,
    params: Result<Query<EventsQueryParams>, QueryRejection>,
) -> ApiResult<Json<Vec<BusEvent>>> {
    let query = query_params(params)?.validate(&state.config.limits)?;
    let events = state.history.query(&query.subject, query.since.as_deref());

    state.metrics.record_point_query();
    debug!(entity_ref = %query.subject, since = ?query.since, count = events.len(), "Point query");

    Ok(Json(events))
}

/// `GET /events/stream`: backlog, then live events, as server-sent events.
async fn stream_events(
    State(state): State<GatewayState>,
    params: Result<Query<EventsQueryParams>, QueryRejection>,
) -> ApiResult<Response> {
    let query = query_params(params)?.validate(&state.config.limits)?;
    open_stream(&state, query)
}

/// Metrics endpoint
async fn metrics(State(state): State<GatewayState>) -> impl IntoResponse {
    let mut body = state.metrics.to_json();
    body["bus"] = serde_json::json!({
        "handlers": state.bus.handler_count(),
        "handler_failures": state.bus.handler_failures(),
    });
    body["streams"] = serde_json::json!({
        "open": state.sessions.len(),
        "by_subject": state.sessions.subject_counts(),
    });
    body["history"] = serde_json::json!({
        "len": state.history.len(),
        "capacity": state.history.capacity(),
        "evicted": state.history.evicted(),
    });
    Json(body)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "event-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
