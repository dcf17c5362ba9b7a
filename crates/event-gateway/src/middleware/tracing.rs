//! Request tracing middleware.
//!
//! Wraps each request in an `api_request` span and records the outcome in
//! [`GatewayMetrics`]. For stream requests the span covers the handshake
//! only; the session logs its own lifecycle.

use crate::middleware::metrics::{GatewayMetrics, RequestTimer};
use axum::{body::Body, http::Request, response::Response};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, info_span, Instrument, Span};

/// Tracing layer that creates spans for each request
#[derive(Clone)]
pub struct TracingLayer {
    metrics: Arc<GatewayMetrics>,
}

impl TracingLayer {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService {
            inner,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Tracing service
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
    metrics: Arc<GatewayMetrics>,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let metrics = Arc::clone(&self.metrics);

        let span = info_span!(
            "api_request",
            http.method = %req.method(),
            http.target = %req.uri().path(),
            http.status_code = tracing::field::Empty,
            otel.kind = "server",
            otel.status_code = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let timer = RequestTimer::start();
                let result = inner.call(req).await;

                match &result {
                    Ok(response) => {
                        let status = response.status();
                        let success = status.is_success();
                        metrics.record_request(success, timer.elapsed_ms());
                        Span::current().record("http.status_code", status.as_u16());
                        Span::current().record("otel.status_code", if success { "OK" } else { "ERROR" });
                        debug!(status = status.as_u16(), latency_ms = timer.elapsed_ms(), "Request handled");
                    }
                    Err(_) => {
                        metrics.record_request(false, timer.elapsed_ms());
                        Span::current().record("otel.status_code", "ERROR");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
