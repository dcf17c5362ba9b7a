//! Gateway counters, exposed as JSON at `/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Gateway metrics
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    // Request counters
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub requests_error: AtomicU64,

    // Point queries
    pub point_queries: AtomicU64,

    // Stream sessions
    pub sessions_active: AtomicU64,
    pub sessions_opened: AtomicU64,
    pub sessions_overflowed: AtomicU64,

    // Frames written to stream sessions
    pub backlog_frames_sent: AtomicU64,
    pub live_frames_sent: AtomicU64,
    pub heartbeats_sent: AtomicU64,

    // Latency tracking (request handling only, not stream lifetime)
    pub total_latency_ms: AtomicU64,
    pub request_count_for_latency: AtomicU64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed request
    pub fn record_request(&self, success: bool, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }

        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.request_count_for_latency.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_point_query(&self) {
        self.point_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_open(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_close(&self) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_session_overflow(&self) {
        self.sessions_overflowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backlog_frame(&self) {
        self.backlog_frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_live_frame(&self) {
        self.live_frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heartbeat(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Get average latency in ms
    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.request_count_for_latency.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "requests": {
                "total": self.requests_total.load(Ordering::Relaxed),
                "success": self.requests_success.load(Ordering::Relaxed),
                "error": self.requests_error.load(Ordering::Relaxed),
                "avg_latency_ms": self.average_latency_ms(),
            },
            "point_queries": self.point_queries.load(Ordering::Relaxed),
            "sessions": {
                "active": self.sessions_active.load(Ordering::Relaxed),
                "opened": self.sessions_opened.load(Ordering::Relaxed),
                "overflowed": self.sessions_overflowed.load(Ordering::Relaxed),
            },
            "frames": {
                "backlog": self.backlog_frames_sent.load(Ordering::Relaxed),
                "live": self.live_frames_sent.load(Ordering::Relaxed),
                "heartbeat": self.heartbeats_sent.load(Ordering::Relaxed),
            }
        })
    }
}

/// Measures how long a request took to produce its response head.
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
