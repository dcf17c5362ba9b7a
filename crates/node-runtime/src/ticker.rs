//! Demo ticker: a heartbeat event about one subject at a fixed interval.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shared_bus::{spawn_periodic, EventPublisher};
use shared_types::{format_instant, BusEvent, DEMO_TICK};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The tick event published at `at`.
pub fn demo_tick(entity_ref: &str, at: DateTime<Utc>) -> BusEvent {
    let ms = at.timestamp_millis();
    BusEvent::new(format!("tick-{ms}"), format_instant(at), DEMO_TICK, entity_ref)
        .with_field("seq", ms)
        .with_field("note", "heartbeat")
}

struct Running {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Publishes [`demo_tick`] events until stopped.
pub struct DemoTicker {
    publisher: Arc<dyn EventPublisher>,
    entity_ref: String,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl DemoTicker {
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        entity_ref: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            publisher,
            entity_ref: entity_ref.into(),
            interval,
            running: Mutex::new(None),
        }
    }

    /// Start ticking under `parent`. Returns `false` if already running.
    pub fn start(&self, parent: &CancellationToken) -> bool {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.token.is_cancelled()) {
            debug!("Demo ticker already running");
            return false;
        }

        let token = parent.child_token();
        let publisher = Arc::clone(&self.publisher);
        let entity_ref = self.entity_ref.clone();
        let task = spawn_periodic(self.interval, token.clone(), move || {
            publisher.publish(demo_tick(&entity_ref, Utc::now()));
        });

        info!(
            entity_ref = %self.entity_ref,
            interval_secs = self.interval.as_secs(),
            "Demo ticker started"
        );
        *running = Some(Running { token, task });
        true
    }

    /// Stop ticking. A later [`start`](Self::start) begins again.
    pub fn stop(&self) {
        if let Some(running) = self.running.lock().take() {
            running.token.cancel();
            running.task.abort();
            info!("Demo ticker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.token.is_cancelled())
    }
}

impl Drop for DemoTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
