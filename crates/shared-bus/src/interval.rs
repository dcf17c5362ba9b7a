//! # Cancellable Interval
//!
//! One timer primitive for every periodic job in the system: stream
//! heartbeats, client polling and the demo ticker. A tick resolves to `None`
//! once the token is cancelled, so loops end with `while let Some(_)`.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shortest accepted period; tokio rejects a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Periodic timer bound to a cancellation token.
///
/// The first tick fires one full period after creation. Missed ticks are
/// delayed rather than bursted.
#[derive(Debug)]
pub struct CancellableInterval {
    interval: Interval,
    token: CancellationToken,
}

impl CancellableInterval {
    /// Create an interval cancelled by `token`.
    pub fn new(period: Duration, token: CancellationToken) -> Self {
        let period = period.max(MIN_PERIOD);
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, token }
    }

    /// Wait for the next tick; `None` once cancelled.
    pub async fn tick(&mut self) -> Option<Instant> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            at = self.interval.tick() => Some(at),
        }
    }

    /// Restart the period from now.
    pub fn reset(&mut self) {
        self.interval.reset();
    }

    /// The tick period.
    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Stop the interval; pending and future ticks resolve to `None`.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token driving this interval.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Run `job` on every tick until `token` is cancelled.
pub fn spawn_periodic<F>(period: Duration, token: CancellationToken, mut job: F) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    let mut interval = CancellableInterval::new(period, token);
    tokio::spawn(async move {
        while interval.tick().await.is_some() {
            job();
        }
    })
}
