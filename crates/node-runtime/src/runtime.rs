//! Process wiring: one bus, one history, one gateway, one optional ticker.

use crate::config::NodeConfig;
use crate::ticker::DemoTicker;
use event_gateway::{EventGatewayService, GatewayError};
use shared_bus::{EventBus, HistoryStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The running node. Owns every shared instance and injects them.
pub struct NodeRuntime {
    config: NodeConfig,
    bus: EventBus,
    history: Arc<HistoryStore>,
    gateway: EventGatewayService,
    ticker: DemoTicker,
    shutdown: CancellationToken,
}

impl NodeRuntime {
    /// Construct the bus, attach history, and build the gateway over both.
    pub fn new(config: NodeConfig) -> Result<Self, GatewayError> {
        info!("Creating event distribution runtime");

        let shutdown = CancellationToken::new();
        let bus = EventBus::new();
        let history = Arc::new(HistoryStore::attach(&bus, config.history_capacity));
        let gateway = EventGatewayService::new(
            config.gateway.clone(),
            bus.clone(),
            Arc::clone(&history),
            shutdown.child_token(),
        )?;
        let ticker = DemoTicker::new(
            Arc::new(bus.clone()),
            config.demo_ticker.entity_ref.clone(),
            config.demo_ticker.interval,
        );

        Ok(Self {
            config,
            bus,
            history,
            gateway,
            ticker,
            shutdown,
        })
    }

    /// Bind the configured HTTP address.
    pub async fn bind(&self) -> Result<TcpListener, GatewayError> {
        self.gateway.bind().await
    }

    /// Start the ticker (if enabled) and serve until [`shutdown`](Self::shutdown).
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        if self.config.demo_ticker.enabled {
            self.ticker.start(&self.shutdown);
        }
        let result = self.gateway.serve(listener).await;
        if let Err(e) = &result {
            warn!(error = %e, "Gateway exited with error");
        }
        self.ticker.stop();
        result
    }

    /// Stop the ticker, end every stream session, then stop the listener.
    pub fn shutdown(&self) {
        info!(
            sessions = self.gateway.state().sessions.len(),
            "Initiating graceful shutdown"
        );
        self.ticker.stop();
        self.shutdown.cancel();
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn gateway(&self) -> &EventGatewayService {
        &self.gateway
    }

    pub fn ticker(&self) -> &DemoTicker {
        &self.ticker
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.config.gateway.http_addr()
    }
}
