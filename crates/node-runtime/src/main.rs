//! # Event Distribution Node
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`EVT_*` / `RUST_LOG`)
//! 2. Load configuration (`EVT_CONFIG_FILE`, then env overrides)
//! 3. Construct bus, history and gateway
//! 4. Bind, start the demo ticker if enabled, serve
//! 5. On Ctrl+C: stop the ticker, end stream sessions, stop the listener

use std::sync::Arc;

use anyhow::{Context, Result};
use event_telemetry::{init_logging, TelemetryConfig};
use node_runtime::{NodeConfig, NodeRuntime};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_logging(&TelemetryConfig::from_env())
        .context("failed to initialize logging")?;

    let config = NodeConfig::load().context("failed to load configuration")?;
    let runtime = Arc::new(NodeRuntime::new(config).context("failed to build runtime")?);

    let listener = runtime
        .bind()
        .await
        .with_context(|| format!("failed to bind {}", runtime.http_addr()))?;

    let mut server = {
        let runtime = Arc::clone(&runtime);
        tokio::spawn(async move { runtime.serve(listener).await })
    };

    info!("Node is running. Press Ctrl+C to stop.");
    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            runtime.shutdown();
            None
        }
        finished = &mut server => Some(finished),
    };
    let outcome = match finished {
        Some(outcome) => outcome,
        None => server.await,
    };

    match outcome {
        Ok(Ok(())) => {
            info!("Shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "Gateway failed");
            Err(e).context("gateway failed")
        }
        Err(e) => Err(e).context("gateway task panicked"),
    }
}
