//! Test fixtures: a node on an ephemeral port, event builders, SSE readers.

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use node_runtime::{NodeConfig, NodeRuntime};
use shared_types::BusEvent;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Subject in canonical shape.
pub const SITE: &str = "component:default/example-website";
/// Same subject in the `namespace/kind/name` shape.
pub const SITE_SLASHED: &str = "default/component/example-website";

/// An event about `entity_ref` at second `second` of a fixed minute.
pub fn event_at(id: &str, second: u32, entity_ref: &str) -> BusEvent {
    BusEvent::new(
        id,
        format!("2024-01-01T00:00:{second:02}Z"),
        "test.event",
        entity_ref,
    )
}

/// A full node serving on `127.0.0.1:0`.
pub struct TestNode {
    pub runtime: Arc<NodeRuntime>,
    pub addr: SocketAddr,
    server: JoinHandle<()>,
}

impl TestNode {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(tweak: impl FnOnce(&mut NodeConfig)) -> Self {
        let mut config = NodeConfig::default();
        config.gateway.http.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.gateway.http.port = 0;
        tweak(&mut config);

        let runtime = Arc::new(NodeRuntime::new(config).expect("valid test config"));
        let listener = runtime.bind().await.expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let server = {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move {
                let _ = runtime.serve(listener).await;
            })
        };
        Self {
            runtime,
            addr,
            server,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn publish(&self, event: BusEvent) -> usize {
        self.runtime.bus().publish(event)
    }

    /// Open a raw stream request.
    pub async fn open_stream(&self, entity_ref: &str, since: Option<&str>) -> reqwest::Response {
        let mut params = vec![("entityRef", entity_ref)];
        if let Some(since) = since {
            params.push(("since", since));
        }
        reqwest::Client::new()
            .get(format!("{}/events/stream", self.base_url()))
            .query(&params)
            .send()
            .await
            .expect("stream request")
    }

    /// Wait until the gateway reports `count` open sessions.
    pub async fn wait_for_sessions(&self, count: usize) {
        let sessions = Arc::clone(&self.runtime.gateway().state().sessions);
        within(async move {
            while sessions.len() != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.runtime.shutdown();
        self.server.abort();
    }
}

/// Splits an SSE response body into frames.
pub struct FrameReader {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: String,
}

impl FrameReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            body: response.bytes_stream().boxed(),
            buffer: String::new(),
        }
    }

    /// Next raw frame, without its terminating blank line.
    pub async fn next_frame(&mut self) -> Option<String> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let frame = self.buffer[..end].to_string();
                self.buffer.drain(..end + 2);
                return Some(frame);
            }
            let chunk = self.body.next().await?.ok()?;
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }

    /// Next data frame decoded as an event, skipping heartbeats.
    pub async fn next_event(&mut self) -> Option<BusEvent> {
        loop {
            let frame = self.next_frame().await?;
            if let Some(data) = frame.strip_prefix("data: ") {
                return serde_json::from_str(data).ok();
            }
        }
    }
}

/// Fail the test if `fut` takes longer than five seconds.
pub async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::normalize;

    #[test]
    fn test_fixture_shapes_name_the_same_subject() {
        assert_eq!(normalize(SITE_SLASHED), normalize(SITE));
        assert_eq!(normalize(SITE_SLASHED), SITE);
    }
}
