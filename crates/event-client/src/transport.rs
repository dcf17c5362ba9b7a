//! Transports the subscriber reads events through.

use crate::config::SubscriberConfig;
use crate::error::ClientError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use shared_types::BusEvent;
use tracing::debug;

/// Raw body chunks of an open event stream.
pub type ByteStream = BoxStream<'static, Result<Bytes, ClientError>>;

/// Where events come from: a push stream and a point query.
#[async_trait]
pub trait EventTransport: Send + Sync + 'static {
    /// Open the event stream for `entity_ref`, resuming at `since`.
    async fn open_stream(
        &self,
        entity_ref: &str,
        since: Option<&str>,
    ) -> Result<ByteStream, ClientError>;

    /// One-shot query of retained events.
    async fn fetch(&self, entity_ref: &str, since: Option<&str>)
        -> Result<Vec<BusEvent>, ClientError>;
}

/// HTTP client for the gateway's `/events` and `/events/stream` routes.
#[derive(Debug, Clone)]
pub struct EventsClient {
    client: reqwest::Client,
    base_url: String,
}

impl EventsClient {
    pub fn new(config: &SubscriberConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, path: &str, entity_ref: &str, since: Option<&str>) -> reqwest::RequestBuilder {
        let mut params = vec![("entityRef", entity_ref)];
        if let Some(since) = since {
            params.push(("since", since));
        }
        self.client
            .get(format!("{}{path}", self.base_url))
            .query(&params)
    }
}

#[async_trait]
impl EventTransport for EventsClient {
    async fn open_stream(
        &self,
        entity_ref: &str,
        since: Option<&str>,
    ) -> Result<ByteStream, ClientError> {
        debug!(entity_ref, since, "Opening event stream");
        let response = self
            .request("/events/stream", entity_ref, since)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return Err(rejected(response).await);
        }
        if !status.is_success() {
            return Err(ClientError::NotStreaming(format!("status {status}")));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("text/event-stream") {
            return Err(ClientError::NotStreaming(format!(
                "content-type {content_type:?}"
            )));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ClientError::Stream(e.to_string())))
            .boxed())
    }

    async fn fetch(
        &self,
        entity_ref: &str,
        since: Option<&str>,
    ) -> Result<Vec<BusEvent>, ClientError> {
        let response = self
            .request("/events", entity_ref, since)
            .send()
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return Err(rejected(response).await);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<Vec<BusEvent>>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Turn a 400 into `Rejected`, keeping the server's `error` message.
async fn rejected(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);
    ClientError::Rejected { status, message }
}
