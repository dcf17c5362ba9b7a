//! # Streaming Flows
//!
//! Raw `GET /events/stream` frames from a running node:
//!
//! 1. Backlog strictly before live events
//! 2. Subject matching across shapes, one delivery per event
//! 3. Heartbeats, headers, rejection and shutdown

#[cfg(test)]
mod tests {
    use crate::harness::{event_at, within, FrameReader, TestNode, SITE, SITE_SLASHED};
    use std::time::Duration;

    #[tokio::test]
    async fn test_backlog_then_live_never_reversed() {
        let node = TestNode::start().await;
        node.publish(event_at("e1", 1, SITE));

        let response = node.open_stream(SITE, None).await;
        node.wait_for_sessions(1).await;
        node.publish(event_at("e2", 2, SITE));

        let mut frames = FrameReader::new(response);
        let first = within(frames.next_event()).await.unwrap();
        let second = within(frames.next_event()).await.unwrap();
        assert_eq!((first.id.as_str(), second.id.as_str()), ("e1", "e2"));
    }

    #[tokio::test]
    async fn test_alternate_shape_receives_event_once() {
        let node = TestNode::start().await;
        let response = node.open_stream(SITE_SLASHED, None).await;
        node.wait_for_sessions(1).await;

        node.publish(event_at("e1", 1, SITE));
        node.publish(event_at("noise", 2, "component:default/other"));
        node.publish(event_at("e2", 3, SITE_SLASHED));

        let mut frames = FrameReader::new(response);
        let first = within(frames.next_event()).await.unwrap();
        let second = within(frames.next_event()).await.unwrap();
        assert_eq!(first.id, "e1");
        assert_eq!(second.id, "e2");
    }

    #[tokio::test]
    async fn test_since_limits_backlog() {
        let node = TestNode::start().await;
        for (id, second) in [("e1", 1), ("e2", 2), ("e3", 3)] {
            node.publish(event_at(id, second, SITE));
        }
        let response = node.open_stream(SITE, Some("2024-01-01T00:00:02Z")).await;
        let mut frames = FrameReader::new(response);
        assert_eq!(within(frames.next_event()).await.unwrap().id, "e2");
        assert_eq!(within(frames.next_event()).await.unwrap().id, "e3");
    }

    #[tokio::test]
    async fn test_stream_headers() {
        let node = TestNode::start().await;
        let response = node.open_stream(SITE, None).await;
        assert_eq!(response.status(), 200);
        let headers = response.headers();
        assert!(headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        assert_eq!(headers["cache-control"], "no-cache, no-transform");
        assert_eq!(headers["x-accel-buffering"], "no");
    }

    #[tokio::test]
    async fn test_heartbeat_frames() {
        let node = TestNode::start_with(|config| {
            config.gateway.stream.heartbeat_interval = Duration::from_millis(50);
        })
        .await;
        let mut frames = FrameReader::new(node.open_stream(SITE, None).await);
        assert_eq!(within(frames.next_frame()).await.unwrap(), ": ping");
        assert_eq!(within(frames.next_frame()).await.unwrap(), ": ping");
    }

    #[tokio::test]
    async fn test_missing_subject_rejected_before_streaming() {
        let node = TestNode::start().await;
        let response = reqwest::get(format!("{}/events/stream", node.base_url()))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
        assert_eq!(node.runtime.gateway().state().sessions.len(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_releases_session() {
        let node = TestNode::start_with(|config| {
            config.gateway.stream.heartbeat_interval = Duration::from_millis(20);
        })
        .await;
        let handlers_before = node.runtime.bus().handler_count();

        let response = node.open_stream(SITE, None).await;
        node.wait_for_sessions(1).await;
        assert_eq!(node.runtime.bus().handler_count(), handlers_before + 1);

        drop(response);
        node.wait_for_sessions(0).await;
        assert_eq!(node.runtime.bus().handler_count(), handlers_before);
    }

    #[tokio::test]
    async fn test_shutdown_ends_open_streams() {
        let node = TestNode::start().await;
        let mut frames = FrameReader::new(node.open_stream(SITE, None).await);
        node.wait_for_sessions(1).await;

        node.runtime.shutdown();
        assert_eq!(within(frames.next_frame()).await, None);
    }
}
