//! # Subscriber Flows
//!
//! `ReconnectingSubscriber` against a running node, and against stub servers
//! that end every stream early or do not stream at all.

#[cfg(test)]
mod tests {
    use crate::harness::{event_at, within, TestNode, SITE, SITE_SLASHED};
    use axum::extract::{Query, State};
    use axum::http::{header, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use event_client::{
        ClientError, ReconnectingSubscriber, SubscriberConfig, SubscriberStatus, SubscriptionHandle,
    };
    use parking_lot::Mutex;
    use shared_bus::{EventBus, HistoryStore};
    use shared_types::BusEvent;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Inbox {
        events: Mutex<Vec<String>>,
        errors: Mutex<Vec<ClientError>>,
    }

    impl Inbox {
        fn ids(&self) -> Vec<String> {
            self.events.lock().clone()
        }

        async fn wait_for(&self, count: usize) {
            within(async {
                while self.events.lock().len() < count {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await;
        }
    }

    fn fast_config(base_url: String) -> SubscriberConfig {
        SubscriberConfig {
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
            poll_interval: Duration::from_millis(50),
            ..SubscriberConfig::for_url(base_url)
        }
    }

    fn subscribe(
        config: SubscriberConfig,
        entity_ref: &str,
        cursor: Option<String>,
    ) -> (SubscriptionHandle, Arc<Inbox>) {
        let subscriber = ReconnectingSubscriber::new(config).unwrap();
        let inbox = Arc::new(Inbox::default());
        let (events, errors) = (Arc::clone(&inbox), Arc::clone(&inbox));
        let handle = subscriber.subscribe(
            entity_ref,
            cursor,
            move |e: &BusEvent| events.events.lock().push(e.id.clone()),
            move |err: &ClientError| errors.errors.lock().push(err.clone()),
        );
        (handle, inbox)
    }

    // =========================================================================
    // Against a running node
    // =========================================================================

    #[tokio::test]
    async fn test_alternate_shape_subscriber_receives_event_once() {
        let node = TestNode::start().await;
        node.publish(event_at("e1", 1, SITE));

        let (handle, inbox) = subscribe(fast_config(node.base_url()), SITE_SLASHED, None);
        inbox.wait_for(1).await;
        node.wait_for_sessions(1).await;

        node.publish(event_at("e2", 2, SITE));
        inbox.wait_for(2).await;

        // Give any stray duplicate a chance to arrive.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(inbox.ids(), vec!["e1", "e2"]);
        assert_eq!(handle.status(), SubscriberStatus::Live);
        assert_eq!(handle.cursor().as_deref(), Some("2024-01-01T00:00:02Z"));
    }

    #[tokio::test]
    async fn test_refresh_after_live_delivers_nothing_new() {
        let node = TestNode::start().await;
        let (handle, inbox) = subscribe(fast_config(node.base_url()), SITE, None);
        node.wait_for_sessions(1).await;

        node.publish(event_at("e1", 1, SITE));
        inbox.wait_for(1).await;

        assert_eq!(handle.refresh().await.unwrap(), 0);
        assert_eq!(inbox.ids(), vec!["e1"]);
    }

    #[tokio::test]
    async fn test_blank_subject_is_fatal() {
        let node = TestNode::start().await;
        let (handle, inbox) = subscribe(fast_config(node.base_url()), "   ", None);

        let mut status = handle.status_watch();
        within(status.wait_for(|s| *s == SubscriberStatus::Closed))
            .await
            .unwrap();
        let errors = inbox.errors.lock().clone();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ClientError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_server_session() {
        let node = TestNode::start_with(|config| {
            config.gateway.stream.heartbeat_interval = Duration::from_millis(20);
        })
        .await;
        let (handle, inbox) = subscribe(fast_config(node.base_url()), SITE, None);
        node.wait_for_sessions(1).await;

        handle.unsubscribe();
        node.wait_for_sessions(0).await;

        node.publish(event_at("late", 5, SITE));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(inbox.ids().is_empty());
    }

    // =========================================================================
    // Against stub servers
    // =========================================================================

    struct Stub {
        bus: EventBus,
        history: HistoryStore,
        stream_cursors: Mutex<Vec<Option<String>>>,
        poll_cursors: Mutex<Vec<Option<String>>>,
    }

    impl Stub {
        fn new() -> Arc<Self> {
            let bus = EventBus::new();
            let history = HistoryStore::new(&bus);
            Arc::new(Self {
                bus,
                history,
                stream_cursors: Mutex::new(Vec::new()),
                poll_cursors: Mutex::new(Vec::new()),
            })
        }

        fn query(&self, params: &HashMap<String, String>) -> Vec<BusEvent> {
            let subject = params.get("entityRef").map(String::as_str).unwrap_or_default();
            self.history.query(subject, params.get("since").map(String::as_str))
        }
    }

    /// Serves the backlog as a finite stream, then hangs up.
    async fn finite_stream(
        State(stub): State<Arc<Stub>>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Response {
        stub.stream_cursors.lock().push(params.get("since").cloned());
        let body: String = stub
            .query(&params)
            .iter()
            .map(|e| format!("data: {}\n\n", serde_json::to_string(e).unwrap_or_default()))
            .collect();
        ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
    }

    async fn no_stream() -> Response {
        (StatusCode::NOT_FOUND, "streams are not served here").into_response()
    }

    async fn point_query(
        State(stub): State<Arc<Stub>>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Vec<BusEvent>> {
        stub.poll_cursors.lock().push(params.get("since").cloned());
        Json(stub.query(&params))
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_reconnect_resumes_without_duplicates() {
        let stub = Stub::new();
        stub.bus.publish(event_at("e1", 1, SITE));
        stub.bus.publish(event_at("e2", 2, SITE));

        let base_url = serve(
            Router::new()
                .route("/events/stream", get(finite_stream))
                .with_state(Arc::clone(&stub)),
        )
        .await;
        let (_handle, inbox) = subscribe(fast_config(base_url), SITE, None);
        inbox.wait_for(2).await;

        // Each reconnect replays e2 (inclusive cursor); it must not reach the callback.
        within(async {
            while stub.stream_cursors.lock().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        stub.bus.publish(event_at("e3", 3, SITE));
        inbox.wait_for(3).await;

        assert_eq!(inbox.ids(), vec!["e1", "e2", "e3"]);
        let cursors = stub.stream_cursors.lock().clone();
        assert_eq!(cursors[0], None);
        assert_eq!(cursors[1].as_deref(), Some("2024-01-01T00:00:02Z"));
        assert!(inbox
            .errors
            .lock()
            .iter()
            .all(|e| *e == ClientError::StreamEnded));
    }

    #[tokio::test]
    async fn test_falls_back_to_polling_when_not_streaming() {
        let stub = Stub::new();
        stub.bus.publish(event_at("e1", 1, SITE));

        let base_url = serve(
            Router::new()
                .route("/events/stream", get(no_stream))
                .route("/events", get(point_query))
                .with_state(Arc::clone(&stub)),
        )
        .await;
        let (handle, inbox) = subscribe(fast_config(base_url), SITE_SLASHED, None);
        inbox.wait_for(1).await;
        assert_eq!(handle.status(), SubscriberStatus::Polling);

        stub.bus.publish(event_at("e2", 2, SITE));
        inbox.wait_for(2).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(inbox.ids(), vec!["e1", "e2"]);
        let polls = stub.poll_cursors.lock().clone();
        assert_eq!(polls[0], None);
        assert!(polls.len() >= 3);
        assert_eq!(polls.last().cloned().flatten().as_deref(), Some("2024-01-01T00:00:02Z"));
    }
}
