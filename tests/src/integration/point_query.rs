//! # Point Query Flows
//!
//! `GET /events` against a running node: subject normalization, the
//! inclusive cursor, malformed cursors and the history bound.

#[cfg(test)]
mod tests {
    use crate::harness::{event_at, TestNode, SITE, SITE_SLASHED};
    use event_client::{ClientError, EventTransport, EventsClient, SubscriberConfig};
    use shared_types::BusEvent;

    async fn get(node: &TestNode, query: &str) -> (u16, serde_json::Value) {
        let response = reqwest::get(format!("{}/events?{query}", node.base_url()))
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    fn ids(body: &serde_json::Value) -> Vec<String> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_either_shape_finds_the_same_events() {
        let node = TestNode::start().await;
        node.publish(event_at("e1", 1, SITE_SLASHED));
        node.publish(event_at("e2", 2, SITE));
        node.publish(event_at("other", 3, "component:default/other"));

        let (status, canonical) = get(&node, &format!("entityRef={SITE}")).await;
        assert_eq!(status, 200);
        assert_eq!(ids(&canonical), vec!["e1", "e2"]);

        let (_, slashed) = get(&node, &format!("entityRef={SITE_SLASHED}")).await;
        assert_eq!(ids(&slashed), vec!["e1", "e2"]);
    }

    #[tokio::test]
    async fn test_since_is_inclusive_and_malformed_since_is_ignored() {
        let node = TestNode::start().await;
        for (id, second) in [("e1", 1), ("e2", 2), ("e3", 3)] {
            node.publish(event_at(id, second, SITE));
        }

        let (_, body) = get(&node, &format!("entityRef={SITE}&since=2024-01-01T00:00:02Z")).await;
        assert_eq!(ids(&body), vec!["e2", "e3"]);

        for junk in ["undefined", "null", "", "yesterday"] {
            let (status, body) = get(&node, &format!("entityRef={SITE}&since={junk}")).await;
            assert_eq!(status, 200, "since={junk:?}");
            assert_eq!(ids(&body).len(), 3, "since={junk:?}");
        }
    }

    #[tokio::test]
    async fn test_missing_subject_is_rejected() {
        let node = TestNode::start().await;
        let (status, body) = get(&node, "since=2024-01-01T00:00:00Z").await;
        assert_eq!(status, 400);
        assert!(body["error"].is_string());

        let (status, _) = get(&node, "entityRef=%20%20").await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_history_keeps_only_the_newest() {
        let node = TestNode::start_with(|config| config.history_capacity = 3).await;
        for second in 0..5 {
            node.publish(event_at(&format!("e{second}"), second, SITE));
        }
        let (_, body) = get(&node, &format!("entityRef={SITE}")).await;
        assert_eq!(ids(&body), vec!["e2", "e3", "e4"]);
    }

    #[tokio::test]
    async fn test_events_client_fetch() {
        let node = TestNode::start().await;
        node.publish(event_at("e1", 1, SITE));
        node.publish(event_at("e2", 2, SITE));

        let client = EventsClient::new(&SubscriberConfig::for_url(node.base_url())).unwrap();
        let events: Vec<BusEvent> = client
            .fetch(SITE_SLASHED, Some("2024-01-01T00:00:02Z"))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "e2");

        let err = client.fetch(" ", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected { status: 400, .. }), "{err:?}");
    }
}
