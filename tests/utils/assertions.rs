//! Test assertion helpers - fluent API for verifying test expectations
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;
use std::time::Duration;

use super::setup::{wait_until, TestClient};

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct MessageAssertion<'a> {
    clients: Vec<&'a TestClient>,
}

impl<'a> MessageAssertion<'a> {
    pub fn for_clients(clients: Vec<&'a TestClient>) -> Self {
        Self { clients }
    }

    /// Waits until every client has received exactly `count` messages and
    /// returns the last one each received
    pub async fn received_count(self, count: usize) -> Vec<Value> {
        let mut last = Vec::new();
        for client in &self.clients {
            wait_until(|| async move { client.peer.sent_messages().await.len() >= count }).await;
            let messages = client.peer.sent_messages().await;
            assert_eq!(
                messages.len(),
                count,
                "{} received an unexpected number of messages: {:?}",
                client.identity,
                messages
            );
            last.push(parse(&messages[count - 1]));
        }
        last
    }

    /// Asserts the newest message of every client is a `room_state` for `url`
    pub async fn received_room_state(self, count: usize, url: &str) -> Vec<Value> {
        let messages = self.received_count(count).await;
        for message in &messages {
            assert_eq!(message["type"], "room_state", "unexpected message {message}");
            assert_eq!(message["state"]["url"], url);
        }
        messages
    }

    /// Asserts no client receives anything within a short grace period
    pub async fn received_nothing_new(self, already: usize) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        for client in &self.clients {
            let messages = client.peer.sent_messages().await;
            assert_eq!(
                messages.len(),
                already,
                "{} should not have received anything new: {:?}",
                client.identity,
                messages
            );
        }
    }
}

pub fn parse(raw: &str) -> Value {
    serde_json::from_str(raw).expect("server frames are JSON")
}

pub fn host_update(url: &str, current_time: f64, paused: bool) -> String {
    serde_json::json!({
        "type": "host_update",
        "state": {
            "url": url,
            "currentTime": current_time,
            "paused": paused,
        }
    })
    .to_string()
}
