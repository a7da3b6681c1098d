//! Shared helpers for integration tests

use std::time::Duration;

use axum::response::Response;
use mucts_mq::mock::MockBroker;
use serde_json::Value;

/// Collect a response body and parse it as JSON
pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Block until `queue` has at least one registered consumer
pub async fn wait_for_consumer(broker: &MockBroker, queue: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while broker.consumer_count(queue) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("consumer never registered");
}

/// Block until the broker has recorded `count` settlements
pub async fn wait_for_acks(broker: &MockBroker, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while broker.acks().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("deliveries were never settled");
}
