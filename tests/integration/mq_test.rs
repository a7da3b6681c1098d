//! Publish/consume flows against the in-memory broker

#![allow(dead_code)]

mod common;

use std::sync::{Arc, Mutex};

use mucts_mq::mock::{AckKind, MockBroker};
use mucts_mq::{
    consume, mq_receive, mq_send, ConsumeOutcome, ConsumeRequest, DeclareOptions, ExchangeKind,
    HandlerError, MessageEnvelope, MessagingConfig, MessagingService, MessagingServiceFactory,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::common::{wait_for_acks, wait_for_consumer};

#[tokio::test]
async fn test_topic_consumer_sees_matching_messages_in_order() {
    let broker = MockBroker::new();
    let cancel = CancellationToken::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let consumer = {
        let broker = broker.clone();
        let cancel = cancel.clone();
        let seen = Arc::clone(&seen);
        tokio::spawn(async move {
            let request = ConsumeRequest::new("events", "audit", "order.#", ExchangeKind::Topic);
            consume(&broker, request, cancel, move |delivery| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().unwrap().push(delivery.routing_key.clone());
                    delivery.ack().await?;
                    Ok::<(), HandlerError>(())
                }
            })
            .await
        })
    };

    wait_for_consumer(&broker, "audit").await;
    for key in ["order.created", "user.created", "order.paid.card", "order"] {
        broker
            .publish(MessageEnvelope::new("events", key, ExchangeKind::Topic, key))
            .await
            .unwrap();
    }

    wait_for_acks(&broker, 3).await;
    cancel.cancel();

    assert_eq!(consumer.await.unwrap().unwrap(), ConsumeOutcome::Cancelled);
    assert_eq!(
        *seen.lock().unwrap(),
        ["order.created", "order.paid.card", "order"]
    );
}

#[tokio::test]
async fn test_fanout_copies_to_every_queue() {
    let broker = MockBroker::new();
    for queue in ["email", "sms"] {
        broker
            .subscribe(ConsumeRequest::new("alerts", queue, "", ExchangeKind::Fanout))
            .await
            .unwrap();
    }

    assert!(
        mq_send(
            &broker,
            json!({ "level": "high" }),
            "alerts",
            "ignored",
            ExchangeKind::Fanout,
            None,
            DeclareOptions::default(),
        )
        .await
    );

    assert_eq!(broker.queue_depth("email") + broker.unacked_count("email"), 1);
    assert_eq!(broker.queue_depth("sms") + broker.unacked_count("sms"), 1);
}

#[tokio::test]
async fn test_mq_send_reports_failure_as_false() {
    let broker = MockBroker::new();
    broker.set_fail_connections(true);

    let sent = mq_send(
        &broker,
        "hello",
        "events",
        "order.created",
        ExchangeKind::Topic,
        None,
        DeclareOptions::default(),
    )
    .await;
    assert!(!sent);
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn test_mq_receive_nack_requeues_for_redelivery() {
    let broker = MockBroker::new();
    let cancel = CancellationToken::new();
    let redelivered = Arc::new(Mutex::new(Vec::new()));

    let receiver = {
        let broker = broker.clone();
        let cancel = cancel.clone();
        let redelivered = Arc::clone(&redelivered);
        tokio::spawn(async move {
            mq_receive(
                &broker,
                "",
                "tasks",
                "",
                ExchangeKind::Default,
                DeclareOptions::durable(),
                cancel,
                move |delivery| {
                    let redelivered = Arc::clone(&redelivered);
                    async move {
                        redelivered.lock().unwrap().push(delivery.redelivered);
                        if delivery.redelivered {
                            delivery.ack().await?;
                        } else {
                            delivery.nack(true).await?;
                        }
                        Ok::<(), HandlerError>(())
                    }
                },
            )
            .await
        })
    };

    wait_for_consumer(&broker, "tasks").await;
    assert!(
        mq_send(
            &broker,
            "resize image 42",
            "",
            "tasks",
            ExchangeKind::Default,
            None,
            DeclareOptions::default(),
        )
        .await
    );

    wait_for_acks(&broker, 2).await;
    cancel.cancel();
    assert!(receiver.await.unwrap());

    assert_eq!(*redelivered.lock().unwrap(), [false, true]);
    let kinds: Vec<AckKind> = broker.acks().into_iter().map(|a| a.kind).collect();
    assert_eq!(kinds, [AckKind::Nack { requeue: true }, AckKind::Ack]);
}

#[tokio::test]
async fn test_factory_builds_mock_service() {
    let config = MessagingConfig::default();
    let service = MessagingServiceFactory::create(&config).unwrap();

    service
        .publish(MessageEnvelope::new("", "nowhere", ExchangeKind::Default, "dropped"))
        .await
        .unwrap();

    let unknown = MessagingConfig {
        provider: "kafka".to_string(),
        ..MessagingConfig::default()
    };
    let err = MessagingServiceFactory::create(&unknown).err().unwrap();
    assert!(err.to_string().contains("Unknown messaging provider: kafka"));
}
