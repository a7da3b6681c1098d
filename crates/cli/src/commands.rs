//! `mq:publish` and `mq:consume`

use anyhow::Context;
use mucts_mq::{
    consume, ConsumeOutcome, ConsumeRequest, DeclareOptions, DeliveryMode, HandlerError,
    MessageEnvelope, MessageProperties, MessagingService, Payload,
};
use tokio_util::sync::CancellationToken;

use crate::args::{ConsumeArgs, PublishArgs};

fn declare_options(durable: bool) -> DeclareOptions {
    if durable {
        DeclareOptions::durable()
    } else {
        DeclareOptions::default()
    }
}

pub async fn publish(service: &dyn MessagingService, args: &PublishArgs) -> anyhow::Result<()> {
    let mut envelope = if args.json {
        let value: serde_json::Value =
            serde_json::from_str(&args.payload).context("Payload is not valid JSON")?;
        MessageEnvelope::new(&args.exchange, &args.routing_key, args.kind, Payload::Json(value))
            .with_properties(
                MessageProperties::new()
                    .with_content_type("application/json")
                    .with_delivery_mode(DeliveryMode::Persistent),
            )
    } else {
        MessageEnvelope::new(&args.exchange, &args.routing_key, args.kind, args.payload.as_str())
    };
    envelope.options = declare_options(args.durable);

    service
        .publish(envelope)
        .await
        .with_context(|| format!("Failed to publish to exchange '{}'", args.exchange))?;

    tracing::info!(
        exchange = %args.exchange,
        routing_key = %args.routing_key,
        kind = %args.kind,
        "Message published"
    );
    Ok(())
}

/// Log and ack every delivery until `cancel` fires or the broker stops the consumer
pub async fn consume_and_ack(
    service: &dyn MessagingService,
    args: &ConsumeArgs,
    cancel: CancellationToken,
) -> anyhow::Result<ConsumeOutcome> {
    let request = ConsumeRequest::new(&args.exchange, &args.queue, &args.routing_key, args.kind)
        .with_options(declare_options(args.durable));

    let outcome = consume(service, request, cancel, |delivery| async move {
        tracing::info!(
            delivery_tag = delivery.delivery_tag,
            routing_key = %delivery.routing_key,
            redelivered = delivery.redelivered,
            body = %String::from_utf8_lossy(&delivery.data),
            "Message received"
        );
        delivery.ack().await?;
        Ok::<(), HandlerError>(())
    })
    .await
    .with_context(|| format!("Consumer on queue '{}' failed", args.queue))?;

    Ok(outcome)
}
