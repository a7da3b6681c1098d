//! Boolean send/receive shims
//!
//! Flattened entry points for callers that only care whether the operation
//! worked. Any error becomes `false`; the cause is logged and dropped.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::consumer::{consume, HandlerError};
use crate::delivery::Delivery;
use crate::message::{
    ConsumeRequest, DeclareOptions, ExchangeKind, MessageEnvelope, MessageProperties, Payload,
};
use crate::MessagingService;

/// Publish one message. `None` properties means `text/plain`, persistent.
pub async fn mq_send(
    service: &dyn MessagingService,
    data: impl Into<Payload>,
    exchange: &str,
    routing_key: &str,
    kind: ExchangeKind,
    properties: Option<MessageProperties>,
    options: DeclareOptions,
) -> bool {
    let mut envelope =
        MessageEnvelope::new(exchange, routing_key, kind, data).with_options(options);
    envelope.properties = properties;

    match service.publish(envelope).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(exchange, routing_key, error = %e, "mq_send failed");
            false
        }
    }
}

/// Consume until cancelled. `true` when the loop stopped cleanly.
#[allow(clippy::too_many_arguments)]
pub async fn mq_receive<F, Fut>(
    service: &dyn MessagingService,
    exchange: &str,
    queue: &str,
    routing_key: &str,
    kind: ExchangeKind,
    options: DeclareOptions,
    cancel: CancellationToken,
    handler: F,
) -> bool
where
    F: FnMut(Delivery) -> Fut,
    Fut: Future<Output = Result<(), HandlerError>>,
{
    let request = ConsumeRequest::new(exchange, queue, routing_key, kind).with_options(options);

    match consume(service, request, cancel, handler).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(exchange, queue, error = %e, "mq_receive failed");
            false
        }
    }
}
