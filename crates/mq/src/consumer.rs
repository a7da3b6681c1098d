//! Consume loop
//!
//! Drives a [`Subscription`] and hands each delivery to a handler, one at a
//! time, until cancelled or until the broker stops the consumer. A failed
//! handler or a lost connection ends the loop with an error; there is no
//! reconnect.

use std::future::Future;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::delivery::Delivery;
use crate::message::ConsumeRequest;
use crate::{MessagingError, MessagingService};

/// Error a handler may return; it ends the loop
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Why a consume loop stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The cancellation token fired
    Cancelled,
    /// The broker ended the consumer
    ConsumerClosed,
}

/// Subscribe and dispatch deliveries to `handler` until cancelled.
///
/// The handler owns acknowledgement. Cancellation is checked between
/// deliveries, so a handler that has started always runs to completion.
pub async fn consume<S, F, Fut>(
    service: &S,
    request: ConsumeRequest,
    cancel: CancellationToken,
    mut handler: F,
) -> Result<ConsumeOutcome, MessagingError>
where
    S: MessagingService + ?Sized,
    F: FnMut(Delivery) -> Fut,
    Fut: Future<Output = Result<(), HandlerError>>,
{
    let exchange = request.exchange.clone();
    let queue = request.queue.clone();
    let mut subscription = service.subscribe(request).await?;

    tracing::info!(
        exchange = %exchange,
        queue = %queue,
        consumer_tag = %subscription.consumer_tag(),
        "Consumer started"
    );

    let outcome = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(ConsumeOutcome::Cancelled),
            next = subscription.next() => match next {
                Some(Ok(delivery)) => {
                    let delivery_tag = delivery.delivery_tag;
                    if let Err(e) = handler(delivery).await {
                        tracing::warn!(
                            delivery_tag,
                            error = %e,
                            "Message handler failed"
                        );
                        break Err(MessagingError::Handler(e.to_string()));
                    }
                }
                Some(Err(e)) => break Err(e),
                None => break Ok(ConsumeOutcome::ConsumerClosed),
            },
        }
    };

    match &outcome {
        Ok(reason) => tracing::info!(?reason, queue = %queue, "Consumer stopped"),
        Err(e) => tracing::error!(error = %e, queue = %queue, "Consumer stopped on error"),
    }

    subscription.close().await;
    outcome
}
