//! Consumed messages and the subscription stream that yields them

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream};
use serde::de::DeserializeOwned;

use crate::message::MessageProperties;
use crate::MessagingError;

/// Settles one delivery with the broker
#[async_trait::async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), MessagingError>;

    async fn nack(&self, requeue: bool) -> Result<(), MessagingError>;

    async fn reject(&self, requeue: bool) -> Result<(), MessagingError>;
}

/// A message handed to a consumer.
///
/// Acknowledgement is manual: the consumer settles each delivery with
/// [`Delivery::ack`], [`Delivery::nack`] or [`Delivery::reject`].
pub struct Delivery {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
    pub properties: MessageProperties,
    pub data: Vec<u8>,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        delivery_tag: u64,
        exchange: String,
        routing_key: String,
        redelivered: bool,
        properties: MessageProperties,
        data: Vec<u8>,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            delivery_tag,
            exchange,
            routing_key,
            redelivered,
            properties,
            data,
            acker,
        }
    }

    /// Body as UTF-8 text
    pub fn text(&self) -> Result<&str, MessagingError> {
        std::str::from_utf8(&self.data)
            .map_err(|e| MessagingError::Transport(format!("message body is not UTF-8: {}", e)))
    }

    /// Body decoded as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, MessagingError> {
        Ok(serde_json::from_slice(&self.data)?)
    }

    pub async fn ack(&self) -> Result<(), MessagingError> {
        self.acker.ack().await
    }

    pub async fn nack(&self, requeue: bool) -> Result<(), MessagingError> {
        self.acker.nack(requeue).await
    }

    pub async fn reject(&self, requeue: bool) -> Result<(), MessagingError> {
        self.acker.reject(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("delivery_tag", &self.delivery_tag)
            .field("exchange", &self.exchange)
            .field("routing_key", &self.routing_key)
            .field("redelivered", &self.redelivered)
            .field("properties", &self.properties)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Stream of deliveries from one registered consumer.
///
/// Yields one delivery at a time. An `Err` item means the connection or
/// channel is gone; the stream ends after it. Call [`Subscription::close`]
/// to release the channel and connection.
pub struct Subscription {
    consumer_tag: String,
    deliveries: BoxStream<'static, Result<Delivery, MessagingError>>,
    on_close: Option<BoxFuture<'static, ()>>,
}

impl Subscription {
    pub fn new(
        consumer_tag: impl Into<String>,
        deliveries: BoxStream<'static, Result<Delivery, MessagingError>>,
        on_close: BoxFuture<'static, ()>,
    ) -> Self {
        Self {
            consumer_tag: consumer_tag.into(),
            deliveries,
            on_close: Some(on_close),
        }
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// Stop consuming and release broker resources
    pub async fn close(mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close.await;
        }
    }
}

impl Stream for Subscription {
    type Item = Result<Delivery, MessagingError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.deliveries.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("consumer_tag", &self.consumer_tag)
            .finish()
    }
}
