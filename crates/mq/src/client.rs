//! AMQP Client Implementation
//!
//! Talks AMQP 0-9-1 to RabbitMQ through `lapin`. Every publish opens its own
//! connection and channel and closes both afterwards. A subscription keeps
//! its connection until [`Subscription::close`].

use futures::{FutureExt, StreamExt};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    BasicRejectOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};

use crate::delivery::{Acknowledger, Delivery, Subscription};
use crate::message::{
    check_default_exchange, ConsumeRequest, DeclareOptions, DeliveryMode, ExchangeKind,
    MessageEnvelope, MessageProperties,
};
use crate::{MessagingConfig, MessagingError, MessagingService};

const REPLY_SUCCESS: u16 = 200;

/// Real AMQP client for RabbitMQ
pub struct AmqpClient {
    uri: String,
}

impl AmqpClient {
    /// Create a new AMQP client from configuration. No connection is made yet.
    pub fn new(config: &MessagingConfig) -> Self {
        Self::with_uri(config.amqp_uri())
    }

    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    async fn open(&self) -> Result<(Connection, Channel), MessagingError> {
        let connection = Connection::connect(&self.uri, ConnectionProperties::default())
            .await
            .map_err(|e| MessagingError::Connection(e.to_string()))?;

        match connection.create_channel().await {
            Ok(channel) => Ok((connection, channel)),
            Err(e) => {
                let _ = connection.close(REPLY_SUCCESS, "OK").await;
                Err(MessagingError::Connection(format!(
                    "failed to open channel: {}",
                    e
                )))
            }
        }
    }
}

fn lapin_kind(kind: ExchangeKind) -> lapin::ExchangeKind {
    match kind {
        ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
        ExchangeKind::Headers => lapin::ExchangeKind::Headers,
        ExchangeKind::Direct | ExchangeKind::Default => lapin::ExchangeKind::Direct,
        ExchangeKind::Topic => lapin::ExchangeKind::Topic,
    }
}

async fn declare_exchange(
    channel: &Channel,
    exchange: &str,
    kind: ExchangeKind,
    options: DeclareOptions,
) -> Result<(), MessagingError> {
    check_default_exchange(exchange, kind)?;
    if kind == ExchangeKind::Default {
        return Ok(());
    }

    channel
        .exchange_declare(
            exchange,
            lapin_kind(kind),
            ExchangeDeclareOptions {
                passive: options.passive,
                durable: options.durable,
                auto_delete: options.auto_delete,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| MessagingError::Declaration(format!("exchange '{}': {}", exchange, e)))
}

fn to_lapin_properties(properties: &MessageProperties) -> BasicProperties {
    let mut basic = BasicProperties::default();
    if let Some(content_type) = &properties.content_type {
        basic = basic.with_content_type(ShortString::from(content_type.clone()));
    }
    if let Some(mode) = properties.delivery_mode {
        basic = basic.with_delivery_mode(mode.as_u8());
    }
    if !properties.headers.is_empty() {
        let mut headers = FieldTable::default();
        for (key, value) in &properties.headers {
            headers.insert(
                ShortString::from(key.clone()),
                AMQPValue::LongString(LongString::from(value.clone())),
            );
        }
        basic = basic.with_headers(headers);
    }
    basic
}

fn header_text(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(s) => Some(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        AMQPValue::ShortString(s) => Some(s.as_str().to_string()),
        AMQPValue::Boolean(b) => Some(b.to_string()),
        AMQPValue::LongInt(n) => Some(n.to_string()),
        AMQPValue::LongLongInt(n) => Some(n.to_string()),
        _ => None,
    }
}

fn from_lapin_properties(basic: &BasicProperties) -> MessageProperties {
    let mut properties = MessageProperties::new();
    properties.content_type = basic.content_type().as_ref().map(|c| c.as_str().to_string());
    properties.delivery_mode = basic.delivery_mode().and_then(DeliveryMode::from_u8);
    if let Some(headers) = basic.headers() {
        for (key, value) in headers.inner() {
            if let Some(text) = header_text(value) {
                properties.headers.insert(key.as_str().to_string(), text);
            }
        }
    }
    properties
}

async fn close_quietly(connection: Connection, channel: Channel) {
    if let Err(e) = channel.close(REPLY_SUCCESS, "OK").await {
        tracing::debug!(error = %e, "AMQP channel close failed");
    }
    if let Err(e) = connection.close(REPLY_SUCCESS, "OK").await {
        tracing::debug!(error = %e, "AMQP connection close failed");
    }
}

async fn publish_on(channel: &Channel, envelope: MessageEnvelope) -> Result<(), MessagingError> {
    declare_exchange(channel, &envelope.exchange, envelope.kind, envelope.options).await?;

    let properties = to_lapin_properties(&envelope.effective_properties());
    let data = envelope.payload.into_bytes()?;

    channel
        .basic_publish(
            &envelope.exchange,
            &envelope.routing_key,
            BasicPublishOptions::default(),
            &data,
            properties,
        )
        .await
        .map_err(|e| MessagingError::Transport(e.to_string()))?
        .await
        .map_err(|e| MessagingError::Transport(e.to_string()))?;

    Ok(())
}

async fn consume_on(channel: &Channel, request: &ConsumeRequest) -> Result<lapin::Consumer, MessagingError> {
    declare_exchange(channel, &request.exchange, request.kind, request.options).await?;

    let queue = channel
        .queue_declare(
            &request.queue,
            QueueDeclareOptions {
                passive: request.options.passive,
                durable: request.options.durable,
                auto_delete: request.options.auto_delete,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| MessagingError::Declaration(format!("queue '{}': {}", request.queue, e)))?;
    let queue_name = queue.name().as_str().to_string();

    // Queues are bound to the default exchange implicitly.
    if request.kind != ExchangeKind::Default {
        channel
            .queue_bind(
                &queue_name,
                &request.exchange,
                &request.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                MessagingError::Declaration(format!(
                    "bind '{}' to '{}': {}",
                    queue_name, request.exchange, e
                ))
            })?;
    }

    channel
        .basic_consume(
            &queue_name,
            &request.consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| MessagingError::Transport(e.to_string()))
}

struct LapinAcker(lapin::acker::Acker);

#[async_trait::async_trait]
impl Acknowledger for LapinAcker {
    async fn ack(&self) -> Result<(), MessagingError> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| MessagingError::Transport(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<(), MessagingError> {
        self.0
            .nack(BasicNackOptions {
                requeue,
                ..BasicNackOptions::default()
            })
            .await
            .map(|_| ())
            .map_err(|e| MessagingError::Transport(e.to_string()))
    }

    async fn reject(&self, requeue: bool) -> Result<(), MessagingError> {
        self.0
            .reject(BasicRejectOptions { requeue })
            .await
            .map(|_| ())
            .map_err(|e| MessagingError::Transport(e.to_string()))
    }
}

fn into_delivery(delivery: lapin::message::Delivery) -> Delivery {
    let properties = from_lapin_properties(&delivery.properties);
    Delivery::new(
        delivery.delivery_tag,
        delivery.exchange.as_str().to_string(),
        delivery.routing_key.as_str().to_string(),
        delivery.redelivered,
        properties,
        delivery.data,
        Box::new(LapinAcker(delivery.acker)),
    )
}

#[async_trait::async_trait]
impl MessagingService for AmqpClient {
    async fn publish(&self, envelope: MessageEnvelope) -> Result<(), MessagingError> {
        let exchange = envelope.exchange.clone();
        let routing_key = envelope.routing_key.clone();

        let (connection, channel) = self.open().await?;
        let result = publish_on(&channel, envelope).await;
        close_quietly(connection, channel).await;

        match &result {
            Ok(()) => tracing::debug!(exchange = %exchange, routing_key = %routing_key, "AMQP message published"),
            Err(e) => tracing::warn!(exchange = %exchange, routing_key = %routing_key, error = %e, "AMQP publish failed"),
        }
        result
    }

    async fn subscribe(&self, request: ConsumeRequest) -> Result<Subscription, MessagingError> {
        let (connection, channel) = self.open().await?;

        let consumer = match consume_on(&channel, &request).await {
            Ok(consumer) => consumer,
            Err(e) => {
                close_quietly(connection, channel).await;
                return Err(e);
            }
        };
        let consumer_tag = consumer.tag().as_str().to_string();

        let deliveries = futures::stream::unfold(Some(consumer), |consumer| async move {
            let mut consumer = consumer?;
            match consumer.next().await? {
                Ok(delivery) => Some((Ok(into_delivery(delivery)), Some(consumer))),
                Err(e) => Some((Err(MessagingError::Connection(e.to_string())), None)),
            }
        })
        .boxed();

        let on_close = close_quietly(connection, channel).boxed();

        Ok(Subscription::new(consumer_tag, deliveries, on_close))
    }
}
