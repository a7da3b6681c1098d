//! Message envelopes, exchange kinds and declaration flags

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MessagingError;

/// Content type applied when a publish carries no properties
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Exchange routing kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    /// The nameless exchange every broker pre-declares; routes by queue name
    #[default]
    Default,
    /// Every bound queue receives every message
    Fanout,
    /// Matches on message headers instead of the routing key
    Headers,
    /// Exact routing-key match
    Direct,
    /// Dot-separated routing-key patterns with `*` and `#`
    Topic,
}

impl ExchangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Default => "",
            ExchangeKind::Fanout => "fanout",
            ExchangeKind::Headers => "headers",
            ExchangeKind::Direct => "direct",
            ExchangeKind::Topic => "topic",
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeKind::Default => f.write_str("default"),
            other => f.write_str(other.as_str()),
        }
    }
}

impl FromStr for ExchangeKind {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Ok(ExchangeKind::Default),
            "fanout" => Ok(ExchangeKind::Fanout),
            "headers" => Ok(ExchangeKind::Headers),
            "direct" => Ok(ExchangeKind::Direct),
            "topic" => Ok(ExchangeKind::Topic),
            other => Err(MessagingError::Configuration(format!(
                "Unknown exchange kind: {}. Supported kinds: default, fanout, headers, direct, topic",
                other
            ))),
        }
    }
}

/// Broker-side declaration flags shared by exchanges and queues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclareOptions {
    /// Assert existence without creating
    pub passive: bool,
    /// Survive broker restart
    pub durable: bool,
    /// Delete once the last consumer or binding goes away
    pub auto_delete: bool,
}

impl DeclareOptions {
    pub fn durable() -> Self {
        Self {
            durable: true,
            ..Self::default()
        }
    }
}

/// AMQP delivery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMode {
    Transient,
    Persistent,
}

impl DeliveryMode {
    /// Wire value (1 transient, 2 persistent)
    pub fn as_u8(&self) -> u8 {
        match self {
            DeliveryMode::Transient => 1,
            DeliveryMode::Persistent => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(DeliveryMode::Transient),
            2 => Some(DeliveryMode::Persistent),
            _ => None,
        }
    }
}

/// Transport metadata attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageProperties {
    pub content_type: Option<String>,
    pub delivery_mode: Option<DeliveryMode>,
    pub headers: BTreeMap<String, String>,
}

impl MessageProperties {
    /// Properties with nothing set
    pub fn new() -> Self {
        Self::default()
    }

    /// `text/plain`, persistent: what a publish without properties uses
    pub fn publish_defaults() -> Self {
        Self {
            content_type: Some(DEFAULT_CONTENT_TYPE.to_string()),
            delivery_mode: Some(DeliveryMode::Persistent),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = Some(mode);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content_type.is_none() && self.delivery_mode.is_none() && self.headers.is_empty()
    }

    pub fn is_persistent(&self) -> bool {
        self.delivery_mode == Some(DeliveryMode::Persistent)
    }
}

/// Message body: text goes out as-is, JSON values are serialized first
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
}

impl Payload {
    /// Capture any serializable value as a JSON payload
    pub fn json<T: Serialize>(value: &T) -> Result<Self, MessagingError> {
        Ok(Payload::Json(serde_json::to_value(value)?))
    }

    /// Bytes to put on the wire
    pub fn into_bytes(self) -> Result<Vec<u8>, MessagingError> {
        match self {
            Payload::Text(text) => Ok(text.into_bytes()),
            Payload::Json(value) => Ok(serde_json::to_vec(&value)?),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(text) => Payload::Text(text),
            other => Payload::Json(other),
        }
    }
}

/// One message to publish, with where and how it goes
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    pub exchange: String,
    pub routing_key: String,
    pub kind: ExchangeKind,
    pub payload: Payload,
    pub properties: Option<MessageProperties>,
    pub options: DeclareOptions,
}

impl MessageEnvelope {
    pub fn new(
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        kind: ExchangeKind,
        payload: impl Into<Payload>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            kind,
            payload: payload.into(),
            properties: None,
            options: DeclareOptions::default(),
        }
    }

    pub fn with_properties(mut self, properties: MessageProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_options(mut self, options: DeclareOptions) -> Self {
        self.options = options;
        self
    }

    /// Properties that go on the wire; absent or empty means the defaults
    pub fn effective_properties(&self) -> MessageProperties {
        match &self.properties {
            Some(properties) if !properties.is_empty() => properties.clone(),
            _ => MessageProperties::publish_defaults(),
        }
    }
}

/// Where a consumer reads from and how its queue is declared
#[derive(Debug, Clone)]
pub struct ConsumeRequest {
    pub exchange: String,
    /// Empty lets the broker name the queue
    pub queue: String,
    pub routing_key: String,
    pub kind: ExchangeKind,
    pub options: DeclareOptions,
    /// Empty lets the broker generate a tag
    pub consumer_tag: String,
}

impl ConsumeRequest {
    pub fn new(
        exchange: impl Into<String>,
        queue: impl Into<String>,
        routing_key: impl Into<String>,
        kind: ExchangeKind,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            queue: queue.into(),
            routing_key: routing_key.into(),
            kind,
            options: DeclareOptions::default(),
            consumer_tag: String::new(),
        }
    }

    pub fn with_options(mut self, options: DeclareOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_consumer_tag(mut self, tag: impl Into<String>) -> Self {
        self.consumer_tag = tag.into();
        self
    }
}

/// The default exchange cannot be declared and only exists without a name.
pub(crate) fn check_default_exchange(exchange: &str, kind: ExchangeKind) -> Result<(), MessagingError> {
    if kind == ExchangeKind::Default && !exchange.is_empty() {
        return Err(MessagingError::Declaration(format!(
            "exchange '{}' cannot use the default kind; the default exchange has no name",
            exchange
        )));
    }
    Ok(())
}
