//! Mock Message Broker Implementation
//!
//! In-memory broker with exchanges, queues, bindings and manual
//! acknowledgement. Thread-safe via `Arc<Mutex<>>`.
//!
//! Failure injection covers the broker faults callers have to survive:
//! refused connections, failed publishes, and a connection dropped in the
//! middle of a consume loop.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::{FutureExt, StreamExt};
use tokio::sync::Notify;

use crate::delivery::{Acknowledger, Delivery, Subscription};
use crate::message::{
    check_default_exchange, ConsumeRequest, DeclareOptions, ExchangeKind, MessageEnvelope,
    MessageProperties,
};
use crate::routing::binding_matches;
use crate::{MessagingError, MessagingService};

/// A message as it was accepted by the broker
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub kind: ExchangeKind,
    pub properties: MessageProperties,
    pub data: Vec<u8>,
}

impl PublishedMessage {
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }
}

/// How a consumer settled a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Ack,
    Nack { requeue: bool },
    Reject { requeue: bool },
}

#[derive(Debug, Clone)]
pub struct AckRecord {
    pub queue: String,
    pub delivery_tag: u64,
    pub kind: AckKind,
}

#[derive(Debug)]
struct ExchangeState {
    kind: ExchangeKind,
    durable: bool,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    exchange: String,
    routing_key: String,
    properties: MessageProperties,
    data: Vec<u8>,
    redelivered: bool,
}

#[derive(Debug)]
struct Unacked {
    message: StoredMessage,
    consumer_tag: String,
}

#[derive(Debug)]
struct QueueState {
    durable: bool,
    auto_delete: bool,
    ready: VecDeque<StoredMessage>,
    unacked: HashMap<u64, Unacked>,
    consumers: HashSet<String>,
    notify: Arc<Notify>,
}

impl QueueState {
    fn new(options: DeclareOptions) -> Self {
        Self {
            durable: options.durable,
            auto_delete: options.auto_delete,
            ready: VecDeque::new(),
            unacked: HashMap::new(),
            consumers: HashSet::new(),
            notify: Arc::new(Notify::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    exchange: String,
    queue: String,
    routing_key: String,
}

#[derive(Debug, Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeState>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    published: Vec<PublishedMessage>,
    acks: Vec<AckRecord>,
    next_delivery_tag: u64,
    next_consumer: u64,
    delivered: usize,
    connections_opened: usize,
    connections_closed: usize,
    fail_connections: bool,
    fail_publishes: bool,
    disconnect_at: Option<usize>,
    dropped_consumers: HashSet<String>,
    cancelled_consumers: HashSet<String>,
}

enum Take {
    Message(u64, StoredMessage),
    Empty,
    Closed,
}

impl BrokerState {
    fn open_connection(&mut self) -> Result<(), MessagingError> {
        if self.fail_connections {
            return Err(MessagingError::Connection(
                "Connection refused by mock broker".to_string(),
            ));
        }
        self.connections_opened += 1;
        Ok(())
    }

    fn declare_exchange(
        &mut self,
        name: &str,
        kind: ExchangeKind,
        options: DeclareOptions,
    ) -> Result<(), MessagingError> {
        check_default_exchange(name, kind)?;
        if kind == ExchangeKind::Default {
            return Ok(());
        }

        match self.exchanges.get(name) {
            Some(existing) if existing.kind != kind => Err(MessagingError::Declaration(format!(
                "PRECONDITION_FAILED - inequivalent arg 'type' for exchange '{}': received '{}' but current is '{}'",
                name, kind, existing.kind
            ))),
            Some(existing) if !options.passive && existing.durable != options.durable => {
                Err(MessagingError::Declaration(format!(
                    "PRECONDITION_FAILED - inequivalent arg 'durable' for exchange '{}'",
                    name
                )))
            }
            Some(_) => Ok(()),
            None if options.passive => Err(MessagingError::Declaration(format!(
                "NOT_FOUND - no exchange '{}'",
                name
            ))),
            None => {
                self.exchanges.insert(
                    name.to_string(),
                    ExchangeState {
                        kind,
                        durable: options.durable,
                    },
                );
                Ok(())
            }
        }
    }

    fn declare_queue(&mut self, name: &str, options: DeclareOptions) -> Result<String, MessagingError> {
        let name = if name.is_empty() {
            format!("amq.gen-{}", uuid::Uuid::new_v4().simple())
        } else {
            name.to_string()
        };

        match self.queues.get(&name) {
            Some(existing) if !options.passive && existing.durable != options.durable => {
                Err(MessagingError::Declaration(format!(
                    "PRECONDITION_FAILED - inequivalent arg 'durable' for queue '{}'",
                    name
                )))
            }
            Some(_) => Ok(name),
            None if options.passive => Err(MessagingError::Declaration(format!(
                "NOT_FOUND - no queue '{}'",
                name
            ))),
            None => {
                self.queues.insert(name.clone(), QueueState::new(options));
                Ok(name)
            }
        }
    }

    fn bind(&mut self, queue: &str, exchange: &str, kind: ExchangeKind, routing_key: &str) {
        // Every queue is implicitly bound to the default exchange by name.
        if kind == ExchangeKind::Default {
            return;
        }
        let binding = Binding {
            exchange: exchange.to_string(),
            queue: queue.to_string(),
            routing_key: routing_key.to_string(),
        };
        if !self.bindings.contains(&binding) {
            self.bindings.push(binding);
        }
    }

    fn publish(&mut self, envelope: MessageEnvelope) -> Result<(), MessagingError> {
        self.declare_exchange(&envelope.exchange, envelope.kind, envelope.options)?;

        if self.fail_publishes {
            return Err(MessagingError::Transport(
                "Publish rejected by mock broker".to_string(),
            ));
        }

        let properties = envelope.effective_properties();
        let data = envelope.payload.into_bytes()?;

        self.published.push(PublishedMessage {
            exchange: envelope.exchange.clone(),
            routing_key: envelope.routing_key.clone(),
            kind: envelope.kind,
            properties: properties.clone(),
            data: data.clone(),
        });

        let message = StoredMessage {
            exchange: envelope.exchange,
            routing_key: envelope.routing_key,
            properties,
            data,
            redelivered: false,
        };
        self.route(envelope.kind, message);
        Ok(())
    }

    fn route(&mut self, kind: ExchangeKind, message: StoredMessage) {
        let mut targets: Vec<String> = Vec::new();
        if kind == ExchangeKind::Default {
            if self.queues.contains_key(&message.routing_key) {
                targets.push(message.routing_key.clone());
            }
        } else {
            for binding in &self.bindings {
                if binding.exchange == message.exchange
                    && binding_matches(kind, &binding.routing_key, &message.routing_key)
                    && !targets.contains(&binding.queue)
                {
                    targets.push(binding.queue.clone());
                }
            }
        }

        if targets.is_empty() {
            tracing::debug!(
                exchange = %message.exchange,
                routing_key = %message.routing_key,
                "Mock broker: message unroutable, dropped"
            );
        }

        for name in targets {
            if let Some(queue) = self.queues.get_mut(&name) {
                queue.ready.push_back(message.clone());
                queue.notify.notify_waiters();
            }
        }
    }

    fn take(&mut self, queue_name: &str, consumer_tag: &str) -> Result<Take, MessagingError> {
        if self.dropped_consumers.contains(consumer_tag) {
            return Err(connection_reset());
        }
        if self.cancelled_consumers.contains(consumer_tag) {
            return Ok(Take::Closed);
        }
        if self.disconnect_at.is_some_and(|limit| self.delivered >= limit) {
            self.dropped_consumers.insert(consumer_tag.to_string());
            return Err(connection_reset());
        }

        let Some(queue) = self.queues.get_mut(queue_name) else {
            return Ok(Take::Closed);
        };
        let Some(message) = queue.ready.pop_front() else {
            return Ok(Take::Empty);
        };

        self.next_delivery_tag += 1;
        let tag = self.next_delivery_tag;
        queue.unacked.insert(
            tag,
            Unacked {
                message: message.clone(),
                consumer_tag: consumer_tag.to_string(),
            },
        );
        self.delivered += 1;
        Ok(Take::Message(tag, message))
    }

    fn settle(&mut self, queue_name: &str, delivery_tag: u64, kind: AckKind) -> Result<(), MessagingError> {
        let queue = self.queues.get_mut(queue_name).ok_or_else(|| {
            MessagingError::Transport(format!("NOT_FOUND - no queue '{}'", queue_name))
        })?;
        let unacked = queue.unacked.get(&delivery_tag).ok_or_else(|| {
            MessagingError::Transport(format!(
                "PRECONDITION_FAILED - unknown delivery tag {}",
                delivery_tag
            ))
        })?;
        if self.dropped_consumers.contains(&unacked.consumer_tag) {
            return Err(connection_reset());
        }

        let unacked = queue
            .unacked
            .remove(&delivery_tag)
            .ok_or_else(connection_reset)?;

        let requeue = matches!(
            kind,
            AckKind::Nack { requeue: true } | AckKind::Reject { requeue: true }
        );
        if requeue {
            let mut message = unacked.message;
            message.redelivered = true;
            queue.ready.push_front(message);
            queue.notify.notify_waiters();
        }

        self.acks.push(AckRecord {
            queue: queue_name.to_string(),
            delivery_tag,
            kind,
        });
        Ok(())
    }

    fn release_consumer(&mut self, queue_name: &str, consumer_tag: &str) {
        self.dropped_consumers.remove(consumer_tag);
        self.cancelled_consumers.remove(consumer_tag);
        self.connections_closed += 1;

        let Some(queue) = self.queues.get_mut(queue_name) else {
            return;
        };
        queue.consumers.remove(consumer_tag);

        // Unsettled deliveries go back to the head of the queue, oldest first.
        let mut tags: Vec<u64> = queue
            .unacked
            .iter()
            .filter(|(_, u)| u.consumer_tag == consumer_tag)
            .map(|(tag, _)| *tag)
            .collect();
        tags.sort_unstable();
        for tag in tags.into_iter().rev() {
            if let Some(unacked) = queue.unacked.remove(&tag) {
                let mut message = unacked.message;
                message.redelivered = true;
                queue.ready.push_front(message);
            }
        }
        queue.notify.notify_waiters();

        if queue.auto_delete && queue.consumers.is_empty() {
            self.queues.remove(queue_name);
            self.bindings.retain(|b| b.queue != queue_name);
        }
    }

    fn wake_all(&self) {
        for queue in self.queues.values() {
            queue.notify.notify_waiters();
        }
    }
}

fn connection_reset() -> MessagingError {
    MessagingError::Connection("Connection reset by mock broker".to_string())
}

/// Mock broker that records traffic for test assertions
#[derive(Debug, Clone, Default)]
pub struct MockBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MockBroker {
    /// Create a new empty mock broker
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BrokerState>, MessagingError> {
        self.state
            .lock()
            .map_err(|e| MessagingError::Transport(format!("broker lock poisoned: {e}")))
    }

    fn inspect(&self) -> MutexGuard<'_, BrokerState> {
        self.state
            .lock()
            .expect("broker lock poisoned by a panicking test")
    }

    /// Refuse every new connection while `fail` is set
    pub fn set_fail_connections(&self, fail: bool) {
        self.inspect().fail_connections = fail;
    }

    /// Reject every publish while `fail` is set
    pub fn set_fail_publishes(&self, fail: bool) {
        self.inspect().fail_publishes = fail;
    }

    /// Drop consumer connections after `deliveries` more messages are handed out
    pub fn disconnect_after(&self, deliveries: usize) {
        let mut state = self.inspect();
        state.disconnect_at = Some(state.delivered + deliveries);
        state.wake_all();
    }

    /// Drop every live consumer connection now
    pub fn disconnect(&self) {
        let mut state = self.inspect();
        let tags: Vec<String> = state
            .queues
            .values()
            .flat_map(|q| q.consumers.iter().cloned())
            .collect();
        state.dropped_consumers.extend(tags);
        state.wake_all();
    }

    /// Broker-side cancel of every consumer; their streams end cleanly
    pub fn cancel_consumers(&self) {
        let mut state = self.inspect();
        let tags: Vec<String> = state
            .queues
            .values()
            .flat_map(|q| q.consumers.iter().cloned())
            .collect();
        state.cancelled_consumers.extend(tags);
        state.wake_all();
    }

    /// All messages accepted by the broker, in publish order
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.inspect().published.clone()
    }

    /// All acknowledgements, in settle order
    pub fn acks(&self) -> Vec<AckRecord> {
        self.inspect().acks.clone()
    }

    /// Messages waiting for delivery on `queue`
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.inspect()
            .queues
            .get(queue)
            .map_or(0, |q| q.ready.len())
    }

    /// Delivered but not yet settled messages on `queue`
    pub fn unacked_count(&self, queue: &str) -> usize {
        self.inspect()
            .queues
            .get(queue)
            .map_or(0, |q| q.unacked.len())
    }

    pub fn consumer_count(&self, queue: &str) -> usize {
        self.inspect()
            .queues
            .get(queue)
            .map_or(0, |q| q.consumers.len())
    }

    pub fn has_queue(&self, queue: &str) -> bool {
        self.inspect().queues.contains_key(queue)
    }

    pub fn exchange_kind(&self, exchange: &str) -> Option<ExchangeKind> {
        self.inspect().exchanges.get(exchange).map(|e| e.kind)
    }

    /// `(exchange, routing_key)` pairs bound to `queue`
    pub fn bindings(&self, queue: &str) -> Vec<(String, String)> {
        self.inspect()
            .bindings
            .iter()
            .filter(|b| b.queue == queue)
            .map(|b| (b.exchange.clone(), b.routing_key.clone()))
            .collect()
    }

    pub fn connections_opened(&self) -> usize {
        self.inspect().connections_opened
    }

    pub fn connections_closed(&self) -> usize {
        self.inspect().connections_closed
    }

    /// Forget every exchange, queue, message and injected fault
    pub fn reset(&self) {
        let mut state = self.inspect();
        state.wake_all();
        *state = BrokerState::default();
    }

    fn publish_now(&self, envelope: MessageEnvelope) -> Result<(), MessagingError> {
        let mut state = self.lock()?;
        state.open_connection()?;
        let result = state.publish(envelope);
        state.connections_closed += 1;
        result
    }

    fn register_consumer(&self, request: &ConsumeRequest) -> Result<(String, String), MessagingError> {
        let mut state = self.lock()?;
        state.open_connection()?;

        let registered = (|| -> Result<(String, String), MessagingError> {
            state.declare_exchange(&request.exchange, request.kind, request.options)?;
            let queue = state.declare_queue(&request.queue, request.options)?;
            state.bind(&queue, &request.exchange, request.kind, &request.routing_key);

            let tag = if request.consumer_tag.is_empty() {
                state.next_consumer += 1;
                format!("amq.ctag-mock-{}", state.next_consumer)
            } else {
                request.consumer_tag.clone()
            };
            if let Some(q) = state.queues.get_mut(&queue) {
                q.consumers.insert(tag.clone());
            }
            Ok((queue, tag))
        })();

        if registered.is_err() {
            state.connections_closed += 1;
        }
        registered
    }

    fn queue_notify(&self, queue: &str) -> Result<Option<Arc<Notify>>, MessagingError> {
        Ok(self.lock()?.queues.get(queue).map(|q| Arc::clone(&q.notify)))
    }

    fn take(&self, queue: &str, consumer_tag: &str) -> Result<Take, MessagingError> {
        self.lock()?.take(queue, consumer_tag)
    }
}

struct MockAcker {
    broker: MockBroker,
    queue: String,
    delivery_tag: u64,
}

impl MockAcker {
    fn settle(&self, kind: AckKind) -> Result<(), MessagingError> {
        self.broker
            .lock()?
            .settle(&self.queue, self.delivery_tag, kind)
    }
}

#[async_trait::async_trait]
impl Acknowledger for MockAcker {
    async fn ack(&self) -> Result<(), MessagingError> {
        self.settle(AckKind::Ack)
    }

    async fn nack(&self, requeue: bool) -> Result<(), MessagingError> {
        self.settle(AckKind::Nack { requeue })
    }

    async fn reject(&self, requeue: bool) -> Result<(), MessagingError> {
        self.settle(AckKind::Reject { requeue })
    }
}

struct ConsumerContext {
    broker: MockBroker,
    queue: String,
    consumer_tag: String,
}

async fn next_delivery(ctx: ConsumerContext) -> Option<(Result<Delivery, MessagingError>, Option<ConsumerContext>)> {
    loop {
        let notify = match ctx.broker.queue_notify(&ctx.queue) {
            Ok(Some(notify)) => notify,
            Ok(None) => return None,
            Err(e) => return Some((Err(e), None)),
        };
        // Registered before checking so a publish in between is not missed.
        let notified = notify.notified();

        match ctx.broker.take(&ctx.queue, &ctx.consumer_tag) {
            Ok(Take::Message(delivery_tag, message)) => {
                let acker = MockAcker {
                    broker: ctx.broker.clone(),
                    queue: ctx.queue.clone(),
                    delivery_tag,
                };
                let delivery = Delivery::new(
                    delivery_tag,
                    message.exchange,
                    message.routing_key,
                    message.redelivered,
                    message.properties,
                    message.data,
                    Box::new(acker),
                );
                return Some((Ok(delivery), Some(ctx)));
            }
            Ok(Take::Empty) => notified.await,
            Ok(Take::Closed) => return None,
            Err(e) => return Some((Err(e), None)),
        }
    }
}

#[async_trait::async_trait]
impl MessagingService for MockBroker {
    async fn publish(&self, envelope: MessageEnvelope) -> Result<(), MessagingError> {
        tracing::debug!(
            exchange = %envelope.exchange,
            routing_key = %envelope.routing_key,
            "Mock broker: recording publish"
        );
        self.publish_now(envelope)
    }

    async fn subscribe(&self, request: ConsumeRequest) -> Result<Subscription, MessagingError> {
        let (queue, consumer_tag) = self.register_consumer(&request)?;
        tracing::debug!(queue = %queue, consumer_tag = %consumer_tag, "Mock broker: consumer registered");

        let ctx = ConsumerContext {
            broker: self.clone(),
            queue: queue.clone(),
            consumer_tag: consumer_tag.clone(),
        };
        let deliveries = futures::stream::unfold(Some(ctx), |ctx| async move {
            next_delivery(ctx?).await
        })
        .boxed();

        let broker = self.clone();
        let tag = consumer_tag.clone();
        let on_close = async move {
            match broker.lock() {
                Ok(mut state) => state.release_consumer(&queue, &tag),
                Err(e) => tracing::warn!(error = %e, "Mock broker: failed to release consumer"),
            }
        }
        .boxed();

        Ok(Subscription::new(consumer_tag, deliveries, on_close))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::time::Duration;

    fn envelope(exchange: &str, key: &str, kind: ExchangeKind, body: &str) -> MessageEnvelope {
        MessageEnvelope::new(exchange, key, kind, body)
    }

    async fn next_text(subscription: &mut Subscription) -> String {
        let delivery = tokio::time::timeout(Duration::from_secs(1), subscription.next())
            .await
            .expect("delivery timed out")
            .expect("stream ended")
            .expect("delivery failed");
        let text = delivery.text().unwrap().to_string();
        delivery.ack().await.unwrap();
        text
    }

    #[tokio::test]
    async fn test_publish_records_message_with_default_properties() {
        let broker = MockBroker::new();
        broker
            .publish(envelope("logs", "app.info", ExchangeKind::Topic, "hello"))
            .await
            .unwrap();

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].text(), Some("hello"));
        assert_eq!(
            published[0].properties.content_type.as_deref(),
            Some("text/plain")
        );
        assert!(published[0].properties.is_persistent());
        assert_eq!(broker.exchange_kind("logs"), Some(ExchangeKind::Topic));
    }

    #[tokio::test]
    async fn test_publish_opens_and_closes_one_connection_per_call() {
        let broker = MockBroker::new();
        for i in 0..3 {
            broker
                .publish(envelope("logs", "k", ExchangeKind::Fanout, &i.to_string()))
                .await
                .unwrap();
        }
        assert_eq!(broker.connections_opened(), 3);
        assert_eq!(broker.connections_closed(), 3);
    }

    #[tokio::test]
    async fn test_publish_connection_failure() {
        let broker = MockBroker::new();
        broker.set_fail_connections(true);

        let err = broker
            .publish(envelope("logs", "k", ExchangeKind::Direct, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::Connection(_)));
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn test_publish_transport_failure_still_closes_connection() {
        let broker = MockBroker::new();
        broker.set_fail_publishes(true);

        let err = broker
            .publish(envelope("logs", "k", ExchangeKind::Direct, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::Transport(_)));
        assert_eq!(broker.connections_closed(), 1);
    }

    #[tokio::test]
    async fn test_redeclare_with_other_kind_fails() {
        let broker = MockBroker::new();
        broker
            .publish(envelope("events", "k", ExchangeKind::Direct, "x"))
            .await
            .unwrap();

        let err = broker
            .publish(envelope("events", "k", ExchangeKind::Topic, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::Declaration(_)));
        assert!(err.to_string().contains("inequivalent arg 'type'"));
    }

    #[tokio::test]
    async fn test_passive_declare_of_missing_exchange_fails() {
        let broker = MockBroker::new();
        let passive = DeclareOptions {
            passive: true,
            ..DeclareOptions::default()
        };

        let err = broker
            .publish(envelope("missing", "k", ExchangeKind::Direct, "x").with_options(passive))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("NOT_FOUND - no exchange 'missing'"));
    }

    #[tokio::test]
    async fn test_topic_routing_to_bound_queues() {
        let broker = MockBroker::new();
        let mut eu = broker
            .subscribe(ConsumeRequest::new("orders", "eu", "order.*.eu", ExchangeKind::Topic))
            .await
            .unwrap();
        let _all = broker
            .subscribe(ConsumeRequest::new("orders", "all", "order.#", ExchangeKind::Topic))
            .await
            .unwrap();

        for key in ["order.created.eu", "order.created.us", "order.paid.eu"] {
            broker
                .publish(envelope("orders", key, ExchangeKind::Topic, key))
                .await
                .unwrap();
        }

        assert_eq!(broker.queue_depth("all"), 3);
        assert_eq!(next_text(&mut eu).await, "order.created.eu");
        assert_eq!(next_text(&mut eu).await, "order.paid.eu");
        assert_eq!(broker.queue_depth("eu"), 0);
    }

    #[tokio::test]
    async fn test_fanout_copies_to_every_queue() {
        let broker = MockBroker::new();
        for queue in ["a", "b", "c"] {
            broker
                .subscribe(ConsumeRequest::new("broadcast", queue, "", ExchangeKind::Fanout))
                .await
                .unwrap();
        }

        broker
            .publish(envelope("broadcast", "ignored", ExchangeKind::Fanout, "ping"))
            .await
            .unwrap();

        for queue in ["a", "b", "c"] {
            assert_eq!(broker.queue_depth(queue), 1);
        }
    }

    #[tokio::test]
    async fn test_default_exchange_routes_by_queue_name() {
        let broker = MockBroker::new();
        let mut sub = broker
            .subscribe(ConsumeRequest::new("", "tasks", "", ExchangeKind::Default))
            .await
            .unwrap();
        assert!(broker.bindings("tasks").is_empty());

        broker
            .publish(envelope("", "tasks", ExchangeKind::Default, "work"))
            .await
            .unwrap();
        broker
            .publish(envelope("", "nowhere", ExchangeKind::Default, "lost"))
            .await
            .unwrap();

        assert_eq!(next_text(&mut sub).await, "work");
        assert_eq!(broker.published().len(), 2);
    }

    #[tokio::test]
    async fn test_server_named_queue() {
        let broker = MockBroker::new();
        let _sub = broker
            .subscribe(ConsumeRequest::new("logs", "", "#", ExchangeKind::Topic))
            .await
            .unwrap();

        broker
            .publish(envelope("logs", "any", ExchangeKind::Topic, "x"))
            .await
            .unwrap();
        let published = broker.published();
        assert_eq!(published.len(), 1);
    }

    #[tokio::test]
    async fn test_nack_with_requeue_redelivers() {
        let broker = MockBroker::new();
        let mut sub = broker
            .subscribe(ConsumeRequest::new("jobs", "work", "run", ExchangeKind::Direct))
            .await
            .unwrap();
        broker
            .publish(envelope("jobs", "run", ExchangeKind::Direct, "job-1"))
            .await
            .unwrap();

        let first = sub.next().await.unwrap().unwrap();
        assert!(!first.redelivered);
        first.nack(true).await.unwrap();

        let second = sub.next().await.unwrap().unwrap();
        assert!(second.redelivered);
        assert_eq!(second.text().unwrap(), "job-1");
        second.ack().await.unwrap();

        let kinds: Vec<AckKind> = broker.acks().iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AckKind::Nack { requeue: true }, AckKind::Ack]);
    }

    #[tokio::test]
    async fn test_reject_without_requeue_discards() {
        let broker = MockBroker::new();
        let mut sub = broker
            .subscribe(ConsumeRequest::new("jobs", "work", "run", ExchangeKind::Direct))
            .await
            .unwrap();
        broker
            .publish(envelope("jobs", "run", ExchangeKind::Direct, "poison"))
            .await
            .unwrap();

        let delivery = sub.next().await.unwrap().unwrap();
        delivery.reject(false).await.unwrap();

        assert_eq!(broker.queue_depth("work"), 0);
        assert_eq!(broker.unacked_count("work"), 0);
    }

    #[tokio::test]
    async fn test_double_ack_is_an_error() {
        let broker = MockBroker::new();
        let mut sub = broker
            .subscribe(ConsumeRequest::new("jobs", "work", "run", ExchangeKind::Direct))
            .await
            .unwrap();
        broker
            .publish(envelope("jobs", "run", ExchangeKind::Direct, "once"))
            .await
            .unwrap();

        let delivery = sub.next().await.unwrap().unwrap();
        delivery.ack().await.unwrap();
        assert!(delivery.ack().await.is_err());
    }

    #[tokio::test]
    async fn test_close_requeues_unacked_messages() {
        let broker = MockBroker::new();
        let mut sub = broker
            .subscribe(ConsumeRequest::new("jobs", "work", "run", ExchangeKind::Direct))
            .await
            .unwrap();
        for body in ["one", "two"] {
            broker
                .publish(envelope("jobs", "run", ExchangeKind::Direct, body))
                .await
                .unwrap();
        }

        let _unsettled = sub.next().await.unwrap().unwrap();
        assert_eq!(broker.unacked_count("work"), 1);
        sub.close().await;

        assert_eq!(broker.unacked_count("work"), 0);
        assert_eq!(broker.queue_depth("work"), 2);
        assert_eq!(broker.consumer_count("work"), 0);
    }

    #[tokio::test]
    async fn test_auto_delete_queue_removed_after_last_consumer() {
        let broker = MockBroker::new();
        let options = DeclareOptions {
            auto_delete: true,
            ..DeclareOptions::default()
        };
        let sub = broker
            .subscribe(
                ConsumeRequest::new("jobs", "temp", "run", ExchangeKind::Direct)
                    .with_options(options),
            )
            .await
            .unwrap();
        assert!(broker.has_queue("temp"));

        sub.close().await;
        assert!(!broker.has_queue("temp"));
        assert!(broker.bindings("temp").is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_ends_stream_with_error() {
        let broker = MockBroker::new();
        let mut sub = broker
            .subscribe(ConsumeRequest::new("jobs", "work", "run", ExchangeKind::Direct))
            .await
            .unwrap();

        let waiter = tokio::spawn(async move { sub.next().await.map(|r| r.is_err()) });
        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.disconnect();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Some(true));
    }

    #[tokio::test]
    async fn test_cancel_consumers_ends_stream_cleanly() {
        let broker = MockBroker::new();
        let mut sub = broker
            .subscribe(ConsumeRequest::new("jobs", "work", "run", ExchangeKind::Direct))
            .await
            .unwrap();
        broker.cancel_consumers();

        let next = tokio::time::timeout(Duration::from_secs(1), sub.next())
            .await
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_json_payload_delivered_as_json() {
        let broker = MockBroker::new();
        let mut sub = broker
            .subscribe(ConsumeRequest::new("events", "q", "user.created", ExchangeKind::Direct))
            .await
            .unwrap();
        broker
            .publish(MessageEnvelope::new(
                "events",
                "user.created",
                ExchangeKind::Direct,
                json!({"id": 9, "name": "Ada"}),
            ))
            .await
            .unwrap();

        let delivery = sub.next().await.unwrap().unwrap();
        let body: serde_json::Value = delivery.json().unwrap();
        assert_eq!(body, json!({"id": 9, "name": "Ada"}));
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let broker = MockBroker::new();
        broker.set_fail_publishes(true);
        let _ = broker
            .publish(envelope("x", "k", ExchangeKind::Direct, "x"))
            .await;
        broker.reset();

        assert!(broker.exchange_kind("x").is_none());
        assert_eq!(broker.connections_opened(), 0);
        broker
            .publish(envelope("x", "k", ExchangeKind::Direct, "x"))
            .await
            .unwrap();
    }
}
