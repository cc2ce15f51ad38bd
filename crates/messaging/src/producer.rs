//! Trace-propagating message producer.

use std::sync::Arc;
use std::time::Duration;

use common::Telemetry;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use serde::Serialize;

use crate::broker::MessageWriter;
use crate::carrier::MessageHeaders;
use crate::envelope::OutgoingMessage;
use crate::error::{PublishError, TransportError};
use crate::propagation::inject_context;

/// Upper bound on a single acknowledged write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Publishes JSON records with the caller's trace context in the headers.
///
/// Cheap to clone; clones share the underlying writer.
#[derive(Clone)]
pub struct Producer {
    writer: Arc<dyn MessageWriter>,
    telemetry: Telemetry,
    write_timeout: Duration,
}

impl Producer {
    pub fn new(writer: Arc<dyn MessageWriter>, telemetry: Telemetry) -> Self {
        Self {
            writer,
            telemetry,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Serializes `record` and writes it to `topic` under `key`.
    ///
    /// Runs inside a producer span that is a child of `cx`; the span's context
    /// and the baggage of `cx` travel in the message headers. There is no
    /// internal retry.
    #[tracing::instrument(skip_all, fields(topic = %topic, key = %key))]
    pub async fn publish<T>(
        &self,
        cx: &Context,
        topic: &str,
        key: &str,
        record: &T,
    ) -> Result<(), PublishError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let cx = self.start_span(cx, topic, key);

        let value = match serde_json::to_vec(record) {
            Ok(value) => value,
            Err(e) => {
                let err = PublishError::Encode(e);
                end_span_with_error(&cx, &err);
                tracing::error!(error = %err, "Failed to encode message");
                return Err(err);
            }
        };

        let mut headers = MessageHeaders::new();
        inject_context(&cx, &mut headers);

        let message = OutgoingMessage::new(key, value).with_headers(headers);
        self.write(&cx, topic, message).await
    }

    /// Writes an already-encoded message, headers untouched.
    #[tracing::instrument(skip_all, fields(topic = %topic, key = %message.key))]
    pub async fn forward(
        &self,
        cx: &Context,
        topic: &str,
        message: OutgoingMessage,
    ) -> Result<(), PublishError> {
        let cx = self.start_span(cx, topic, &message.key);
        self.write(&cx, topic, message).await
    }

    fn start_span(&self, parent: &Context, topic: &str, key: &str) -> Context {
        let tracer = self.telemetry.tracer();
        let span = tracer
            .span_builder(format!("publish {topic}"))
            .with_kind(SpanKind::Producer)
            .with_attributes(vec![
                KeyValue::new("messaging.system", "kafka"),
                KeyValue::new("messaging.destination.name", topic.to_string()),
                KeyValue::new("messaging.kafka.message.key", key.to_string()),
            ])
            .start_with_context(tracer, parent);
        parent.with_span(span)
    }

    async fn write(
        &self,
        cx: &Context,
        topic: &str,
        message: OutgoingMessage,
    ) -> Result<(), PublishError> {
        let result = match tokio::time::timeout(
            self.write_timeout,
            self.writer.write(topic, message),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.write_timeout)),
        };

        match result {
            Ok(()) => {
                self.telemetry.metrics().message_published(topic);
                let span = cx.span();
                span.set_status(Status::Ok);
                span.end();
                tracing::debug!("Message published");
                Ok(())
            }
            Err(e) => {
                let err = PublishError::Transport(e);
                end_span_with_error(cx, &err);
                tracing::error!(error = %err, "Failed to publish message");
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}

fn end_span_with_error(cx: &Context, err: &PublishError) {
    let span = cx.span();
    span.record_error(err);
    span.set_status(Status::error(err.to_string()));
    span.end();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBroker;
    use crate::propagation::{baggage_customer_id, extract_context, with_customer_id};
    use async_trait::async_trait;
    use serde::Serializer;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot encode"))
        }
    }

    struct StalledWriter;

    #[async_trait]
    impl MessageWriter for StalledWriter {
        async fn write(&self, _: &str, _: OutgoingMessage) -> crate::error::Result<()> {
            std::future::pending().await
        }
    }

    fn producer(broker: &InMemoryBroker) -> Producer {
        Producer::new(Arc::new(broker.clone()), Telemetry::new("producer-test"))
    }

    #[tokio::test]
    async fn test_publish_writes_json_with_key() {
        let broker = InMemoryBroker::new();
        let producer = producer(&broker);

        producer
            .publish(&Context::new(), "orders", "o-1", &serde_json::json!({"id": "o-1"}))
            .await
            .unwrap();

        let messages = broker.messages("orders");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].key, "o-1");
        let value: serde_json::Value = serde_json::from_slice(&messages[0].value).unwrap();
        assert_eq!(value["id"], "o-1");
    }

    #[tokio::test]
    async fn test_publish_carries_baggage() {
        let broker = InMemoryBroker::new();
        let producer = producer(&broker);
        let cx = with_customer_id(&Context::new(), "alice");

        producer.publish(&cx, "orders", "o-1", &1).await.unwrap();

        let messages = broker.messages("orders");
        let extracted = extract_context(&messages[0].headers);
        assert_eq!(baggage_customer_id(&extracted).as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_encode_failure_never_writes() {
        let broker = InMemoryBroker::new();
        let producer = producer(&broker);

        let err = producer
            .publish(&Context::new(), "orders", "o-1", &Unencodable)
            .await
            .unwrap_err();

        assert!(err.is_encode());
        assert!(broker.messages("orders").is_empty());
    }

    #[tokio::test]
    async fn test_rejected_write_is_transport_error() {
        let broker = InMemoryBroker::new();
        broker.set_fail_on_write(true);
        let producer = producer(&broker);

        let err = producer
            .publish(&Context::new(), "orders", "o-1", &1)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Transport(TransportError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_write_timeout() {
        let producer = Producer::new(Arc::new(StalledWriter), Telemetry::new("producer-test"))
            .with_write_timeout(Duration::from_millis(50));

        let err = producer
            .publish(&Context::new(), "orders", "o-1", &1)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Transport(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_forward_keeps_headers() {
        let broker = InMemoryBroker::new();
        let producer = producer(&broker);
        let mut headers = MessageHeaders::new();
        headers.set("x-origin", "orders");

        producer
            .forward(
                &Context::new(),
                "orders.dlq",
                OutgoingMessage::new("o-1", b"raw".to_vec()).with_headers(headers),
            )
            .await
            .unwrap();

        let messages = broker.messages("orders.dlq");
        assert_eq!(messages[0].value, b"raw");
        assert_eq!(messages[0].headers.get("x-origin"), Some("orders"));
    }
}
