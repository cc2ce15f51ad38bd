//! Handler for the orders topic.

use std::time::Duration;

use async_trait::async_trait;
use common::topics::{ORDERS_TOPIC, PAYMENTS_TOPIC};
use common::{Order, Payment};
use domain::ServiceContext;
use messaging::propagation::effective_customer_id;
use messaging::{HandlerError, MessageHandler};
use opentelemetry::trace::{Span, SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use rand::Rng;

use crate::error::{Result, SagaError, fail_span};

/// Bounds of the simulated processing delay.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(50);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(500);

/// Turns each consumed order into a confirmed payment on the payments topic.
#[derive(Debug, Clone)]
pub struct OrderProcessor {
    ctx: ServiceContext,
    min_delay: Duration,
    max_delay: Duration,
}

impl OrderProcessor {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            ctx,
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Sets the simulated delay range. Bounds are swapped if reversed.
    pub fn with_delay(mut self, min: Duration, max: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.min_delay = min;
        self.max_delay = max;
        self
    }

    fn pick_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Processes one order message.
    ///
    /// The customer on the published payment is the `customer_id` baggage
    /// entry when present, otherwise the order's own customer. The payment is
    /// keyed by the order id.
    #[tracing::instrument(skip(self, cx, value))]
    pub async fn process_order(&self, cx: &Context, key: &str, value: &[u8]) -> Result<Payment> {
        let tracer = self.ctx.telemetry.tracer();
        let metrics = self.ctx.telemetry.metrics();

        let span = tracer
            .span_builder("ProcessOrder")
            .with_kind(SpanKind::Internal)
            .start_with_context(tracer, cx);
        let cx = cx.with_span(span);

        let order: Order = match serde_json::from_slice(value) {
            Ok(order) => order,
            Err(source) => {
                let err = SagaError::Decode {
                    record: "order",
                    source,
                };
                fail_span(&cx, &err);
                tracing::error!(error = %err, "Failed to decode order");
                return Err(err);
            }
        };

        cx.span().set_attributes(vec![
            KeyValue::new("order.id", order.id.to_string()),
            KeyValue::new("order.customer_id", order.customer_id.clone()),
            KeyValue::new("order.total_cents", order.total_cents),
        ]);

        let customer_id = effective_customer_id(&cx, &order.customer_id);

        let delay = self.pick_delay();
        let mut delay_span = tracer.start_with_context("SimulateProcessingDelay", &cx);
        delay_span.set_attribute(KeyValue::new("delay_ms", delay.as_millis() as i64));
        tokio::time::sleep(delay).await;
        delay_span.end();

        metrics.message_consumed(ORDERS_TOPIC, &customer_id);
        metrics.record_processing_time(&customer_id, delay.as_secs_f64());

        let payment = Payment::confirmed(order.id.clone(), customer_id, order.total_cents);

        if let Err(e) = self
            .ctx
            .producer
            .publish(&cx, PAYMENTS_TOPIC, order.id.as_str(), &payment)
            .await
        {
            let err = SagaError::Publish(e);
            fail_span(&cx, &err);
            tracing::error!(order_id = %order.id, error = %err, "Failed to publish payment");
            return Err(err);
        }

        let span = cx.span();
        span.set_status(Status::Ok);
        span.end();

        tracing::info!(
            order_id = %payment.order_id,
            customer_id = %payment.customer_id,
            total_cents = payment.total_cents,
            delay_ms = delay.as_millis() as u64,
            "Order processed, payment published"
        );

        Ok(payment)
    }
}

#[async_trait]
impl MessageHandler for OrderProcessor {
    async fn handle(
        &self,
        cx: &Context,
        key: &str,
        value: &[u8],
    ) -> std::result::Result<(), HandlerError> {
        self.process_order(cx, key, value).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::Telemetry;
    use messaging::propagation::with_customer_id;
    use messaging::{InMemoryBroker, Producer};

    use super::*;

    fn processor(broker: &InMemoryBroker) -> OrderProcessor {
        let telemetry = Telemetry::new("consumer-test");
        let producer = Producer::new(Arc::new(broker.clone()), telemetry.clone());
        OrderProcessor::new(ServiceContext::new(telemetry, producer))
            .with_delay(Duration::ZERO, Duration::ZERO)
    }

    fn order_bytes(customer_id: &str) -> (Order, Vec<u8>) {
        let order = Order::new(customer_id, vec!["pen".to_string()], 500);
        let bytes = serde_json::to_vec(&order).unwrap();
        (order, bytes)
    }

    #[tokio::test]
    async fn test_publishes_payment_keyed_by_order_id() {
        let broker = InMemoryBroker::new();
        let (order, bytes) = order_bytes("alice");

        let payment = processor(&broker)
            .process_order(&Context::new(), order.id.as_str(), &bytes)
            .await
            .unwrap();

        assert_eq!(payment.order_id, order.id);
        assert_eq!(payment.customer_id, "alice");
        assert_eq!(payment.total_cents, 500);

        let messages = broker.messages(PAYMENTS_TOPIC);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].key, order.id.as_str());
        let published: Payment = serde_json::from_slice(&messages[0].value).unwrap();
        assert_eq!(published, payment);
    }

    #[tokio::test]
    async fn test_baggage_customer_wins() {
        let broker = InMemoryBroker::new();
        let (order, bytes) = order_bytes("Y");
        let cx = with_customer_id(&Context::new(), "X");

        let payment = processor(&broker)
            .process_order(&cx, order.id.as_str(), &bytes)
            .await
            .unwrap();

        assert_eq!(payment.customer_id, "X");
    }

    #[tokio::test]
    async fn test_undecodable_order_is_permanent() {
        let broker = InMemoryBroker::new();

        let err = processor(&broker)
            .handle(&Context::new(), "k", b"{not json")
            .await
            .unwrap_err();

        assert!(err.is_permanent());
        assert!(broker.messages(PAYMENTS_TOPIC).is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_is_transient() {
        let broker = InMemoryBroker::new();
        broker.set_fail_on_write(true);
        let (order, bytes) = order_bytes("alice");

        let err = processor(&broker)
            .handle(&Context::new(), order.id.as_str(), &bytes)
            .await
            .unwrap_err();

        assert!(!err.is_permanent());
    }

    #[test]
    fn test_delay_bounds_are_ordered() {
        let broker = InMemoryBroker::new();
        let processor = processor(&broker)
            .with_delay(Duration::from_millis(20), Duration::from_millis(10));

        for _ in 0..20 {
            let delay = processor.pick_delay();
            assert!(delay >= Duration::from_millis(10) && delay <= Duration::from_millis(20));
        }
    }
}
