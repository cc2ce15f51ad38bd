//! Handler for the payments topic.

use async_trait::async_trait;
use common::{Payment, Telemetry};
use common::topics::PAYMENTS_TOPIC;
use domain::ConfirmPayment;
use messaging::{HandlerError, MessageHandler};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};

use crate::confirmation::PaymentConfirmationClient;
use crate::error::{Result, SagaError, fail_span};

/// Confirms each consumed payment with the payment service.
#[derive(Debug, Clone)]
pub struct PaymentProcessor<C> {
    telemetry: Telemetry,
    client: C,
}

impl<C: PaymentConfirmationClient> PaymentProcessor<C> {
    pub fn new(telemetry: Telemetry, client: C) -> Self {
        Self { telemetry, client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Processes one payment message by calling the confirmation endpoint.
    ///
    /// Network failures and non-success responses are returned as
    /// [`SagaError::Callout`], which leaves the message uncommitted.
    #[tracing::instrument(skip(self, cx, value))]
    pub async fn process_payment(&self, cx: &Context, key: &str, value: &[u8]) -> Result<()> {
        let tracer = self.telemetry.tracer();
        let span = tracer
            .span_builder("ProcessPayment")
            .with_kind(SpanKind::Internal)
            .start_with_context(tracer, cx);
        let cx = cx.with_span(span);

        let payment: Payment = match serde_json::from_slice(value) {
            Ok(payment) => payment,
            Err(source) => {
                let err = SagaError::Decode {
                    record: "payment",
                    source,
                };
                fail_span(&cx, &err);
                tracing::error!(error = %err, "Failed to decode payment");
                return Err(err);
            }
        };

        cx.span().set_attributes(vec![
            KeyValue::new("payment.order_id", payment.order_id.to_string()),
            KeyValue::new("payment.customer_id", payment.customer_id.clone()),
            KeyValue::new("payment.total_cents", payment.total_cents),
        ]);

        let request = ConfirmPayment::from(&payment);
        if let Err(e) = self.client.confirm(&cx, &request).await {
            let err = SagaError::Callout(e);
            fail_span(&cx, &err);
            tracing::error!(
                order_id = %payment.order_id,
                error = %err,
                "Payment confirmation failed"
            );
            return Err(err);
        }

        self.telemetry
            .metrics()
            .message_consumed(PAYMENTS_TOPIC, &payment.customer_id);

        let span = cx.span();
        span.set_status(Status::Ok);
        span.end();

        tracing::info!(
            order_id = %payment.order_id,
            customer_id = %payment.customer_id,
            "Payment confirmed via payment-api"
        );
        Ok(())
    }
}

#[async_trait]
impl<C: PaymentConfirmationClient> MessageHandler for PaymentProcessor<C> {
    async fn handle(
        &self,
        cx: &Context,
        key: &str,
        value: &[u8],
    ) -> std::result::Result<(), HandlerError> {
        self.process_payment(cx, key, value).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirmation::InMemoryConfirmationClient;
    use common::OrderId;

    fn processor() -> PaymentProcessor<InMemoryConfirmationClient> {
        PaymentProcessor::new(
            Telemetry::new("consumer-test"),
            InMemoryConfirmationClient::new(),
        )
    }

    fn payment_bytes() -> Vec<u8> {
        serde_json::to_vec(&Payment::confirmed(OrderId::new("o-1"), "alice", 500)).unwrap()
    }

    #[tokio::test]
    async fn test_confirms_payment() {
        let processor = processor();

        processor
            .process_payment(&Context::new(), "o-1", &payment_bytes())
            .await
            .unwrap();

        assert_eq!(
            processor.client().confirmed(),
            vec![ConfirmPayment::new("o-1", "alice", 500)]
        );
    }

    #[tokio::test]
    async fn test_callout_failure_is_transient() {
        let processor = processor();
        processor.client().set_fail_with_status(Some(500));

        let err = processor
            .handle(&Context::new(), "o-1", &payment_bytes())
            .await
            .unwrap_err();

        assert!(!err.is_permanent());
        assert_eq!(err.to_string(), "payment-api returned 500");
    }

    #[tokio::test]
    async fn test_undecodable_payment_is_permanent() {
        let processor = processor();

        let err = processor
            .handle(&Context::new(), "o-1", b"not json")
            .await
            .unwrap_err();

        assert!(err.is_permanent());
        assert!(processor.client().confirmed().is_empty());
    }
}
