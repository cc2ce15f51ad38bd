use common::{OrderId, Payment, Telemetry};
use messaging::propagation::effective_customer_id;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::PaymentError;

/// Body of a payment confirmation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmPayment {
    pub order_id: String,
    pub customer_id: String,
    pub total_cents: i64,
}

impl ConfirmPayment {
    pub fn new(order_id: impl Into<String>, customer_id: impl Into<String>, total_cents: i64) -> Self {
        Self {
            order_id: order_id.into(),
            customer_id: customer_id.into(),
            total_cents,
        }
    }
}

impl From<&Payment> for ConfirmPayment {
    fn from(payment: &Payment) -> Self {
        Self {
            order_id: payment.order_id.to_string(),
            customer_id: payment.customer_id.clone(),
            total_cents: payment.total_cents,
        }
    }
}

/// Confirms payments. Stateless: confirming the same order twice yields two
/// confirmed records.
#[derive(Debug, Clone)]
pub struct PaymentService {
    telemetry: Telemetry,
}

impl PaymentService {
    pub fn new(telemetry: Telemetry) -> Self {
        Self { telemetry }
    }

    /// Returns a confirmed payment for `cmd`.
    ///
    /// A `customer_id` baggage entry on `cx` replaces the customer named in
    /// the request.
    #[tracing::instrument(skip(self, cx, cmd), fields(order_id = %cmd.order_id))]
    pub async fn confirm_payment(
        &self,
        cx: &Context,
        cmd: ConfirmPayment,
    ) -> Result<Payment, PaymentError> {
        if cmd.order_id.is_empty() {
            tracing::warn!("Payment confirmation rejected: missing order_id");
            return Err(ValidationError::OrderIdRequired.into());
        }

        let customer_id = effective_customer_id(cx, &cmd.customer_id);

        let tracer = self.telemetry.tracer();
        let span = tracer
            .span_builder("ConfirmPayment")
            .with_kind(SpanKind::Internal)
            .with_attributes(vec![
                KeyValue::new("payment.order_id", cmd.order_id.clone()),
                KeyValue::new("payment.customer_id", customer_id.clone()),
                KeyValue::new("payment.total_cents", cmd.total_cents),
                KeyValue::new("payment.status", "confirmed"),
            ])
            .start_with_context(tracer, cx);
        let cx = cx.with_span(span);

        let payment = Payment::confirmed(OrderId::new(cmd.order_id), customer_id, cmd.total_cents);
        self.telemetry.metrics().payment_confirmed();

        let span = cx.span();
        span.set_status(Status::Ok);
        span.end();

        tracing::info!(
            order_id = %payment.order_id,
            customer_id = %payment.customer_id,
            total_cents = payment.total_cents,
            "Payment confirmed"
        );

        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PaymentStatus;
    use messaging::propagation::with_customer_id;

    fn service() -> PaymentService {
        PaymentService::new(Telemetry::new("payment-service-test"))
    }

    #[tokio::test]
    async fn test_confirm_payment() {
        let payment = service()
            .confirm_payment(&Context::new(), ConfirmPayment::new("o-1", "bob", 300))
            .await
            .unwrap();

        assert_eq!(payment.order_id.as_str(), "o-1");
        assert_eq!(payment.customer_id, "bob");
        assert_eq!(payment.total_cents, 300);
        assert_eq!(payment.status, PaymentStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_baggage_overrides_request_customer() {
        let cx = with_customer_id(&Context::new(), "X");
        let payment = service()
            .confirm_payment(&cx, ConfirmPayment::new("o-1", "Y", 300))
            .await
            .unwrap();

        assert_eq!(payment.customer_id, "X");
    }

    #[tokio::test]
    async fn test_missing_order_id() {
        let err = service()
            .confirm_payment(&Context::new(), ConfirmPayment::new("", "bob", 300))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PaymentError::Validation(ValidationError::OrderIdRequired)
        ));
    }

    #[tokio::test]
    async fn test_whitespace_order_id_is_accepted() {
        let payment = service()
            .confirm_payment(&Context::new(), ConfirmPayment::new(" ", "bob", 300))
            .await
            .unwrap();

        assert_eq!(payment.order_id.as_str(), " ");
    }

    #[tokio::test]
    async fn test_duplicate_confirmations_accepted() {
        let service = service();
        let cmd = ConfirmPayment::new("o-1", "bob", 300);

        let first = service.confirm_payment(&Context::new(), cmd.clone()).await.unwrap();
        let second = service.confirm_payment(&Context::new(), cmd).await.unwrap();

        assert_eq!(first.order_id, second.order_id);
    }
}
