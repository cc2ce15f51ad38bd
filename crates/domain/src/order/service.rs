//! Order placement.

use common::topics::ORDERS_TOPIC;
use common::{Order, OrderOutcome};
use opentelemetry::trace::{Span, SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};

use crate::context::ServiceContext;

use super::{OrderError, PaymentAuthorizer, PlaceOrder};

/// Validates, authorizes and publishes orders.
pub struct OrderService<A: PaymentAuthorizer> {
    ctx: ServiceContext,
    authorizer: A,
}

impl<A: PaymentAuthorizer> OrderService<A> {
    pub fn new(ctx: ServiceContext, authorizer: A) -> Self {
        Self { ctx, authorizer }
    }

    pub fn authorizer(&self) -> &A {
        &self.authorizer
    }

    /// Places an order.
    ///
    /// Validation runs before anything else. A declined authorization returns
    /// [`OrderError::PaymentDeclined`] and publishes nothing. An accepted order
    /// gets a fresh id and is published once to the orders topic, keyed by
    /// that id.
    #[tracing::instrument(
        skip(self, cx, cmd),
        fields(customer_id = %cmd.customer_id, total_cents = cmd.total_cents)
    )]
    pub async fn place_order(&self, cx: &Context, cmd: PlaceOrder) -> Result<Order, OrderError> {
        if let Err(e) = cmd.validate() {
            tracing::warn!(error = %e, "Order rejected");
            return Err(e.into());
        }

        let tracer = self.ctx.telemetry.tracer();
        let metrics = self.ctx.telemetry.metrics();

        let span = tracer
            .span_builder("PlaceOrder")
            .with_kind(SpanKind::Internal)
            .with_attributes(vec![
                KeyValue::new("order.customer_id", cmd.customer_id.clone()),
                KeyValue::new("order.total_cents", cmd.total_cents),
                KeyValue::new("order.items_count", cmd.items.len() as i64),
            ])
            .start_with_context(tracer, cx);
        let cx = cx.with_span(span);

        let mut validate_span = tracer.start_with_context("ValidatePayment", &cx);
        let authorization = self
            .authorizer
            .authorize(&cmd.customer_id, cmd.total_cents)
            .await;
        validate_span.set_attribute(KeyValue::new(
            "payment.declined",
            authorization.is_declined(),
        ));

        if authorization.is_declined() {
            validate_span.set_status(Status::error("payment declined"));
            validate_span.end();

            let span = cx.span();
            span.set_status(Status::error("payment declined"));
            span.end();

            metrics.order_outcome(OrderOutcome::Declined);
            tracing::warn!("Payment declined");
            return Err(OrderError::PaymentDeclined);
        }
        validate_span.set_status(Status::Ok);
        validate_span.end();

        let order = Order::new(cmd.customer_id, cmd.items, cmd.total_cents);
        cx.span()
            .set_attribute(KeyValue::new("order.id", order.id.to_string()));

        if let Err(e) = self
            .ctx
            .producer
            .publish(&cx, ORDERS_TOPIC, order.id.as_str(), &order)
            .await
        {
            let span = cx.span();
            span.record_error(&e);
            span.set_status(Status::error(e.to_string()));
            span.end();

            metrics.order_outcome(OrderOutcome::Error);
            tracing::error!(order_id = %order.id, error = %e, "Failed to publish order");
            return Err(OrderError::Publish(e));
        }

        metrics.order_outcome(OrderOutcome::Ok);
        metrics.record_order_value(order.total_cents);

        let span = cx.span();
        span.set_status(Status::Ok);
        span.end();

        tracing::info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            total_cents = order.total_cents,
            "Order placed"
        );

        Ok(order)
    }
}

impl<A: PaymentAuthorizer + std::fmt::Debug> std::fmt::Debug for OrderService<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("authorizer", &self.authorizer)
            .finish_non_exhaustive()
    }
}
