//! Order placement endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use common::{Order, Telemetry};
use domain::{OrderService, PaymentAuthorizer, PlaceOrder};
use messaging::HeaderExtractor;
use messaging::propagation::{extract_context, with_customer_id};
use opentelemetry::Context;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};

use crate::error::ApiError;

/// Shared state of the order service.
pub struct OrderState<A: PaymentAuthorizer> {
    pub orders: OrderService<A>,
    pub telemetry: Telemetry,
}

/// POST /orders
///
/// Validates, authorizes and publishes an order.
///
/// The request's trace context becomes the parent of the server span, and
/// the order's customer is attached as `customer_id` baggage for every
/// downstream hop.
pub async fn create<A: PaymentAuthorizer + 'static>(
    State(state): State<Arc<OrderState<A>>>,
    headers: HeaderMap,
    body: Result<Json<PlaceOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let parent = extract_context(&HeaderExtractor(&headers));
    let tracer = state.telemetry.tracer();
    let span = tracer
        .span_builder("POST /orders")
        .with_kind(SpanKind::Server)
        .start_with_context(tracer, &parent);
    let cx = parent.with_span(span);

    let result = place(&state, &cx, body).await;

    let span = cx.span();
    match &result {
        Ok(_) => span.set_status(Status::Ok),
        Err(err) => span.set_status(Status::error(err.to_string())),
    }
    span.end();

    result.map(|order| (StatusCode::CREATED, Json(order)))
}

async fn place<A: PaymentAuthorizer>(
    state: &OrderState<A>,
    cx: &Context,
    body: Result<Json<PlaceOrder>, JsonRejection>,
) -> Result<Order, ApiError> {
    let Json(cmd) = body?;

    let cx = if cmd.customer_id.is_empty() {
        cx.clone()
    } else {
        with_customer_id(cx, &cmd.customer_id)
    };

    match state.orders.place_order(&cx, cmd).await {
        Ok(order) => Ok(order),
        Err(err) => {
            let err = ApiError::from(err);
            if matches!(err, ApiError::PaymentDeclined) {
                tracing::warn!("payment declined");
            }
            Err(err)
        }
    }
}
