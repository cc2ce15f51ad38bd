//! Payment confirmation endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use common::{Payment, Telemetry};
use domain::{ConfirmPayment, PaymentService};
use messaging::HeaderExtractor;
use messaging::propagation::extract_context;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};

use crate::error::ApiError;

/// Shared state of the payment service.
pub struct PaymentState {
    pub payments: PaymentService,
    pub telemetry: Telemetry,
}

/// POST /payments/confirm
pub async fn confirm(
    State(state): State<Arc<PaymentState>>,
    headers: HeaderMap,
    body: Result<Json<ConfirmPayment>, JsonRejection>,
) -> Result<Json<Payment>, ApiError> {
    let parent = extract_context(&HeaderExtractor(&headers));
    let tracer = state.telemetry.tracer();
    let span = tracer
        .span_builder("POST /payments/confirm")
        .with_kind(SpanKind::Server)
        .start_with_context(tracer, &parent);
    let cx = parent.with_span(span);

    let result = match body {
        Ok(Json(cmd)) => state
            .payments
            .confirm_payment(&cx, cmd)
            .await
            .map_err(ApiError::from),
        Err(rejection) => Err(rejection.into()),
    };

    let span = cx.span();
    match &result {
        Ok(_) => span.set_status(Status::Ok),
        Err(err) => span.set_status(Status::error(err.to_string())),
    }
    span.end();

    result.map(Json)
}
