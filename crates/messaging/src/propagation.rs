//! Trace context and baggage propagation shared by every hop.

use std::sync::LazyLock;

use common::topics::CUSTOMER_ID_BAGGAGE;
use opentelemetry::baggage::BaggageExt;
use opentelemetry::propagation::{
    Extractor, Injector, TextMapCompositePropagator, TextMapPropagator,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};

static PROPAGATOR: LazyLock<TextMapCompositePropagator> = LazyLock::new(|| {
    TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ])
});

/// Writes `traceparent` and `baggage` for `cx` into `carrier`.
pub fn inject_context(cx: &Context, carrier: &mut dyn Injector) {
    PROPAGATOR.inject_context(cx, carrier);
}

/// Reads a context from `carrier`. Missing or malformed headers yield an
/// empty context rather than an error.
pub fn extract_context(carrier: &dyn Extractor) -> Context {
    PROPAGATOR.extract(carrier)
}

/// Returns `cx` with the `customer_id` baggage entry set.
pub fn with_customer_id(cx: &Context, customer_id: &str) -> Context {
    cx.with_baggage(vec![KeyValue::new(
        CUSTOMER_ID_BAGGAGE,
        customer_id.to_string(),
    )])
}

/// Returns the `customer_id` baggage entry if present and non-empty.
pub fn baggage_customer_id(cx: &Context) -> Option<String> {
    cx.baggage()
        .get(CUSTOMER_ID_BAGGAGE)
        .map(|v| v.as_str().into_owned())
        .filter(|v| !v.is_empty())
}

/// Customer identifier to act on: baggage wins over the payload value.
pub fn effective_customer_id(cx: &Context, payload_customer_id: &str) -> String {
    baggage_customer_id(cx).unwrap_or_else(|| payload_customer_id.to_string())
}
