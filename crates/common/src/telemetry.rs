//! Tracer and metric handles shared by a service.
//!
//! A [`Telemetry`] value is created once at startup, after the process-wide
//! tracer provider and metrics recorder are installed, and is then cloned
//! into every component that emits spans or metrics.

use std::sync::Arc;

use metrics::{Counter, Histogram, Unit};
use opentelemetry::global::{self, BoxedTracer};

pub const MESSAGES_PUBLISHED: &str = "messages_published_total";
pub const MESSAGES_CONSUMED: &str = "messages_consumed_total";
pub const MESSAGE_PROCESSING_DURATION: &str = "message_processing_duration_seconds";
pub const ORDERS_CREATED: &str = "orders_created_total";
pub const PAYMENTS_CONFIRMED: &str = "payments_confirmed_total";
pub const ORDER_VALUE_CENTS: &str = "order_value_cents";
pub const HANDLER_FAILURES: &str = "consumer_handler_failures_total";
pub const MESSAGES_DEAD_LETTERED: &str = "messages_dead_lettered_total";

/// Histogram buckets for [`MESSAGE_PROCESSING_DURATION`], in seconds.
pub const PROCESSING_DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.2, 0.3, 0.5, 1.0];

/// Histogram buckets for [`ORDER_VALUE_CENTS`].
pub const ORDER_VALUE_BUCKETS: &[f64] = &[100.0, 500.0, 1000.0, 5000.0, 10000.0, 50000.0];

/// Outcome of a `place_order` call, used as the `status` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOutcome {
    Ok,
    Declined,
    Error,
}

impl OrderOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderOutcome::Ok => "ok",
            OrderOutcome::Declined => "declined",
            OrderOutcome::Error => "error",
        }
    }
}

/// Metric instruments used by the pipeline.
///
/// Fixed-label instruments are registered up front; instruments labelled by
/// topic or customer are resolved per call.
#[derive(Clone)]
pub struct Metrics {
    orders_ok: Counter,
    orders_declined: Counter,
    orders_error: Counter,
    payments_confirmed: Counter,
    order_value: Histogram,
    dead_lettered: Counter,
}

impl Metrics {
    /// Registers the instruments with the currently installed recorder.
    pub fn register() -> Self {
        metrics::describe_counter!(MESSAGES_PUBLISHED, Unit::Count, "Total messages published");
        metrics::describe_counter!(MESSAGES_CONSUMED, Unit::Count, "Total messages consumed");
        metrics::describe_histogram!(
            MESSAGE_PROCESSING_DURATION,
            Unit::Seconds,
            "Duration of message processing"
        );
        metrics::describe_counter!(ORDERS_CREATED, Unit::Count, "Total orders created");
        metrics::describe_counter!(PAYMENTS_CONFIRMED, Unit::Count, "Total payments confirmed");
        metrics::describe_histogram!(ORDER_VALUE_CENTS, "Order value in cents");
        metrics::describe_counter!(
            HANDLER_FAILURES,
            Unit::Count,
            "Messages left uncommitted after a handler failure"
        );
        metrics::describe_counter!(
            MESSAGES_DEAD_LETTERED,
            Unit::Count,
            "Messages forwarded to a dead-letter topic"
        );

        Self {
            orders_ok: metrics::counter!(ORDERS_CREATED, "status" => OrderOutcome::Ok.as_str()),
            orders_declined: metrics::counter!(
                ORDERS_CREATED,
                "status" => OrderOutcome::Declined.as_str()
            ),
            orders_error: metrics::counter!(
                ORDERS_CREATED,
                "status" => OrderOutcome::Error.as_str()
            ),
            payments_confirmed: metrics::counter!(PAYMENTS_CONFIRMED),
            order_value: metrics::histogram!(ORDER_VALUE_CENTS),
            dead_lettered: metrics::counter!(MESSAGES_DEAD_LETTERED),
        }
    }

    pub fn order_outcome(&self, outcome: OrderOutcome) {
        match outcome {
            OrderOutcome::Ok => self.orders_ok.increment(1),
            OrderOutcome::Declined => self.orders_declined.increment(1),
            OrderOutcome::Error => self.orders_error.increment(1),
        }
    }

    pub fn record_order_value(&self, total_cents: i64) {
        self.order_value.record(total_cents as f64);
    }

    pub fn payment_confirmed(&self) {
        self.payments_confirmed.increment(1);
    }

    pub fn message_published(&self, topic: &str) {
        metrics::counter!(MESSAGES_PUBLISHED, "topic" => topic.to_string()).increment(1);
    }

    pub fn message_consumed(&self, topic: &str, customer_id: &str) {
        metrics::counter!(
            MESSAGES_CONSUMED,
            "topic" => topic.to_string(),
            "customer_id" => customer_id.to_string()
        )
        .increment(1);
    }

    pub fn record_processing_time(&self, customer_id: &str, seconds: f64) {
        metrics::histogram!(MESSAGE_PROCESSING_DURATION, "customer_id" => customer_id.to_string())
            .record(seconds);
    }

    pub fn handler_failed(&self, topic: &str) {
        metrics::counter!(HANDLER_FAILURES, "topic" => topic.to_string()).increment(1);
    }

    pub fn message_dead_lettered(&self) {
        self.dead_lettered.increment(1);
    }
}

/// Tracer plus metric instruments for one service.
#[derive(Clone)]
pub struct Telemetry {
    service_name: &'static str,
    tracer: Arc<BoxedTracer>,
    metrics: Metrics,
}

impl Telemetry {
    /// Creates handles bound to the global tracer provider and metrics recorder.
    ///
    /// Without an installed provider or recorder both are no-ops, which is
    /// what unit tests rely on.
    pub fn new(service_name: &'static str) -> Self {
        Self {
            service_name,
            tracer: Arc::new(global::tracer(service_name)),
            metrics: Metrics::register(),
        }
    }

    pub fn service_name(&self) -> &'static str {
        self.service_name
    }

    pub fn tracer(&self) -> &BoxedTracer {
        &self.tracer
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("service_name", &self.service_name)
            .finish_non_exhaustive()
    }
}
