//! Process-wide logging, trace export and metrics bootstrap.

use common::telemetry::{
    MESSAGE_PROCESSING_DURATION, ORDER_VALUE_BUCKETS, ORDER_VALUE_CENTS,
    PROCESSING_DURATION_BUCKETS,
};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use opentelemetry::KeyValue;
use opentelemetry::trace::TraceError;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::{LogError, LoggerProvider};
use opentelemetry_sdk::runtime;
use opentelemetry_sdk::trace::TracerProvider;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::config::Config;

/// Crates whose events stay out of the OTLP log pipeline, along with every
/// `opentelemetry*` crate. Their events are emitted while exporting and
/// would feed back into it.
const EXPORT_INTERNAL_CRATES: [&str; 5] = ["tonic", "h2", "hyper", "hyper_util", "tower"];

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),

    #[error("failed to build span exporter: {0}")]
    Exporter(#[from] TraceError),

    #[error("failed to build log exporter: {0}")]
    LogExporter(#[from] LogError),

    #[error("failed to install Prometheus recorder: {0}")]
    Metrics(#[from] BuildError),
}

/// Keeps the tracer and logger providers alive and flushes them on
/// [`shutdown`](Self::shutdown).
pub struct TelemetryGuard {
    tracer_provider: TracerProvider,
    logger_provider: LoggerProvider,
    metrics: PrometheusHandle,
}

impl TelemetryGuard {
    pub fn metrics_handle(&self) -> PrometheusHandle {
        self.metrics.clone()
    }

    /// Exports buffered spans and log records and stops both providers.
    pub fn shutdown(self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            tracing::warn!(error = %e, "tracer provider shutdown failed");
        }
        if let Err(e) = self.logger_provider.shutdown() {
            tracing::warn!(error = %e, "logger provider shutdown failed");
        }
    }
}

/// Installs the log subscriber, the OTLP tracer and logger providers and
/// the Prometheus recorder for `service_name`.
///
/// Events are written as JSON to stdout and also exported as OTLP log
/// records, correlated with the active span.
///
/// Must run inside a tokio runtime and before any
/// [`Telemetry`](common::Telemetry) handle is created.
pub fn init(service_name: &'static str, config: &Config) -> Result<TelemetryGuard, TelemetryError> {
    let resource = Resource::new(vec![KeyValue::new("service.name", service_name)]);

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;
    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(span_exporter, runtime::Tokio)
        .with_resource(resource.clone())
        .build();

    let log_exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;
    let logger_provider = LoggerProvider::builder()
        .with_batch_exporter(log_exporter, runtime::Tokio)
        .with_resource(resource)
        .build();

    let otlp_logs = OpenTelemetryTracingBridge::new(&logger_provider)
        .with_filter(filter_fn(|meta| exported_as_log(meta.target())));

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .with(otlp_logs)
        .try_init()?;

    opentelemetry::global::set_tracer_provider(tracer_provider.clone());

    let metrics = install_metrics_recorder()?;

    tracing::info!(
        service = service_name,
        otlp_endpoint = %config.otlp_endpoint,
        "telemetry initialized"
    );

    Ok(TelemetryGuard {
        tracer_provider,
        logger_provider,
        metrics,
    })
}

fn exported_as_log(target: &str) -> bool {
    let krate = target.split("::").next().unwrap_or(target);
    !(krate.starts_with("opentelemetry") || EXPORT_INTERNAL_CRATES.contains(&krate))
}

/// Builds the Prometheus builder with the pipeline's histogram buckets.
pub fn prometheus_builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(MESSAGE_PROCESSING_DURATION.to_string()),
            PROCESSING_DURATION_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(ORDER_VALUE_CENTS.to_string()),
            ORDER_VALUE_BUCKETS,
        )
}

/// Installs the global Prometheus recorder.
pub fn install_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    prometheus_builder()?.install_recorder()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accepts_buckets() {
        let handle = prometheus_builder().unwrap().build_recorder().handle();
        assert!(handle.render().is_empty());
    }

    #[test]
    fn test_application_events_are_exported_as_logs() {
        assert!(exported_as_log("consumer"));
        assert!(exported_as_log("saga::payment_processor"));
        assert!(exported_as_log("messaging::consumer"));
        assert!(exported_as_log("hyperion"));
    }

    #[test]
    fn test_exporter_internals_are_not_exported_as_logs() {
        assert!(!exported_as_log("opentelemetry_sdk"));
        assert!(!exported_as_log("opentelemetry"));
        assert!(!exported_as_log("tonic::transport"));
        assert!(!exported_as_log("h2::codec"));
        assert!(!exported_as_log("hyper"));
    }
}
