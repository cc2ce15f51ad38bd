//! HTTP services and process wiring for the order pipeline.
//!
//! Provides the order and payment routers, the operational router served by
//! every process, configuration, telemetry bootstrap, signal handling and
//! the load generator used by the four binaries.

pub mod config;
pub mod error;
pub mod loadgen;
pub mod routes;
pub mod shutdown;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::Telemetry;
use common::topics::{DEFAULT_PARTITIONS, DEFAULT_REPLICATION};
use domain::{OrderService, PaymentAuthorizer, PaymentService};
use messaging::{KafkaSettings, TopicSpec, ensure_topic};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::OrderState;
use routes::payments::PaymentState;

/// Creates the router with `/health` and `/metrics`.
pub fn create_ops_app(metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .merge(metrics_router)
}

/// Creates the order service router.
pub fn create_order_app<A: PaymentAuthorizer + 'static>(
    orders: OrderService<A>,
    telemetry: Telemetry,
    metrics_handle: PrometheusHandle,
) -> Router {
    let state = Arc::new(OrderState { orders, telemetry });

    Router::new()
        .route("/orders", post(routes::orders::create::<A>))
        .with_state(state)
        .merge(create_ops_app(metrics_handle))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the payment confirmation service router.
pub fn create_payment_app(
    payments: PaymentService,
    telemetry: Telemetry,
    metrics_handle: PrometheusHandle,
) -> Router {
    let state = Arc::new(PaymentState {
        payments,
        telemetry,
    });

    Router::new()
        .route("/payments/confirm", post(routes::payments::confirm))
        .with_state(state)
        .merge(create_ops_app(metrics_handle))
        .layer(TraceLayer::new_for_http())
}

/// Serves `app` on `addr` until `shutdown` is cancelled.
pub async fn serve(app: Router, addr: &str, shutdown: CancellationToken) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Like [`serve`], but cancels `shutdown` when the server fails so that
/// sibling tasks sharing the token stop too.
pub async fn serve_or_cancel(
    app: Router,
    addr: &str,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let result = serve(app, addr, shutdown.clone()).await;
    if let Err(error) = &result {
        tracing::error!(addr, %error, "server stopped");
        shutdown.cancel();
    }
    result
}

/// Provisions `topic` with the default layout.
///
/// Failures are logged and otherwise ignored: the broker may auto-create
/// topics, and a missing topic surfaces again on the first publish.
pub async fn provision_topic(kafka: &KafkaSettings, topic: &str) {
    let spec = TopicSpec::new(topic, DEFAULT_PARTITIONS, DEFAULT_REPLICATION);
    let result = match kafka.admin() {
        Ok(admin) => ensure_topic(&admin, &spec).await.map(|_| ()).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(error) = result {
        tracing::warn!(topic, %error, "failed to provision topic");
    }
}
