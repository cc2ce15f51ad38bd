//! End-to-end run of the whole pipeline in one process.
//!
//! The order router publishes to an in-memory broker, both consumer loops run
//! as tasks, and the payment router is served on an ephemeral port so the
//! confirmation callout goes over real HTTP.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::topics::{
    ORDER_PROCESSOR_GROUP, ORDERS_TOPIC, PAYMENT_PROCESSOR_GROUP, PAYMENTS_TOPIC,
};
use common::{Payment, Telemetry};
use domain::{OrderService, PaymentService, ServiceContext, StaticAuthorizer};
use messaging::{Consumer, ConsumerSettings, InMemoryBroker, Producer};
use metrics_exporter_prometheus::PrometheusBuilder;
use saga::{HttpConfirmationClient, OrderProcessor, PaymentProcessor};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const TRACE_ID: &str = "0af7651916cd43dd8448eb211c80319c";
const TRACEPARENT: &str = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";

async fn start_payment_api() -> String {
    let metrics = PrometheusBuilder::new().build_recorder().handle();
    let telemetry = Telemetry::new("payment-api");
    let app = api::create_payment_app(PaymentService::new(telemetry.clone()), telemetry, metrics);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn order_request_is_confirmed_by_payment_api() {
    let broker = InMemoryBroker::new();
    let payment_api = start_payment_api().await;
    let settings = ConsumerSettings {
        retry_backoff: Duration::from_millis(10),
    };

    let telemetry = Telemetry::new("consumer");
    let producer = Producer::new(Arc::new(broker.clone()), telemetry.clone());

    let order_app = api::create_order_app(
        OrderService::new(
            ServiceContext::new(telemetry.clone(), producer.clone()),
            StaticAuthorizer::approving(),
        ),
        telemetry.clone(),
        PrometheusBuilder::new().build_recorder().handle(),
    );

    let order_processor = OrderProcessor::new(ServiceContext::new(telemetry.clone(), producer))
        .with_delay(Duration::ZERO, Duration::from_millis(5));
    let payment_processor = PaymentProcessor::new(
        telemetry.clone(),
        HttpConfirmationClient::new(&payment_api).unwrap(),
    );

    let mut orders = Consumer::new(
        broker.reader(ORDERS_TOPIC, ORDER_PROCESSOR_GROUP),
        ORDERS_TOPIC,
        ORDER_PROCESSOR_GROUP,
        telemetry.clone(),
    )
    .with_settings(settings.clone());
    let mut payments = Consumer::new(
        broker.reader(PAYMENTS_TOPIC, PAYMENT_PROCESSOR_GROUP),
        PAYMENTS_TOPIC,
        PAYMENT_PROCESSOR_GROUP,
        telemetry,
    )
    .with_settings(settings);

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let order_loop = tokio::spawn(async move { orders.listen(token, &order_processor).await });
    let token = shutdown.clone();
    let payment_loop = tokio::spawn(async move { payments.listen(token, &payment_processor).await });

    let request = Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .header("traceparent", TRACEPARENT)
        .body(Body::from(
            serde_json::json!({"customer_id": "alice", "items": ["pen"], "total_cents": 500})
                .to_string(),
        ))
        .unwrap();
    let response = order_app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    tokio::time::timeout(Duration::from_secs(10), async {
        while broker.committed_offset(PAYMENT_PROCESSOR_GROUP, PAYMENTS_TOPIC, 0) != Some(0) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("payment was not confirmed in time");

    shutdown.cancel();
    order_loop.await.unwrap().unwrap();
    payment_loop.await.unwrap().unwrap();

    assert_eq!(
        broker.committed_offset(ORDER_PROCESSOR_GROUP, ORDERS_TOPIC, 0),
        Some(0)
    );

    let payments = broker.messages(PAYMENTS_TOPIC);
    assert_eq!(payments.len(), 1);
    let payment: Payment = serde_json::from_slice(&payments[0].value).unwrap();
    assert_eq!(payment.customer_id, "alice");
    assert_eq!(payment.total_cents, 500);

    let headers = &payments[0].headers;
    assert!(headers.get("traceparent").unwrap().contains(TRACE_ID));
    assert!(headers.get("baggage").unwrap().contains("customer_id=alice"));
}
