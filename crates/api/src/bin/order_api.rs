//! Order service: accepts orders over HTTP and publishes them to Kafka.

use std::sync::Arc;

use api::config::{Config, ORDER_API_PORT};
use common::Telemetry;
use common::topics::ORDERS_TOPIC;
use domain::{OrderService, RandomAuthorizer, ServiceContext};
use messaging::{KafkaSettings, Producer};
use tokio_util::sync::CancellationToken;

const SERVICE_NAME: &str = "order-api";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env(ORDER_API_PORT);
    let guard = api::telemetry::init(SERVICE_NAME, &config)?;

    let shutdown = CancellationToken::new();
    api::shutdown::cancel_on_signal(shutdown.clone());

    let kafka = KafkaSettings::new(&config.kafka_broker);
    api::provision_topic(&kafka, ORDERS_TOPIC).await;

    let telemetry = Telemetry::new(SERVICE_NAME);
    let producer = Producer::new(Arc::new(kafka.writer()?), telemetry.clone());
    let orders = OrderService::new(
        ServiceContext::new(telemetry.clone(), producer),
        RandomAuthorizer::default(),
    );

    let app = api::create_order_app(orders, telemetry, guard.metrics_handle());
    api::serve(app, &config.addr(), shutdown).await?;

    tracing::info!("order-api shut down gracefully");
    guard.shutdown();
    Ok(())
}
