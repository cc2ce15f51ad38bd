//! Runs the order and payment consumer loops.

use std::sync::Arc;

use api::config::{CONSUMER_PORT, Config};
use common::Telemetry;
use common::topics::{ORDER_PROCESSOR_GROUP, ORDERS_TOPIC, PAYMENT_PROCESSOR_GROUP, PAYMENTS_TOPIC};
use domain::ServiceContext;
use messaging::{Consumer, KafkaReader, KafkaSettings, Producer};
use saga::{HttpConfirmationClient, OrderProcessor, PaymentProcessor};
use tokio_util::sync::CancellationToken;

const SERVICE_NAME: &str = "consumer";

fn consumer(
    kafka: &KafkaSettings,
    topic: &str,
    group_id: &str,
    telemetry: &Telemetry,
    dead_letter: Option<(&Producer, &str)>,
) -> Result<Consumer<KafkaReader>, messaging::TransportError> {
    let consumer = Consumer::new(kafka.reader(topic, group_id)?, topic, group_id, telemetry.clone());
    Ok(match dead_letter {
        Some((producer, dlq)) => consumer.with_dead_letter(producer.clone(), dlq),
        None => consumer,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env(CONSUMER_PORT);
    let guard = api::telemetry::init(SERVICE_NAME, &config)?;

    let shutdown = CancellationToken::new();
    api::shutdown::cancel_on_signal(shutdown.clone());

    let kafka = KafkaSettings::new(&config.kafka_broker);
    api::provision_topic(&kafka, PAYMENTS_TOPIC).await;
    if let Some(dlq) = &config.dead_letter_topic {
        api::provision_topic(&kafka, dlq).await;
    }

    let telemetry = Telemetry::new(SERVICE_NAME);
    let producer = Producer::new(Arc::new(kafka.writer()?), telemetry.clone());
    let dead_letter = config
        .dead_letter_topic
        .as_deref()
        .map(|dlq| (&producer, dlq));

    let order_processor = OrderProcessor::new(ServiceContext::new(telemetry.clone(), producer.clone()));
    let payment_processor = PaymentProcessor::new(
        telemetry.clone(),
        HttpConfirmationClient::new(&config.payment_api_addr)?,
    );

    let mut orders = consumer(&kafka, ORDERS_TOPIC, ORDER_PROCESSOR_GROUP, &telemetry, dead_letter)?;
    let mut payments = consumer(
        &kafka,
        PAYMENTS_TOPIC,
        PAYMENT_PROCESSOR_GROUP,
        &telemetry,
        dead_letter,
    )?;

    let addr = config.addr();
    let ops = api::serve_or_cancel(
        api::create_ops_app(guard.metrics_handle()),
        &addr,
        shutdown.clone(),
    );

    let token = shutdown.clone();
    let order_loop = tokio::spawn(async move {
        let result = orders.listen(token.clone(), &order_processor).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "order consumer stopped");
            token.cancel();
        }
        result
    });

    let token = shutdown.clone();
    let payment_loop = tokio::spawn(async move {
        let result = payments.listen(token.clone(), &payment_processor).await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "payment consumer stopped");
            token.cancel();
        }
        result
    });

    let (served, orders_done, payments_done) = tokio::join!(ops, order_loop, payment_loop);

    guard.shutdown();
    served?;
    orders_done??;
    payments_done??;
    tracing::info!("consumer shut down gracefully");
    Ok(())
}
