//! Kafka integration tests
//!
//! These tests share one Kafka container and need Docker. Run with:
//!
//! ```bash
//! cargo test -p messaging --test kafka_integration -- --ignored --test-threads=1
//! ```

#![cfg(feature = "kafka")]

use std::sync::Arc;
use std::time::Duration;

use common::Telemetry;
use messaging::propagation::{baggage_customer_id, extract_context, with_customer_id};
use messaging::{
    KafkaSettings, MessageReader, Producer, TopicSpec, TopicStatus, ensure_topic,
};
use opentelemetry::Context;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Kafka>,
    brokers: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Kafka::default().start().await.unwrap();
            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(KAFKA_PORT).await.unwrap();

            Arc::new(ContainerInfo {
                container,
                brokers: format!("{}:{}", host, port),
            })
        })
        .await
        .clone()
}

async fn settings() -> KafkaSettings {
    KafkaSettings::new(get_container_info().await.brokers.clone())
}

fn unique_topic(prefix: &str) -> String {
    format!("{}-{}", prefix, unique_suffix())
}

fn unique_suffix() -> String {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_ensure_topic_twice() {
    let settings = settings().await;
    let admin = settings.admin().unwrap();
    let spec = TopicSpec::new(unique_topic("orders"), 3, 1);

    assert_eq!(ensure_topic(&admin, &spec).await.unwrap(), TopicStatus::Created);
    assert_eq!(
        ensure_topic(&admin, &spec).await.unwrap(),
        TopicStatus::AlreadyExists
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_publish_and_fetch_with_baggage() {
    let settings = settings().await;
    let topic = unique_topic("payments");
    ensure_topic(&settings.admin().unwrap(), &TopicSpec::new(topic.clone(), 3, 1))
        .await
        .unwrap();

    let producer = Producer::new(
        Arc::new(settings.writer().unwrap()),
        Telemetry::new("kafka-test"),
    );
    let cx = with_customer_id(&Context::new(), "carol");
    producer
        .publish(&cx, &topic, "o-7", &serde_json::json!({"order_id": "o-7"}))
        .await
        .unwrap();

    let mut reader = settings.reader(&topic, "kafka-test-group").unwrap();
    let envelope = tokio::time::timeout(Duration::from_secs(30), reader.fetch())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(envelope.key, "o-7");
    let extracted = extract_context(&envelope.headers);
    assert_eq!(baggage_customer_id(&extracted).as_deref(), Some("carol"));

    reader.commit(&envelope).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_rewind_redelivers_message() {
    let settings = settings().await;
    let topic = unique_topic("rewind");
    ensure_topic(&settings.admin().unwrap(), &TopicSpec::new(topic.clone(), 1, 1))
        .await
        .unwrap();

    let producer = Producer::new(
        Arc::new(settings.writer().unwrap()),
        Telemetry::new("kafka-test"),
    );
    producer
        .publish(&Context::new(), &topic, "k", &"once")
        .await
        .unwrap();

    let mut reader = settings.reader(&topic, "kafka-rewind-group").unwrap();
    let first = tokio::time::timeout(Duration::from_secs(30), reader.fetch())
        .await
        .unwrap()
        .unwrap();
    reader.rewind(&first).await.unwrap();
    let again = tokio::time::timeout(Duration::from_secs(30), reader.fetch())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(again.offset, first.offset);
    assert_eq!(again.value, first.value);
}
