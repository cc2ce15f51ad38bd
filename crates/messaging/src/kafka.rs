//! Kafka backend built on `rdkafka`.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as _, StreamConsumer};
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::message::{Header, Headers, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Message, Offset, TopicPartitionList};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::broker::{MessageReader, MessageWriter, TopicAdmin, TopicSpec, TopicStatus};
use crate::carrier::MessageHeaders;
use crate::envelope::{Envelope, OutgoingMessage};
use crate::error::{Result, TransportError};

/// Connection settings shared by every Kafka client of a process.
#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
    /// librdkafka delivery timeout for produced messages.
    pub message_timeout: Duration,
    pub admin_timeout: Duration,
    pub seek_timeout: Duration,
}

impl KafkaSettings {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            message_timeout: Duration::from_secs(10),
            admin_timeout: Duration::from_secs(10),
            seek_timeout: Duration::from_secs(5),
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config.set("bootstrap.servers", &self.brokers);
        config
    }

    /// Creates a writer that waits for the partition leader's acknowledgement.
    pub fn writer(&self) -> Result<KafkaWriter> {
        let producer: FutureProducer = self
            .client_config()
            .set("acks", "1")
            .set(
                "message.timeout.ms",
                self.message_timeout.as_millis().to_string(),
            )
            .create()?;
        Ok(KafkaWriter {
            producer,
            queue_timeout: self.message_timeout,
        })
    }

    /// Creates a reader subscribed to `topic` as a member of `group_id`.
    ///
    /// Auto-commit is disabled; a group with no committed offset starts from
    /// the earliest message.
    pub fn reader(&self, topic: &str, group_id: &str) -> Result<KafkaReader> {
        let consumer: StreamConsumer = self
            .client_config()
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;
        consumer.subscribe(&[topic])?;
        Ok(KafkaReader {
            consumer,
            seek_timeout: self.seek_timeout,
        })
    }

    pub fn admin(&self) -> Result<KafkaAdmin> {
        let client: AdminClient<DefaultClientContext> = self.client_config().create()?;
        Ok(KafkaAdmin {
            client,
            operation_timeout: self.admin_timeout,
        })
    }
}

fn to_kafka_headers(headers: &MessageHeaders) -> OwnedHeaders {
    headers.iter().fold(OwnedHeaders::new(), |acc, h| {
        acc.insert(Header {
            key: h.key.as_str(),
            value: Some(h.value.as_str()),
        })
    })
}

fn from_kafka_headers<H: Headers>(headers: Option<&H>) -> MessageHeaders {
    let Some(headers) = headers else {
        return MessageHeaders::new();
    };
    headers
        .iter()
        .map(|h| {
            let value = h
                .value
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .unwrap_or_default();
            (h.key.to_string(), value)
        })
        .collect()
}

/// Kafka producer handle.
pub struct KafkaWriter {
    producer: FutureProducer,
    queue_timeout: Duration,
}

#[async_trait]
impl MessageWriter for KafkaWriter {
    async fn write(&self, topic: &str, message: OutgoingMessage) -> Result<()> {
        let record = FutureRecord::to(topic)
            .key(message.key.as_str())
            .payload(message.value.as_slice())
            .headers(to_kafka_headers(&message.headers));

        self.producer
            .send(record, self.queue_timeout)
            .await
            .map_err(|(e, _)| TransportError::Kafka(e))?;
        Ok(())
    }
}

/// Kafka group consumer bound to one topic.
pub struct KafkaReader {
    consumer: StreamConsumer,
    seek_timeout: Duration,
}

#[async_trait]
impl MessageReader for KafkaReader {
    async fn fetch(&mut self) -> Result<Envelope> {
        let message = self.consumer.recv().await?;
        Ok(Envelope {
            topic: message.topic().to_string(),
            key: message
                .key()
                .map(|k| String::from_utf8_lossy(k).into_owned())
                .unwrap_or_default(),
            value: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            headers: from_kafka_headers(message.headers()),
            partition: message.partition(),
            offset: message.offset(),
        })
    }

    async fn commit(&mut self, envelope: &Envelope) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets.add_partition_offset(
            &envelope.topic,
            envelope.partition,
            Offset::Offset(envelope.offset + 1),
        )?;
        blocking(|| self.consumer.commit(&offsets, CommitMode::Sync))?;
        Ok(())
    }

    async fn rewind(&mut self, envelope: &Envelope) -> Result<()> {
        blocking(|| {
            self.consumer.seek(
                &envelope.topic,
                envelope.partition,
                Offset::Offset(envelope.offset),
                self.seek_timeout,
            )
        })?;
        Ok(())
    }
}

/// Runs a synchronous librdkafka call. On a multi-threaded runtime the
/// worker is handed off with `block_in_place`; a current-thread runtime
/// has no other worker, so the call blocks it.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}

/// Kafka admin client.
pub struct KafkaAdmin {
    client: AdminClient<DefaultClientContext>,
    operation_timeout: Duration,
}

#[async_trait]
impl TopicAdmin for KafkaAdmin {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicStatus> {
        let topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication),
        );
        let options = AdminOptions::new().operation_timeout(Some(self.operation_timeout));

        let results = self
            .client
            .create_topics(&[topic], &options)
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        match results.into_iter().next() {
            Some(Ok(_)) => Ok(TopicStatus::Created),
            Some(Err((_, RDKafkaErrorCode::TopicAlreadyExists))) => Ok(TopicStatus::AlreadyExists),
            Some(Err((name, code))) => Err(TransportError::Rejected(format!("{name}: {code}"))),
            None => Err(TransportError::Rejected(format!(
                "no result for topic {}",
                spec.name
            ))),
        }
    }
}
