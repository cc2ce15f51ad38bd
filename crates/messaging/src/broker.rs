//! Broker capabilities used by the producer, consumer and provisioner.
//!
//! Each capability is a trait so the pipeline can run against Kafka in
//! production and against [`InMemoryBroker`](crate::InMemoryBroker) in tests.

use async_trait::async_trait;

use crate::envelope::{Envelope, OutgoingMessage};
use crate::error::Result;

/// Writes messages to a topic.
#[async_trait]
pub trait MessageWriter: Send + Sync {
    /// Writes one message and waits for the broker's acknowledgement.
    async fn write(&self, topic: &str, message: OutgoingMessage) -> Result<()>;
}

/// Reads messages for one topic on behalf of one consumer group.
#[async_trait]
pub trait MessageReader: Send {
    /// Waits for the next message.
    async fn fetch(&mut self) -> Result<Envelope>;

    /// Records `envelope` as processed for the group.
    async fn commit(&mut self, envelope: &Envelope) -> Result<()>;

    /// Repositions the reader so `envelope` is the next message fetched from
    /// its partition.
    async fn rewind(&mut self, envelope: &Envelope) -> Result<()>;
}

/// Topic layout requested from the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication: i32,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, partitions: i32, replication: i32) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication,
        }
    }
}

/// Result of a topic creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicStatus {
    Created,
    AlreadyExists,
}

/// Creates topics.
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicStatus>;
}
