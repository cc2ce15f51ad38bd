//! In-memory broker for tests and local runs.
//!
//! Topics are partitioned logs, readers belong to consumer groups and commits
//! are tracked per group and partition, so redelivery semantics match Kafka
//! closely enough to test the consumer loop without a cluster.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::broker::{MessageReader, MessageWriter, TopicAdmin, TopicSpec, TopicStatus};
use crate::envelope::{Envelope, OutgoingMessage};
use crate::error::{Result, TransportError};

#[derive(Debug, Clone)]
struct StoredMessage {
    key: String,
    value: Vec<u8>,
    headers: crate::carrier::MessageHeaders,
}

#[derive(Debug, Default)]
struct BrokerState {
    topics: HashMap<String, Vec<Vec<StoredMessage>>>,
    /// Last processed offset per (group, topic, partition).
    commits: HashMap<(String, String, i32), i64>,
    fail_on_write: bool,
    fail_on_commit: bool,
    fail_on_rewind: bool,
}

impl BrokerState {
    fn envelope(&self, topic: &str, partition: i32, offset: i64) -> Option<Envelope> {
        let log = self.topics.get(topic)?.get(partition as usize)?;
        let stored = log.get(usize::try_from(offset).ok()?)?;
        Some(Envelope {
            topic: topic.to_string(),
            key: stored.key.clone(),
            value: stored.value.clone(),
            headers: stored.headers.clone(),
            partition,
            offset,
        })
    }
}

/// In-memory broker implementing writer, reader and admin capabilities.
///
/// Clones share state. Writing to an unknown topic creates it with a single
/// partition; use [`TopicAdmin::create_topic`] first for more.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    appended: Arc<watch::Sender<u64>>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(BrokerState::default())),
            appended: Arc::new(appended),
        }
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a reader for `topic` in consumer group `group_id`, positioned
    /// after the group's committed offsets.
    pub fn reader(&self, topic: impl Into<String>, group_id: impl Into<String>) -> InMemoryReader {
        InMemoryReader {
            broker: self.clone(),
            topic: topic.into(),
            group_id: group_id.into(),
            positions: HashMap::new(),
            appended: self.appended.subscribe(),
        }
    }

    /// Makes every subsequent write fail with [`TransportError::Rejected`].
    pub fn set_fail_on_write(&self, fail: bool) {
        self.state().fail_on_write = fail;
    }

    /// Makes every subsequent commit fail.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.state().fail_on_commit = fail;
    }

    /// Makes every subsequent rewind fail.
    pub fn set_fail_on_rewind(&self, fail: bool) {
        self.state().fail_on_rewind = fail;
    }

    /// Returns the last offset committed by `group_id` on a partition.
    pub fn committed_offset(&self, group_id: &str, topic: &str, partition: i32) -> Option<i64> {
        self.state()
            .commits
            .get(&(group_id.to_string(), topic.to_string(), partition))
            .copied()
    }

    /// Returns every message on `topic`, ordered by partition then offset.
    pub fn messages(&self, topic: &str) -> Vec<Envelope> {
        let state = self.state();
        let Some(partitions) = state.topics.get(topic) else {
            return Vec::new();
        };
        let mut messages = Vec::new();
        for (partition, log) in partitions.iter().enumerate() {
            for offset in 0..log.len() {
                if let Some(envelope) = state.envelope(topic, partition as i32, offset as i64) {
                    messages.push(envelope);
                }
            }
        }
        messages
    }

    /// Returns the partition count of `topic`, if it exists.
    pub fn partition_count(&self, topic: &str) -> Option<i32> {
        self.state().topics.get(topic).map(|p| p.len() as i32)
    }
}

fn partition_for(key: &str, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % partitions as u64) as usize
}

#[async_trait]
impl MessageWriter for InMemoryBroker {
    async fn write(&self, topic: &str, message: OutgoingMessage) -> Result<()> {
        {
            let mut state = self.state();
            if state.fail_on_write {
                return Err(TransportError::Rejected(format!(
                    "write to {topic} refused"
                )));
            }

            let partitions = state
                .topics
                .entry(topic.to_string())
                .or_insert_with(|| vec![Vec::new()]);
            let partition = partition_for(&message.key, partitions.len());
            partitions[partition].push(StoredMessage {
                key: message.key,
                value: message.value,
                headers: message.headers,
            });
        }
        self.appended.send_modify(|version| *version += 1);
        Ok(())
    }
}

#[async_trait]
impl TopicAdmin for InMemoryBroker {
    async fn create_topic(&self, spec: &TopicSpec) -> Result<TopicStatus> {
        if spec.partitions < 1 {
            return Err(TransportError::Rejected(format!(
                "invalid partition count {} for {}",
                spec.partitions, spec.name
            )));
        }

        let mut state = self.state();
        if state.topics.contains_key(&spec.name) {
            return Ok(TopicStatus::AlreadyExists);
        }
        state
            .topics
            .insert(spec.name.clone(), vec![Vec::new(); spec.partitions as usize]);
        Ok(TopicStatus::Created)
    }
}

/// Reader over one topic of an [`InMemoryBroker`] for one consumer group.
#[derive(Debug)]
pub struct InMemoryReader {
    broker: InMemoryBroker,
    topic: String,
    group_id: String,
    /// Next offset to fetch per partition.
    positions: HashMap<i32, i64>,
    appended: watch::Receiver<u64>,
}

impl InMemoryReader {
    fn next_available(&mut self) -> Option<Envelope> {
        let state = self.broker.state();
        let partitions = state.topics.get(&self.topic)?.len() as i32;

        for partition in 0..partitions {
            let position = *self.positions.entry(partition).or_insert_with(|| {
                state
                    .commits
                    .get(&(self.group_id.clone(), self.topic.clone(), partition))
                    .map_or(0, |committed| committed + 1)
            });
            if let Some(envelope) = state.envelope(&self.topic, partition, position) {
                self.positions.insert(partition, position + 1);
                return Some(envelope);
            }
        }
        None
    }
}

#[async_trait]
impl MessageReader for InMemoryReader {
    async fn fetch(&mut self) -> Result<Envelope> {
        loop {
            self.appended.borrow_and_update();
            if let Some(envelope) = self.next_available() {
                return Ok(envelope);
            }
            self.appended
                .changed()
                .await
                .map_err(|_| TransportError::Unavailable("broker closed".to_string()))?;
        }
    }

    async fn commit(&mut self, envelope: &Envelope) -> Result<()> {
        let mut state = self.broker.state();
        if state.fail_on_commit {
            return Err(TransportError::Rejected(format!(
                "commit of {}/{} refused",
                envelope.partition, envelope.offset
            )));
        }
        state.commits.insert(
            (self.group_id.clone(), envelope.topic.clone(), envelope.partition),
            envelope.offset,
        );
        Ok(())
    }

    async fn rewind(&mut self, envelope: &Envelope) -> Result<()> {
        if self.broker.state().fail_on_rewind {
            return Err(TransportError::Rejected(format!(
                "seek to {}/{} refused",
                envelope.partition, envelope.offset
            )));
        }
        self.positions.insert(envelope.partition, envelope.offset);
        Ok(())
    }
}
