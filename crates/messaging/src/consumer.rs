//! At-least-once consumer loop.
//!
//! Messages are handled one at a time. A message is committed only after its
//! handler succeeds; a failed message is fetched again (or, for permanent
//! failures with a dead-letter topic configured, moved aside) before anything
//! after it on the same partition is committed.

use std::time::Duration;

use common::Telemetry;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use tokio_util::sync::CancellationToken;

use crate::broker::MessageReader;
use crate::envelope::{Envelope, OutgoingMessage};
use crate::error::{ConsumeError, HandlerError};
use crate::handler::MessageHandler;
use crate::producer::Producer;
use crate::propagation::extract_context;

/// Pause before a failed message is fetched again.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

pub const DEAD_LETTER_TOPIC_HEADER: &str = "x-dead-letter-topic";
pub const DEAD_LETTER_PARTITION_HEADER: &str = "x-dead-letter-partition";
pub const DEAD_LETTER_OFFSET_HEADER: &str = "x-dead-letter-offset";
pub const DEAD_LETTER_GROUP_HEADER: &str = "x-dead-letter-group";
pub const DEAD_LETTER_ERROR_HEADER: &str = "x-dead-letter-error";

/// Consumer tuning.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Delay before redelivering a failed message. Interrupted by shutdown.
    pub retry_backoff: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

#[derive(Debug, Clone)]
struct DeadLetter {
    producer: Producer,
    topic: String,
}

/// Consumes one topic on behalf of one consumer group.
pub struct Consumer<R> {
    reader: R,
    topic: String,
    group_id: String,
    telemetry: Telemetry,
    settings: ConsumerSettings,
    dead_letter: Option<DeadLetter>,
}

impl<R: MessageReader> Consumer<R> {
    pub fn new(
        reader: R,
        topic: impl Into<String>,
        group_id: impl Into<String>,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            reader,
            topic: topic.into(),
            group_id: group_id.into(),
            telemetry,
            settings: ConsumerSettings::default(),
            dead_letter: None,
        }
    }

    pub fn with_settings(mut self, settings: ConsumerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Routes messages whose handler fails permanently to `topic`.
    pub fn with_dead_letter(mut self, producer: Producer, topic: impl Into<String>) -> Self {
        self.dead_letter = Some(DeadLetter {
            producer,
            topic: topic.into(),
        });
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Runs the fetch-handle-commit loop until `shutdown` is cancelled.
    ///
    /// Returns `Ok(())` on cancellation. A message fetched but not yet
    /// committed at that point stays uncommitted. Fetch, commit and rewind
    /// failures end the loop with an error.
    #[tracing::instrument(skip_all, fields(topic = %self.topic, group_id = %self.group_id))]
    pub async fn listen<H>(
        &mut self,
        shutdown: CancellationToken,
        handler: &H,
    ) -> Result<(), ConsumeError>
    where
        H: MessageHandler + ?Sized,
    {
        tracing::info!("Consumer started");

        loop {
            let envelope = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Consumer stopping");
                    return Ok(());
                }
                fetched = self.reader.fetch() => match fetched {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to fetch message");
                        return Err(ConsumeError::Fetch(e));
                    }
                },
            };

            let cx = self.start_span(&envelope);

            match handler.handle(&cx, &envelope.key, &envelope.value).await {
                Ok(()) => {
                    let span = cx.span();
                    span.set_status(Status::Ok);
                    span.end();

                    if let Err(e) = self.reader.commit(&envelope).await {
                        tracing::error!(
                            partition = envelope.partition,
                            offset = envelope.offset,
                            error = %e,
                            "Failed to commit offset"
                        );
                        return Err(ConsumeError::Commit(e));
                    }
                    tracing::debug!(
                        partition = envelope.partition,
                        offset = envelope.offset,
                        "Message committed"
                    );
                }
                Err(err) => {
                    let span = cx.span();
                    span.record_error(&err);
                    span.set_status(Status::error(err.to_string()));
                    span.end();

                    self.telemetry.metrics().handler_failed(&self.topic);
                    tracing::warn!(
                        partition = envelope.partition,
                        offset = envelope.offset,
                        key = %envelope.key,
                        permanent = err.is_permanent(),
                        error = %err,
                        "Handler failed, message left uncommitted"
                    );

                    self.handle_failure(&cx, &envelope, &err, &shutdown).await?;
                }
            }
        }
    }

    fn start_span(&self, envelope: &Envelope) -> Context {
        let parent = extract_context(&envelope.headers);
        let tracer = self.telemetry.tracer();
        let span = tracer
            .span_builder(format!("receive {}", self.topic))
            .with_kind(SpanKind::Consumer)
            .with_attributes(vec![
                KeyValue::new("messaging.system", "kafka"),
                KeyValue::new("messaging.destination.name", self.topic.clone()),
                KeyValue::new("messaging.kafka.message.key", envelope.key.clone()),
                KeyValue::new("messaging.kafka.partition", i64::from(envelope.partition)),
                KeyValue::new("messaging.kafka.offset", envelope.offset),
                KeyValue::new("messaging.kafka.consumer.group", self.group_id.clone()),
            ])
            .start_with_context(tracer, &parent);
        parent.with_span(span)
    }

    async fn handle_failure(
        &mut self,
        cx: &Context,
        envelope: &Envelope,
        err: &HandlerError,
        shutdown: &CancellationToken,
    ) -> Result<(), ConsumeError> {
        if err.is_permanent() && self.forward_to_dead_letter(cx, envelope, err).await {
            if let Err(e) = self.reader.commit(envelope).await {
                tracing::error!(error = %e, "Failed to commit dead-lettered message");
                return Err(ConsumeError::Commit(e));
            }
            return Ok(());
        }

        if let Err(e) = self.reader.rewind(envelope).await {
            tracing::error!(
                partition = envelope.partition,
                offset = envelope.offset,
                error = %e,
                "Failed to rewind to failed message"
            );
            return Err(ConsumeError::Rewind(e));
        }

        if !self.settings.retry_backoff.is_zero() {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(self.settings.retry_backoff) => {}
            }
        }
        Ok(())
    }

    /// Forwards `envelope` to the dead-letter topic. Returns true once the
    /// copy is acknowledged.
    async fn forward_to_dead_letter(
        &self,
        cx: &Context,
        envelope: &Envelope,
        err: &HandlerError,
    ) -> bool {
        let Some(dead_letter) = &self.dead_letter else {
            return false;
        };

        let mut message = OutgoingMessage::from(envelope);
        message.headers.set(DEAD_LETTER_TOPIC_HEADER, envelope.topic.as_str());
        message
            .headers
            .set(DEAD_LETTER_PARTITION_HEADER, envelope.partition.to_string());
        message
            .headers
            .set(DEAD_LETTER_OFFSET_HEADER, envelope.offset.to_string());
        message.headers.set(DEAD_LETTER_GROUP_HEADER, self.group_id.as_str());
        message.headers.set(DEAD_LETTER_ERROR_HEADER, err.to_string());

        match dead_letter
            .producer
            .forward(cx, &dead_letter.topic, message)
            .await
        {
            Ok(()) => {
                self.telemetry.metrics().message_dead_lettered();
                tracing::warn!(
                    dead_letter_topic = %dead_letter.topic,
                    partition = envelope.partition,
                    offset = envelope.offset,
                    "Message moved to dead-letter topic"
                );
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to dead-letter message, will redeliver");
                false
            }
        }
    }
}

impl<R> std::fmt::Debug for Consumer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("topic", &self.topic)
            .field("group_id", &self.group_id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
