//! Messaging layer for the order-to-payment pipeline.
//!
//! - [`Producer`] publishes JSON records with the caller's trace context and
//!   baggage injected into the message headers.
//! - [`Consumer`] runs an at-least-once fetch, handle, commit loop and hands
//!   each handler the context extracted from the headers.
//! - [`ensure_topic`] provisions topics idempotently.
//!
//! Broker access goes through the [`MessageWriter`], [`MessageReader`] and
//! [`TopicAdmin`] traits. [`InMemoryBroker`] implements all three for tests;
//! the `kafka` feature adds the `rdkafka` backend.

pub mod admin;
pub mod broker;
pub mod carrier;
pub mod consumer;
pub mod envelope;
pub mod error;
pub mod handler;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod producer;
pub mod propagation;

pub use admin::ensure_topic;
pub use broker::{MessageReader, MessageWriter, TopicAdmin, TopicSpec, TopicStatus};
pub use carrier::{Header, HeaderExtractor, HeaderInjector, MessageHeaders};
pub use consumer::{Consumer, ConsumerSettings};
pub use envelope::{Envelope, OutgoingMessage};
pub use error::{BoxError, ConsumeError, HandlerError, ProvisionError, PublishError, TransportError};
pub use handler::{HandlerFn, MessageHandler, handler_fn};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaAdmin, KafkaReader, KafkaSettings, KafkaWriter};
pub use memory::{InMemoryBroker, InMemoryReader};
pub use producer::Producer;
