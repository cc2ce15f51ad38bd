//! Messaging error types.

use std::time::Duration;

use thiserror::Error;

/// Boxed error used for handler failures and backend-specific causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure talking to the broker.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The operation did not complete within its deadline.
    #[error("Broker operation timed out after {0:?}")]
    Timeout(Duration),

    /// The broker refused the request.
    #[error("Broker rejected the request: {0}")]
    Rejected(String),

    /// The broker could not be reached.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// Error reported by the Kafka client.
    #[cfg(feature = "kafka")]
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

/// Error returned by [`Producer::publish`](crate::Producer::publish).
#[derive(Debug, Error)]
pub enum PublishError {
    /// The record could not be serialized; the broker was never contacted.
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The write was not acknowledged.
    #[error("Failed to publish message: {0}")]
    Transport(#[from] TransportError),
}

impl PublishError {
    /// Returns true for encode failures, which retrying cannot fix.
    pub fn is_encode(&self) -> bool {
        matches!(self, PublishError::Encode(_))
    }
}

/// Error that ends a consumer loop.
#[derive(Debug, Error)]
pub enum ConsumeError {
    /// Fetching the next message failed.
    #[error("Failed to fetch message: {0}")]
    Fetch(#[source] TransportError),

    /// Committing a processed message failed.
    #[error("Failed to commit offset: {0}")]
    Commit(#[source] TransportError),

    /// Repositioning on a failed message failed.
    #[error("Failed to rewind to uncommitted offset: {0}")]
    Rewind(#[source] TransportError),
}

/// Error returned by topic provisioning.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The admin client could not be created or could not reach the cluster.
    #[error("Failed to connect to broker: {0}")]
    Connect(#[source] TransportError),

    /// The create request failed for a reason other than "already exists".
    #[error("Failed to create topic {topic}: {reason}")]
    Create { topic: String, reason: String },
}

/// Failure reported by a message handler.
///
/// Every handler failure leaves the message uncommitted. Permanent failures
/// (an undecodable payload, say) additionally qualify the message for the
/// dead-letter topic when one is configured.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct HandlerError {
    permanent: bool,
    source: BoxError,
}

impl HandlerError {
    /// A failure that may succeed on redelivery.
    pub fn transient(err: impl Into<BoxError>) -> Self {
        Self {
            permanent: false,
            source: err.into(),
        }
    }

    /// A failure that will recur on every redelivery.
    pub fn permanent(err: impl Into<BoxError>) -> Self {
        Self {
            permanent: true,
            source: err.into(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }
}

/// Result type for messaging operations.
pub type Result<T, E = TransportError> = std::result::Result<T, E>;
