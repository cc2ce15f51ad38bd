//! Saga error types.

use messaging::{HandlerError, PublishError};
use opentelemetry::Context;
use opentelemetry::trace::{Status, TraceContextExt};
use thiserror::Error;

/// Failure of the payment confirmation callout.
#[derive(Debug, Error)]
pub enum CalloutError {
    /// The request could not be sent or the response not received.
    #[error("payment-api request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The confirmation service answered with a non-success status.
    #[error("payment-api returned {status}")]
    Status { status: u16 },
}

/// Errors that can occur while handling a pipeline message.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The message payload is not a valid record.
    #[error("Failed to decode {record}: {source}")]
    Decode {
        record: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The follow-up message could not be published.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// The downstream confirmation failed.
    #[error(transparent)]
    Callout(#[from] CalloutError),
}

impl SagaError {
    /// Returns true if redelivering the same message cannot succeed.
    pub fn is_permanent(&self) -> bool {
        match self {
            SagaError::Decode { .. } => true,
            SagaError::Publish(e) => e.is_encode(),
            SagaError::Callout(_) => false,
        }
    }
}

impl From<SagaError> for HandlerError {
    fn from(err: SagaError) -> Self {
        if err.is_permanent() {
            HandlerError::permanent(err)
        } else {
            HandlerError::transient(err)
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

/// Records `err` on the active span of `cx`, marks it failed and ends it.
pub(crate) fn fail_span(cx: &Context, err: &SagaError) {
    let span = cx.span();
    span.record_error(err);
    span.set_status(Status::error(err.to_string()));
    span.end();
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging::TransportError;
    use std::time::Duration;

    fn decode_error() -> SagaError {
        SagaError::Decode {
            record: "order",
            source: serde_json::from_slice::<u8>(b"not json").unwrap_err(),
        }
    }

    #[test]
    fn decode_failures_are_permanent() {
        let handler_error = HandlerError::from(decode_error());
        assert!(handler_error.is_permanent());
    }

    #[test]
    fn callout_failures_are_transient() {
        let err = SagaError::from(CalloutError::Status { status: 500 });
        assert_eq!(err.to_string(), "payment-api returned 500");
        assert!(!HandlerError::from(err).is_permanent());
    }

    #[test]
    fn transport_failures_are_transient() {
        let err = SagaError::from(PublishError::from(TransportError::Timeout(
            Duration::from_secs(10),
        )));
        assert!(!err.is_permanent());
    }
}
