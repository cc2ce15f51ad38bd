//! Order placement and related types.

mod authorizer;
mod commands;
mod service;

pub use authorizer::{
    Authorization, DEFAULT_DECLINE_RATE, PaymentAuthorizer, RandomAuthorizer, StaticAuthorizer,
};
pub use commands::PlaceOrder;
pub use service::OrderService;

use messaging::PublishError;
use thiserror::Error;

use crate::error::ValidationError;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request failed validation; nothing was authorized or published.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The payment was not authorized; nothing was published.
    #[error("payment declined")]
    PaymentDeclined,

    /// The accepted order could not be published.
    #[error("Failed to publish order: {0}")]
    Publish(#[from] PublishError),
}
