//! Message handlers that drive the order-to-payment workflow.
//!
//! The workflow has two consumer hops:
//! 1. [`OrderProcessor`] consumes orders, simulates processing and publishes
//!    a confirmed payment keyed by the order id.
//! 2. [`PaymentProcessor`] consumes payments and confirms each one with the
//!    payment service over HTTP.
//!
//! Both implement [`messaging::MessageHandler`]. A failed step leaves its
//! message uncommitted so it is delivered again.

pub mod confirmation;
pub mod error;
pub mod order_processor;
pub mod payment_processor;

pub use confirmation::{
    HttpConfirmationClient, InMemoryConfirmationClient, PaymentConfirmationClient,
};
pub use error::{CalloutError, SagaError};
pub use order_processor::OrderProcessor;
pub use payment_processor::PaymentProcessor;
