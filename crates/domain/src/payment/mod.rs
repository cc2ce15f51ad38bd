//! Payment confirmation.

mod service;

pub use service::{ConfirmPayment, PaymentService};

use thiserror::Error;

use crate::error::ValidationError;

/// Errors that can occur while confirming a payment.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
