//! Domain error types.

use thiserror::Error;

/// Input rejected before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("customer_id is required")]
    CustomerIdRequired,

    #[error("items must not be empty")]
    NoItems,

    #[error("total_cents must be greater than 0, got {total_cents}")]
    InvalidTotal { total_cents: i64 },

    #[error("order_id is required")]
    OrderIdRequired,
}
