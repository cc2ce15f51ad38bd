//! Order commands.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Request to place an order.
///
/// Missing fields deserialize to empty values so they surface as
/// [`ValidationError`]s rather than decode failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaceOrder {
    pub customer_id: String,
    pub items: Vec<String>,
    pub total_cents: i64,
}

impl PlaceOrder {
    pub fn new(customer_id: impl Into<String>, items: Vec<String>, total_cents: i64) -> Self {
        Self {
            customer_id: customer_id.into(),
            items,
            total_cents,
        }
    }

    /// Checks the command. The first failing rule is reported.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.customer_id.is_empty() {
            return Err(ValidationError::CustomerIdRequired);
        }
        if self.items.is_empty() {
            return Err(ValidationError::NoItems);
        }
        if self.total_cents <= 0 {
            return Err(ValidationError::InvalidTotal {
                total_cents: self.total_cents,
            });
        }
        Ok(())
    }
}
