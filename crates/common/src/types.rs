use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an order.
///
/// Generated server-side as a UUID v4 string but treated as opaque on the
/// wire, so records produced by other writers still decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Creates a new random order ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An accepted order, published once to the orders topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: String,
    pub items: Vec<String>,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates an order with a fresh identifier stamped with the current time.
    pub fn new(customer_id: impl Into<String>, items: Vec<String>, total_cents: i64) -> Self {
        Self {
            id: OrderId::generate(),
            customer_id: customer_id.into(),
            items,
            total_cents,
            created_at: Utc::now(),
        }
    }
}

/// Payment status. `Confirmed` is the only state the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Confirmed,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// A payment for an order.
///
/// `order_id` references an [`Order`] but is never checked against one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub order_id: OrderId,
    pub customer_id: String,
    pub total_cents: i64,
    pub status: PaymentStatus,
    pub confirmed_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a confirmed payment stamped with the current time.
    pub fn confirmed(order_id: OrderId, customer_id: impl Into<String>, total_cents: i64) -> Self {
        Self {
            order_id,
            customer_id: customer_id.into(),
            total_cents,
            status: PaymentStatus::Confirmed,
            confirmed_at: Utc::now(),
        }
    }
}
