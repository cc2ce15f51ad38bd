//! Payment authorization performed before an order is accepted.

use async_trait::async_trait;
use rand::Rng;

/// Probability that [`RandomAuthorizer::default`] declines a payment.
pub const DEFAULT_DECLINE_RATE: f64 = 0.2;

/// Outcome of a payment authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Approved,
    Declined,
}

impl Authorization {
    pub fn is_declined(&self) -> bool {
        matches!(self, Authorization::Declined)
    }
}

/// Decides whether an order's payment is authorized.
#[async_trait]
pub trait PaymentAuthorizer: Send + Sync {
    async fn authorize(&self, customer_id: &str, total_cents: i64) -> Authorization;
}

/// Declines a fixed fraction of payments at random.
#[derive(Debug, Clone, Copy)]
pub struct RandomAuthorizer {
    decline_rate: f64,
}

impl RandomAuthorizer {
    /// Creates an authorizer declining with probability `decline_rate`,
    /// clamped to `[0, 1]`.
    pub fn new(decline_rate: f64) -> Self {
        Self {
            decline_rate: decline_rate.clamp(0.0, 1.0),
        }
    }

    pub fn decline_rate(&self) -> f64 {
        self.decline_rate
    }
}

impl Default for RandomAuthorizer {
    fn default() -> Self {
        Self::new(DEFAULT_DECLINE_RATE)
    }
}

#[async_trait]
impl PaymentAuthorizer for RandomAuthorizer {
    async fn authorize(&self, _customer_id: &str, _total_cents: i64) -> Authorization {
        if rand::thread_rng().gen_bool(self.decline_rate) {
            Authorization::Declined
        } else {
            Authorization::Approved
        }
    }
}

/// Always returns the same outcome.
#[derive(Debug, Clone, Copy)]
pub struct StaticAuthorizer {
    outcome: Authorization,
}

impl StaticAuthorizer {
    pub fn approving() -> Self {
        Self {
            outcome: Authorization::Approved,
        }
    }

    pub fn declining() -> Self {
        Self {
            outcome: Authorization::Declined,
        }
    }
}

#[async_trait]
impl PaymentAuthorizer for StaticAuthorizer {
    async fn authorize(&self, _customer_id: &str, _total_cents: i64) -> Authorization {
        self.outcome
    }
}
