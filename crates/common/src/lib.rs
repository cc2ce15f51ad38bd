//! Shared types for the order-to-payment pipeline.

pub mod telemetry;
pub mod topics;
mod types;

pub use telemetry::{Metrics, OrderOutcome, Telemetry};
pub use types::{Order, OrderId, Payment, PaymentStatus};
