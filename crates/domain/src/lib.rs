//! Domain layer for the order-to-payment pipeline.
//!
//! This crate provides:
//! - [`OrderService`], which validates, authorizes and publishes orders
//! - the [`PaymentAuthorizer`] capability with random and fixed implementations
//! - [`PaymentService`], which confirms payments
//! - [`ServiceContext`], the shared handles services are built from

pub mod context;
pub mod error;
pub mod order;
pub mod payment;

pub use context::ServiceContext;
pub use error::ValidationError;
pub use order::{
    Authorization, OrderError, OrderService, PaymentAuthorizer, PlaceOrder, RandomAuthorizer,
    StaticAuthorizer,
};
pub use payment::{ConfirmPayment, PaymentError, PaymentService};
