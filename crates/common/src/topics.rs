//! Topic and consumer-group names shared by every service.

/// Topic carrying accepted orders, keyed by order ID.
pub const ORDERS_TOPIC: &str = "orders";

/// Topic carrying in-flight payments, keyed by order ID.
pub const PAYMENTS_TOPIC: &str = "payments";

/// Consumer group of the order-topic handler.
pub const ORDER_PROCESSOR_GROUP: &str = "order-processor";

/// Consumer group of the payment-topic handler.
pub const PAYMENT_PROCESSOR_GROUP: &str = "payment-processor";

/// Partition count used when provisioning pipeline topics.
pub const DEFAULT_PARTITIONS: i32 = 3;

/// Replication factor used when provisioning pipeline topics.
pub const DEFAULT_REPLICATION: i32 = 1;

/// Baggage key whose value overrides the payload customer identifier.
pub const CUSTOMER_ID_BAGGAGE: &str = "customer_id";
