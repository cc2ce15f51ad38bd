//! Synthetic traffic for the order service.

use std::time::Duration;

use axum::http::StatusCode;
use common::OrderOutcome;
use domain::PlaceOrder;
use rand::Rng;
use tokio_util::sync::CancellationToken;

pub const CUSTOMERS: [&str; 5] = ["alice", "bob", "carol", "dave", "eve"];

pub const ITEM_BUNDLES: [&[&str]; 5] = [
    &["notebook", "pen"],
    &["keyboard", "mouse"],
    &["headphones"],
    &["monitor", "hdmi-cable", "desk-lamp"],
    &["coffee-mug"],
];

pub const MIN_TOTAL_CENTS: i64 = 500;
pub const MAX_TOTAL_CENTS: i64 = 49_999;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds a random order. Each customer always orders the same bundle.
pub fn random_order<R: Rng>(rng: &mut R) -> PlaceOrder {
    let i = rng.gen_range(0..CUSTOMERS.len());
    let items = ITEM_BUNDLES[i % ITEM_BUNDLES.len()]
        .iter()
        .map(|item| item.to_string())
        .collect();
    PlaceOrder::new(
        CUSTOMERS[i],
        items,
        rng.gen_range(MIN_TOTAL_CENTS..=MAX_TOTAL_CENTS),
    )
}

/// Maps an order service response status to an outcome.
pub fn classify(status: StatusCode) -> OrderOutcome {
    if status.is_success() {
        OrderOutcome::Ok
    } else if status == StatusCode::PAYMENT_REQUIRED {
        OrderOutcome::Declined
    } else {
        OrderOutcome::Error
    }
}

/// Posts random orders to the order service at a fixed interval.
#[derive(Debug, Clone)]
pub struct LoadGenerator {
    client: reqwest::Client,
    endpoint: String,
    interval: Duration,
}

impl LoadGenerator {
    pub fn new(order_api_addr: &str, interval: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/orders", order_api_addr.trim_end_matches('/')),
            interval,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends one random order and logs the outcome.
    pub async fn send_one(&self) -> Result<OrderOutcome, reqwest::Error> {
        let order = random_order(&mut rand::thread_rng());
        let response = self.client.post(&self.endpoint).json(&order).send().await?;
        let status = response.status();
        let outcome = classify(status);

        tracing::info!(
            customer_id = %order.customer_id,
            total_cents = order.total_cents,
            items = ?order.items,
            status = outcome.as_str(),
            http_status = status.as_u16(),
            "order sent"
        );
        Ok(outcome)
    }

    /// Sends an order every interval until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            target_url = %self.endpoint,
            interval_ms = self.interval.as_millis() as u64,
            "load generator started"
        );

        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.send_one().await {
                        tracing::warn!(error = %e, "request failed");
                    }
                }
            }
        }

        tracing::info!("load generator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_orders_are_valid() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let order = random_order(&mut rng);
            assert!(order.validate().is_ok());
            assert!(CUSTOMERS.contains(&order.customer_id.as_str()));
            assert!((MIN_TOTAL_CENTS..=MAX_TOTAL_CENTS).contains(&order.total_cents));
        }
    }

    #[test]
    fn test_customer_orders_fixed_bundle() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let order = random_order(&mut rng);
            let i = CUSTOMERS
                .iter()
                .position(|c| *c == order.customer_id)
                .unwrap();
            assert_eq!(order.items, ITEM_BUNDLES[i]);
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(StatusCode::CREATED), OrderOutcome::Ok);
        assert_eq!(classify(StatusCode::PAYMENT_REQUIRED), OrderOutcome::Declined);
        assert_eq!(classify(StatusCode::INTERNAL_SERVER_ERROR), OrderOutcome::Error);
        assert_eq!(classify(StatusCode::BAD_REQUEST), OrderOutcome::Error);
    }

    #[test]
    fn test_endpoint() {
        let generator =
            LoadGenerator::new("http://localhost:8080/", Duration::from_secs(2)).unwrap();
        assert_eq!(generator.endpoint(), "http://localhost:8080/orders");
    }
}
