//! Payment confirmation service.

use api::config::{Config, PAYMENT_API_PORT};
use common::Telemetry;
use domain::PaymentService;
use tokio_util::sync::CancellationToken;

const SERVICE_NAME: &str = "payment-api";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env(PAYMENT_API_PORT);
    let guard = api::telemetry::init(SERVICE_NAME, &config)?;

    let shutdown = CancellationToken::new();
    api::shutdown::cancel_on_signal(shutdown.clone());

    let telemetry = Telemetry::new(SERVICE_NAME);
    let payments = PaymentService::new(telemetry.clone());

    let app = api::create_payment_app(payments, telemetry, guard.metrics_handle());
    api::serve(app, &config.addr(), shutdown).await?;

    tracing::info!("payment-api shut down gracefully");
    guard.shutdown();
    Ok(())
}
