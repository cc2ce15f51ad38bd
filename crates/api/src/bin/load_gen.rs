//! Posts random orders to the order service until interrupted.

use api::config::{Config, ORDER_API_PORT};
use api::loadgen::LoadGenerator;
use tokio_util::sync::CancellationToken;

const SERVICE_NAME: &str = "load-gen";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env(ORDER_API_PORT);
    let guard = api::telemetry::init(SERVICE_NAME, &config)?;

    let shutdown = CancellationToken::new();
    api::shutdown::cancel_on_signal(shutdown.clone());

    LoadGenerator::new(&config.order_api_addr, config.interval)?
        .run(shutdown)
        .await;

    guard.shutdown();
    Ok(())
}
