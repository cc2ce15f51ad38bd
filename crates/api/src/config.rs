//! Process configuration loaded from environment variables.

use std::time::Duration;

pub const ORDER_API_PORT: u16 = 8080;
pub const PAYMENT_API_PORT: u16 = 8081;
pub const CONSUMER_PORT: u16 = 8082;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";
const DEFAULT_PAYMENT_API_ADDR: &str = "http://localhost:8081";
const DEFAULT_ORDER_API_ADDR: &str = "http://localhost:8080";
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";
const DEFAULT_INTERVAL_MS: u64 = 2000;

/// Configuration shared by every binary of the pipeline.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default depends on the binary)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `KAFKA_BROKER`: bootstrap servers (default: `"localhost:9092"`)
/// - `PAYMENT_API_ADDR`: base URL of the payment service
/// - `ORDER_API_ADDR`: base URL of the order service
/// - `INTERVAL_MS`: load generator period (default: `2000`)
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP/gRPC collector endpoint
/// - `DEAD_LETTER_TOPIC`: enables dead-lettering of undecodable messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub kafka_broker: String,
    pub payment_api_addr: String,
    pub order_api_addr: String,
    pub interval: Duration,
    pub otlp_endpoint: String,
    pub dead_letter_topic: Option<String>,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env(default_port: u16) -> Self {
        Self::from_lookup(default_port, |key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`. Empty and unparsable values
    /// fall back to the defaults.
    pub fn from_lookup(default_port: u16, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(default_port),
            log_level: var("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            kafka_broker: var("KAFKA_BROKER").unwrap_or_else(|| DEFAULT_KAFKA_BROKER.to_string()),
            payment_api_addr: var("PAYMENT_API_ADDR")
                .unwrap_or_else(|| DEFAULT_PAYMENT_API_ADDR.to_string()),
            order_api_addr: var("ORDER_API_ADDR")
                .unwrap_or_else(|| DEFAULT_ORDER_API_ADDR.to_string()),
            interval: Duration::from_millis(
                var("INTERVAL_MS")
                    .and_then(|ms| ms.parse().ok())
                    .unwrap_or(DEFAULT_INTERVAL_MS),
            ),
            otlp_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_string()),
            dead_letter_topic: var("DEAD_LETTER_TOPIC"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
