//! Payment confirmation callout.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::ConfirmPayment;
use http::HeaderMap;
use messaging::HeaderInjector;
use messaging::propagation::inject_context;
use opentelemetry::Context;

use crate::error::CalloutError;

/// Path of the confirmation endpoint on the payment service.
pub const CONFIRM_PATH: &str = "/payments/confirm";

/// Default timeout for one confirmation request.
pub const DEFAULT_CALLOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Asks the payment service to confirm a payment.
#[async_trait]
pub trait PaymentConfirmationClient: Send + Sync {
    /// Sends `request` with the trace context and baggage of `cx`.
    async fn confirm(&self, cx: &Context, request: &ConfirmPayment) -> Result<(), CalloutError>;
}

/// HTTP client for `POST /payments/confirm`.
#[derive(Debug, Clone)]
pub struct HttpConfirmationClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpConfirmationClient {
    /// Creates a client for the payment service at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, CalloutError> {
        Self::with_timeout(base_url, DEFAULT_CALLOUT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, CalloutError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), CONFIRM_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PaymentConfirmationClient for HttpConfirmationClient {
    async fn confirm(&self, cx: &Context, request: &ConfirmPayment) -> Result<(), CalloutError> {
        let mut headers = HeaderMap::new();
        inject_context(cx, &mut HeaderInjector(&mut headers));

        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalloutError::Status {
                status: status.as_u16(),
            });
        }
        tracing::debug!(status = status.as_u16(), "payment-api accepted confirmation");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryConfirmationState {
    confirmed: Vec<ConfirmPayment>,
    fail_with_status: Option<u16>,
}

/// In-memory confirmation client for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfirmationClient {
    state: Arc<RwLock<InMemoryConfirmationState>>,
}

impl InMemoryConfirmationClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent confirmation fail with `status`, or succeed
    /// again with `None`.
    pub fn set_fail_with_status(&self, status: Option<u16>) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .fail_with_status = status;
    }

    /// Returns the requests confirmed so far.
    pub fn confirmed(&self) -> Vec<ConfirmPayment> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .confirmed
            .clone()
    }
}

#[async_trait]
impl PaymentConfirmationClient for InMemoryConfirmationClient {
    async fn confirm(&self, _cx: &Context, request: &ConfirmPayment) -> Result<(), CalloutError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(status) = state.fail_with_status {
            return Err(CalloutError::Status { status });
        }
        state.confirmed.push(request.clone());
        Ok(())
    }
}
