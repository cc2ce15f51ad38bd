use std::future::Future;

use async_trait::async_trait;
use opentelemetry::Context;

use crate::error::HandlerError;

/// Processes one consumed message.
///
/// `cx` is the context extracted from the message headers with the consumer
/// span already active. Returning `Ok` commits the message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, cx: &Context, key: &str, value: &[u8]) -> Result<(), HandlerError>;
}

/// Adapts an async closure into a [`MessageHandler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Context, String, Vec<u8>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    HandlerFn(f)
}

/// See [`handler_fn`].
pub struct HandlerFn<F>(F);

#[async_trait]
impl<F, Fut> MessageHandler for HandlerFn<F>
where
    F: Fn(Context, String, Vec<u8>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, cx: &Context, key: &str, value: &[u8]) -> Result<(), HandlerError> {
        (self.0)(cx.clone(), key.to_string(), value.to_vec()).await
    }
}
