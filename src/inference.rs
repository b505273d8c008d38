//! Inference endpoint abstraction
//!
//! One call per question: the question, the transcript so far and an optional
//! attachment go out, one reply text comes back.

mod error;
mod format;
mod http;
mod types;

pub use error::{InferenceError, InferenceErrorKind};
pub use format::{format_reply, plain_text};
pub use http::{HttpInferenceClient, WAKEUP_TIMEOUT};
pub use types::{date_label, AskReply, AskRequest};

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for inference endpoints
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Ask one question
    async fn ask(&self, request: &AskRequest) -> Result<AskReply, InferenceError>;

    /// Liveness probe sent once at session start
    async fn wakeup(&self) -> Result<(), InferenceError> {
        Ok(())
    }

    /// Where requests go, for logging
    fn endpoint(&self) -> &str;
}

#[async_trait]
impl<T: InferenceClient + ?Sized> InferenceClient for Arc<T> {
    async fn ask(&self, request: &AskRequest) -> Result<AskReply, InferenceError> {
        (**self).ask(request).await
    }

    async fn wakeup(&self) -> Result<(), InferenceError> {
        (**self).wakeup().await
    }

    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }
}

/// Logging wrapper for inference clients
pub struct LoggingClient {
    inner: Arc<dyn InferenceClient>,
    endpoint: String,
}

impl LoggingClient {
    pub fn new(inner: Arc<dyn InferenceClient>) -> Self {
        let endpoint = inner.endpoint().to_string();
        Self { inner, endpoint }
    }
}

#[async_trait]
impl InferenceClient for LoggingClient {
    async fn ask(&self, request: &AskRequest) -> Result<AskReply, InferenceError> {
        let start = std::time::Instant::now();
        let result = self.inner.ask(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    endpoint = %self.endpoint,
                    scope = %request.scope,
                    duration_ms = %duration.as_millis(),
                    history_len = request.history.len(),
                    has_attachment = request.attachment.is_some(),
                    reply_len = reply.text.len(),
                    "Inference request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    endpoint = %self.endpoint,
                    scope = %request.scope,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    status = ?e.status,
                    transient = e.kind.is_transient(),
                    "Inference request failed"
                );
            }
        }

        result
    }

    async fn wakeup(&self) -> Result<(), InferenceError> {
        let result = self.inner.wakeup().await;
        match &result {
            Ok(()) => tracing::debug!(endpoint = %self.endpoint, "Wakeup probe answered"),
            Err(e) => tracing::warn!(endpoint = %self.endpoint, error = %e, "Wakeup probe failed"),
        }
        result
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
