//! Inference error types

use thiserror::Error;

/// Inference failure with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct InferenceError {
    pub kind: InferenceErrorKind,
    pub message: String,
    /// HTTP status, when the endpoint answered at all
    pub status: Option<u16>,
}

impl InferenceError {
    pub fn new(kind: InferenceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(InferenceErrorKind::Network, message)
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new(InferenceErrorKind::Server, message).with_status(status)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(InferenceErrorKind::InvalidResponse, message)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferenceErrorKind {
    /// Transport failure or timeout
    Network,
    /// Non-2xx answer
    Server,
    /// 2xx answer whose body is not `{"response": string}`
    InvalidResponse,
}

impl InferenceErrorKind {
    /// Whether asking again unchanged could plausibly succeed. Only used to
    /// word the log line; retrying is always the reader's call.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Server)
    }
}
