//! HTTP implementation of the ask endpoint

use super::types::{date_label, AskReply, AskRequest, AskResponseBody};
use super::{InferenceClient, InferenceError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Client-side timeout of the liveness probe
pub const WAKEUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Inference endpoint reached over HTTP
pub struct HttpInferenceClient {
    client: Client,
    base_url: String,
}

impl HttpInferenceClient {
    /// `request_timeout` of `None` leaves questions without a client-side
    /// deadline.
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Option<Duration>,
    ) -> Result<Self, InferenceError> {
        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| InferenceError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn ask_url(&self) -> String {
        format!("{}/ask", self.base_url)
    }

    fn wakeup_url(&self) -> String {
        format!("{}/wakeup", self.base_url)
    }

    fn build_form(request: &AskRequest) -> Result<Form, InferenceError> {
        let history = serde_json::to_string(&request.history)
            .map_err(|e| InferenceError::invalid_response(format!("Failed to encode history: {e}")))?;

        let mut form = Form::new()
            .text("question", request.question.clone())
            .text("history", history)
            .text("scope", request.scope.as_str().to_string())
            .text("now", date_label(&chrono::Local::now()));

        if let Some(course) = &request.course {
            form = form.text("course", course.clone());
        }

        if let Some(attachment) = &request.attachment {
            let part = Part::bytes(attachment.data().to_vec())
                .file_name(attachment.name().to_string())
                .mime_str(attachment.media_type())
                .map_err(|e| InferenceError::network(format!("Invalid attachment type: {e}")))?;
            form = form.part("attachment", part);
        }

        Ok(form)
    }

    fn classify_error(status: StatusCode, body: &str) -> InferenceError {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| body.to_string());
        InferenceError::server(status.as_u16(), format!("HTTP {status}: {detail}"))
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn ask(&self, request: &AskRequest) -> Result<AskReply, InferenceError> {
        let form = Self::build_form(request)?;

        let response = self
            .client
            .post(self.ask_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    InferenceError::network(format!("Connection failed: {e}"))
                } else {
                    InferenceError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InferenceError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let parsed: AskResponseBody = serde_json::from_str(&body).map_err(|e| {
            InferenceError::invalid_response(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Ok(AskReply {
            text: parsed.response,
        })
    }

    async fn wakeup(&self) -> Result<(), InferenceError> {
        let response = self
            .client
            .get(self.wakeup_url())
            .timeout(WAKEUP_TIMEOUT)
            .send()
            .await
            .map_err(|e| InferenceError::network(format!("Wakeup failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(InferenceError::server(status.as_u16(), format!("Wakeup answered HTTP {status}")))
        }
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}
