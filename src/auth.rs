//! Client for the authentication service
//!
//! JSON in, JSON out. Failures come back as a title/message pair ready to
//! show in a form banner.

mod validation;

pub use validation::{
    student_email, validate_password, validate_student_number, SignupFieldError, SignupForm,
};

use crate::session::User;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Client-side deadline on token refresh
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(5);

const UNEXPECTED: &str = "An unexpected error occurred";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The service answered with a non-success status
    #[error("{title}: {message}")]
    Rejected { title: String, message: String },
    #[error("{0}")]
    Network(String),
    #[error("You have to agree to the terms of use and policies to continue.")]
    AgreementRequired,
    #[error("Not signed in")]
    MissingToken,
    #[error("Invalid signup details: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "))]
    Invalid(Vec<SignupFieldError>),
}

impl AuthError {
    /// Banner title and message
    pub fn banner(&self) -> (String, String) {
        match self {
            AuthError::Rejected { title, message } => (title.clone(), message.clone()),
            AuthError::Network(message) => ("Oops".to_string(), message.clone()),
            AuthError::AgreementRequired => ("Agreement Required".to_string(), self.to_string()),
            other => ("Oops".to_string(), other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignupBody<'a> {
    username: &'a str,
    name: String,
    email: String,
    password: &'a str,
    faculty: &'a str,
    department: &'a str,
    course: &'a str,
    joined: String,
}

#[derive(Serialize)]
struct VerifyBody<'a> {
    email: &'a str,
    code: &'a str,
}

pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(auth_url: impl Into<String>) -> Result<Self, AuthError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AuthError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: format!("{}/auth", auth_url.into().trim_end_matches('/')),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<User, AuthError> {
        let request = self
            .client
            .post(self.url("login"))
            .json(&LoginBody {
                identifier,
                password,
            });
        let user = Self::execute(request).await?;
        tracing::info!(username = %user.username, "Signed in");
        Ok(user)
    }

    /// Register a student. The form is checked locally first.
    pub async fn signup(&self, form: &SignupForm) -> Result<User, AuthError> {
        if !form.agreed {
            return Err(AuthError::AgreementRequired);
        }
        let problems = form.validate();
        if !problems.is_empty() {
            return Err(AuthError::Invalid(problems));
        }

        let request = self.client.post(self.url("signup")).json(&SignupBody {
            username: &form.student_number,
            name: form.full_name(),
            email: form.email(),
            password: &form.password,
            faculty: &form.faculty,
            department: &form.department,
            course: &form.course,
            joined: chrono::Local::now().to_rfc2822(),
        });
        let user = Self::execute(request).await?;
        tracing::info!(username = %user.username, "Signed up, awaiting verification");
        Ok(user)
    }

    pub async fn verify(&self, email: &str, code: &str) -> Result<User, AuthError> {
        let request = self
            .client
            .post(self.url("verify"))
            .json(&VerifyBody { email, code });
        Self::execute(request).await
    }

    /// Exchange the stored access token for fresh account details.
    pub async fn refresh(&self, user: &User) -> Result<User, AuthError> {
        let token = user.access_token.as_deref().ok_or(AuthError::MissingToken)?;
        let request = self
            .client
            .post(self.url("refresh"))
            .bearer_auth(token)
            .timeout(REFRESH_TIMEOUT);
        let mut refreshed = Self::execute(request).await?;
        if refreshed.access_token.is_none() {
            refreshed.access_token = user.access_token.clone();
        }
        Ok(refreshed)
    }

    async fn execute(request: RequestBuilder) -> Result<User, AuthError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "Auth request failed");
            AuthError::Network(UNEXPECTED.to_string())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read auth response");
            AuthError::Network(UNEXPECTED.to_string())
        })?;

        if !status.is_success() {
            return Err(Self::rejected(status, &body));
        }

        serde_json::from_str::<User>(&body).map_err(|e| {
            tracing::warn!(error = %e, "Malformed auth response");
            AuthError::Network(UNEXPECTED.to_string())
        })
    }

    fn rejected(status: StatusCode, body: &str) -> AuthError {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| UNEXPECTED.to_string());
        AuthError::Rejected {
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
        }
    }
}
