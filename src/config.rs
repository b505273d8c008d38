//! Client configuration from the environment

use crate::persistence::MAX_HISTORY_BYTES;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Endpoints and local storage settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Inference endpoint (`/ask`, `/wakeup`)
    pub base_url: String,
    /// Auth service (`/auth/...`)
    pub auth_url: String,
    pub db_path: PathBuf,
    /// Byte cap on the stored transcript
    pub history_cap: usize,
    /// `None` leaves questions without a client-side deadline
    pub request_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let var = |name: &str| vars.get(name).filter(|v| !v.trim().is_empty()).cloned();

        let base_url = var("CAMPUS_CHAT_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let auth_url = var("CAMPUS_CHAT_AUTH_URL").unwrap_or_else(|| base_url.clone());

        let db_path = var("CAMPUS_CHAT_DB_PATH").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.campus-chat/campus-chat.db"))
            },
            PathBuf::from,
        );

        let history_cap = match var("CAMPUS_CHAT_HISTORY_CAP") {
            Some(value) => parse_positive("CAMPUS_CHAT_HISTORY_CAP", &value)?,
            None => MAX_HISTORY_BYTES,
        };

        let request_timeout = var("CAMPUS_CHAT_REQUEST_TIMEOUT_SECS")
            .map(|value| parse_positive("CAMPUS_CHAT_REQUEST_TIMEOUT_SECS", &value))
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            base_url,
            auth_url,
            db_path,
            history_cap,
            request_timeout,
        })
    }
}

fn parse_positive<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
{
    match value.trim().parse::<T>() {
        Ok(n) if n != T::default() => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        }),
    }
}
