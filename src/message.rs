//! Conversation message model
//!
//! The serialized shape (camelCase keys, lowercase enums) is the durable
//! history format, so changing field names breaks previously stored chats.

use chrono::Utc;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Text shown in place of a reply when the inference call fails
pub const ERROR_REPLY_TEXT: &str = "Sorry, there was an error processing your request.";

/// Text shown when the endpoint answers with an empty reply
pub const EMPTY_REPLY_TEXT: &str = "Sorry, I could not process your request.";

/// Opaque message identifier
pub type MessageId = String;

/// Generate a fresh message id.
pub fn new_message_id() -> MessageId {
    uuid::Uuid::new_v4().to_string()
}

/// Delivery status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Error,
    Editing,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Error => write!(f, "error"),
            MessageStatus::Editing => write!(f, "editing"),
        }
    }
}

/// Reader feedback on an assistant reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Like,
    Dislike,
}

impl Feedback {
    /// Result of pressing `pressed` when `current` is set: pressing the
    /// active value clears it, anything else replaces it.
    pub fn toggle(current: Option<Feedback>, pressed: Feedback) -> Option<Feedback> {
        if current == Some(pressed) {
            None
        } else {
            Some(pressed)
        }
    }
}

/// Attachment descriptor kept in history; the payload itself is not retained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

/// A single entry of the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub is_user: bool,
    /// Creation instant, epoch milliseconds
    #[serde(deserialize_with = "timestamp_from_number")]
    pub timestamp: i64,
    pub status: MessageStatus,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub feedback: Option<Feedback>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub attachment: Option<AttachmentMeta>,
}

/// Any JSON number is a valid timestamp; fractions are dropped.
#[allow(clippy::cast_possible_truncation)] // Saturating float to int
fn timestamp_from_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(i64),
        Float(f64),
    }

    match Number::deserialize(deserializer)? {
        Number::Int(millis) => Ok(millis),
        Number::Float(millis) if millis.is_finite() => Ok(millis as i64),
        Number::Float(_) => Err(D::Error::custom("timestamp is not a finite number")),
    }
}

/// Optional fields that fall back to `None` instead of rejecting the message
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value::<Option<T>>(value).unwrap_or_default())
}

impl Message {
    pub fn user(text: impl Into<String>, attachment: Option<AttachmentMeta>) -> Self {
        Self {
            id: new_message_id(),
            text: text.into(),
            is_user: true,
            timestamp: Utc::now().timestamp_millis(),
            status: MessageStatus::Sent,
            feedback: None,
            attachment,
        }
    }

    /// Assistant reply carrying already-formatted text.
    pub fn assistant(formatted: impl Into<String>) -> Self {
        let formatted = formatted.into();
        let text = if formatted.is_empty() {
            EMPTY_REPLY_TEXT.to_string()
        } else {
            formatted
        };
        Self {
            id: new_message_id(),
            text,
            is_user: false,
            timestamp: Utc::now().timestamp_millis(),
            status: MessageStatus::Sent,
            feedback: None,
            attachment: None,
        }
    }

    /// Assistant bubble standing in for a failed reply
    pub fn assistant_error() -> Self {
        Self {
            id: new_message_id(),
            text: ERROR_REPLY_TEXT.to_string(),
            is_user: false,
            timestamp: Utc::now().timestamp_millis(),
            status: MessageStatus::Error,
            feedback: None,
            attachment: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == MessageStatus::Error
    }

    /// Text with reply markup removed, as copied to a clipboard or terminal
    pub fn plain_text(&self) -> String {
        crate::inference::plain_text(&self.text)
    }
}
