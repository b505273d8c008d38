//! Request and reply types for the ask endpoint

use crate::attachment::Attachment;
use crate::message::Message;
use crate::session::Scope;
use chrono::{DateTime, TimeZone};
use serde::Deserialize;
use std::fmt::Display;

/// One question to the inference endpoint
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub question: String,
    /// Transcript preceding the question
    pub history: Vec<Message>,
    pub scope: Scope,
    /// Signed-in student's course, if any
    pub course: Option<String>,
    pub attachment: Option<Attachment>,
}

/// Raw, unformatted reply text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskReply {
    pub text: String,
}

/// Wire shape of a successful answer
#[derive(Debug, Deserialize)]
pub(super) struct AskResponseBody {
    pub response: String,
}

/// Calendar date in the form the endpoint expects, e.g. `Mon Oct 19 2026`
pub fn date_label<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    now.format("%a %b %d %Y").to_string()
}
