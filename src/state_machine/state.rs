//! Controller state types

use crate::message::{Message, MessageId};
use crate::session::Session;
use crate::suggestions::Suggestion;
use serde::Serialize;

/// Whether a reply is outstanding
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Phase {
    /// Ready for a question
    #[default]
    Idle,

    /// One question in flight
    AwaitingReply {
        question_id: MessageId,
        /// The transcript was cleared after the question went out; the
        /// reply will be dropped on arrival
        superseded: bool,
    },
}

/// Controller flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    pub phase: Phase,
    /// User message currently being edited
    pub editing_message_id: Option<MessageId>,
    /// Draft in the input field
    pub input: String,
}

impl ChatState {
    pub fn is_response_loading(&self) -> bool {
        matches!(self.phase, Phase::AwaitingReply { .. })
    }

    pub fn is_editing(&self) -> bool {
        self.editing_message_id.is_some()
    }

    pub(crate) fn with_phase(&self, phase: Phase) -> Self {
        Self {
            phase,
            ..self.clone()
        }
    }
}

/// Read-only view of the data the controller decides on
#[derive(Debug, Clone, Copy)]
pub struct ChatView<'a> {
    pub messages: &'a [Message],
    pub suggestions: &'a [Suggestion],
}

/// Injected identity/scope used to tag requests
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    pub session: Session,
}

impl ChatContext {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}
