//! Events that drive the controller

use crate::attachment::Attachment;
use crate::inference::InferenceError;
use crate::message::{Feedback, MessageId};
use crate::session::Session;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Reader events
    InputChanged {
        text: String,
    },
    /// Send the current input, or confirm an edit when one is active
    Submit {
        attachment: Option<Attachment>,
    },
    Retry {
        message_id: MessageId,
    },
    Edit {
        message_id: MessageId,
    },
    CancelEdit,
    Clear,
    /// Press like/dislike; pressing the active value clears it
    SetFeedback {
        message_id: MessageId,
        feedback: Feedback,
    },
    SuggestionPicked {
        label: String,
    },
    SessionChanged {
        session: Session,
    },

    // Inference events
    ReplyReceived {
        question_id: MessageId,
        text: String,
    },
    ReplyFailed {
        question_id: MessageId,
        error: InferenceError,
    },
}

impl Event {
    /// Produced by the runtime itself rather than by a reader
    pub fn is_internal(&self) -> bool {
        matches!(self, Event::ReplyReceived { .. } | Event::ReplyFailed { .. })
    }
}
