//! Effects produced by state transitions

use crate::inference::AskRequest;
use crate::message::{Feedback, Message, MessageId};
use crate::session::{Role, Session};

/// Effects to be executed, in order, after a transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Append to the transcript
    AppendMessage(Message),

    /// Drop the message at `index` and everything after it
    TruncateFrom { index: usize },

    /// Empty the transcript
    ClearTranscript,

    /// Overwrite the feedback of an assistant message
    SetFeedback {
        message_id: MessageId,
        feedback: Option<Feedback>,
    },

    /// Mirror the transcript to storage (may evict oldest messages)
    PersistHistory,

    /// Remove the stored transcript
    ClearHistory,

    DismissSuggestion { label: String },

    ResetSuggestions { role: Role },

    PersistSuggestions,

    /// Remove the stored suggestion list
    ForgetSuggestions,

    /// Replace and persist identity/scope
    UpdateSession(Session),

    /// Start the (single) inference request
    RequestReply {
        question_id: MessageId,
        request: AskRequest,
    },
}
