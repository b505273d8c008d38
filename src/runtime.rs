//! Runtime for driving a chat session
//!
//! Owns the transcript, suggestion list and session, feeds reader events
//! through the state machine and executes the resulting effects. Readers
//! talk to it through a [`ChatHandle`].

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::ChatRuntime;

use crate::attachment::Attachment;
use crate::message::{Feedback, Message, MessageId};
use crate::session::Session;
use crate::state_machine::{ChatState, Event};
use crate::suggestions::Suggestion;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Incremental updates sent to subscribers
#[derive(Debug, Clone)]
pub enum ChatUpdate {
    MessageAppended {
        message: Message,
    },
    /// Everything from index `len` on was removed
    TranscriptTruncated {
        len: usize,
    },
    /// The oldest `dropped` messages were evicted to fit the storage cap
    TranscriptTrimmed {
        dropped: usize,
    },
    TranscriptCleared,
    FeedbackChanged {
        message_id: MessageId,
        feedback: Option<Feedback>,
    },
    LoadingChanged {
        loading: bool,
    },
    EditingChanged {
        message_id: Option<MessageId>,
    },
    InputChanged {
        text: String,
    },
    SuggestionsChanged {
        suggestions: Vec<Suggestion>,
    },
    SessionChanged {
        session: Session,
    },
    /// A reader event was refused; nothing changed
    Rejected {
        reason: String,
    },
}

/// Full view of the session after the last processed event
#[derive(Debug, Clone, Default)]
pub struct ChatSnapshot {
    pub messages: Vec<Message>,
    pub suggestions: Vec<Suggestion>,
    pub state: ChatState,
    pub session: Session,
}

impl ChatSnapshot {
    pub fn is_response_loading(&self) -> bool {
        self.state.is_response_loading()
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Chat runtime has stopped")]
    Stopped,
}

/// Handle to interact with a running chat session
#[derive(Clone)]
pub struct ChatHandle {
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<ChatUpdate>,
    snapshot_rx: watch::Receiver<ChatSnapshot>,
    shutdown: CancellationToken,
}

impl ChatHandle {
    pub async fn send(&self, event: Event) -> Result<(), RuntimeError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| RuntimeError::Stopped)
    }

    /// Type `text` into the input and submit it
    pub async fn ask(
        &self,
        text: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> Result<(), RuntimeError> {
        self.send(Event::InputChanged { text: text.into() }).await?;
        self.send(Event::Submit { attachment }).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.broadcast_tx.subscribe()
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that observes every published snapshot
    pub fn watch(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Stop the runtime; an in-flight reply is abandoned.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
