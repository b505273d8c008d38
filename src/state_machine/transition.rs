//! State transition function
//!
//! Decides how the controller reacts to an event. It reads the transcript
//! through a borrowed view and never touches storage or the network; the
//! only inputs beyond its arguments are the clock and id generator used to
//! stamp new messages.

use super::{ChatContext, ChatState, ChatView, Effect, Event, Phase};
use crate::attachment::Attachment;
use crate::inference::{format_reply, AskRequest};
use crate::message::{Feedback, Message, MessageId};
use crate::store::{find_unique, StoreError};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ChatState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ChatState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Still waiting for the previous reply")]
    Busy,
    #[error("Nothing to send")]
    EmptyInput,
    #[error("Message not found: {0}")]
    MessageNotFound(String),
    #[error("Message id is not unique: {0}")]
    DuplicateMessageId(String),
    #[error("Only your own questions can be retried or edited: {0}")]
    NotUserMessage(String),
    #[error("Only replies can be rated: {0}")]
    NotAssistantMessage(String),
    #[error("No such suggestion: {0}")]
    UnknownSuggestion(String),
    #[error("Reply for a question no longer awaited: {0}")]
    StaleReply(String),
}

impl From<StoreError> for TransitionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::MessageNotFound(id) => TransitionError::MessageNotFound(id),
            StoreError::DuplicateId(id) => TransitionError::DuplicateMessageId(id),
            StoreError::NotAssistantMessage(id) => TransitionError::NotAssistantMessage(id),
        }
    }
}

/// Decide the controller's reaction to `event`.
pub fn transition(
    state: &ChatState,
    view: &ChatView<'_>,
    context: &ChatContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::InputChanged { text } => Ok(TransitionResult::new(ChatState {
            input: text,
            ..state.clone()
        })),

        // ============================================================
        // Sending
        // ============================================================
        Event::Submit { attachment } => {
            if state.is_response_loading() {
                return Err(TransitionError::Busy);
            }
            if state.input.trim().is_empty() {
                return Err(TransitionError::EmptyInput);
            }

            // Confirming an edit replays from the edited question. If that
            // question is gone the edit ends and the input is kept unsent.
            let cut = match &state.editing_message_id {
                Some(id) => match find_unique(view.messages, id) {
                    Ok(index) => index,
                    Err(StoreError::MessageNotFound(_)) => {
                        return Ok(TransitionResult::new(ChatState {
                            editing_message_id: None,
                            ..state.clone()
                        }));
                    }
                    Err(e) => return Err(e.into()),
                },
                None => view.messages.len(),
            };

            Ok(send_question(
                view,
                context,
                state.input.clone(),
                attachment,
                cut,
                None,
            ))
        }

        Event::Retry { message_id } => {
            if state.is_response_loading() {
                return Err(TransitionError::Busy);
            }
            let index = find_unique(view.messages, &message_id)?;
            let target = &view.messages[index];
            if !target.is_user {
                return Err(TransitionError::NotUserMessage(message_id));
            }

            Ok(send_question(
                view,
                context,
                target.text.clone(),
                None,
                index,
                state.editing_message_id.clone(),
            ))
        }

        Event::SuggestionPicked { label } => {
            if state.is_response_loading() {
                return Err(TransitionError::Busy);
            }
            let suggestion = view
                .suggestions
                .iter()
                .find(|s| s.label == label)
                .ok_or_else(|| TransitionError::UnknownSuggestion(label.clone()))?;

            Ok(send_question(
                view,
                context,
                suggestion.question.clone(),
                None,
                view.messages.len(),
                state.editing_message_id.clone(),
            )
            .with_effect(Effect::DismissSuggestion { label })
            .with_effect(Effect::PersistSuggestions))
        }

        // ============================================================
        // Editing
        // ============================================================
        Event::Edit { message_id } => {
            let index = find_unique(view.messages, &message_id)?;
            let target = &view.messages[index];
            if !target.is_user {
                return Err(TransitionError::NotUserMessage(message_id));
            }
            Ok(TransitionResult::new(ChatState {
                phase: state.phase.clone(),
                input: target.text.clone(),
                editing_message_id: Some(message_id),
            }))
        }

        Event::CancelEdit => Ok(TransitionResult::new(ChatState {
            phase: state.phase.clone(),
            editing_message_id: None,
            input: String::new(),
        })),

        // ============================================================
        // Transcript maintenance
        // ============================================================
        Event::Clear => {
            let phase = match &state.phase {
                Phase::AwaitingReply { question_id, .. } => Phase::AwaitingReply {
                    question_id: question_id.clone(),
                    superseded: true,
                },
                Phase::Idle => Phase::Idle,
            };

            Ok(TransitionResult::new(ChatState {
                phase,
                editing_message_id: None,
                input: state.input.clone(),
            })
            .with_effects([
                Effect::ClearTranscript,
                Effect::ClearHistory,
                Effect::ResetSuggestions {
                    role: context.session.role(),
                },
                Effect::ForgetSuggestions,
            ]))
        }

        Event::SetFeedback {
            message_id,
            feedback,
        } => {
            let index = find_unique(view.messages, &message_id)?;
            let target = &view.messages[index];
            if target.is_user {
                return Err(TransitionError::NotAssistantMessage(message_id));
            }

            Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::SetFeedback {
                    message_id,
                    feedback: Feedback::toggle(target.feedback, feedback),
                })
                .with_effect(Effect::PersistHistory))
        }

        Event::SessionChanged { session } => {
            let role = session.role();
            let role_changed = role != context.session.role();

            let result = TransitionResult::new(state.clone())
                .with_effect(Effect::UpdateSession(session));
            if role_changed {
                Ok(result
                    .with_effect(Effect::ResetSuggestions { role })
                    .with_effect(Effect::PersistSuggestions))
            } else {
                Ok(result)
            }
        }

        // ============================================================
        // Replies
        // ============================================================
        Event::ReplyReceived { question_id, text } => {
            let superseded = awaited(state, &question_id)?;
            let result = TransitionResult::new(state.with_phase(Phase::Idle));
            if superseded {
                return Ok(result);
            }
            Ok(result
                .with_effect(Effect::AppendMessage(Message::assistant(format_reply(&text))))
                .with_effect(Effect::PersistHistory))
        }

        Event::ReplyFailed { question_id, .. } => {
            let superseded = awaited(state, &question_id)?;
            let result = TransitionResult::new(state.with_phase(Phase::Idle));
            if superseded {
                return Ok(result);
            }
            Ok(result
                .with_effect(Effect::AppendMessage(Message::assistant_error()))
                .with_effect(Effect::PersistHistory))
        }
    }
}

// Helper functions

/// Whether `question_id` is the awaited question, and if so whether its
/// reply was superseded by a clear.
fn awaited(state: &ChatState, question_id: &str) -> Result<bool, TransitionError> {
    match &state.phase {
        Phase::AwaitingReply {
            question_id: awaited,
            superseded,
        } if awaited == question_id => Ok(*superseded),
        _ => Err(TransitionError::StaleReply(question_id.to_string())),
    }
}

/// Replace everything from `cut` onwards with a fresh user question and ask it.
fn send_question(
    view: &ChatView<'_>,
    context: &ChatContext,
    text: String,
    attachment: Option<Attachment>,
    cut: usize,
    editing_message_id: Option<MessageId>,
) -> TransitionResult {
    let question = Message::user(text.clone(), attachment.as_ref().map(Attachment::meta));
    let question_id = question.id.clone();

    let request = AskRequest {
        question: text,
        history: view.messages[..cut].to_vec(),
        scope: context.session.scope,
        course: context.session.course().map(String::from),
        attachment,
    };

    let mut effects = Vec::with_capacity(4);
    if cut < view.messages.len() {
        effects.push(Effect::TruncateFrom { index: cut });
    }
    effects.push(Effect::AppendMessage(question));
    effects.push(Effect::PersistHistory);
    effects.push(Effect::RequestReply {
        question_id: question_id.clone(),
        request,
    });

    TransitionResult::new(ChatState {
        phase: Phase::AwaitingReply {
            question_id,
            superseded: false,
        },
        editing_message_id,
        input: String::new(),
    })
    .with_effects(effects)
}
