//! Chat runtime executor

use super::{ChatHandle, ChatSnapshot, ChatUpdate};

use crate::db::SlotStore;
use crate::inference::InferenceClient;
use crate::persistence::{Persistence, SaveOutcome};
use crate::session::Session;
use crate::state_machine::{transition, ChatContext, ChatState, ChatView, Effect, Event};
use crate::store::MessageStore;
use crate::suggestions::SuggestionEngine;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Single chat session, generic over where state is kept and who answers
pub struct ChatRuntime<S, C>
where
    S: SlotStore + 'static,
    C: InferenceClient + 'static,
{
    context: ChatContext,
    state: ChatState,
    store: MessageStore,
    suggestions: SuggestionEngine,
    persistence: Persistence<S>,
    client: Arc<C>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<ChatUpdate>,
    snapshot_tx: watch::Sender<ChatSnapshot>,
    shutdown: CancellationToken,
}

impl<S, C> ChatRuntime<S, C>
where
    S: SlotStore + 'static,
    C: InferenceClient + 'static,
{
    /// Hydrate a session from `persistence` and return it with its handle.
    pub fn new(persistence: Persistence<S>, client: C) -> (Self, ChatHandle) {
        let session = persistence.load_session();
        let store = MessageStore::from_messages(persistence.load_history());
        let suggestions = persistence.load_suggestions(session.role());

        tracing::info!(
            messages = store.len(),
            suggestions = suggestions.items().len(),
            scope = %session.scope,
            authenticated = session.is_authenticated(),
            "Restored chat session"
        );

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) = watch::channel(ChatSnapshot::default());
        let shutdown = CancellationToken::new();

        let runtime = Self {
            context: ChatContext::new(session),
            state: ChatState::default(),
            store,
            suggestions,
            persistence,
            client: Arc::new(client),
            event_rx,
            event_tx: event_tx.clone(),
            broadcast_tx: broadcast_tx.clone(),
            snapshot_tx,
            shutdown: shutdown.clone(),
        };
        runtime.publish_snapshot();

        let handle = ChatHandle {
            event_tx,
            broadcast_tx,
            snapshot_rx,
            shutdown,
        };
        (runtime, handle)
    }

    pub async fn run(mut self) {
        tracing::info!(endpoint = %self.client.endpoint(), "Starting chat runtime");

        // Fire-and-forget liveness probe; the outcome only gets logged
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.wakeup().await {
                Ok(()) => tracing::debug!("Inference endpoint awake"),
                Err(error) => tracing::debug!(error = %error, "Wakeup probe failed, continuing"),
            }
        });

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                Some(event) = self.event_rx.recv() => {
                    self.process_event(event);
                }

                else => break,
            }
        }

        tracing::info!("Chat runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        let internal = event.is_internal();
        let view = ChatView {
            messages: self.store.messages(),
            suggestions: self.suggestions.items(),
        };

        let result = match transition(&self.state, &view, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                if internal {
                    tracing::debug!(error = %e, "Ignoring reply");
                } else {
                    // Reader-facing (e.g. "still waiting for the previous reply")
                    tracing::warn!(error = %e, "Event rejected");
                    let _ = self.broadcast_tx.send(ChatUpdate::Rejected {
                        reason: e.to_string(),
                    });
                }
                return;
            }
        };

        let old_state = std::mem::replace(&mut self.state, result.new_state);

        for effect in result.effects {
            self.execute_effect(effect);
        }

        self.publish_state_changes(&old_state);
        self.publish_snapshot();
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendMessage(message) => {
                self.store.append(message.clone());
                let _ = self
                    .broadcast_tx
                    .send(ChatUpdate::MessageAppended { message });
            }

            Effect::TruncateFrom { index } => {
                let removed = self.store.truncate_from(index);
                tracing::debug!(index, removed, "Truncated transcript");
                let _ = self
                    .broadcast_tx
                    .send(ChatUpdate::TranscriptTruncated { len: index });
            }

            Effect::ClearTranscript => {
                self.store.clear();
                let _ = self.broadcast_tx.send(ChatUpdate::TranscriptCleared);
            }

            Effect::SetFeedback {
                message_id,
                feedback,
            } => {
                if let Err(e) = self.store.set_feedback(&message_id, feedback) {
                    tracing::error!(error = %e, "Failed to set feedback");
                    return;
                }
                let _ = self.broadcast_tx.send(ChatUpdate::FeedbackChanged {
                    message_id,
                    feedback,
                });
            }

            Effect::PersistHistory => {
                if let SaveOutcome::Trimmed { dropped } =
                    self.persistence.save_history(self.store.messages())
                {
                    // Keep memory identical to what was stored
                    self.store.drop_oldest(dropped);
                    let _ = self
                        .broadcast_tx
                        .send(ChatUpdate::TranscriptTrimmed { dropped });
                }
            }

            Effect::ClearHistory => self.persistence.clear_history(),

            Effect::DismissSuggestion { label } => {
                if self.suggestions.dismiss(&label) {
                    self.publish_suggestions();
                }
            }

            Effect::ResetSuggestions { role } => {
                self.suggestions.reset(role);
                self.publish_suggestions();
            }

            Effect::PersistSuggestions => {
                self.persistence.save_suggestions(self.suggestions.items());
            }

            Effect::ForgetSuggestions => self.persistence.clear_suggestions(),

            Effect::UpdateSession(session) => self.update_session(session),

            Effect::RequestReply {
                question_id,
                request,
            } => {
                let client = self.client.clone();
                let event_tx = self.event_tx.clone();
                let cancel = self.shutdown.child_token();

                tracing::info!(
                    question_id = %question_id,
                    history_len = request.history.len(),
                    has_attachment = request.attachment.is_some(),
                    "Sending question"
                );

                tokio::spawn(async move {
                    tokio::select! {
                        biased;

                        () = cancel.cancelled() => {
                            tracing::info!(question_id = %question_id, "Reply abandoned on shutdown");
                        }

                        result = client.ask(&request) => {
                            let event = match result {
                                Ok(reply) => Event::ReplyReceived {
                                    question_id,
                                    text: reply.text,
                                },
                                Err(error) => Event::ReplyFailed { question_id, error },
                            };
                            let _ = event_tx.send(event).await;
                        }
                    }
                });
            }
        }
    }

    fn update_session(&mut self, session: Session) {
        let previous = &self.context.session;
        if previous.user != session.user {
            self.persistence.save_user(session.user.as_ref());
        }
        if previous.scope != session.scope {
            self.persistence.save_scope(session.scope);
        }

        tracing::info!(
            scope = %session.scope,
            authenticated = session.is_authenticated(),
            "Session updated"
        );
        self.context.session = session.clone();
        let _ = self
            .broadcast_tx
            .send(ChatUpdate::SessionChanged { session });
    }

    fn publish_suggestions(&self) {
        let _ = self.broadcast_tx.send(ChatUpdate::SuggestionsChanged {
            suggestions: self.suggestions.items().to_vec(),
        });
    }

    fn publish_state_changes(&self, old: &ChatState) {
        let new = &self.state;
        if old.is_response_loading() != new.is_response_loading() {
            let _ = self.broadcast_tx.send(ChatUpdate::LoadingChanged {
                loading: new.is_response_loading(),
            });
        }
        if old.editing_message_id != new.editing_message_id {
            let _ = self.broadcast_tx.send(ChatUpdate::EditingChanged {
                message_id: new.editing_message_id.clone(),
            });
        }
        if old.input != new.input {
            let _ = self.broadcast_tx.send(ChatUpdate::InputChanged {
                text: new.input.clone(),
            });
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(ChatSnapshot {
            messages: self.store.messages().to_vec(),
            suggestions: self.suggestions.items().to_vec(),
            state: self.state.clone(),
            session: self.context.session.clone(),
        });
    }
}
