//! Best-effort mirroring of chat state into durable slots
//!
//! Nothing in here returns an error to the caller. A slot that cannot be
//! read or parsed behaves like an empty one, and a failed write is logged
//! and otherwise ignored.

use crate::db::{SlotStore, StorageError, StorageResult};
use crate::db::{HISTORY_KEY, SCOPE_KEY, SESSION_KEY, SUGGESTIONS_KEY};
use crate::message::Message;
use crate::session::{Role, Scope, Session, User};
use crate::suggestions::{Suggestion, SuggestionEngine};

/// Upper bound on the serialized transcript, in bytes
pub const MAX_HISTORY_BYTES: usize = 5 * 1024 * 1024;

/// What happened to a transcript save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Stored as-is
    Stored,
    /// The oldest `dropped` messages had to go to fit under the cap; the
    /// caller must drop them in memory too
    Trimmed { dropped: usize },
    /// The write failed and was logged
    Failed,
}

/// Encode `messages` as a JSON array no longer than `cap` bytes by evicting
/// from the front. Returns the number of evicted messages and the encoding.
pub fn encode_within_cap(messages: &[Message], cap: usize) -> serde_json::Result<(usize, String)> {
    let encoded: Vec<String> = messages
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<_, _>>()?;

    // "[" + items joined by "," + "]"
    let mut total = 2 + encoded.iter().map(String::len).sum::<usize>() + encoded.len().saturating_sub(1);
    let mut dropped = 0;
    while total > cap && dropped < encoded.len() {
        total -= encoded[dropped].len();
        if encoded.len() - dropped > 1 {
            total -= 1;
        }
        dropped += 1;
    }

    let json = format!("[{}]", encoded[dropped..].join(","));
    debug_assert_eq!(json.len(), total);
    Ok((dropped, json))
}

/// Persistence adapter over a slot store
pub struct Persistence<S: SlotStore> {
    slots: S,
    history_cap: usize,
}

impl<S: SlotStore> Persistence<S> {
    pub fn new(slots: S) -> Self {
        Self::with_history_cap(slots, MAX_HISTORY_BYTES)
    }

    pub fn with_history_cap(slots: S, history_cap: usize) -> Self {
        Self { slots, history_cap }
    }

    pub fn slots(&self) -> &S {
        &self.slots
    }

    pub fn history_cap(&self) -> usize {
        self.history_cap
    }

    // ==================== Transcript ====================

    /// Restore the transcript. Any malformed element discards the whole
    /// stored value.
    pub fn load_history(&self) -> Vec<Message> {
        match self.try_load_history() {
            Ok(messages) => messages,
            Err(StorageError::InvalidValue { key, reason }) => {
                tracing::error!(slot = %key, reason = %reason, "Discarding invalid stored history");
                if let Err(e) = self.slots.remove(HISTORY_KEY) {
                    tracing::warn!(error = %e, "Failed to remove invalid history");
                }
                Vec::new()
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load history");
                Vec::new()
            }
        }
    }

    fn try_load_history(&self) -> StorageResult<Vec<Message>> {
        let Some(raw) = self.slots.get(HISTORY_KEY)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str::<Vec<Message>>(&raw).map_err(|e| StorageError::InvalidValue {
            key: HISTORY_KEY.to_string(),
            reason: e.to_string(),
        })
    }

    /// Mirror the full transcript, evicting oldest messages past the cap.
    pub fn save_history(&self, messages: &[Message]) -> SaveOutcome {
        let (dropped, json) = match encode_within_cap(messages, self.history_cap) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize history");
                return SaveOutcome::Failed;
            }
        };

        if let Err(e) = self.slots.set(HISTORY_KEY, &json) {
            tracing::error!(error = %e, "Failed to save history");
            return SaveOutcome::Failed;
        }

        if dropped == 0 {
            SaveOutcome::Stored
        } else {
            tracing::warn!(
                dropped,
                kept = messages.len() - dropped,
                cap = self.history_cap,
                "History over size cap, evicted oldest messages"
            );
            SaveOutcome::Trimmed { dropped }
        }
    }

    pub fn clear_history(&self) {
        if let Err(e) = self.slots.remove(HISTORY_KEY) {
            tracing::error!(error = %e, "Failed to clear history");
        }
    }

    // ==================== Suggestions ====================

    /// Saved suggestion list, or the role's defaults when none is stored
    pub fn load_suggestions(&self, role: Role) -> SuggestionEngine {
        let saved = self
            .slots
            .get(SUGGESTIONS_KEY)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                raw.map(|raw| serde_json::from_str::<Vec<Suggestion>>(&raw))
                    .transpose()
                    .map_err(|e| e.to_string())
            });

        match saved {
            Ok(Some(items)) => SuggestionEngine::from_saved(role, items),
            Ok(None) => SuggestionEngine::new(role),
            Err(reason) => {
                tracing::warn!(reason = %reason, "Ignoring stored suggestions");
                SuggestionEngine::new(role)
            }
        }
    }

    pub fn save_suggestions(&self, items: &[Suggestion]) {
        let result = serde_json::to_string(items)
            .map_err(StorageError::from)
            .and_then(|json| self.slots.set(SUGGESTIONS_KEY, &json));
        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to save suggestions");
        }
    }

    pub fn clear_suggestions(&self) {
        if let Err(e) = self.slots.remove(SUGGESTIONS_KEY) {
            tracing::error!(error = %e, "Failed to clear suggestions");
        }
    }

    // ==================== Session ====================

    /// Stored user and scope; missing or unreadable slots yield a guest in
    /// the default scope.
    pub fn load_session(&self) -> Session {
        let user = match self.slots.get(SESSION_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<User>(&raw)
                .map_err(|e| tracing::warn!(error = %e, "Ignoring stored session"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session");
                None
            }
        };

        let scope = match self.slots.get(SCOPE_KEY) {
            Ok(Some(raw)) => raw.parse::<Scope>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring stored scope");
                Scope::default()
            }),
            Ok(None) => Scope::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read scope");
                Scope::default()
            }
        };

        Session { user, scope }
    }

    /// Store the signed-in user, or forget it on logout
    pub fn save_user(&self, user: Option<&User>) {
        let result = match user {
            Some(user) => serde_json::to_string(user)
                .map_err(StorageError::from)
                .and_then(|json| self.slots.set(SESSION_KEY, &json)),
            None => self.slots.remove(SESSION_KEY),
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to save session");
        }
    }

    pub fn save_scope(&self, scope: Scope) {
        if let Err(e) = self.slots.set(SCOPE_KEY, scope.as_str()) {
            tracing::error!(error = %e, "Failed to save scope");
        }
    }
}
