//! Dismissible prompt shortcuts

use crate::session::Role;
use serde::{Deserialize, Serialize};

/// A prompt shortcut; `label` is the removal key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub label: String,
    pub question: String,
}

impl Suggestion {
    pub fn new(label: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            question: question.into(),
        }
    }
}

pub fn default_suggestions(role: Role) -> Vec<Suggestion> {
    match role {
        Role::Student => vec![
            Suggestion::new("IoT career choices", "What are some career choices in IoT?"),
            Suggestion::new("Next lecture", "Show me details of the next lecture."),
            Suggestion::new("Test week", "When is the test week?"),
        ],
        Role::Guest => vec![
            Suggestion::new("Courses offered", "Which courses does the faculty offer?"),
            Suggestion::new("Applications", "How do I apply to study here?"),
            Suggestion::new("Campus contacts", "Who do I contact for student support?"),
        ],
    }
}

/// Active suggestion list for the current role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionEngine {
    role: Role,
    items: Vec<Suggestion>,
}

impl SuggestionEngine {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            items: default_suggestions(role),
        }
    }

    /// Restore a previously persisted list
    pub fn from_saved(role: Role, items: Vec<Suggestion>) -> Self {
        Self { role, items }
    }

    pub fn items(&self) -> &[Suggestion] {
        &self.items
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn find(&self, label: &str) -> Option<&Suggestion> {
        self.items.iter().find(|s| s.label == label)
    }

    /// Remove every entry carrying `label`; returns whether anything was removed.
    pub fn dismiss(&mut self, label: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|s| s.label != label);
        self.items.len() != before
    }

    /// Back to the defaults, e.g. after the chat is cleared or the role changes
    pub fn reset(&mut self, role: Role) {
        self.role = role;
        self.items = default_suggestions(role);
    }
}
