//! In-memory transcript
//!
//! The store is the single source of truth for the conversation. Only the
//! runtime mutates it, and only through the operations below.

use crate::message::{Feedback, Message};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Message not found: {0}")]
    MessageNotFound(String),
    #[error("Message id is not unique: {0}")]
    DuplicateId(String),
    #[error("Feedback only applies to assistant messages: {0}")]
    NotAssistantMessage(String),
}

/// Locate `id` in `messages`, refusing to pick one of several matches.
pub fn find_unique(messages: &[Message], id: &str) -> Result<usize, StoreError> {
    let mut matches = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.id == id)
        .map(|(i, _)| i);

    match (matches.next(), matches.next()) {
        (Some(index), None) => Ok(index),
        (Some(_), Some(_)) => Err(StoreError::DuplicateId(id.to_string())),
        (None, _) => Err(StoreError::MessageNotFound(id.to_string())),
    }
}

/// Ordered message list; insertion order is display order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Keep only the messages before `index`; returns how many were dropped.
    pub fn truncate_from(&mut self, index: usize) -> usize {
        let before = self.messages.len();
        self.messages.truncate(index);
        before - self.messages.len()
    }

    /// Drop the `count` oldest messages.
    pub fn drop_oldest(&mut self, count: usize) {
        let count = count.min(self.messages.len());
        self.messages.drain(..count);
    }

    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn position(&self, id: &str) -> Result<usize, StoreError> {
        find_unique(&self.messages, id)
    }

    pub fn get(&self, id: &str) -> Result<&Message, StoreError> {
        let index = self.position(id)?;
        Ok(&self.messages[index])
    }

    /// Set (or clear) the feedback of an assistant message.
    pub fn set_feedback(
        &mut self,
        id: &str,
        feedback: Option<Feedback>,
    ) -> Result<(), StoreError> {
        let index = self.position(id)?;
        let message = &mut self.messages[index];
        if message.is_user {
            return Err(StoreError::NotAssistantMessage(id.to_string()));
        }
        message.feedback = feedback;
        Ok(())
    }

    /// The only reply the UI lets the reader rate
    pub fn latest_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| !m.is_user)
    }
}
