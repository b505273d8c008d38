//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::{ChatHandle, ChatRuntime, ChatSnapshot, ChatUpdate};
use crate::db::{SlotStore, StorageError, StorageResult, HISTORY_KEY};
use crate::inference::{AskReply, AskRequest, InferenceClient, InferenceError};
use crate::message::Message;
use crate::persistence::{Persistence, MAX_HISTORY_BYTES};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

// ============================================================================
// Mock Inference Client
// ============================================================================

/// Mock inference client that returns queued replies
pub struct MockInferenceClient {
    replies: Mutex<VecDeque<Result<AskReply, InferenceError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<AskRequest>>,
    pub wakeups: AtomicUsize,
    wakeup_error: Mutex<Option<InferenceError>>,
}

impl MockInferenceClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            wakeups: AtomicUsize::new(0),
            wakeup_error: Mutex::new(None),
        }
    }

    /// Make the next wakeup probe fail
    pub fn fail_wakeup(&self, error: InferenceError) {
        *self.wakeup_error.lock().unwrap() = Some(error);
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(AskReply { text: text.into() }));
    }

    /// Queue a failure
    pub fn queue_error(&self, error: InferenceError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<AskRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Result<AskReply, InferenceError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(InferenceError::network("No mock reply queued")))
    }
}

impl Default for MockInferenceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn ask(&self, request: &AskRequest) -> Result<AskReply, InferenceError> {
        self.requests.lock().unwrap().push(request.clone());
        self.next_reply()
    }

    async fn wakeup(&self) -> Result<(), InferenceError> {
        self.wakeups.fetch_add(1, Ordering::SeqCst);
        match self.wakeup_error.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn endpoint(&self) -> &str {
        "mock://inference"
    }
}

// ============================================================================
// Gated Mock Inference Client (for in-flight testing)
// ============================================================================

/// Mock client that holds each reply until the test releases it
pub struct DelayedMockInferenceClient {
    inner: MockInferenceClient,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
    release: Arc<Notify>,
}

impl DelayedMockInferenceClient {
    pub fn new() -> Self {
        Self {
            inner: MockInferenceClient::new(),
            request_started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    pub fn queue_reply(&self, text: impl Into<String>) {
        self.inner.queue_reply(text);
    }

    /// Let one pending request complete
    pub fn release_one(&self) {
        self.release.notify_one();
    }

    pub fn recorded_requests(&self) -> Vec<AskRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl InferenceClient for DelayedMockInferenceClient {
    async fn ask(&self, request: &AskRequest) -> Result<AskReply, InferenceError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_one();
        self.release.notified().await;
        self.inner.next_reply()
    }

    fn endpoint(&self) -> &str {
        "mock://delayed"
    }
}

// ============================================================================
// In-memory Slots
// ============================================================================

/// Slot store kept in a map, with switchable write failures
#[derive(Default)]
pub struct MemorySlots {
    values: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (e.g. quota exceeded)
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("slot quota exceeded")));
        }
        Ok(())
    }
}

impl SlotStore for MemorySlots {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_writable()?;
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_writable()?;
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

// ============================================================================
// Test Harness
// ============================================================================

const WAIT: Duration = Duration::from_secs(2);

/// Helper for running a chat runtime with minimal boilerplate
pub struct TestChat<C: InferenceClient + 'static> {
    pub handle: ChatHandle,
    pub slots: Arc<MemorySlots>,
    pub client: Arc<C>,
    pub updates: broadcast::Receiver<ChatUpdate>,
    _runtime_handle: tokio::task::JoinHandle<()>,
}

impl<C: InferenceClient + 'static> TestChat<C> {
    pub fn start(client: C) -> Self {
        Self::start_with(client, Arc::new(MemorySlots::new()), MAX_HISTORY_BYTES)
    }

    /// Start over existing slots with a custom history cap
    pub fn start_with(client: C, slots: Arc<MemorySlots>, history_cap: usize) -> Self {
        let client = Arc::new(client);
        let persistence = Persistence::with_history_cap(slots.clone(), history_cap);
        let (runtime, handle) = ChatRuntime::new(persistence, client.clone());
        let updates = handle.subscribe();

        let runtime_handle = tokio::spawn(async move {
            runtime.run().await;
        });

        Self {
            handle,
            slots,
            client,
            updates,
            _runtime_handle: runtime_handle,
        }
    }

    /// Wait until a published snapshot satisfies `pred`
    pub async fn wait_until(&self, pred: impl FnMut(&ChatSnapshot) -> bool) -> ChatSnapshot {
        let mut rx = self.handle.watch();
        let snapshot = tokio::time::timeout(WAIT, rx.wait_for(pred))
            .await
            .expect("timed out waiting for snapshot")
            .expect("runtime stopped");
        snapshot.clone()
    }

    /// Wait until the reply to the last question has been handled
    pub async fn wait_idle_with(&self, len: usize) -> ChatSnapshot {
        self.wait_until(|s| !s.is_response_loading() && s.messages.len() == len)
            .await
    }

    /// Wait for an update matching `pred`, skipping others
    pub async fn wait_for_update(&mut self, pred: impl Fn(&ChatUpdate) -> bool) -> ChatUpdate {
        let deadline = tokio::time::Instant::now() + WAIT;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.updates.recv()).await {
                Ok(Ok(update)) if pred(&update) => return update,
                _ => continue,
            }
        }
        panic!("timed out waiting for update");
    }

    /// Transcript as currently stored, if any
    pub fn stored_history(&self) -> Option<Vec<Message>> {
        self.slots
            .raw(HISTORY_KEY)
            .map(|raw| serde_json::from_str(&raw).expect("stored history is valid"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::Attachment;
    use crate::db::{SCOPE_KEY, SESSION_KEY, SUGGESTIONS_KEY};
    use crate::message::{Feedback, MessageStatus, ERROR_REPLY_TEXT};
    use crate::session::{Role, Scope, Session, User};
    use crate::state_machine::Event;
    use crate::suggestions::{default_suggestions, Suggestion};

    fn student() -> User {
        User {
            username: "21900123".to_string(),
            name: "Thandi".to_string(),
            email: "21900123@dut4life.ac.za".to_string(),
            course: "BICIOT".to_string(),
            verified: true,
            ..User::default()
        }
    }

    #[tokio::test]
    async fn test_question_appears_before_reply() {
        let client = DelayedMockInferenceClient::new();
        client.queue_reply("**Monday**\nat 8");
        let chat = TestChat::start(client);

        chat.handle.ask("When does class start?", None).await.unwrap();
        tokio::time::timeout(WAIT, chat.client.request_started.notified())
            .await
            .expect("request should start");

        let pending = chat.handle.snapshot();
        assert_eq!(pending.messages.len(), 1);
        assert!(pending.messages[0].is_user);
        assert_eq!(pending.messages[0].text, "When does class start?");
        assert!(pending.is_response_loading());
        assert!(pending.state.input.is_empty());

        chat.client.release_one();
        let done = chat.wait_idle_with(2).await;
        assert!(!done.messages[1].is_user);
        assert_eq!(done.messages[1].text, "<b>Monday</b><br />at 8");
        assert_eq!(chat.stored_history().unwrap(), done.messages);
    }

    #[tokio::test]
    async fn test_failure_becomes_error_message() {
        let client = MockInferenceClient::new();
        client.queue_error(InferenceError::server(502, "bad gateway"));
        let chat = TestChat::start(client);

        chat.handle.ask("hello", None).await.unwrap();
        let done = chat.wait_idle_with(2).await;

        let reply = &done.messages[1];
        assert_eq!(reply.status, MessageStatus::Error);
        assert_eq!(reply.text, ERROR_REPLY_TEXT);
        assert_eq!(chat.stored_history().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_second_question_rejected_while_loading() {
        let client = DelayedMockInferenceClient::new();
        client.queue_reply("first");
        let mut chat = TestChat::start(client);

        chat.handle.ask("one", None).await.unwrap();
        tokio::time::timeout(WAIT, chat.client.request_started.notified())
            .await
            .unwrap();

        chat.handle.ask("two", None).await.unwrap();
        let update = chat
            .wait_for_update(|u| matches!(u, ChatUpdate::Rejected { .. }))
            .await;
        assert!(matches!(
            update,
            ChatUpdate::Rejected { reason } if reason == "Still waiting for the previous reply"
        ));

        chat.client.release_one();
        let done = chat.wait_idle_with(2).await;
        assert_eq!(done.messages[0].text, "one");
        assert_eq!(chat.client.recorded_requests().len(), 1);
        // The refused text stays in the input for another try
        assert_eq!(done.state.input, "two");
    }

    #[tokio::test]
    async fn test_retry_replays_from_question() {
        let client = MockInferenceClient::new();
        client.queue_reply("a1");
        client.queue_error(InferenceError::network("connection reset"));
        client.queue_reply("a2");
        let chat = TestChat::start(client);

        chat.handle.ask("q1", None).await.unwrap();
        chat.wait_idle_with(2).await;
        chat.handle.ask("q2", None).await.unwrap();
        let failed = chat.wait_idle_with(4).await;
        assert!(failed.messages[3].is_error());

        let target = failed.messages[2].clone();
        chat.handle
            .send(Event::Retry {
                message_id: target.id.clone(),
            })
            .await
            .unwrap();
        let done = chat
            .wait_until(|s| !s.is_response_loading() && s.messages.last().is_some_and(|m| m.text == "a2"))
            .await;

        assert_eq!(done.messages.len(), 4);
        assert_eq!(done.messages[..2], failed.messages[..2]);
        assert_eq!(done.messages[2].text, "q2");
        assert_ne!(done.messages[2].id, target.id);

        let requests = chat.client.recorded_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].history, failed.messages[..2].to_vec());
    }

    #[tokio::test]
    async fn test_edit_replaces_question() {
        let client = MockInferenceClient::new();
        client.queue_reply("a1");
        client.queue_reply("about X");
        let chat = TestChat::start(client);

        chat.handle.ask("u1", None).await.unwrap();
        let first = chat.wait_idle_with(2).await;
        let u1 = first.messages[0].clone();

        chat.handle
            .send(Event::Edit {
                message_id: u1.id.clone(),
            })
            .await
            .unwrap();
        let editing = chat.wait_until(|s| s.state.is_editing()).await;
        assert_eq!(editing.state.input, "u1");

        chat.handle.ask("X", None).await.unwrap();
        let done = chat
            .wait_until(|s| {
                !s.is_response_loading() && s.messages.len() == 2 && s.messages[0].text == "X"
            })
            .await;

        assert_ne!(done.messages[0].id, u1.id);
        assert_eq!(done.messages[0].status, MessageStatus::Sent);
        assert_eq!(done.messages[1].text, "about X");
        assert!(!done.state.is_editing());
        assert!(chat.client.recorded_requests()[1].history.is_empty());
    }

    #[tokio::test]
    async fn test_clear_empties_store_and_slot() {
        let client = MockInferenceClient::new();
        client.queue_reply("hi");
        let chat = TestChat::start(client);

        chat.handle.ask("hello", None).await.unwrap();
        chat.wait_idle_with(2).await;
        assert!(chat.slots.raw(HISTORY_KEY).is_some());

        chat.handle.send(Event::Clear).await.unwrap();
        let cleared = chat.wait_until(|s| s.messages.is_empty()).await;

        assert!(chat.slots.raw(HISTORY_KEY).is_none());
        assert!(chat.slots.raw(SUGGESTIONS_KEY).is_none());
        assert_eq!(cleared.suggestions, default_suggestions(Role::Guest));
    }

    #[tokio::test]
    async fn test_clear_while_waiting_drops_late_reply() {
        let client = DelayedMockInferenceClient::new();
        client.queue_reply("too late");
        let chat = TestChat::start(client);

        chat.handle.ask("question", None).await.unwrap();
        tokio::time::timeout(WAIT, chat.client.request_started.notified())
            .await
            .unwrap();

        chat.handle.send(Event::Clear).await.unwrap();
        chat.wait_until(|s| s.messages.is_empty()).await;

        chat.client.release_one();
        let done = chat.wait_until(|s| !s.is_response_loading()).await;
        assert!(done.messages.is_empty());
        assert!(chat.slots.raw(HISTORY_KEY).is_none());
    }

    #[tokio::test]
    async fn test_feedback_toggles_and_persists() {
        let client = MockInferenceClient::new();
        client.queue_reply("answer");
        let chat = TestChat::start(client);

        chat.handle.ask("question", None).await.unwrap();
        let done = chat.wait_idle_with(2).await;
        let reply_id = done.messages[1].id.clone();

        let press = |feedback| Event::SetFeedback {
            message_id: reply_id.clone(),
            feedback,
        };

        chat.handle.send(press(Feedback::Like)).await.unwrap();
        chat.wait_until(|s| s.messages[1].feedback == Some(Feedback::Like))
            .await;
        assert_eq!(
            chat.stored_history().unwrap()[1].feedback,
            Some(Feedback::Like)
        );

        chat.handle.send(press(Feedback::Dislike)).await.unwrap();
        chat.wait_until(|s| s.messages[1].feedback == Some(Feedback::Dislike))
            .await;

        chat.handle.send(press(Feedback::Dislike)).await.unwrap();
        chat.wait_until(|s| s.messages[1].feedback.is_none()).await;
        assert_eq!(chat.stored_history().unwrap()[1].feedback, None);
    }

    #[tokio::test]
    async fn test_suggestion_is_sent_and_dismissed() {
        let client = MockInferenceClient::new();
        client.queue_reply("Here are the courses");
        let chat = TestChat::start(client);

        let picked: Suggestion = chat.handle.snapshot().suggestions[0].clone();
        chat.handle
            .send(Event::SuggestionPicked {
                label: picked.label.clone(),
            })
            .await
            .unwrap();
        let done = chat.wait_idle_with(2).await;

        assert_eq!(done.messages[0].text, picked.question);
        assert!(!done.suggestions.contains(&picked));

        let stored: Vec<Suggestion> =
            serde_json::from_str(&chat.slots.raw(SUGGESTIONS_KEY).unwrap()).unwrap();
        assert_eq!(stored, done.suggestions);
    }

    #[tokio::test]
    async fn test_restores_previous_session() {
        let slots = Arc::new(MemorySlots::new());
        let history = vec![Message::user("q", None), Message::assistant("a")];
        {
            let persistence = Persistence::new(slots.clone());
            persistence.save_history(&history);
            persistence.save_user(Some(&student()));
            persistence.save_scope(Scope::Biciot);
        }

        let client = MockInferenceClient::new();
        client.queue_reply("hi again");
        let chat = TestChat::start_with(client, slots, MAX_HISTORY_BYTES);

        let restored = chat.handle.snapshot();
        assert_eq!(restored.messages, history);
        assert!(restored.session.is_authenticated());
        assert_eq!(restored.session.scope, Scope::Biciot);
        assert_eq!(restored.suggestions, default_suggestions(Role::Student));

        chat.handle.ask("follow up", None).await.unwrap();
        chat.wait_idle_with(4).await;
        let request = &chat.client.recorded_requests()[0];
        assert_eq!(request.history, history);
        assert_eq!(request.scope, Scope::Biciot);
        assert_eq!(request.course.as_deref(), Some("BICIOT"));
    }

    #[tokio::test]
    async fn test_attachment_meta_kept_in_history() {
        let client = MockInferenceClient::new();
        client.queue_reply("summary");
        let chat = TestChat::start(client);

        let attachment =
            Attachment::new("notes.pdf", crate::attachment::PDF_TYPE, b"%PDF".to_vec()).unwrap();
        chat.handle
            .ask("summarise", Some(attachment.clone()))
            .await
            .unwrap();
        let done = chat.wait_idle_with(2).await;

        assert_eq!(done.messages[0].attachment, Some(attachment.meta()));
        assert_eq!(
            chat.client.recorded_requests()[0].attachment.as_ref(),
            Some(&attachment)
        );
    }

    #[tokio::test]
    async fn test_trimming_reaches_memory() {
        let client = MockInferenceClient::new();
        for i in 0..6 {
            client.queue_reply(format!("reply number {i} with some padding text"));
        }
        let cap = 700;
        let mut chat = TestChat::start_with(client, Arc::new(MemorySlots::new()), cap);

        for i in 0..6 {
            chat.handle
                .ask(format!("question number {i}"), None)
                .await
                .unwrap();
            chat.wait_until(|s| {
                !s.is_response_loading()
                    && s.messages.last().is_some_and(|m| m.text.contains(&format!("reply number {i}")))
            })
            .await;
        }

        chat.wait_for_update(|u| matches!(u, ChatUpdate::TranscriptTrimmed { .. }))
            .await;

        let snapshot = chat.handle.snapshot();
        let raw = chat.slots.raw(HISTORY_KEY).unwrap();
        assert!(raw.len() <= cap);
        assert_eq!(chat.stored_history().unwrap(), snapshot.messages);
        assert!(snapshot.messages.len() < 12);
        assert!(snapshot.messages.last().unwrap().text.contains("reply number 5"));
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_fatal() {
        let client = MockInferenceClient::new();
        client.queue_reply("still works");
        let slots = Arc::new(MemorySlots::new());
        slots.fail_writes(true);
        let chat = TestChat::start_with(client, slots, MAX_HISTORY_BYTES);

        chat.handle.ask("hello", None).await.unwrap();
        let done = chat.wait_idle_with(2).await;
        assert_eq!(done.messages[1].text, "still works");
        assert!(chat.slots.raw(HISTORY_KEY).is_none());
    }

    #[tokio::test]
    async fn test_login_switches_suggestions() {
        let chat = TestChat::start(MockInferenceClient::new());
        assert_eq!(
            chat.handle.snapshot().suggestions,
            default_suggestions(Role::Guest)
        );

        chat.handle
            .send(Event::SessionChanged {
                session: Session {
                    user: Some(student()),
                    scope: Scope::FaiIs,
                },
            })
            .await
            .unwrap();
        let signed_in = chat.wait_until(|s| s.session.is_authenticated()).await;

        assert_eq!(signed_in.suggestions, default_suggestions(Role::Student));
        assert!(chat.slots.raw(SESSION_KEY).is_some());
        assert_eq!(chat.slots.raw(SCOPE_KEY).as_deref(), Some("FAI/IS"));
    }

    #[tokio::test]
    async fn test_failed_wakeup_does_not_block_questions() {
        let client = MockInferenceClient::new();
        client.fail_wakeup(InferenceError::network("connection refused"));
        client.queue_reply("Still here");
        let chat = TestChat::start(client);

        chat.handle.ask("anyone there?", None).await.unwrap();
        let done = chat.wait_idle_with(2).await;
        assert_eq!(done.messages[1].text, "Still here");
        assert_eq!(done.messages[1].status, MessageStatus::Sent);
        assert_eq!(chat.client.wakeups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wakeup_probe_sent_once() {
        let chat = TestChat::start(MockInferenceClient::new());
        let deadline = tokio::time::Instant::now() + WAIT;
        while chat.client.wakeups.load(Ordering::SeqCst) == 0 {
            assert!(tokio::time::Instant::now() < deadline, "no wakeup probe");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(chat.client.wakeups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_runtime() {
        let chat = TestChat::start(MockInferenceClient::new());
        chat.handle.shutdown();
        tokio::time::timeout(WAIT, chat._runtime_handle)
            .await
            .unwrap()
            .unwrap();
    }
}
