//! In-crate fakes for pipeline and bridge tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_stream::try_stream;

use companion_types::character::CharacterId;
use companion_types::chat::{ChatMessage, MessageRole, SessionState};
use companion_types::error::RepositoryError;
use companion_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason,
    StreamEvent, Usage,
};
use companion_types::relationship::RelationshipState;

use crate::completion::{CompletionService, EventStream};
use crate::history::HistoryStore;

#[derive(Debug, Clone)]
enum Step {
    Token(String),
    Fail(String),
    Delay(Duration),
    Stall,
}

/// Completion service that replays a fixed script.
#[derive(Clone)]
pub struct ScriptedCompletionService {
    steps: Vec<Step>,
    configured: bool,
    capabilities: ProviderCapabilities,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedCompletionService {
    fn with_steps(steps: Vec<Step>) -> Self {
        Self {
            steps,
            configured: true,
            capabilities: ProviderCapabilities {
                streaming: true,
                max_context_tokens: 8_192,
                max_output_tokens: 1_024,
            },
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Yield each token, then finish cleanly.
    pub fn tokens(tokens: &[&str]) -> Self {
        Self::with_steps(tokens.iter().map(|t| Step::Token(t.to_string())).collect())
    }

    /// Yield each token, then fail with a stream error.
    pub fn tokens_then_error(tokens: &[&str], message: &str) -> Self {
        let mut steps: Vec<Step> = tokens.iter().map(|t| Step::Token(t.to_string())).collect();
        steps.push(Step::Fail(message.to_string()));
        Self::with_steps(steps)
    }

    /// Yield each token, then hang until the stream is dropped.
    pub fn tokens_then_stall(tokens: &[&str]) -> Self {
        let mut steps: Vec<Step> = tokens.iter().map(|t| Step::Token(t.to_string())).collect();
        steps.push(Step::Stall);
        Self::with_steps(steps)
    }

    /// Wait before each token.
    pub fn slow_tokens(tokens: &[&str], delay: Duration) -> Self {
        let steps = tokens
            .iter()
            .flat_map(|t| [Step::Delay(delay), Step::Token(t.to_string())])
            .collect();
        Self::with_steps(steps)
    }

    /// Behaves like a service with no credential.
    pub fn not_configured() -> Self {
        let mut service = Self::with_steps(Vec::new());
        service.configured = false;
        service
    }

    /// Handle to the requests received so far.
    pub fn requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        Arc::clone(&self.requests)
    }
}

impl CompletionService for ScriptedCompletionService {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.configured {
            return Err(LlmError::NotConfigured("no credential".to_string()));
        }
        let mut content = String::new();
        for step in &self.steps {
            match step {
                Step::Token(t) => content.push_str(t),
                Step::Fail(msg) => return Err(LlmError::Stream(msg.clone())),
                Step::Delay(_) | Step::Stall => {}
            }
        }
        Ok(CompletionResponse {
            id: "scripted-1".to_string(),
            content,
            model: request.model.clone(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        })
    }

    fn stream(&self, request: CompletionRequest) -> EventStream {
        self.requests.lock().unwrap().push(request);
        let steps = self.steps.clone();
        let configured = self.configured;

        Box::pin(try_stream! {
            if !configured {
                Err::<(), _>(LlmError::NotConfigured("no credential".to_string()))?;
            }
            yield StreamEvent::Connected;
            for step in steps {
                match step {
                    Step::Token(text) => {
                        yield StreamEvent::TextDelta { index: 0, text };
                    }
                    Step::Fail(msg) => {
                        Err::<(), _>(LlmError::Stream(msg))?;
                    }
                    Step::Delay(d) => tokio::time::sleep(d).await,
                    Step::Stall => futures_util::future::pending::<()>().await,
                }
            }
            yield StreamEvent::MessageDelta { stop_reason: StopReason::EndTurn };
            yield StreamEvent::Done;
        })
    }
}

#[derive(Default)]
struct MemoryInner {
    messages: Vec<ChatMessage>,
    sessions: HashMap<String, SessionState>,
    relationships: HashMap<CharacterId, RelationshipState>,
}

/// In-memory history store with switchable write failures.
#[derive(Default)]
pub struct MemoryHistoryStore {
    inner: Mutex<MemoryInner>,
    pub fail_user_append: AtomicBool,
    pub fail_assistant_append: AtomicBool,
    pub fail_session_save: AtomicBool,
    pub fail_relationship_save: AtomicBool,
    pub fail_reads: AtomicBool,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.lock().unwrap().messages.clone()
    }

    pub fn assistant_messages(&self) -> Vec<ChatMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .collect()
    }

    pub fn session(&self, session_id: &str) -> Option<SessionState> {
        self.inner.lock().unwrap().sessions.get(session_id).cloned()
    }

    pub fn relationship(&self, id: &CharacterId) -> Option<RelationshipState> {
        self.inner.lock().unwrap().relationships.get(id).cloned()
    }

    pub fn insert_relationship(&self, state: RelationshipState) {
        self.inner
            .lock()
            .unwrap()
            .relationships
            .insert(state.character_id.clone(), state);
    }

    pub fn insert_session(&self, state: SessionState) {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(state.session_id.clone(), state);
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<(), RepositoryError> {
        if flag.load(Ordering::SeqCst) {
            Err(RepositoryError::Query(format!("{what} failed")))
        } else {
            Ok(())
        }
    }
}

impl HistoryStore for MemoryHistoryStore {
    async fn append_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        match message.role {
            MessageRole::Assistant => Self::check(&self.fail_assistant_append, "assistant append")?,
            _ => Self::check(&self.fail_user_append, "user append")?,
        }
        self.inner.lock().unwrap().messages.push(message.clone());
        Ok(())
    }

    async fn recent_messages(
        &self,
        character_id: &CharacterId,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        Self::check(&self.fail_reads, "read")?;
        let mut matching: Vec<ChatMessage> = self
            .inner
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| &m.character_id == character_id)
            .cloned()
            .collect();
        matching.sort_by_key(|m| m.timestamp);
        let skip = matching.len().saturating_sub(limit as usize);
        Ok(matching.split_off(skip))
    }

    async fn get_session_state(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionState>, RepositoryError> {
        Self::check(&self.fail_reads, "read")?;
        Ok(self.session(session_id))
    }

    async fn save_session_state(&self, state: &SessionState) -> Result<(), RepositoryError> {
        Self::check(&self.fail_session_save, "session save")?;
        self.insert_session(state.clone());
        Ok(())
    }

    async fn get_relationship_state(
        &self,
        character_id: &CharacterId,
    ) -> Result<Option<RelationshipState>, RepositoryError> {
        Self::check(&self.fail_reads, "read")?;
        Ok(self.relationship(character_id))
    }

    async fn save_relationship_state(
        &self,
        state: &RelationshipState,
    ) -> Result<(), RepositoryError> {
        Self::check(&self.fail_relationship_save, "relationship save")?;
        self.insert_relationship(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    #[tokio::test]
    async fn recent_messages_are_oldest_first_and_bounded() {
        let store = MemoryHistoryStore::new();
        let id = CharacterId::new("chr_aaaaaaaaaaaa");
        let base = Utc::now();
        // Insert out of chronological order.
        for i in [5i64, 1, 9, 3, 7, 0, 2, 8, 4, 6, 11, 10] {
            let mut m = ChatMessage::user(&id, format!("m{i}"));
            m.timestamp = base + ChronoDuration::seconds(i);
            store.append_message(&m).await.unwrap();
        }
        let recent = store.recent_messages(&id, 10).await.unwrap();
        assert_eq!(recent.len(), 10);
        let contents: Vec<String> = recent.iter().map(|m| m.content.clone()).collect();
        let expected: Vec<String> = (2..12).map(|i| format!("m{i}")).collect();
        assert_eq!(contents, expected);
    }
}
