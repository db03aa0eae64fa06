//! Streaming reply pipeline.
//!
//! One call to [`StreamingReplyPipeline::run`] drives one exchange on a
//! background task:
//!
//! 1. Sending: persist the user message, read the relationship level, apply
//!    the intimacy bump. All three writes and reads are best-effort.
//! 2. Fetch the most recent history window, oldest first.
//! 3. Build the system prompt from the level read *before* the bump.
//! 4. Streaming: relay text deltas into a bounded channel in arrival order.
//! 5. Finalizing: on a clean finish only, persist the assistant message and
//!    advance `turn_index`, then emit `Completed`.
//!
//! A failure emits exactly one `Failed` event and commits nothing. A
//! cancellation commits nothing and closes the channel without a terminal
//! event.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use companion_types::character::{CharacterId, CharacterProfile};
use companion_types::chat::{ChatMessage, ExchangePhase, SessionState};
use companion_types::config::CompanionConfig;
use companion_types::error::{ExchangeError, PipelineError, RepositoryError};
use companion_types::event::{PipelineDiagnostic, SecondaryWrite};
use companion_types::llm::{CompletionRequest, Message, StreamEvent};
use companion_types::relationship::{DEFAULT_LEVEL, RelationshipState};

use crate::completion::{BoxCompletionService, stream_with_span};
use crate::history::HistoryStore;
use crate::prompt::PromptAssembler;
use crate::relationship::{BumpPolicy, apply_existing};

use super::diagnostics::DiagnosticBus;

/// Tunables for an exchange.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Number of most recent messages sent as context.
    pub history_window: u32,
    /// Deadline for the whole streaming request. `None` waits forever.
    pub timeout_ms: Option<u64>,
    pub channel_capacity: usize,
    pub bump_policy: BumpPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &CompanionConfig) -> Self {
        Self {
            model: config.provider.model.clone(),
            max_tokens: config.provider.max_tokens,
            temperature: config.chat.temperature,
            history_window: config.chat.history_window.max(1),
            timeout_ms: Some(config.provider.timeout_ms).filter(|ms| *ms > 0),
            channel_capacity: config.chat.channel_capacity.max(1),
            bump_policy: BumpPolicy::from(&config.intimacy),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&CompanionConfig::default())
    }
}

/// What the background task hands to the consumer.
#[derive(Debug, Clone)]
pub enum ExchangeEvent {
    Token(String),
    /// The reply was committed. Always the last event of a successful run.
    Completed(ExchangeSummary),
    /// The exchange failed. Always the last event of a failed run.
    Failed(ExchangeError),
}

/// Result of a committed exchange.
#[derive(Debug, Clone)]
pub struct ExchangeSummary {
    pub reply: String,
    /// Session as persisted, with the advanced `turn_index`.
    pub session: SessionState,
    /// Relationship after this turn's bump, if a record existed.
    pub relationship: Option<RelationshipState>,
}

/// Handle to one running exchange.
///
/// Dropping the handle does not stop the exchange; call [`cancel`](Self::cancel)
/// or cancel the token passed to `run`.
pub struct ExchangeHandle {
    events: mpsc::Receiver<ExchangeEvent>,
    cancel: CancellationToken,
    phase: watch::Receiver<ExchangePhase>,
    task: JoinHandle<()>,
}

impl ExchangeHandle {
    /// Wait for the next event. `None` once the producer has finished.
    pub async fn recv(&mut self) -> Option<ExchangeEvent> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<ExchangeEvent, mpsc::error::TryRecvError> {
        self.events.try_recv()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn phase(&self) -> ExchangePhase {
        *self.phase.borrow()
    }

    /// Wait for the background task to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Exchange task ended abnormally");
        }
    }
}

/// Orchestrates one exchange at a time over a history store and a
/// completion service.
///
/// Generic over `HistoryStore` so companion-core never depends on
/// companion-infra.
pub struct StreamingReplyPipeline<H: HistoryStore> {
    store: Arc<H>,
    completion: Arc<BoxCompletionService>,
    settings: Arc<PipelineSettings>,
    diagnostics: DiagnosticBus,
}

impl<H: HistoryStore> Clone for StreamingReplyPipeline<H> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            completion: Arc::clone(&self.completion),
            settings: Arc::clone(&self.settings),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

impl<H: HistoryStore + 'static> StreamingReplyPipeline<H> {
    pub fn new(
        store: Arc<H>,
        completion: Arc<BoxCompletionService>,
        settings: PipelineSettings,
        diagnostics: DiagnosticBus,
    ) -> Self {
        Self {
            store,
            completion,
            settings: Arc::new(settings),
            diagnostics,
        }
    }

    pub fn diagnostics(&self) -> &DiagnosticBus {
        &self.diagnostics
    }

    /// Get or create the session for `character_id`, seeding the
    /// relationship record (level 7, score 50) if it does not exist.
    ///
    /// Never fails. Storage problems are reported as diagnostics and an
    /// in-memory session is returned.
    pub async fn ensure_session(&self, character_id: &CharacterId) -> SessionState {
        let session_id = character_id.session_id();
        let existing = match self.store.get_session_state(&session_id).await {
            Ok(state) => state,
            Err(e) => {
                self.read_failed(character_id, "session_state", &e);
                None
            }
        };

        let session = match existing {
            Some(state) => state,
            None => {
                let state = SessionState::new(character_id);
                if let Err(e) = self.store.save_session_state(&state).await {
                    self.swallow(character_id, SecondaryWrite::SessionBootstrap, &e);
                } else {
                    info!(session_id = %state.session_id, "Session created");
                }
                state
            }
        };

        match self.store.get_relationship_state(character_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                let seed = RelationshipState::seed(character_id);
                if let Err(e) = self.store.save_relationship_state(&seed).await {
                    self.swallow(character_id, SecondaryWrite::RelationshipSeed, &e);
                } else {
                    debug!(character_id = %character_id, "Relationship seeded");
                }
            }
            Err(e) => self.read_failed(character_id, "relationship_state", &e),
        }

        session
    }

    /// Start an exchange for `user_text` on a background task.
    ///
    /// Whitespace-only input is rejected before anything is written, as is a
    /// session that belongs to a different character. Cancelling `cancel`
    /// stops the exchange without committing a reply.
    pub fn run(
        &self,
        cancel: CancellationToken,
        user_text: &str,
        profile: &CharacterProfile,
        session: &SessionState,
    ) -> Result<ExchangeHandle, PipelineError> {
        let text = user_text.trim();
        if text.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        if session.character_id != profile.id || session.session_id != profile.session_id() {
            return Err(PipelineError::CharacterMismatch {
                character: profile.id.to_string(),
                session: session.session_id.clone(),
            });
        }

        let (tx, rx) = mpsc::channel(self.settings.channel_capacity);
        let (phase_tx, phase_rx) = watch::channel(ExchangePhase::Idle);

        let exchange = Exchange {
            pipeline: self.clone(),
            profile: profile.clone(),
            session: session.clone(),
            user_text: text.to_string(),
            tx,
            phase: phase_tx,
            cancel: cancel.clone(),
        };

        let span = info_span!(
            "companion.exchange",
            character_id = %profile.id,
            session_id = %session.session_id,
            turn_index = session.turn_index,
        );
        let task = tokio::spawn(exchange.drive().instrument(span));

        Ok(ExchangeHandle {
            events: rx,
            cancel,
            phase: phase_rx,
            task,
        })
    }

    fn swallow(&self, character_id: &CharacterId, write: SecondaryWrite, err: &RepositoryError) {
        warn!(
            character_id = %character_id,
            write = %write,
            error = %err,
            "Secondary write failed, continuing"
        );
        self.diagnostics.publish(PipelineDiagnostic::SecondaryWriteFailed {
            character_id: character_id.clone(),
            write,
            error: err.to_string(),
        });
    }

    fn read_failed(&self, character_id: &CharacterId, what: &str, err: &RepositoryError) {
        warn!(character_id = %character_id, what, error = %err, "Read failed, using defaults");
        self.diagnostics.publish(PipelineDiagnostic::ReadFailed {
            character_id: character_id.clone(),
            what: what.to_string(),
            error: err.to_string(),
        });
    }
}

/// How the streaming step ended.
enum StreamOutcome {
    Finished(String),
    Failed(ExchangeError),
    Cancelled,
    /// The consumer dropped its receiver.
    Abandoned,
}

/// State owned by the background task of one exchange.
struct Exchange<H: HistoryStore> {
    pipeline: StreamingReplyPipeline<H>,
    profile: CharacterProfile,
    session: SessionState,
    user_text: String,
    tx: mpsc::Sender<ExchangeEvent>,
    phase: watch::Sender<ExchangePhase>,
    cancel: CancellationToken,
}

impl<H: HistoryStore + 'static> Exchange<H> {
    async fn drive(self) {
        self.set_phase(ExchangePhase::Sending);
        let character_id = self.profile.id.clone();
        let store = Arc::clone(&self.pipeline.store);
        let settings = Arc::clone(&self.pipeline.settings);

        // Step 1: user message and relationship bump, both best-effort.
        let user_message = ChatMessage::user(&character_id, self.user_text.clone());
        let user_saved = match store.append_message(&user_message).await {
            Ok(()) => true,
            Err(e) => {
                self.pipeline
                    .swallow(&character_id, SecondaryWrite::UserMessage, &e);
                false
            }
        };

        let current = match store.get_relationship_state(&character_id).await {
            Ok(state) => state,
            Err(e) => {
                self.pipeline
                    .read_failed(&character_id, "relationship_state", &e);
                None
            }
        };
        let tone_level = current
            .as_ref()
            .map(|s| s.intimacy_level)
            .filter(|level| *level > 0)
            .unwrap_or(DEFAULT_LEVEL);

        let bump = settings.bump_policy.bump_for(&self.user_text);
        let relationship = apply_existing(current.as_ref(), bump, self.session.turn_index)
            .map(|mut next| {
                next.updated_at = Utc::now();
                next
            });
        match &relationship {
            Some(next) => {
                if let Err(e) = store.save_relationship_state(next).await {
                    self.pipeline
                        .swallow(&character_id, SecondaryWrite::RelationshipState, &e);
                } else {
                    debug!(
                        level = next.intimacy_level,
                        score = next.intimacy_score,
                        bump,
                        "Relationship updated"
                    );
                }
            }
            None => {
                debug!("No relationship record, skipping bump");
                self.pipeline
                    .diagnostics
                    .publish(PipelineDiagnostic::RelationshipAbsent {
                        character_id: character_id.clone(),
                    });
            }
        }

        if self.cancel.is_cancelled() {
            self.finish_cancelled();
            return;
        }

        // Step 2: bounded history, oldest first, always ending with this turn.
        let window = settings.history_window as usize;
        let mut history = match store
            .recent_messages(&character_id, settings.history_window)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                self.pipeline.read_failed(&character_id, "history", &e);
                Vec::new()
            }
        };
        if !user_saved || history.last().map(|m| m.id) != Some(user_message.id) {
            history.retain(|m| m.id != user_message.id);
            history.push(user_message);
        }
        if history.len() > window {
            history.drain(..history.len() - window);
        }

        // Step 3: prompt from the level read before the bump.
        let request = CompletionRequest {
            model: settings.model.clone(),
            messages: history
                .into_iter()
                .map(|m| Message {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            system: Some(PromptAssembler::build(&self.profile, tone_level)),
            max_tokens: settings.max_tokens,
            temperature: Some(settings.temperature),
            stream: true,
            timeout_ms: settings.timeout_ms,
        };

        if self.cancel.is_cancelled() {
            self.finish_cancelled();
            return;
        }

        // Step 4: relay.
        self.set_phase(ExchangePhase::Streaming);
        match self.relay(request).await {
            StreamOutcome::Finished(reply) => self.finalize(reply, relationship).await,
            StreamOutcome::Failed(err) => self.fail(err).await,
            StreamOutcome::Cancelled => self.finish_cancelled(),
            StreamOutcome::Abandoned => {
                debug!("Receiver dropped, abandoning exchange");
                self.finish_cancelled();
            }
        }
    }

    async fn relay(&self, request: CompletionRequest) -> StreamOutcome {
        let timeout_ms = request.timeout_ms;
        let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
        let mut stream = stream_with_span(&self.pipeline.completion, request);
        let mut reply = String::new();

        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return StreamOutcome::Cancelled,
                _ = sleep_until(deadline) => {
                    return StreamOutcome::Failed(ExchangeError::Timeout(timeout_ms.unwrap_or_default()));
                }
                item = stream.next() => item,
            };

            match item {
                Some(Ok(StreamEvent::TextDelta { text, .. })) => {
                    if text.is_empty() {
                        continue;
                    }
                    reply.push_str(&text);
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return StreamOutcome::Cancelled,
                        sent = self.tx.send(ExchangeEvent::Token(text)) => {
                            if sent.is_err() {
                                return StreamOutcome::Abandoned;
                            }
                        }
                    }
                }
                Some(Ok(StreamEvent::Done)) | None => return StreamOutcome::Finished(reply),
                Some(Ok(StreamEvent::MessageDelta { stop_reason })) => {
                    debug!(stop_reason = %stop_reason, "Stream stopping");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, chars = reply.len(), "Completion stream failed");
                    return StreamOutcome::Failed(ExchangeError::from(&e));
                }
            }
        }
    }

    /// Step 5: commit the reply and advance the turn counter.
    async fn finalize(&self, reply: String, relationship: Option<RelationshipState>) {
        if self.cancel.is_cancelled() {
            self.finish_cancelled();
            return;
        }
        if reply.trim().is_empty() {
            self.fail(ExchangeError::Transport("the model returned an empty reply".to_string()))
                .await;
            return;
        }

        self.set_phase(ExchangePhase::Finalizing);
        let store = &self.pipeline.store;
        let assistant = ChatMessage::assistant(&self.profile.id, reply.clone());
        if let Err(e) = store.append_message(&assistant).await {
            error!(error = %e, "Failed to persist assistant reply");
            self.fail(ExchangeError::Persistence(e.to_string())).await;
            return;
        }

        let mut session = self.session.clone();
        session.turn_index += 1;
        session.state = ExchangePhase::Idle;
        session.last_error_code = None;
        session.updated_at = Utc::now();
        if let Err(e) = store.save_session_state(&session).await {
            error!(error = %e, "Failed to persist turn increment");
            self.fail(ExchangeError::Persistence(e.to_string())).await;
            return;
        }

        info!(turn_index = session.turn_index, chars = reply.len(), "Exchange committed");
        self.set_phase(ExchangePhase::Idle);
        let summary = ExchangeSummary {
            reply,
            session,
            relationship,
        };
        let _ = self.tx.send(ExchangeEvent::Completed(summary)).await;
    }

    async fn fail(&self, err: ExchangeError) {
        self.set_phase(ExchangePhase::Failed);

        let mut session = self.session.clone();
        session.state = ExchangePhase::Idle;
        session.last_error_code = Some(err.code().to_string());
        session.updated_at = Utc::now();
        if let Err(e) = self.pipeline.store.save_session_state(&session).await {
            self.pipeline
                .swallow(&self.profile.id, SecondaryWrite::ErrorBookkeeping, &e);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            _ = self.tx.send(ExchangeEvent::Failed(err)) => {}
        }
        self.set_phase(ExchangePhase::Idle);
    }

    fn finish_cancelled(&self) {
        info!("Exchange cancelled");
        self.set_phase(ExchangePhase::Failed);
        self.set_phase(ExchangePhase::Idle);
    }

    fn set_phase(&self, next: ExchangePhase) {
        let previous = self.phase.send_replace(next);
        if previous == next {
            return;
        }
        if !previous.can_transition_to(next) {
            warn!(from = %previous, to = %next, "Unexpected phase transition");
        }
        debug!(from = %previous, to = %next, "Exchange phase");
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
