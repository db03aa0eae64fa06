//! Bridge between the reply pipeline and a single-threaded UI loop.
//!
//! The bridge owns at most one active exchange. The UI calls
//! [`UiEventBridge::next_event`] once per frame (usually under a short
//! timeout) and gets exactly one [`UiEvent`] back: a token, or the single
//! terminal event of the run. Starting a new exchange while one is active
//! is rejected.

use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use companion_types::character::CharacterProfile;
use companion_types::chat::{ExchangePhase, SessionState};
use companion_types::error::{BridgeError, ExchangeError, PipelineError};
use companion_types::event::{StreamEnd, UiEvent};
use companion_types::relationship::RelationshipState;

use crate::history::HistoryStore;

use super::pipeline::{ExchangeEvent, ExchangeHandle, StreamingReplyPipeline};

/// Result of [`UiEventBridge::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// Blank input; nothing happened.
    IgnoredEmpty,
}

struct ActiveRun {
    handle: ExchangeHandle,
}

pub struct UiEventBridge<H: HistoryStore> {
    pipeline: StreamingReplyPipeline<H>,
    profile: CharacterProfile,
    session: SessionState,
    relationship: Option<RelationshipState>,
    active: Option<ActiveRun>,
    shutdown: CancellationToken,
}

impl<H: HistoryStore + 'static> UiEventBridge<H> {
    /// Create a bridge for one character's session.
    ///
    /// Fails if `session` belongs to a different character than `profile`.
    pub fn new(
        pipeline: StreamingReplyPipeline<H>,
        profile: CharacterProfile,
        session: SessionState,
    ) -> Result<Self, BridgeError> {
        if session.character_id != profile.id || session.session_id != profile.session_id() {
            return Err(PipelineError::CharacterMismatch {
                character: profile.id.to_string(),
                session: session.session_id,
            }
            .into());
        }
        Ok(Self {
            pipeline,
            profile,
            session,
            relationship: None,
            active: None,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn profile(&self) -> &CharacterProfile {
        &self.profile
    }

    /// Session as of the last committed exchange.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Relationship after the last committed exchange, if known.
    pub fn relationship(&self) -> Option<&RelationshipState> {
        self.relationship.as_ref()
    }

    pub fn set_relationship(&mut self, relationship: Option<RelationshipState>) {
        self.relationship = relationship;
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Phase of the active exchange, `Idle` when there is none.
    pub fn phase(&self) -> ExchangePhase {
        self.active
            .as_ref()
            .map(|run| run.handle.phase())
            .unwrap_or(ExchangePhase::Idle)
    }

    /// Start an exchange for `text`.
    ///
    /// Blank input is ignored rather than rejected. Returns
    /// `BridgeError::Busy` while another exchange is still active.
    pub fn start(&mut self, text: &str) -> Result<StartOutcome, BridgeError> {
        if self.active.is_some() {
            return Err(BridgeError::Busy);
        }
        if text.trim().is_empty() {
            return Ok(StartOutcome::IgnoredEmpty);
        }

        let cancel = self.shutdown.child_token();
        let handle = self
            .pipeline
            .run(cancel, text, &self.profile, &self.session)?;
        debug!(turn_index = self.session.turn_index, "Exchange started");
        self.active = Some(ActiveRun { handle });
        Ok(StartOutcome::Started)
    }

    /// Cancel the active exchange, if any. Its terminal event is still
    /// delivered by the next calls to `next_event`.
    pub fn cancel(&self) {
        if let Some(run) = &self.active {
            run.handle.cancel();
        }
    }

    /// Cancel the active exchange and every exchange started afterwards.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Cancel everything and wait for the active exchange task to exit.
    ///
    /// Pending events of that exchange are discarded.
    pub async fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(run) = self.active.take() {
            run.handle.join().await;
        }
    }

    /// Wait for the next event of the active exchange.
    ///
    /// Consumes at most one unit of pipeline output. Returns `None` only
    /// when no exchange is active. Safe to call under a timeout: if the
    /// future is dropped before completing, nothing is lost.
    pub async fn next_event(&mut self) -> Option<UiEvent> {
        let run = self.active.as_mut()?;
        let received = run.handle.recv().await;
        Some(self.translate(received))
    }

    /// Non-blocking variant of [`next_event`](Self::next_event).
    ///
    /// Returns `None` when there is no active exchange or nothing is ready.
    pub fn try_next_event(&mut self) -> Option<UiEvent> {
        let run = self.active.as_mut()?;
        match run.handle.try_recv() {
            Ok(event) => Some(self.translate(Some(event))),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(self.translate(None)),
        }
    }

    /// Map one pipeline item to a UI event, retiring the run on a terminal.
    fn translate(&mut self, received: Option<ExchangeEvent>) -> UiEvent {
        let event = match received {
            Some(ExchangeEvent::Token(text)) => return UiEvent::TokenChunk(text),
            Some(ExchangeEvent::Completed(summary)) => {
                self.session = summary.session;
                if summary.relationship.is_some() {
                    self.relationship = summary.relationship;
                }
                UiEvent::StreamDone(StreamEnd::Completed)
            }
            Some(ExchangeEvent::Failed(err)) => {
                self.session.last_error_code = Some(err.code().to_string());
                UiEvent::StreamError(err)
            }
            None => {
                // Closed without a terminal event.
                let cancelled = self
                    .active
                    .as_ref()
                    .is_some_and(|run| run.handle.is_cancelled());
                if cancelled {
                    UiEvent::StreamDone(StreamEnd::Cancelled)
                } else {
                    warn!("Exchange ended without a terminal event");
                    UiEvent::StreamError(ExchangeError::Transport(
                        "the reply stopped unexpectedly".to_string(),
                    ))
                }
            }
        };
        self.active = None;
        event
    }
}

impl<H: HistoryStore> Drop for UiEventBridge<H> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use companion_types::character::CharacterId;

    use crate::chat::diagnostics::DiagnosticBus;
    use crate::chat::pipeline::PipelineSettings;
    use crate::chat::testing::{MemoryHistoryStore, ScriptedCompletionService};
    use crate::completion::BoxCompletionService;

    async fn bridge(
        service: ScriptedCompletionService,
    ) -> (UiEventBridge<MemoryHistoryStore>, Arc<MemoryHistoryStore>) {
        let store = Arc::new(MemoryHistoryStore::new());
        let pipeline = StreamingReplyPipeline::new(
            Arc::clone(&store),
            Arc::new(BoxCompletionService::new(service)),
            PipelineSettings::default(),
            DiagnosticBus::default(),
        );
        let profile = CharacterProfile::new("Wanqing", "female");
        let session = pipeline.ensure_session(&profile.id).await;
        (UiEventBridge::new(pipeline, profile, session).unwrap(), store)
    }

    /// Pull events until the terminal one, failing if any call hangs.
    async fn collect(bridge: &mut UiEventBridge<MemoryHistoryStore>) -> Vec<UiEvent> {
        let mut events = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(2), bridge.next_event())
                .await
                .expect("next_event must not hang")
                .expect("run must be active until its terminal event");
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                return events;
            }
        }
    }

    #[tokio::test]
    async fn delivers_tokens_then_done() {
        let (mut bridge, store) = bridge(ScriptedCompletionService::tokens(&["Hel", "lo"])).await;
        assert_eq!(bridge.start("hi").unwrap(), StartOutcome::Started);

        let events = collect(&mut bridge).await;
        assert_eq!(
            events,
            vec![
                UiEvent::TokenChunk("Hel".to_string()),
                UiEvent::TokenChunk("lo".to_string()),
                UiEvent::StreamDone(StreamEnd::Completed),
            ]
        );
        assert!(!bridge.is_streaming());
        assert_eq!(bridge.session().turn_index, 1);
        assert_eq!(store.assistant_messages()[0].content, "Hello");
        // Nothing further once the terminal event has been delivered.
        assert!(bridge.next_event().await.is_none());
    }

    #[tokio::test]
    async fn delivers_token_then_error() {
        let (mut bridge, store) =
            bridge(ScriptedCompletionService::tokens_then_error(&["Hel"], "reset")).await;
        bridge.start("hi").unwrap();

        let events = collect(&mut bridge).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], UiEvent::TokenChunk("Hel".to_string()));
        assert!(matches!(
            events[1],
            UiEvent::StreamError(ExchangeError::Transport(_))
        ));
        assert_eq!(bridge.session().turn_index, 0);
        assert_eq!(bridge.session().last_error_code.as_deref(), Some("transport"));
        assert!(store.assistant_messages().is_empty());
    }

    #[tokio::test]
    async fn rejects_second_start_while_streaming() {
        let (mut bridge, _store) =
            bridge(ScriptedCompletionService::tokens_then_stall(&["Hel"])).await;
        bridge.start("first").unwrap();
        assert_eq!(bridge.start("second"), Err(BridgeError::Busy));
        bridge.cancel();
        collect(&mut bridge).await;
        assert!(!bridge.is_streaming());
    }

    #[tokio::test]
    async fn empty_input_is_ignored() {
        let (mut bridge, store) = bridge(ScriptedCompletionService::tokens(&["x"])).await;
        assert_eq!(bridge.start("  \n").unwrap(), StartOutcome::IgnoredEmpty);
        assert!(!bridge.is_streaming());
        assert!(store.messages().is_empty());
    }

    #[tokio::test]
    async fn cancel_mid_stream_reports_cancelled_done() {
        let (mut bridge, store) =
            bridge(ScriptedCompletionService::tokens_then_stall(&["Hel"])).await;
        bridge.start("hi").unwrap();

        let first = bridge.next_event().await.unwrap();
        assert_eq!(first, UiEvent::TokenChunk("Hel".to_string()));
        bridge.cancel();

        let events = collect(&mut bridge).await;
        assert_eq!(events, vec![UiEvent::StreamDone(StreamEnd::Cancelled)]);
        assert!(store.assistant_messages().is_empty());
        assert_eq!(bridge.session().turn_index, 0);
    }

    #[tokio::test]
    async fn consecutive_exchanges_advance_turns() {
        let (mut bridge, store) = bridge(ScriptedCompletionService::tokens(&["ok"])).await;
        for expected in 1..=3u32 {
            bridge.start("hello").unwrap();
            collect(&mut bridge).await;
            assert_eq!(bridge.session().turn_index, expected);
        }
        assert_eq!(store.assistant_messages().len(), 3);
        assert_eq!(store.session(&bridge.session().session_id).unwrap().turn_index, 3);
    }

    #[tokio::test]
    async fn bounded_waits_do_not_lose_events() {
        let (mut bridge, _store) = bridge(ScriptedCompletionService::slow_tokens(
            &["a", "b", "c"],
            Duration::from_millis(20),
        ))
        .await;
        bridge.start("hi").unwrap();

        let mut events = Vec::new();
        for _ in 0..500 {
            match tokio::time::timeout(Duration::from_millis(1), bridge.next_event()).await {
                Ok(Some(event)) => {
                    let terminal = event.is_terminal();
                    events.push(event);
                    if terminal {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => continue,
            }
        }
        assert_eq!(
            events,
            vec![
                UiEvent::TokenChunk("a".to_string()),
                UiEvent::TokenChunk("b".to_string()),
                UiEvent::TokenChunk("c".to_string()),
                UiEvent::StreamDone(StreamEnd::Completed),
            ]
        );
    }

    #[tokio::test]
    async fn try_next_event_is_non_blocking() {
        let (mut bridge, _store) =
            bridge(ScriptedCompletionService::tokens_then_stall(&[])).await;
        assert!(bridge.try_next_event().is_none());
        bridge.start("hi").unwrap();
        assert!(bridge.try_next_event().is_none());
        bridge.cancel();
        let events = collect(&mut bridge).await;
        assert_eq!(events, vec![UiEvent::StreamDone(StreamEnd::Cancelled)]);
    }

    #[tokio::test]
    async fn close_waits_for_the_exchange_task() {
        let (mut bridge, store) =
            bridge(ScriptedCompletionService::tokens_then_stall(&["Hel"])).await;
        bridge.start("hi").unwrap();
        assert_eq!(
            bridge.next_event().await,
            Some(UiEvent::TokenChunk("Hel".to_string()))
        );

        tokio::time::timeout(Duration::from_secs(2), bridge.close())
            .await
            .expect("close must not hang");
        assert!(!bridge.is_streaming());
        assert!(bridge.next_event().await.is_none());
        assert!(store.assistant_messages().is_empty());
    }

    #[tokio::test]
    async fn mismatched_session_is_rejected() {
        let store = Arc::new(MemoryHistoryStore::new());
        let pipeline = StreamingReplyPipeline::new(
            store,
            Arc::new(BoxCompletionService::new(ScriptedCompletionService::tokens(&[]))),
            PipelineSettings::default(),
            DiagnosticBus::default(),
        );
        let profile = CharacterProfile::new("Wanqing", "female");
        let session = SessionState::new(&CharacterId::new("chr_bbbbbbbbbbbb"));
        assert!(matches!(
            UiEventBridge::new(pipeline, profile, session),
            Err(BridgeError::Pipeline(PipelineError::CharacterMismatch { .. }))
        ));
    }
}
