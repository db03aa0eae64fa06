//! Chat view state: transcript, input line, and key handling.
//!
//! Kept free of terminal I/O so the behavior can be tested directly.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use companion_types::chat::{ChatMessage, MessageRole};
use companion_types::error::ExchangeError;
use companion_types::event::{StreamEnd, UiEvent};

/// State of an assistant turn in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    Streaming,
    Done,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    User(String),
    Assistant { text: String, state: ReplyState },
    Notice(String),
}

/// What the loop should do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Submit(String),
    Cancel,
    Quit,
}

#[derive(Debug, Default)]
pub struct ChatView {
    pub entries: Vec<Entry>,
    pub input: String,
    pub quit: bool,
}

impl ChatView {
    /// Seed the transcript with stored messages, oldest first.
    pub fn with_history(messages: &[ChatMessage]) -> Self {
        let entries = messages
            .iter()
            .filter_map(|msg| match msg.role {
                MessageRole::User => Some(Entry::User(msg.content.clone())),
                MessageRole::Assistant => Some(Entry::Assistant {
                    text: msg.content.clone(),
                    state: ReplyState::Done,
                }),
                MessageRole::System => None,
            })
            .collect();
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, streaming: bool) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return Action::Quit;
        }

        match key.code {
            KeyCode::Esc if streaming => Action::Cancel,
            KeyCode::Esc => {
                self.quit = true;
                Action::Quit
            }
            KeyCode::Enter if streaming => Action::None,
            KeyCode::Enter => {
                let text = self.input.trim().to_string();
                self.input.clear();
                if text.is_empty() {
                    return Action::None;
                }
                self.entries.push(Entry::User(text.clone()));
                self.entries.push(Entry::Assistant {
                    text: String::new(),
                    state: ReplyState::Streaming,
                });
                Action::Submit(text)
            }
            KeyCode::Backspace => {
                self.input.pop();
                Action::None
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                Action::None
            }
            _ => Action::None,
        }
    }

    /// Fold one bridge event into the transcript.
    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::TokenChunk(chunk) => {
                if let Some((text, _)) = self.streaming_reply() {
                    text.push_str(&chunk);
                }
            }
            UiEvent::StreamDone(StreamEnd::Completed) => self.settle(ReplyState::Done),
            UiEvent::StreamDone(StreamEnd::Cancelled) => self.settle(ReplyState::Interrupted),
            UiEvent::StreamError(err) => {
                self.settle(ReplyState::Interrupted);
                self.notice(describe_error(&err));
            }
        }
    }

    /// Drop the pending reply placeholder after a start that never ran.
    pub fn abandon_pending(&mut self, reason: impl Into<String>) {
        if matches!(
            self.entries.last(),
            Some(Entry::Assistant { state: ReplyState::Streaming, .. })
        ) {
            self.entries.pop();
        }
        self.notice(reason);
    }

    pub fn notice(&mut self, text: impl Into<String>) {
        self.entries.push(Entry::Notice(text.into()));
    }

    fn streaming_reply(&mut self) -> Option<(&mut String, &mut ReplyState)> {
        match self.entries.last_mut() {
            Some(Entry::Assistant { text, state }) if *state == ReplyState::Streaming => {
                Some((text, state))
            }
            _ => None,
        }
    }

    /// Close the streaming reply. An interrupted reply with no text is
    /// removed instead of left as an empty bubble.
    fn settle(&mut self, outcome: ReplyState) {
        let Some((text, state)) = self.streaming_reply() else {
            return;
        };
        if outcome == ReplyState::Interrupted && text.is_empty() {
            self.entries.pop();
            if let Some(Entry::User(_)) = self.entries.last() {
                self.entries.push(Entry::Notice("(interrupted)".to_string()));
            }
            return;
        }
        *state = outcome;
    }
}

/// One-line notice for a failed exchange.
pub fn describe_error(err: &ExchangeError) -> String {
    match err {
        ExchangeError::Configuration(msg) => format!("⚠ Not configured: {msg}"),
        ExchangeError::Transport(msg) => format!("⚠ Connection problem, try again: {msg}"),
        ExchangeError::Timeout(ms) => format!("⚠ No reply after {}s, try again", ms / 1000),
        ExchangeError::Persistence(msg) => format!("⚠ The reply could not be saved: {msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use companion_types::character::CharacterId;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(view: &mut ChatView, text: &str) {
        for c in text.chars() {
            view.handle_key(key(KeyCode::Char(c)), false);
        }
    }

    #[test]
    fn test_enter_submits_trimmed_text() {
        let mut view = ChatView::default();
        type_text(&mut view, "  你好 ");

        let action = view.handle_key(key(KeyCode::Enter), false);
        assert_eq!(action, Action::Submit("你好".to_string()));
        assert!(view.input.is_empty());
        assert_eq!(view.entries[0], Entry::User("你好".to_string()));
        assert!(matches!(
            view.entries[1],
            Entry::Assistant { state: ReplyState::Streaming, .. }
        ));
    }

    #[test]
    fn test_enter_is_gated_while_streaming() {
        let mut view = ChatView::default();
        type_text(&mut view, "next");
        assert_eq!(view.handle_key(key(KeyCode::Enter), true), Action::None);
        assert_eq!(view.input, "next");
        assert!(view.entries.is_empty());
    }

    #[test]
    fn test_blank_enter_does_nothing() {
        let mut view = ChatView::default();
        type_text(&mut view, "   ");
        assert_eq!(view.handle_key(key(KeyCode::Enter), false), Action::None);
        assert!(view.entries.is_empty());
    }

    #[test]
    fn test_escape_cancels_then_quits() {
        let mut view = ChatView::default();
        assert_eq!(view.handle_key(key(KeyCode::Esc), true), Action::Cancel);
        assert!(!view.quit);
        assert_eq!(view.handle_key(key(KeyCode::Esc), false), Action::Quit);
        assert!(view.quit);
    }

    #[test]
    fn test_ctrl_c_quits_even_while_streaming() {
        let mut view = ChatView::default();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(view.handle_key(ctrl_c, true), Action::Quit);
        assert!(view.input.is_empty());
    }

    #[test]
    fn test_tokens_accumulate_and_complete() {
        let mut view = ChatView::default();
        type_text(&mut view, "hi");
        view.handle_key(key(KeyCode::Enter), false);

        view.apply(UiEvent::TokenChunk("我".to_string()));
        view.apply(UiEvent::TokenChunk("在呢。".to_string()));
        view.apply(UiEvent::StreamDone(StreamEnd::Completed));

        assert_eq!(
            view.entries.last(),
            Some(&Entry::Assistant {
                text: "我在呢。".to_string(),
                state: ReplyState::Done
            })
        );
    }

    #[test]
    fn test_cancel_marks_partial_reply_interrupted() {
        let mut view = ChatView::default();
        type_text(&mut view, "hi");
        view.handle_key(key(KeyCode::Enter), false);
        view.apply(UiEvent::TokenChunk("我".to_string()));
        view.apply(UiEvent::StreamDone(StreamEnd::Cancelled));

        assert!(matches!(
            view.entries.last(),
            Some(Entry::Assistant { state: ReplyState::Interrupted, .. })
        ));
    }

    #[test]
    fn test_cancel_before_tokens_leaves_marker() {
        let mut view = ChatView::default();
        type_text(&mut view, "hi");
        view.handle_key(key(KeyCode::Enter), false);
        view.apply(UiEvent::StreamDone(StreamEnd::Cancelled));

        assert_eq!(view.entries.len(), 2);
        assert_eq!(view.entries[1], Entry::Notice("(interrupted)".to_string()));
    }

    #[test]
    fn test_error_becomes_inline_notice() {
        let mut view = ChatView::default();
        type_text(&mut view, "hi");
        view.handle_key(key(KeyCode::Enter), false);
        view.apply(UiEvent::StreamError(ExchangeError::Configuration(
            "set OPENAI_API_KEY".to_string(),
        )));

        match view.entries.last() {
            Some(Entry::Notice(text)) => assert!(text.contains("OPENAI_API_KEY")),
            other => panic!("expected notice, got {other:?}"),
        }
        assert!(!view
            .entries
            .iter()
            .any(|e| matches!(e, Entry::Assistant { state: ReplyState::Streaming, .. })));
    }

    #[test]
    fn test_history_skips_system_messages() {
        let cid = CharacterId::new("chr_0123456789ab");
        let messages = vec![
            ChatMessage::user(&cid, "早"),
            ChatMessage::new(&cid, MessageRole::System, "hidden"),
            ChatMessage::assistant(&cid, "早安"),
        ];
        let view = ChatView::with_history(&messages);
        assert_eq!(view.entries.len(), 2);
        assert_eq!(view.entries[0], Entry::User("早".to_string()));
    }

    #[test]
    fn test_abandon_pending_removes_placeholder() {
        let mut view = ChatView::default();
        type_text(&mut view, "hi");
        view.handle_key(key(KeyCode::Enter), false);
        view.abandon_pending("busy");

        assert_eq!(view.entries.len(), 2);
        assert_eq!(view.entries[1], Entry::Notice("busy".to_string()));
    }
}
