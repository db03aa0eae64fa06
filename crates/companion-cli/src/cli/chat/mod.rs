//! `companion chat`: the full-screen chat view.
//!
//! One cooperative loop owns the terminal. Each pass draws, waits at most
//! one tick for the next reply event, then drains pending key presses
//! without blocking. Replies are produced on a background task by the
//! pipeline, so typing stays responsive while a reply streams.

mod draw;
mod view;

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;

use companion_core::chat::{StartOutcome, UiEventBridge};
use companion_core::history::HistoryStore;
use companion_infra::sqlite::history::SqliteHistoryStore;

use self::draw::{StatusLine, draw};
use self::view::{Action, ChatView};
use super::character::resolve_character;
use crate::state::AppState;

/// Messages loaded into the transcript when the view opens.
const HISTORY_VIEW_LIMIT: u32 = 50;

type ChatTerminal = Terminal<CrosstermBackend<io::Stdout>>;

pub async fn run_chat(state: &AppState, character: Option<&str>) -> Result<()> {
    let profile = resolve_character(state, character).await?;
    let pipeline = state.pipeline();
    let session = pipeline.ensure_session(&profile.id).await;

    let relationship = match state.history.get_relationship_state(&profile.id).await {
        Ok(rel) => rel,
        Err(e) => {
            tracing::warn!(character_id = %profile.id, error = %e, "relationship read failed");
            None
        }
    };
    let history = match state.history.recent_messages(&profile.id, HISTORY_VIEW_LIMIT).await {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!(character_id = %profile.id, error = %e, "history read failed");
            Vec::new()
        }
    };

    let mut view = ChatView::with_history(&history);
    if !state.has_credential {
        view.notice(format!(
            "⚠ No API key found. Set {} to get replies.",
            state.config.provider.api_key_env
        ));
    }

    let mut bridge = UiEventBridge::new(pipeline, profile, session)?;
    bridge.set_relationship(relationship);
    tracing::info!(
        character_id = %bridge.profile().id,
        turn_index = bridge.session().turn_index,
        "chat view opened"
    );

    let tick = Duration::from_millis(state.config.chat.tick_ms.max(1));

    let screen = ScreenGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let result = run_loop(
        &mut terminal,
        &mut view,
        &mut bridge,
        tick,
        &state.config.provider.model,
    )
    .await;

    bridge.close().await;
    screen.leave()?;

    result
}

/// Raw mode plus the alternate screen, restored on drop.
///
/// Armed as soon as raw mode is on, so a failure while entering the
/// alternate screen or building the terminal still restores it.
struct ScreenGuard {
    restore: Option<fn() -> io::Result<()>>,
}

impl ScreenGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let guard = Self::armed(restore_terminal);
        io::stdout().execute(EnterAlternateScreen)?;
        Ok(guard)
    }

    fn armed(restore: fn() -> io::Result<()>) -> Self {
        Self {
            restore: Some(restore),
        }
    }

    /// Restore now and report the outcome.
    fn leave(mut self) -> io::Result<()> {
        match self.restore.take() {
            Some(restore) => restore(),
            None => Ok(()),
        }
    }
}

impl Drop for ScreenGuard {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            let _ = restore();
        }
    }
}

fn restore_terminal() -> io::Result<()> {
    let raw = disable_raw_mode();
    io::stdout().execute(LeaveAlternateScreen)?;
    raw
}

async fn run_loop(
    terminal: &mut ChatTerminal,
    view: &mut ChatView,
    bridge: &mut UiEventBridge<SqliteHistoryStore>,
    tick: Duration,
    model: &str,
) -> Result<()> {
    loop {
        {
            let status = StatusLine {
                character_name: &bridge.profile().name,
                phase: bridge.phase(),
                intimacy_level: bridge.relationship().map(|r| r.intimacy_level),
                turn_index: bridge.session().turn_index,
                model,
            };
            terminal.draw(|frame| draw(frame, view, &status))?;
        }

        if view.quit {
            break;
        }

        if bridge.is_streaming() {
            // Dropping the wait on timeout loses nothing; the event stays queued.
            if let Ok(Some(event)) = tokio::time::timeout(tick, bridge.next_event()).await {
                view.apply(event);
            }
        } else {
            tokio::time::sleep(tick).await;
        }

        while !view.quit && event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match view.handle_key(key, bridge.is_streaming()) {
                Action::Submit(text) => match bridge.start(&text) {
                    Ok(StartOutcome::Started) => {}
                    Ok(StartOutcome::IgnoredEmpty) => view.abandon_pending("(empty message ignored)"),
                    Err(e) => view.abandon_pending(format!("⚠ {e}")),
                },
                Action::Cancel => bridge.cancel(),
                Action::Quit => bridge.shutdown(),
                Action::None => {}
            }
        }
    }

    Ok(())
}
