//! Rendering for the chat view.
//!
//! Layout: header (character and stage), transcript, input line, footer
//! (phase, intimacy level, turn index).

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use companion_core::prompt::RelationshipStage;
use companion_types::chat::ExchangePhase;

use super::view::{ChatView, Entry, ReplyState};

/// Everything the footer and header show besides the transcript.
pub struct StatusLine<'a> {
    pub character_name: &'a str,
    pub phase: ExchangePhase,
    pub intimacy_level: Option<u8>,
    pub turn_index: u32,
    pub model: &'a str,
}

pub fn draw(frame: &mut Frame, view: &ChatView, status: &StatusLine<'_>) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(3),    // transcript
            Constraint::Length(3), // input
            Constraint::Length(1), // footer
        ])
        .split(frame.area());

    draw_header(frame, layout[0], status);
    draw_transcript(frame, layout[1], view, status.character_name);
    draw_input(frame, layout[2], view, status.phase.is_active());
    draw_footer(frame, layout[3], status);
}

fn draw_header(frame: &mut Frame, area: Rect, status: &StatusLine<'_>) {
    let stage = status
        .intimacy_level
        .map(|level| format!("  ·  {}", RelationshipStage::for_level(level)))
        .unwrap_or_default();
    let header = Paragraph::new(format!(" ♥ {}{stage} ", status.character_name))
        .style(Style::default().fg(Color::Magenta).bold())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
    frame.render_widget(header, area);
}

fn draw_transcript(frame: &mut Frame, area: Rect, view: &ChatView, character_name: &str) {
    let width = usize::from(area.width.max(1));
    let mut lines: Vec<Line<'static>> = Vec::new();

    for entry in &view.entries {
        match entry {
            Entry::User(text) => {
                push_wrapped(&mut lines, "你: ", text, width, Style::default().fg(Color::Green));
            }
            Entry::Assistant { text, state } => {
                let prefix = format!("{character_name}: ");
                let mut body = text.clone();
                match state {
                    ReplyState::Streaming => body.push('▌'),
                    ReplyState::Interrupted => body.push_str(" (interrupted)"),
                    ReplyState::Done => {}
                }
                push_wrapped(&mut lines, &prefix, &body, width, Style::default().fg(Color::Cyan));
            }
            Entry::Notice(text) => {
                let style = if text.starts_with('⚠') {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM)
                };
                push_wrapped(&mut lines, "", text, width, style);
            }
        }
        lines.push(Line::default());
    }

    // Keep the newest lines in view.
    let height = usize::from(area.height);
    let skip = lines.len().saturating_sub(height);
    let visible: Vec<Line> = lines.into_iter().skip(skip).collect();
    frame.render_widget(Paragraph::new(visible), area);
}

fn draw_input(frame: &mut Frame, area: Rect, view: &ChatView, streaming: bool) {
    let (title, border) = if streaming {
        (" replying… (Esc to stop) ", Color::DarkGray)
    } else {
        (" message (Enter to send, Esc to quit) ", Color::Magenta)
    };
    let input = Paragraph::new(format!("{}▏", view.input)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(border)),
    );
    frame.render_widget(input, area);
}

fn draw_footer(frame: &mut Frame, area: Rect, status: &StatusLine<'_>) {
    let level = status
        .intimacy_level
        .map(|l| l.to_string())
        .unwrap_or_else(|| "-".to_string());
    let footer = Paragraph::new(format!(
        " {}  |  intimacy {level}/10  |  turn {}  |  {} ",
        status.phase, status.turn_index, status.model
    ))
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, area);
}

/// Push `prefix + text` as lines no wider than `width` columns.
fn push_wrapped(lines: &mut Vec<Line<'static>>, prefix: &str, text: &str, width: usize, style: Style) {
    for rows in wrap(&format!("{prefix}{text}"), width) {
        lines.push(Line::from(Span::styled(rows, style)));
    }
}

/// Hard-wrap by display columns. Explicit newlines are kept.
pub(crate) fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(2);
    let mut rows = Vec::new();

    for paragraph in text.split('\n') {
        let mut row = String::new();
        let mut used = 0;
        for c in paragraph.chars() {
            let w = char_width(c);
            if used + w > width {
                rows.push(std::mem::take(&mut row));
                used = 0;
            }
            row.push(c);
            used += w;
        }
        rows.push(row);
    }
    rows
}

/// Approximate terminal column width: wide for CJK and fullwidth forms.
fn char_width(c: char) -> usize {
    match c as u32 {
        0x1100..=0x115F | 0x2E80..=0xA4CF | 0xAC00..=0xD7A3 | 0xF900..=0xFAFF | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60 | 0xFFE0..=0xFFE6 | 0x1F300..=0x1FAFF => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_ascii() {
        assert_eq!(wrap("abcdef", 4), vec!["abcd", "ef"]);
    }

    #[test]
    fn test_wrap_counts_cjk_as_double_width() {
        // Each character takes two columns.
        assert_eq!(wrap("我在呢", 4), vec!["我在", "呢"]);
    }

    #[test]
    fn test_wrap_keeps_newlines_and_empty_text() {
        assert_eq!(wrap("a\nb", 10), vec!["a", "b"]);
        assert_eq!(wrap("", 10), vec![""]);
    }
}
