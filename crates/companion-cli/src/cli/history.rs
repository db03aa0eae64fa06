//! `companion history`: print the recent conversation.

use anyhow::Result;
use console::style;

use companion_core::history::HistoryStore;
use companion_types::chat::{ChatMessage, MessageRole};

use super::character::resolve_character;
use crate::state::AppState;

pub async fn show_history(
    state: &AppState,
    character: Option<&str>,
    limit: u32,
    json: bool,
) -> Result<()> {
    let profile = resolve_character(state, character).await?;
    let messages = state.history.recent_messages(&profile.id, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    println!();
    if messages.is_empty() {
        println!("  No messages with {} yet.", style(&profile.name).cyan());
        println!();
        return Ok(());
    }

    for msg in &messages {
        println!("  {}", format_message(msg, &profile.name));
    }
    println!();
    Ok(())
}

fn format_message(msg: &ChatMessage, character_name: &str) -> String {
    let time = msg.timestamp.with_timezone(&chrono::Local).format("%m-%d %H:%M");
    let speaker = match msg.role {
        MessageRole::User => style("你".to_string()).green().bold(),
        MessageRole::Assistant => style(character_name.to_string()).cyan().bold(),
        MessageRole::System => style("system".to_string()).dim(),
    };
    format!("{} {}: {}", style(time).dim(), speaker, msg.content)
}
