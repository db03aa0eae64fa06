//! `companion status`: configuration and relationship overview.

use anyhow::Result;
use console::style;

use companion_core::character::CharacterRepository;
use companion_core::history::HistoryStore;
use companion_core::prompt::RelationshipStage;

use super::character::resolve_character;
use crate::state::AppState;

pub async fn status(state: &AppState, character: Option<&str>, json: bool) -> Result<()> {
    let characters = state.characters.list().await?;
    let provider = &state.config.provider;

    // Without an explicit id, only report on a character if one exists;
    // status should not create the default companion.
    let profile = match character {
        Some(id) => Some(resolve_character(state, Some(id)).await?),
        None => characters.first().cloned(),
    };
    let (session, relationship, message_count) = match &profile {
        Some(p) => (
            state.history.get_session_state(&p.session_id()).await?,
            state.history.get_relationship_state(&p.id).await?,
            state.history.count_messages(&p.id).await?,
        ),
        None => (None, None, 0),
    };

    if json {
        let value = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "provider": {
                "base_url": provider.base_url,
                "model": provider.model,
                "fallback_model": provider.fallback_model,
                "credential": state.has_credential,
            },
            "characters": characters.len(),
            "character": profile,
            "session": session,
            "relationship": relationship,
            "messages": message_count,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  {} Companion v{}", style("♥").magenta().bold(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Provider ──").dim());
    println!("  Endpoint:   {}", style(&provider.base_url).dim());
    println!("  Model:      {}", style(&provider.model).cyan());
    println!("  Fallback:   {}", style(&provider.fallback_model).dim());
    if state.has_credential {
        println!("  Credential: {}", style("configured").green());
    } else {
        println!(
            "  Credential: {} (set {})",
            style("missing").red(),
            style(&provider.api_key_env).yellow()
        );
    }
    println!();

    println!("  {}", style("── Relationship ──").dim());
    match &profile {
        Some(p) => {
            println!("  Character:  {} {}", style(&p.name).cyan(), style(&p.id).dim());
            if let Some(rel) = &relationship {
                println!(
                    "  Intimacy:   level {} ({:.1}/100) {}",
                    style(rel.intimacy_level).bold(),
                    rel.intimacy_score,
                    style(RelationshipStage::for_level(rel.intimacy_level).to_string()).dim()
                );
                if let Some(narrative) = &rel.relationship_narrative {
                    println!("  Story:      {narrative}");
                }
            }
            if let Some(session) = &session {
                println!("  Turns:      {}", session.turn_index);
                if let Some(code) = &session.last_error_code {
                    println!("  Last error: {}", style(code).red());
                }
            }
            println!("  Messages:   {message_count}");
        }
        None => println!("  No characters yet."),
    }
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Characters: {}", characters.len());
    println!("  Data dir:   {}", style(state.data_dir.display()).dim());
    println!("  Database:   {}", style("SQLite (WAL mode)").dim());
    println!();

    Ok(())
}
