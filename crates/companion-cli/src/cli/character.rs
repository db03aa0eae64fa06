//! Character commands: list, create, show, plus the lookup every other
//! command uses to pick a character.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Input;

use companion_core::character::CharacterRepository;
use companion_core::history::HistoryStore;
use companion_core::prompt::PromptAssembler;
use companion_types::character::{CharacterId, CharacterProfile};
use companion_types::relationship::DEFAULT_LEVEL;

use crate::state::AppState;

/// Profile created the first time `companion` runs with no characters.
pub fn default_profile() -> CharacterProfile {
    let mut profile = CharacterProfile::new("苏晚晴", "女性");
    profile.age = Some(24);
    profile.relationship_type = Some("恋人".to_string());
    profile.mbti = Some("INFJ".to_string());
    profile.personality_tags = vec!["温柔体贴".to_string(), "知性".to_string()];
    profile.catchphrase = Some("我在呢。".to_string());
    profile.speech_style = Some("温柔自然，像恋人日常聊天".to_string());
    profile
}

/// Resolve the character a command should act on.
///
/// An explicit id must exist. Without one, the oldest character is used,
/// and the default companion is created if there are none yet.
pub async fn resolve_character(state: &AppState, id: Option<&str>) -> Result<CharacterProfile> {
    if let Some(id) = id {
        let id = CharacterId::new(id);
        return state
            .characters
            .get(&id)
            .await?
            .with_context(|| format!("character '{id}' not found"));
    }

    let existing = state.characters.list().await?;
    if let Some(first) = existing.into_iter().next() {
        return Ok(first);
    }

    let profile = state.characters.create(&default_profile()).await?;
    tracing::info!(character_id = %profile.id, "created default character");
    Ok(profile)
}

/// Fields for `characters create`; missing required ones are prompted for.
pub struct CreateInput {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub relationship_type: Option<String>,
    pub mbti: Option<String>,
    pub tags: Vec<String>,
    pub catchphrase: Option<String>,
    pub speech_style: Option<String>,
}

pub async fn create_character(state: &AppState, input: CreateInput, json: bool) -> Result<()> {
    let name = match input.name {
        Some(n) => n,
        None => Input::<String>::new()
            .with_prompt("Character name")
            .interact_text()?,
    };
    let gender = match input.gender {
        Some(g) => g,
        None => Input::<String>::new()
            .with_prompt("Gender")
            .default("女性".to_string())
            .interact_text()?,
    };

    let mut profile = CharacterProfile::new(name.trim(), gender.trim());
    profile.age = input.age;
    profile.relationship_type = non_blank(input.relationship_type);
    profile.mbti = non_blank(input.mbti);
    profile.personality_tags = input
        .tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    profile.catchphrase = non_blank(input.catchphrase);
    profile.speech_style = non_blank(input.speech_style);

    let profile = state.characters.create(&profile).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    println!();
    println!("  {} Character created", style("✓").green().bold());
    println!();
    println!("  {}  {}", style("Name:").bold(), style(&profile.name).cyan());
    println!("  {}    {}", style("ID:").bold(), style(&profile.id).dim());
    println!();
    println!(
        "  Start chatting: {}",
        style(format!("companion chat --character {}", profile.id)).yellow()
    );
    println!();
    Ok(())
}

pub async fn list_characters(state: &AppState, json: bool) -> Result<()> {
    let characters = state.characters.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&characters)?);
        return Ok(());
    }

    if characters.is_empty() {
        println!();
        println!("  No characters yet. Run {} to meet your companion.", style("companion chat").yellow());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::DarkGrey),
            Cell::new("Name"),
            Cell::new("Relationship"),
            Cell::new("Level"),
            Cell::new("Turns"),
        ]);

    for profile in &characters {
        let level = match state.history.get_relationship_state(&profile.id).await {
            Ok(Some(rel)) => rel.intimacy_level.to_string(),
            Ok(None) => "-".to_string(),
            Err(e) => {
                tracing::warn!(character_id = %profile.id, error = %e, "relationship lookup failed");
                "?".to_string()
            }
        };
        let turns = match state.history.get_session_state(&profile.session_id()).await {
            Ok(Some(session)) => session.turn_index.to_string(),
            _ => "0".to_string(),
        };

        table.add_row(vec![
            Cell::new(profile.id.as_str()).fg(Color::DarkGrey),
            Cell::new(&profile.name).fg(Color::Cyan),
            Cell::new(profile.relationship_type.as_deref().unwrap_or("-")),
            Cell::new(level),
            Cell::new(turns),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

pub async fn show_character(state: &AppState, id: &str, json: bool) -> Result<()> {
    let profile = resolve_character(state, Some(id)).await?;
    let level = state
        .history
        .get_relationship_state(&profile.id)
        .await?
        .map(|r| r.intimacy_level)
        .unwrap_or(DEFAULT_LEVEL);
    let prompt = PromptAssembler::build(&profile, level);

    if json {
        let value = serde_json::json!({
            "profile": profile,
            "intimacy_level": level,
            "system_prompt": prompt,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style(&profile.name).cyan().bold(), style(&profile.id).dim());
    println!();
    let field = |label: &str, value: Option<String>| {
        if let Some(value) = value {
            println!("  {:<14} {}", style(label).bold(), value);
        }
    };
    field("Gender:", Some(profile.gender.clone()));
    field("Age:", profile.age.map(|a| a.to_string()));
    field("Relationship:", profile.relationship_type.clone());
    field("MBTI:", profile.mbti.clone());
    if !profile.personality_tags.is_empty() {
        field("Tags:", Some(profile.personality_tags.join(", ")));
    }
    field("Catchphrase:", profile.catchphrase.clone());
    field("Intimacy:", Some(format!("level {level}")));
    println!();
    println!("  {}", style("── System prompt ──").dim());
    for line in prompt.lines() {
        println!("  {line}");
    }
    println!();
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
