//! `companion backstory`: write a backstory from the character profile.

use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::Instrument;

use companion_core::prompt::{Backstory, BackstoryGenerator, BackstorySource, render_offline_backstory};
use companion_observe::genai_attrs::OP_GENERATE_BACKSTORY;
use companion_types::character::BackstorySeed;

use super::character::resolve_character;
use crate::state::AppState;

pub struct BackstoryOptions {
    pub occupation: Option<String>,
    pub city: Option<String>,
    pub use_model: bool,
    pub save: bool,
}

pub async fn backstory(
    state: &AppState,
    character: Option<&str>,
    options: BackstoryOptions,
    json: bool,
) -> Result<()> {
    let profile = resolve_character(state, character).await?;

    let mut seed = BackstorySeed::from_profile(&profile);
    seed.occupation = options.occupation;
    seed.city = options.city;

    let backstory = if options.use_model {
        generate_with_model(state, &seed).await?
    } else {
        Backstory {
            text: render_offline_backstory(&seed),
            source: BackstorySource::Offline,
        }
    };

    if options.save {
        state.characters.set_backstory(&profile.id, &backstory.text).await?;
    }

    if json {
        let value = serde_json::json!({
            "character_id": profile.id,
            "source": match backstory.source {
                BackstorySource::Model => "model",
                BackstorySource::Offline => "offline",
            },
            "saved": options.save,
            "backstory": backstory.text,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  {}", backstory.text);
    println!();
    if options.use_model && backstory.source == BackstorySource::Offline {
        println!("  {}", style("(model unavailable, used the offline template)").dim());
    }
    if options.save {
        println!("  {} Saved to {}", style("✓").green().bold(), style(&profile.name).cyan());
    }
    println!();
    Ok(())
}

async fn generate_with_model(state: &AppState, seed: &BackstorySeed) -> Result<Backstory> {
    let provider = &state.config.provider;
    let generator = BackstoryGenerator::new(
        state.completion.clone(),
        provider.model.clone(),
        provider.max_tokens,
        state.config.chat.temperature,
    )
    .with_timeout_ms(provider.timeout_ms);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.magenta} {msg}")?);
    spinner.set_message("Writing backstory...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    let span = tracing::info_span!(
        "gen_ai.generate_backstory",
        gen_ai.operation.name = OP_GENERATE_BACKSTORY,
        gen_ai.provider.name = state.completion.name(),
        gen_ai.request.model = %provider.model,
    );
    let backstory = generator.generate(seed).instrument(span).await;

    spinner.finish_and_clear();
    Ok(backstory)
}
