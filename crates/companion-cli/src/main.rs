//! Companion entry point.
//!
//! Binary name: `companion`
//!
//! Parses CLI arguments, sets up tracing, wires the application state, and
//! dispatches to the command handlers.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use companion_infra::filesystem::{log_path, resolve_data_dir};
use companion_observe::tracing_setup::{
    LogTarget, filter_for_verbosity, init_tracing, shutdown_tracing,
};

use cli::{CharacterCommand, Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "companion", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = resolve_data_dir();

    // The chat view owns the terminal, so its logs go to a file.
    let target = match cli.command {
        Commands::Chat { .. } => {
            companion_infra::filesystem::ensure_data_dir(&data_dir).await?;
            LogTarget::File(log_path(&data_dir))
        }
        _ => LogTarget::Stderr,
    };
    let _guard = init_tracing(filter_for_verbosity(cli.verbose, cli.quiet), target, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init(data_dir).await?;
    let result = dispatch(&state, cli).await;

    shutdown_tracing();
    result
}

async fn dispatch(state: &AppState, cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Chat { character } => {
            cli::chat::run_chat(state, character.as_deref()).await?;
        }

        Commands::Characters { action } => match action {
            CharacterCommand::List => {
                cli::character::list_characters(state, cli.json).await?;
            }
            CharacterCommand::Create {
                name,
                gender,
                age,
                relationship,
                mbti,
                tags,
                catchphrase,
                speech_style,
            } => {
                let input = cli::character::CreateInput {
                    name,
                    gender,
                    age,
                    relationship_type: relationship,
                    mbti,
                    tags,
                    catchphrase,
                    speech_style,
                };
                cli::character::create_character(state, input, cli.json).await?;
            }
            CharacterCommand::Show { id } => {
                cli::character::show_character(state, &id, cli.json).await?;
            }
        },

        Commands::History { character, limit } => {
            cli::history::show_history(state, character.as_deref(), limit, cli.json).await?;
        }

        Commands::Status { character } => {
            cli::status::status(state, character.as_deref(), cli.json).await?;
        }

        Commands::Backstory {
            character,
            occupation,
            city,
            llm,
            save,
        } => {
            let options = cli::backstory::BackstoryOptions {
                occupation,
                city,
                use_model: llm,
                save,
            };
            cli::backstory::backstory(state, character.as_deref(), options, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled before state init"),
    }

    Ok(())
}
