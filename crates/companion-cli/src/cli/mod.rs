//! CLI command definitions for the `companion` binary.

pub mod backstory;
pub mod character;
pub mod chat;
pub mod history;
pub mod status;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Chat with your AI companion in the terminal.
#[derive(Parser)]
#[command(name = "companion", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry (ignored by `chat`).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the chat view (the default companion is created on first run).
    Chat {
        /// Character id to chat with.
        #[arg(long, short)]
        character: Option<String>,
    },

    /// Manage character profiles.
    #[command(alias = "chars")]
    Characters {
        #[command(subcommand)]
        action: CharacterCommand,
    },

    /// Print recent messages with a character.
    History {
        #[arg(long, short)]
        character: Option<String>,

        /// Number of messages to show.
        #[arg(long, short = 'n', default_value = "50")]
        limit: u32,
    },

    /// Configuration, credential and relationship overview.
    Status {
        #[arg(long, short)]
        character: Option<String>,
    },

    /// Write a backstory for a character.
    Backstory {
        #[arg(long, short)]
        character: Option<String>,

        #[arg(long)]
        occupation: Option<String>,

        #[arg(long)]
        city: Option<String>,

        /// Ask the model to expand the outline (falls back to the outline).
        #[arg(long)]
        llm: bool,

        /// Store the result on the character profile.
        #[arg(long)]
        save: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum CharacterCommand {
    /// List all characters.
    #[command(alias = "ls")]
    List,

    /// Create a character (prompts for anything not given as a flag).
    Create {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        gender: Option<String>,

        #[arg(long)]
        age: Option<u32>,

        /// e.g. 恋人, 朋友
        #[arg(long)]
        relationship: Option<String>,

        #[arg(long)]
        mbti: Option<String>,

        /// Comma-separated personality tags.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        #[arg(long)]
        catchphrase: Option<String>,

        #[arg(long)]
        speech_style: Option<String>,
    },

    /// Show one character, including the assembled system prompt.
    Show {
        /// Character id.
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create_with_tags() {
        let cli = Cli::try_parse_from([
            "companion", "characters", "create", "--name", "林夏", "--tags", "开朗,爱笑",
        ])
        .unwrap();
        match cli.command {
            Commands::Characters {
                action: CharacterCommand::Create { name, tags, .. },
            } => {
                assert_eq!(name.as_deref(), Some("林夏"));
                assert_eq!(tags, vec!["开朗", "爱笑"]);
            }
            _ => panic!("expected characters create"),
        }
    }

    #[test]
    fn test_history_default_limit() {
        let cli = Cli::try_parse_from(["companion", "history"]).unwrap();
        assert!(matches!(cli.command, Commands::History { limit: 50, character: None }));
    }
}
