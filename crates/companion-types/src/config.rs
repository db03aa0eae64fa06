//! Configuration types for Companion.
//!
//! `CompanionConfig` represents the top-level `config.toml` in the data
//! directory. Every field has a default, so an empty or missing file is valid.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.companion/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanionConfig {
    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub chat: ChatSettings,

    #[serde(default)]
    pub intimacy: IntimacySettings,
}

/// Completion service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Model to report as the fallback when the primary is unavailable.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_fallback_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            fallback_model: default_fallback_model(),
            api_key_env: default_api_key_env(),
            timeout_ms: default_timeout_ms(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Reply generation and presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Number of most recent messages sent as context.
    #[serde(default = "default_history_window")]
    pub history_window: u32,

    /// Capacity of the token hand-off channel between producer and UI.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Longest wait the chat view spends on one event per frame.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_history_window() -> u32 {
    10
}

fn default_channel_capacity() -> usize {
    32
}

fn default_tick_ms() -> u64 {
    50
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            history_window: default_history_window(),
            channel_capacity: default_channel_capacity(),
            tick_ms: default_tick_ms(),
        }
    }
}

/// Intimacy bump tuning.
///
/// A message longer than `length_threshold` characters earns
/// `engaged_bump`; anything else earns `base_bump`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntimacySettings {
    #[serde(default = "default_base_bump")]
    pub base_bump: f64,

    #[serde(default = "default_engaged_bump")]
    pub engaged_bump: f64,

    #[serde(default = "default_length_threshold")]
    pub length_threshold: usize,
}

fn default_base_bump() -> f64 {
    0.5
}

fn default_engaged_bump() -> f64 {
    1.0
}

fn default_length_threshold() -> usize {
    20
}

impl Default for IntimacySettings {
    fn default() -> Self {
        Self {
            base_bump: default_base_bump(),
            engaged_bump: default_engaged_bump(),
            length_threshold: default_length_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = CompanionConfig::default();
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.fallback_model, "gpt-3.5-turbo");
        assert_eq!(config.provider.timeout_ms, 30_000);
        assert_eq!(config.provider.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.chat.history_window, 10);
        assert!((config.chat.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.intimacy.length_threshold, 20);
    }

    #[test]
    fn test_deserialize_empty() {
        let config: CompanionConfig = toml::from_str("").unwrap();
        assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
        assert_eq!(config.chat.channel_capacity, 32);
        assert!((config.intimacy.base_bump - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let toml_str = r#"
[provider]
model = "gpt-4o"
timeout_ms = 5000

[intimacy]
engaged_bump = 2.5
"#;
        let config: CompanionConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.provider.timeout_ms, 5000);
        // Untouched fields keep their defaults.
        assert_eq!(config.provider.max_tokens, 1024);
        assert!((config.intimacy.engaged_bump - 2.5).abs() < f64::EPSILON);
        assert!((config.intimacy.base_bump - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.chat.history_window, 10);
    }
}
