//! Configuration loader for Companion.
//!
//! Reads `config.toml` from the data directory and applies environment
//! overrides. Falls back to defaults when the file is missing or malformed.

use std::path::Path;

use companion_types::config::CompanionConfig;

use crate::filesystem::config_path;

/// Overrides `provider.model`.
pub const MODEL_ENV: &str = "COMPANION_MODEL";
/// Overrides `provider.base_url`.
pub const BASE_URL_ENV: &str = "COMPANION_BASE_URL";

/// Load configuration from `{data_dir}/config.toml`, then apply env overrides.
pub async fn load_config(data_dir: &Path) -> CompanionConfig {
    let mut config = load_config_file(data_dir).await;
    apply_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

async fn load_config_file(data_dir: &Path) -> CompanionConfig {
    let path = config_path(data_dir);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", path.display());
            return CompanionConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return CompanionConfig::default();
        }
    };

    match toml::from_str::<CompanionConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            CompanionConfig::default()
        }
    }
}

/// Apply `COMPANION_MODEL` / `COMPANION_BASE_URL`. Blank values are ignored.
fn apply_overrides(config: &mut CompanionConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(model) = non_blank(MODEL_ENV) {
        tracing::debug!(%model, "model overridden from environment");
        config.provider.model = model;
    }
    if let Some(base_url) = non_blank(BASE_URL_ENV) {
        tracing::debug!(%base_url, "base URL overridden from environment");
        config.provider.base_url = base_url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config_file(tmp.path()).await;
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.chat.history_window, 10);
    }

    #[tokio::test]
    async fn test_valid_file_is_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            config_path(tmp.path()),
            r#"
[provider]
model = "gpt-4o"
base_url = "http://localhost:8080/v1"

[chat]
history_window = 4
"#,
        )
        .await
        .unwrap();

        let config = load_config_file(tmp.path()).await;
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.provider.base_url, "http://localhost:8080/v1");
        assert_eq!(config.chat.history_window, 4);
        assert_eq!(config.chat.channel_capacity, 32);
    }

    #[tokio::test]
    async fn test_malformed_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(config_path(tmp.path()), "[provider\nmodel = ")
            .await
            .unwrap();

        let config = load_config_file(tmp.path()).await;
        assert_eq!(config.provider.model, "gpt-4o-mini");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CompanionConfig::default();
        apply_overrides(&mut config, |name| match name {
            MODEL_ENV => Some("qwen-plus".to_string()),
            BASE_URL_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.provider.model, "qwen-plus");
        assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
    }
}
