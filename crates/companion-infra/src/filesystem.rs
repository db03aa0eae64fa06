//! Data directory layout.

use std::path::{Path, PathBuf};

/// Resolve the data directory.
///
/// Priority:
/// 1. `COMPANION_DATA_DIR` environment variable
/// 2. `~/.companion`
/// 3. `./.companion` when no home directory is known
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("COMPANION_DATA_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".companion");
    }

    PathBuf::from(".companion")
}

/// Create the data directory if needed.
pub async fn ensure_data_dir(data_dir: &Path) -> Result<(), std::io::Error> {
    tokio::fs::create_dir_all(data_dir).await
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// Log file used while the chat view owns the terminal.
pub fn log_path(data_dir: &Path) -> PathBuf {
    data_dir.join("companion.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_data_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        ensure_data_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        // Second call is a no-op.
        ensure_data_dir(&nested).await.unwrap();
    }

    #[test]
    fn test_layout() {
        let root = Path::new("/data");
        assert_eq!(config_path(root), PathBuf::from("/data/config.toml"));
        assert_eq!(log_path(root), PathBuf::from("/data/companion.log"));
    }
}
