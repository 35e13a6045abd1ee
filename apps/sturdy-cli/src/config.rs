//! Server configuration, loaded from `sturdy.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SturdyConfig {
    /// Where trunk and view repositories live.
    #[serde(default = "default_repos_dir")]
    pub repos_dir: PathBuf,

    /// Where entity records (JSON stores) live.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// JSONL file notifications are appended to.
    #[serde(default = "default_notifications_log")]
    pub notifications_log: PathBuf,
}

impl Default for SturdyConfig {
    fn default() -> Self {
        Self {
            repos_dir: default_repos_dir(),
            data_dir: default_data_dir(),
            notifications_log: default_notifications_log(),
        }
    }
}

fn default_repos_dir() -> PathBuf {
    PathBuf::from(".sturdy/repos")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".sturdy/db")
}

fn default_notifications_log() -> PathBuf {
    PathBuf::from(".sturdy/notifications.jsonl")
}

impl SturdyConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Try to load config, returning defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: SturdyConfig = toml::from_str("repos_dir = \"/var/sturdy/repos\"").unwrap();
        assert_eq!(config.repos_dir, PathBuf::from("/var/sturdy/repos"));
        assert_eq!(config.data_dir, default_data_dir());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = SturdyConfig::load_or_default(Path::new("/does/not/exist.toml"));
        assert_eq!(config.repos_dir, default_repos_dir());
    }
}
