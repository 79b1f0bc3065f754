//! CLI configuration file.

use std::path::{Path, PathBuf};
use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default config file looked up in the working directory.
pub const CONFIG_FILE: &str = "buildathon.json";

/// Storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// JSON files under the storage directory
    #[default]
    Json,
    /// SQLite database `buildathon.db` under the storage directory
    Sqlite,
}

/// Settings read from `buildathon.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildathonConfig {
    /// Data directory
    pub storage_path: PathBuf,
    /// Storage backend
    pub backend: Backend,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for BuildathonConfig {
    fn default() -> Self {
        Self {
            storage_path: ".buildathon".into(),
            backend: Backend::Json,
            log_level: "info".to_string(),
        }
    }
}

impl BuildathonConfig {
    /// Load from `path`, or from `./buildathon.json` when present, or defaults.
    ///
    /// An explicitly named file must exist.
    pub async fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(CONFIG_FILE), false),
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("Invalid config file {}", path.display())),
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Cannot read config file {}", path.display())),
        }
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, storage_path: Option<PathBuf>, backend: Option<Backend>) -> Self {
        if let Some(p) = storage_path {
            self.storage_path = p;
        }
        if let Some(b) = backend {
            self.backend = b;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("buildathon.json");
        tokio::fs::write(&path, r#"{ "backend": "sqlite" }"#).await.unwrap();

        let config = BuildathonConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.storage_path, PathBuf::from(".buildathon"));
        assert_eq!(config.log_level, "info");
    }

    #[tokio::test]
    async fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(BuildathonConfig::load(Some(&missing)).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("buildathon.json");
        tokio::fs::write(&path, r#"{ "backend": "postgres" }"#).await.unwrap();
        assert!(BuildathonConfig::load(Some(&path)).await.is_err());
    }

    #[test]
    fn test_overrides() {
        let config = BuildathonConfig::default()
            .with_overrides(Some("/tmp/data".into()), Some(Backend::Sqlite));
        assert_eq!(config.storage_path, PathBuf::from("/tmp/data"));
        assert_eq!(config.backend, Backend::Sqlite);

        let config = BuildathonConfig::default().with_overrides(None, None);
        assert_eq!(config, BuildathonConfig::default());
    }
}
