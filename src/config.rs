//! Configuration for building a registry of channels

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::channel::DEFAULT_THRESHOLD;
use crate::sink::{FileBackend, OpenMode};

/// One configured channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Registry name
    pub name: String,
    /// Output identifier (defaults to the name)
    #[serde(default)]
    pub file: Option<String>,
    /// Flush threshold (defaults to the registry default)
    #[serde(default)]
    pub threshold: Option<usize>,
}

impl ChannelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: None,
            threshold: None,
        }
    }

    /// The identifier the channel opens
    pub fn identifier(&self) -> &str {
        self.file.as_deref().unwrap_or(&self.name)
    }
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Threshold for channels that don't set their own (default: 30)
    #[serde(default = "default_threshold")]
    pub default_threshold: usize,

    /// Terminate the process when a flush fails
    #[serde(default)]
    pub exit_on_error: bool,

    /// Directory relative identifiers resolve under
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// How existing files are opened: "truncate" (default) or "append"
    #[serde(default)]
    pub open_mode: OpenMode,

    /// Channels created up front
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

fn default_threshold() -> usize {
    DEFAULT_THRESHOLD
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            exit_on_error: false,
            log_dir: None,
            open_mode: OpenMode::default(),
            channels: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Load configuration from `path`, or return the default if it doesn't exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Threshold a configured channel ends up with
    pub fn threshold_for(&self, channel: &ChannelConfig) -> usize {
        channel.threshold.unwrap_or(self.default_threshold)
    }

    /// File backend described by this configuration
    pub fn backend(&self) -> FileBackend {
        let backend = FileBackend::new().with_mode(self.open_mode);
        match &self.log_dir {
            Some(dir) => backend.with_base_dir(dir),
            None => backend,
        }
    }
}

/// Get the base configuration directory (~/.chanlog)
/// Falls back to ./.chanlog if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".chanlog"))
        .unwrap_or_else(|| {
            tracing::warn!("Could not determine home directory, using current directory for config");
            PathBuf::from(".chanlog")
        })
}

/// Get the path to the default config file
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.default_threshold, 30);
        assert!(!config.exit_on_error);
        assert_eq!(config.open_mode, OpenMode::Truncate);
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_parse_minimal() {
        let config: RegistryConfig = toml::from_str("").unwrap();
        assert_eq!(config.default_threshold, 30);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_parse_channels() {
        let toml_str = r#"
default_threshold = 10
exit_on_error = true
log_dir = "/var/log/app"
open_mode = "append"

[[channels]]
name = "app"

[[channels]]
name = "audit"
file = "audit/audit.log"
threshold = 1
"#;
        let config: RegistryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_threshold, 10);
        assert!(config.exit_on_error);
        assert_eq!(config.open_mode, OpenMode::Append);
        assert_eq!(config.channels.len(), 2);

        let app = &config.channels[0];
        assert_eq!(app.identifier(), "app");
        assert_eq!(config.threshold_for(app), 10);

        let audit = &config.channels[1];
        assert_eq!(audit.identifier(), "audit/audit.log");
        assert_eq!(config.threshold_for(audit), 1);

        assert_eq!(
            config.backend().resolve("app"),
            PathBuf::from("/var/log/app/app")
        );
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = RegistryConfig::default();
        config.default_threshold = 5;
        config.channels.push(ChannelConfig::new("app"));
        config.save(&path).unwrap();

        let loaded = RegistryConfig::load(&path).unwrap();
        assert_eq!(loaded.default_threshold, 5);
        assert_eq!(loaded.channels, vec![ChannelConfig::new("app")]);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = RegistryConfig::load_or_default(&temp_dir.path().join("none.toml")).unwrap();
        assert_eq!(config.default_threshold, 30);
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "default_threshold = \"many\"").unwrap();

        let err = RegistryConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with(".chanlog/config.toml"));
    }
}
