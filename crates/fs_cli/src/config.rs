//! Command-line configuration

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Defaults applied when a flag is not given on the command line
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub transfer: TransferConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Replace existing destination entries without --overwrite
    pub overwrite: bool,
    /// Always match destination timestamps to the source on copy
    pub preserve_dates: bool,
    /// Copy reparse points themselves instead of their targets
    pub copy_symlinks: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            overwrite: false,
            preserve_dates: false,
            copy_symlinks: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Emit listings as JSON
    pub json: bool,
    /// Print a running byte count during transfers
    pub progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json: false,
            progress: true,
        }
    }
}

impl CliConfig {
    /// Configuration file path
    pub fn path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "fskit", "fskit")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when the file is
    /// absent or unreadable
    pub fn load() -> Option<Self> {
        let path = Self::path()?;
        let text = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&text) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Invalid configuration, using defaults: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert!(!config.transfer.overwrite);
        assert!(config.output.progress);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: CliConfig = toml::from_str("[transfer]\noverwrite = true\n").unwrap();
        assert!(config.transfer.overwrite);
        assert!(!config.transfer.preserve_dates);
        assert!(config.output.progress);
    }
}
