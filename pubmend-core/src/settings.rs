//! User settings
//!
//! Read once per invocation and passed explicitly to every component.
//!
//! ```yaml
//! autoAddPackage: true
//! useCaretSyntax: true
//! sortDependencies: false
//! useLegacySorting: false
//! useLegacyParser: false
//! search:
//!   autoResolveThreshold: 0.1
//!   matchThreshold: 0.5
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::manifest::MergeStrategy;
use crate::search::RankerConfig;

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "settings.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Skip disambiguation when exactly one candidate is a confident match
    pub auto_add_package: bool,

    /// Prefix written versions with `^`
    pub use_caret_syntax: bool,

    /// Sort dependency blocks after every merge
    pub sort_dependencies: bool,

    /// Group sorted entries by source kind (sdk, path, git, hosted)
    pub use_legacy_sorting: bool,

    /// Use the line-based merge instead of the structured one
    pub use_legacy_parser: bool,

    /// Search ranker tuning
    pub search: RankerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_add_package: true,
            use_caret_syntax: true,
            sort_dependencies: false,
            use_legacy_sorting: false,
            use_legacy_parser: false,
            search: RankerConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from the default location
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path()?)
    }

    /// Load settings from a specific path, falling back to defaults when
    /// the file does not exist
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    /// Parse settings from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(content).context("Invalid settings YAML")
    }

    /// Default settings file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = directories::ProjectDirs::from("dev", "pubmend", "pubmend")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .or_else(|| dirs::config_dir().map(|d| d.join("pubmend")))
            .context("Could not determine config directory")?;

        Ok(config_dir.join(SETTINGS_FILE))
    }

    /// Merge algorithm selected by `useLegacyParser`
    pub fn merge_strategy(&self) -> MergeStrategy {
        if self.use_legacy_parser {
            MergeStrategy::LineBased
        } else {
            MergeStrategy::Structured
        }
    }
}
