//! CLI settings file
//!
//! Stored as JSON at `<config dir>/pgexplain/settings.json`. Every field is
//! optional; a missing file means defaults. Command-line flags win over the
//! file.

use crate::output::OutputFormat;
use anyhow::{Context, Result};
use pgexplain_analyzer::{AnalyzerConfig, FormatHint};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliSettings {
    /// Analyzer thresholds
    pub analyzer: AnalyzerConfig,
    /// Input format when `--format` is not given
    pub default_format: FormatHint,
    /// Output format when `--output` is not given
    pub output: OutputFormat,
    /// Default `tracing` filter, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            default_format: FormatHint::Auto,
            output: OutputFormat::Json,
            log_filter: "warn".to_string(),
        }
    }
}

impl CliSettings {
    /// Loads the settings file from the default location, if there is one
    pub fn load() -> Result<Self> {
        let path = Self::settings_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Loads an explicitly named settings file, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings JSON in {:?}", path))
    }

    pub fn settings_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not find config directory")?;
        Ok(config_dir.join("pgexplain").join("settings.json"))
    }
}
