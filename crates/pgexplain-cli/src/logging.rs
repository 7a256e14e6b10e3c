//! Logging setup for the command line
//!
//! Everything goes to stderr so stdout carries only the analysis output.
//! `RUST_LOG` takes precedence over the configured default filter.

use crate::settings::CliSettings;
use std::io::IsTerminal;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used by `--verbose`
const VERBOSE_FILTER: &str = "debug";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default log level filter
    pub default_filter: String,

    /// Whether to include file/line information in logs
    pub include_location: bool,

    /// Whether to colorize output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "warn".to_string(),
            include_location: false,
            ansi: std::io::stderr().is_terminal(),
        }
    }
}

impl LoggingConfig {
    /// Builds the configuration from settings, raised to debug by `--verbose`
    pub fn from_settings(settings: &CliSettings, verbose: bool) -> Self {
        if verbose {
            return Self::verbose();
        }
        Self {
            default_filter: settings.log_filter.clone(),
            ..Self::default()
        }
    }

    /// Debug output with source locations
    pub fn verbose() -> Self {
        Self {
            default_filter: VERBOSE_FILTER.to_string(),
            include_location: true,
            ..Self::default()
        }
    }

    /// The effective filter, honoring `RUST_LOG`
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Initialize the logging system with the given configuration
pub fn init(config: LoggingConfig) -> anyhow::Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_ansi(config.ansi)
        .with_filter(config.env_filter());

    tracing_subscriber::registry().with(stderr_layer).try_init()?;

    tracing::debug!(filter = %config.default_filter, "Logging initialized");
    Ok(())
}
