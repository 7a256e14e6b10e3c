//! pgexplain - Analyze PostgreSQL EXPLAIN output from the command line
//!
//! Reads a plan from a file or stdin, runs it through the analyzer and prints
//! the response envelope. Exit codes: 0 on success, 2 when the plan could not
//! be analyzed (the envelope is still printed), 1 on I/O or config failure.

mod logging;
mod output;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use pgexplain_analyzer::{AnalysisResponse, FormatHint, PlanAnalyzer};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use logging::LoggingConfig;
use output::OutputFormat;
use settings::CliSettings;

/// Exit code when the input was read but could not be analyzed
const EXIT_ANALYSIS_FAILED: u8 = 2;
/// Exit code for I/O and configuration failures
const EXIT_FAILURE: u8 = 1;

#[derive(Parser, Debug)]
#[command(name = "pgexplain")]
#[command(about = "Analyze PostgreSQL EXPLAIN plans and suggest optimizations")]
#[command(version)]
struct Cli {
    /// Plan file to read; omit or pass `-` to read stdin
    file: Option<PathBuf>,

    /// Input format: auto, json or text
    #[arg(short, long, env = "PGEXPLAIN_FORMAT")]
    format: Option<FormatHint>,

    /// Output format
    #[arg(short, long, value_enum, env = "PGEXPLAIN_OUTPUT")]
    output: Option<OutputFormat>,

    /// Settings file (defaults to <config dir>/pgexplain/settings.json)
    #[arg(short, long, env = "PGEXPLAIN_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = match &cli.config {
        Some(path) => CliSettings::load_from(path)?,
        None => CliSettings::load()?,
    };
    logging::init(LoggingConfig::from_settings(&settings, cli.verbose))?;

    let raw = read_input(cli.file.as_deref())?;
    let format = cli.format.unwrap_or(settings.default_format);
    let output = cli.output.unwrap_or(settings.output);
    tracing::debug!(%format, ?output, bytes = raw.len(), "Analyzing plan");

    let analyzer = PlanAnalyzer::with_config(settings.analyzer);
    let response = AnalysisResponse::from_result(analyzer.analyze(&raw, format));
    println!("{}", output::render(&response, output)?);

    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_ANALYSIS_FAILED)
    })
}

/// Reads the plan from `path`, or stdin for `None` and `-`
fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan from {}", path.display())),
        _ => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read plan from stdin")?;
            Ok(raw)
        }
    }
}
