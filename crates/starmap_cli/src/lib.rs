//! Batch tools for the starmap persistence engine: sync, import, migrate.
#![forbid(unsafe_code)]

use clap::{Args, ValueEnum};
use log::{error, warn};
use starmap_core::report::write_report;
use starmap_core::{default_log_level, init_logging, BackendKind, EngineConfig};
use std::path::{Path, PathBuf};

mod error;
pub mod import;
pub mod migrate;
pub mod sync;

pub use error::CliError;

/// Flags shared by every binary.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// TOML configuration file.
    #[arg(long, value_name = "path", global = true)]
    pub config: Option<PathBuf>,
    /// Override the flat JSON file location.
    #[arg(long = "flat-file", value_name = "path", global = true)]
    pub flat_file: Option<PathBuf>,
    /// Override the SQLite database location.
    #[arg(long, value_name = "path", global = true)]
    pub database: Option<PathBuf>,
    /// Directory for rolling logs and reports.
    #[arg(long = "logs-dir", value_name = "path", global = true)]
    pub logs_dir: Option<PathBuf>,
    /// trace|debug|info|warn|error
    #[arg(long = "log-level", value_name = "level", global = true)]
    pub log_level: Option<String>,
}

impl CommonArgs {
    /// Loads the config file (if any) and applies flag overrides.
    pub fn load_config(&self) -> Result<EngineConfig, CliError> {
        let mut config = EngineConfig::load(self.config.as_deref())?;
        if let Some(path) = &self.flat_file {
            config.flat_file_path = path.clone();
        }
        if let Some(path) = &self.database {
            config.database_path = path.clone();
        }
        if let Some(path) = &self.logs_dir {
            config.logs_dir = path.clone();
        }
        Ok(config)
    }

    /// Starts file logging in the configured logs directory.
    pub fn start_logging(&self, config: &EngineConfig) -> Result<(), CliError> {
        let level = self.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &config.logs_dir).map_err(CliError::Logging)
    }
}

/// `--backend` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Auto,
    #[value(alias = "json")]
    Flat,
    #[value(alias = "sqlite", alias = "database")]
    Relational,
}

impl From<BackendArg> for BackendKind {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Auto => Self::Auto,
            BackendArg::Flat => Self::Flat,
            BackendArg::Relational => Self::Relational,
        }
    }
}

/// Result of one command run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Drives the process exit code.
    pub success: bool,
    pub report_path: PathBuf,
}

/// Prints `body` and saves it either to `explicit` or as a timestamped
/// report in `logs_dir`.
pub(crate) fn emit_report(
    body: &str,
    explicit: Option<&Path>,
    logs_dir: &Path,
    prefix: &str,
) -> Result<PathBuf, CliError> {
    print!("{body}");
    let written = match explicit {
        Some(path) => write_explicit(path, body),
        None => write_report(logs_dir, prefix, body),
    };
    let path = written.map_err(|source| CliError::Report {
        path: explicit.unwrap_or(logs_dir).to_path_buf(),
        source,
    })?;
    println!("report written to {}", path.display());
    Ok(path)
}

/// Saves a report for a command that failed before producing results and
/// hands the error back to the caller.
///
/// The command error is returned even when the report cannot be written.
pub(crate) fn report_failure(
    tool: &str,
    err: CliError,
    explicit: Option<&Path>,
    logs_dir: &Path,
    prefix: &str,
) -> CliError {
    error!("event=cli_run module=cli status=error tool={tool} error={err}");
    let body = format!("{tool} failed\n  error: {err}\n");
    if let Err(report_err) = emit_report(&body, explicit, logs_dir, prefix) {
        warn!(
            "event=cli_report module=cli status=error tool={tool} error_code=report_write_failed error={report_err}"
        );
    }
    err
}

fn write_explicit(path: &Path, body: &str) -> std::io::Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests;
