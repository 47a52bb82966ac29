//! Error types emitted by the starmap batch tools.

use starmap_core::{ConfigError, ImportError, MigrationError, RepoError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors emitted by the starmap CLI binaries.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// The TOML configuration could not be loaded.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    /// The log backend could not be started.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
    /// A directory was given to a single-file import.
    #[error("{path:?} is a directory; pass --batch to import every JSON file in it")]
    DirectoryWithoutBatch { path: PathBuf },
    #[error(transparent)]
    Store(#[from] RepoError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    /// The text report could not be written.
    #[error("failed to write report {path:?}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
