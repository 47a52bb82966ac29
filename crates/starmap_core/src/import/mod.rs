//! Batch import of external JSON exports.
//!
//! # Responsibility
//! - Recognize the two export shapes (standard records, discovery log).
//! - Normalize loosely typed records and write them through a store.
//! - Count every outcome and render a report.
//!
//! # Invariants
//! - Per-record and per-file failures are recorded, never raised.
//! - Only setup failures (missing source) abort a run.
//! - Nothing is rolled back when a batch partially fails.

use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter, Write as _};
use std::path::PathBuf;

pub mod discovery;
mod importer;
pub mod records;
pub mod retry;

pub use importer::Importer;

/// Import behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Replace systems whose name already exists instead of skipping them.
    pub allow_updates: bool,
    /// Validate normalized records before touching the store.
    pub validate: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            allow_updates: false,
            validate: true,
        }
    }
}

/// Outcome counters for one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub systems_found: usize,
    pub systems_imported: usize,
    pub systems_updated: usize,
    pub systems_skipped: usize,
    pub systems_failed: usize,
    pub discoveries_found: usize,
    pub discoveries_imported: usize,
    pub discoveries_skipped: usize,
    pub discoveries_failed: usize,
    pub errors: Vec<String>,
}

impl ImportStats {
    pub fn success(&self) -> bool {
        self.files_failed == 0 && self.systems_failed == 0 && self.discoveries_failed == 0
    }

    /// Folds another run's counters into this one.
    pub fn merge(&mut self, other: ImportStats) {
        self.files_processed += other.files_processed;
        self.files_failed += other.files_failed;
        self.systems_found += other.systems_found;
        self.systems_imported += other.systems_imported;
        self.systems_updated += other.systems_updated;
        self.systems_skipped += other.systems_skipped;
        self.systems_failed += other.systems_failed;
        self.discoveries_found += other.discoveries_found;
        self.discoveries_imported += other.discoveries_imported;
        self.discoveries_skipped += other.discoveries_skipped;
        self.discoveries_failed += other.discoveries_failed;
        self.errors.extend(other.errors);
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Import summary");
        let _ = writeln!(
            out,
            "  files:       {} processed, {} failed",
            self.files_processed, self.files_failed
        );
        let _ = writeln!(
            out,
            "  systems:     {} found, {} imported, {} updated, {} skipped, {} failed",
            self.systems_found,
            self.systems_imported,
            self.systems_updated,
            self.systems_skipped,
            self.systems_failed
        );
        let _ = writeln!(
            out,
            "  discoveries: {} found, {} imported, {} skipped, {} failed",
            self.discoveries_found,
            self.discoveries_imported,
            self.discoveries_skipped,
            self.discoveries_failed
        );
        let _ = writeln!(
            out,
            "  status:      {}",
            if self.success() { "OK" } else { "COMPLETED WITH ERRORS" }
        );
        if !self.errors.is_empty() {
            let _ = writeln!(out, "\nerrors ({}):", self.errors.len());
            for error in &self.errors {
                let _ = writeln!(out, "  - {error}");
            }
        }
        out
    }
}

/// Import setup or file-level failure.
#[derive(Debug)]
pub enum ImportError {
    /// Import path does not exist.
    SourceMissing(PathBuf),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// Parsed JSON matches neither export shape.
    UnrecognizedFormat(PathBuf),
    Repo(RepoError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceMissing(path) => write!(f, "import source not found: {}", path.display()),
            Self::Io { path, source } => write!(f, "failed to read `{}`: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "invalid JSON in `{}`: {source}", path.display())
            }
            Self::UnrecognizedFormat(path) => {
                write!(f, "unrecognized export format in `{}`", path.display())
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
            Self::SourceMissing(_) | Self::UnrecognizedFormat(_) => None,
        }
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}
