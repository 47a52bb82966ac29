//! Store selection.
//!
//! # Responsibility
//! - Resolve the configured [`BackendKind`] to a concrete store.
//! - Make the `auto` decision observable: every choice is logged with its
//!   reason.
//!
//! # Invariants
//! - `auto` picks the relational store only when the database file exists
//!   and the flat file is missing or holds at least `auto_threshold`
//!   records.
//! - Selection never creates or migrates files; the chosen store does that
//!   lazily on first use.

use crate::config::{BackendKind, EngineConfig};
use crate::repo::flat_file::FlatFileRepository;
use crate::repo::sqlite::SqliteSystemRepository;
use crate::repo::{RepoResult, SystemRepository};
use log::info;

/// Why a backend was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// The config named the backend explicitly.
    Configured,
    /// `auto`: database present and no flat file.
    FlatFileMissing,
    /// `auto`: database present and the flat file is at or over threshold.
    ThresholdReached { flat_count: u64 },
    /// `auto`: no database file yet.
    DatabaseMissing,
    /// `auto`: database present but the flat file is still small.
    BelowThreshold { flat_count: u64 },
}

impl SelectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::FlatFileMissing => "flat_file_missing",
            Self::ThresholdReached { .. } => "threshold_reached",
            Self::DatabaseMissing => "database_missing",
            Self::BelowThreshold { .. } => "below_threshold",
        }
    }
}

/// Resolved backend plus the reason it was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendChoice {
    pub backend: BackendKind,
    pub reason: SelectionReason,
}

/// Decides which concrete backend `config` selects.
///
/// Never returns [`BackendKind::Auto`].
pub fn choose_backend(config: &EngineConfig) -> RepoResult<BackendChoice> {
    let choice = match config.backend {
        BackendKind::Flat | BackendKind::Relational => BackendChoice {
            backend: config.backend,
            reason: SelectionReason::Configured,
        },
        BackendKind::Auto => choose_auto(config)?,
    };

    info!(
        "event=backend_select module=repo status=ok backend={} reason={} threshold={}",
        choice.backend.as_str(),
        choice.reason.as_str(),
        config.auto_threshold
    );
    Ok(choice)
}

fn choose_auto(config: &EngineConfig) -> RepoResult<BackendChoice> {
    if !config.database_path.exists() {
        return Ok(BackendChoice {
            backend: BackendKind::Flat,
            reason: SelectionReason::DatabaseMissing,
        });
    }
    if !config.flat_file_path.exists() {
        return Ok(BackendChoice {
            backend: BackendKind::Relational,
            reason: SelectionReason::FlatFileMissing,
        });
    }

    let flat_count = FlatFileRepository::from_config(config).get_total_count()?;
    Ok(if flat_count >= config.auto_threshold {
        BackendChoice {
            backend: BackendKind::Relational,
            reason: SelectionReason::ThresholdReached { flat_count },
        }
    } else {
        BackendChoice {
            backend: BackendKind::Flat,
            reason: SelectionReason::BelowThreshold { flat_count },
        }
    })
}

/// Opens the store selected by `config`.
pub fn open_repository(config: &EngineConfig) -> RepoResult<Box<dyn SystemRepository>> {
    let choice = choose_backend(config)?;
    Ok(match choice.backend {
        BackendKind::Relational => Box::new(SqliteSystemRepository::from_config(config)),
        BackendKind::Flat | BackendKind::Auto => Box::new(FlatFileRepository::from_config(config)),
    })
}

#[cfg(test)]
mod tests {
    use super::{choose_backend, SelectionReason};
    use crate::config::{BackendKind, EngineConfig};

    #[test]
    fn auto_prefers_flat_without_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::with_data_dir(dir.path());

        let choice = choose_backend(&config).unwrap();
        assert_eq!(choice.backend, BackendKind::Flat);
        assert_eq!(choice.reason, SelectionReason::DatabaseMissing);
    }

    #[test]
    fn auto_uses_database_when_flat_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::with_data_dir(dir.path());
        std::fs::write(&config.database_path, b"").unwrap();

        let choice = choose_backend(&config).unwrap();
        assert_eq!(choice.backend, BackendKind::Relational);
        assert_eq!(choice.reason, SelectionReason::FlatFileMissing);
    }

    #[test]
    fn explicit_backend_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::with_data_dir(dir.path());
        config.backend = BackendKind::Relational;

        let choice = choose_backend(&config).unwrap();
        assert_eq!(choice.backend, BackendKind::Relational);
        assert_eq!(choice.reason, SelectionReason::Configured);
    }
}
