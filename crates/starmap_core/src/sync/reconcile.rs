//! Directional reconciliation between the flat file and the database.
//!
//! # Responsibility
//! - Detect drift (`check`) and copy systems in either direction.
//! - Isolate per-system failures; one bad record never aborts a run.
//! - Record the last successful sync in database metadata.
//!
//! # Invariants
//! - Writes go through the store contract only; validation stays with the
//!   stores.
//! - `relational_to_flat` rebuilds the flat file wholesale from the
//!   database's composed systems.

use crate::config::EngineConfig;
use crate::model::arena::EntityArena;
use crate::model::system::{System, SystemPatch};
use crate::model::validate::validate_system;
use crate::repo::flat_file::FlatFileRepository;
use crate::repo::sqlite::SqliteSystemRepository;
use crate::repo::{RepoResult, SystemRepository};
use crate::sync::diff::{compare, SyncReport};
use log::{info, warn};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Metadata key holding the direction of the last successful sync.
pub const LAST_SYNC_DIRECTION_KEY: &str = "last_sync_direction";
/// Metadata key holding the RFC 3339 time of the last successful sync.
pub const LAST_SYNC_AT_KEY: &str = "last_sync_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    FlatToRelational,
    RelationalToFlat,
}

impl SyncDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FlatToRelational => "flat_to_relational",
            Self::RelationalToFlat => "relational_to_flat",
        }
    }
}

/// Counts from one directional sync.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub direction: SyncDirection,
    pub synced: usize,
    pub skipped: usize,
    /// `"<system>: <error>"` per failed system.
    pub errors: Vec<String>,
    /// Flat-file backup written before a rebuild.
    pub backup_path: Option<PathBuf>,
}

impl SyncOutcome {
    fn new(direction: SyncDirection) -> Self {
        Self {
            direction,
            synced: 0,
            skipped: 0,
            errors: Vec::new(),
            backup_path: None,
        }
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Sync {}", self.direction.as_str());
        let _ = writeln!(out, "  synced:  {}", self.synced);
        let _ = writeln!(out, "  skipped: {}", self.skipped);
        let _ = writeln!(out, "  errors:  {}", self.errors.len());
        if let Some(path) = &self.backup_path {
            let _ = writeln!(out, "  backup:  {}", path.display());
        }
        for error in &self.errors {
            let _ = writeln!(out, "  - {error}");
        }
        out
    }
}

/// Keeps the flat file and the database aligned.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    flat: FlatFileRepository,
    relational: SqliteSystemRepository,
}

impl Synchronizer {
    pub fn new(flat: FlatFileRepository, relational: SqliteSystemRepository) -> Self {
        Self { flat, relational }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            FlatFileRepository::from_config(config),
            SqliteSystemRepository::from_config(config),
        )
    }

    /// Loads both stores and reports drift without mutating anything.
    pub fn check(&self) -> RepoResult<SyncReport> {
        let flat = load_arena(&self.flat, "flat")?;
        let relational = load_arena(&self.relational, "relational")?;
        let report = compare(&flat, &relational);

        info!(
            "event=sync_check module=sync status=ok in_sync={} flat_count={} relational_count={} only_in_flat={} only_in_relational={} differences={}",
            report.in_sync(),
            report.flat_count,
            report.relational_count,
            report.only_in_flat_total,
            report.only_in_relational_total,
            report.differences.len()
        );
        Ok(report)
    }

    /// Copies flat-file systems into the database.
    ///
    /// Missing systems are inserted. Existing ones (matched by id, then
    /// name) are replaced when `overwrite` is set and skipped otherwise.
    pub fn flat_to_relational(&self, overwrite: bool) -> RepoResult<SyncOutcome> {
        let direction = SyncDirection::FlatToRelational;
        let flat = load_arena(&self.flat, "flat")?;
        let relational = load_arena(&self.relational, "relational")?;
        let mut outcome = SyncOutcome::new(direction);

        for index in flat.indices_by_name() {
            let system = flat.compose(index);
            let existing = system
                .id
                .as_deref()
                .and_then(|id| relational.find_by_id(id))
                .or_else(|| relational.find_by_name(&system.name))
                .map(|rel_index| relational.system(rel_index));

            let result = match existing {
                Some(_) if !overwrite => {
                    outcome.skipped += 1;
                    continue;
                }
                Some(current) => {
                    let key = current.id.clone().unwrap_or_else(|| current.name.clone());
                    self.relational
                        .update(&key, &SystemPatch::replace_with(&system))
                }
                None => self.relational.add(&system).map(|_| ()),
            };

            match result {
                Ok(()) => outcome.synced += 1,
                Err(err) => {
                    warn!(
                        "event=sync_system module=sync status=error direction={} name={} error={}",
                        direction.as_str(),
                        system.name,
                        err
                    );
                    outcome.errors.push(format!("{}: {err}", system.name));
                }
            }
        }

        self.finish(&outcome);
        Ok(outcome)
    }

    /// Rebuilds the flat file from the database.
    ///
    /// With `backup`, the current flat file is first copied to a timestamped
    /// sibling. Systems that fail validation are left out and reported.
    pub fn relational_to_flat(&self, backup: bool) -> RepoResult<SyncOutcome> {
        let direction = SyncDirection::RelationalToFlat;
        let mut outcome = SyncOutcome::new(direction);
        if backup {
            outcome.backup_path = self.flat.backup()?;
        }

        let mut accepted: Vec<System> = Vec::new();
        for system in self.relational.get_all(None)? {
            match validate_system(&system) {
                Ok(()) => accepted.push(system),
                Err(err) => {
                    warn!(
                        "event=sync_system module=sync status=error direction={} name={} error={}",
                        direction.as_str(),
                        system.name,
                        err
                    );
                    outcome.errors.push(format!("{}: {err}", system.name));
                }
            }
        }

        outcome.synced = self.flat.replace_all(accepted)?;
        self.finish(&outcome);
        Ok(outcome)
    }

    fn finish(&self, outcome: &SyncOutcome) {
        info!(
            "event=sync_run module=sync status={} direction={} synced={} skipped={} errors={}",
            if outcome.success() { "ok" } else { "error" },
            outcome.direction.as_str(),
            outcome.synced,
            outcome.skipped,
            outcome.errors.len()
        );
        if !outcome.success() {
            return;
        }

        let recorded = self
            .relational
            .set_metadata(LAST_SYNC_DIRECTION_KEY, outcome.direction.as_str())
            .and_then(|()| {
                self.relational
                    .set_metadata(LAST_SYNC_AT_KEY, &chrono::Utc::now().to_rfc3339())
            });
        if let Err(err) = recorded {
            warn!("event=sync_metadata module=sync status=error error={err}");
        }
    }
}

fn load_arena(store: &dyn SystemRepository, side: &str) -> RepoResult<EntityArena> {
    let (arena, rejected) = EntityArena::from_systems(store.get_all(None)?);
    for system in rejected {
        warn!(
            "event=sync_load module=sync status=error side={} name={} error_code=duplicate_name",
            side, system.name
        );
    }
    Ok(arena)
}
