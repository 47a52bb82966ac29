//! One-shot migration of a flat file into a fresh database.
//!
//! # Responsibility
//! - Validate inputs, back up and recreate the target, copy every system,
//!   then optionally verify the result.
//! - Report each step and every per-system failure.
//!
//! # Invariants
//! - An existing target is only replaced with `force`.
//! - The target is deleted together with its `-wal`/`-shm` companions
//!   before recreation.
//! - Per-system failures are recorded, never raised; they make the run
//!   unsuccessful.

use crate::config::{EngineConfig, LockConfig};
use crate::model::system::System;
use crate::repo::flat_file::FlatFileRepository;
use crate::repo::sqlite::SqliteSystemRepository;
use crate::repo::{RepoError, SystemRepository};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter, Write as _};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Maximum number of sample names looked up during verification.
pub const VERIFY_SAMPLE_SIZE: usize = 5;

/// Metadata key recording the migration source path.
pub const MIGRATED_FROM_KEY: &str = "migrated_from";
/// Metadata key recording the migration time.
pub const MIGRATED_AT_KEY: &str = "migrated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Back up an existing target before replacing it.
    pub backup: bool,
    /// Compare counts and sample names after copying.
    pub verify: bool,
    /// Replace an existing target.
    pub force: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            backup: true,
            verify: false,
            force: false,
        }
    }
}

/// Post-migration comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    pub source_count: u64,
    pub target_count: u64,
    pub samples_checked: usize,
    pub samples_missing: Vec<String>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.source_count == self.target_count && self.samples_missing.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStats {
    pub source: PathBuf,
    pub target: PathBuf,
    pub backup_path: Option<PathBuf>,
    pub systems_found: usize,
    pub systems_migrated: usize,
    pub systems_failed: usize,
    pub errors: Vec<String>,
    pub verification: Option<Verification>,
    pub duration: Duration,
}

impl MigrationStats {
    fn new(source: &Path, target: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            backup_path: None,
            systems_found: 0,
            systems_migrated: 0,
            systems_failed: 0,
            errors: Vec::new(),
            verification: None,
            duration: Duration::ZERO,
        }
    }

    pub fn success(&self) -> bool {
        self.systems_failed == 0
            && self
                .verification
                .as_ref()
                .map_or(true, Verification::passed)
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Migration");
        let _ = writeln!(out, "  source:   {}", self.source.display());
        let _ = writeln!(out, "  target:   {}", self.target.display());
        if let Some(path) = &self.backup_path {
            let _ = writeln!(out, "  backup:   {}", path.display());
        }
        let _ = writeln!(
            out,
            "  systems:  {} found, {} migrated, {} failed",
            self.systems_found, self.systems_migrated, self.systems_failed
        );
        let _ = writeln!(out, "  duration: {} ms", self.duration.as_millis());
        if let Some(verification) = &self.verification {
            let _ = writeln!(
                out,
                "  verify:   {} (source {} / target {}, {} samples, {} missing)",
                if verification.passed() { "PASSED" } else { "FAILED" },
                verification.source_count,
                verification.target_count,
                verification.samples_checked,
                verification.samples_missing.len()
            );
            for name in &verification.samples_missing {
                let _ = writeln!(out, "    missing sample: {name}");
            }
        }
        let _ = writeln!(
            out,
            "  status:   {}",
            if self.success() { "OK" } else { "FAILED" }
        );
        for error in &self.errors {
            let _ = writeln!(out, "  - {error}");
        }
        out
    }
}

/// Setup failure that aborts a migration.
#[derive(Debug)]
pub enum MigrationError {
    SourceMissing(PathBuf),
    /// Target exists and `force` was not given.
    TargetExists(PathBuf),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Repo(RepoError),
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceMissing(path) => {
                write!(f, "migration source not found: {}", path.display())
            }
            Self::TargetExists(path) => write!(
                f,
                "migration target already exists: {} (use force to replace it)",
                path.display()
            ),
            Self::Io { path, source } => write!(f, "I/O error on `{}`: {source}", path.display()),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MigrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
            Self::SourceMissing(_) | Self::TargetExists(_) => None,
        }
    }
}

impl From<RepoError> for MigrationError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Copies a flat file into a newly created database.
#[derive(Debug, Clone)]
pub struct Migrator {
    source: PathBuf,
    target: PathBuf,
    options: MigrationOptions,
    lock: LockConfig,
}

impl Migrator {
    pub fn new(
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            options,
            lock: LockConfig::default(),
        }
    }

    /// Migrates the configured flat file into the configured database.
    pub fn from_config(config: &EngineConfig, options: MigrationOptions) -> Self {
        Self::new(
            config.flat_file_path.clone(),
            config.database_path.clone(),
            options,
        )
        .with_lock_config(config.lock.clone())
    }

    /// Lock timings used while reading the source file.
    pub fn with_lock_config(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    /// Runs every step in order.
    ///
    /// # Errors
    /// Setup failures (missing source, existing target without `force`,
    /// backup or recreation failures) abort the run. Per-system failures are
    /// reported through [`MigrationStats`].
    pub fn run(&self) -> Result<MigrationStats, MigrationError> {
        let started_at = Instant::now();
        let mut stats = MigrationStats::new(&self.source, &self.target);

        let systems = self.validate_inputs()?;
        stats.systems_found = systems.len();
        log_step("validate", &format!("systems={}", systems.len()));

        if self.target.exists() && self.options.backup {
            stats.backup_path = Some(self.backup_target()?);
        }

        let store = self.recreate_target()?;
        log_step("recreate", &format!("target={}", self.target.display()));

        for system in &systems {
            match store.add(system) {
                Ok(_) => stats.systems_migrated += 1,
                Err(err) => {
                    warn!(
                        "event=migrate_system module=migrate status=error name={} error={}",
                        system.name, err
                    );
                    stats.systems_failed += 1;
                    stats.errors.push(format!("{}: {err}", system.name));
                }
            }
        }
        log_step(
            "copy",
            &format!(
                "migrated={} failed={}",
                stats.systems_migrated, stats.systems_failed
            ),
        );

        store.set_metadata(MIGRATED_FROM_KEY, &self.source.display().to_string())?;
        store.set_metadata(MIGRATED_AT_KEY, &chrono::Utc::now().to_rfc3339())?;

        if self.options.verify {
            let verification = verify(&store, &systems)?;
            log_step(
                "verify",
                &format!(
                    "passed={} source_count={} target_count={}",
                    verification.passed(),
                    verification.source_count,
                    verification.target_count
                ),
            );
            stats.verification = Some(verification);
        }

        stats.duration = started_at.elapsed();
        if stats.success() {
            info!(
                "event=migrate_run module=migrate status=ok migrated={} duration_ms={}",
                stats.systems_migrated,
                stats.duration.as_millis()
            );
        } else {
            error!(
                "event=migrate_run module=migrate status=error migrated={} failed={} duration_ms={}",
                stats.systems_migrated,
                stats.systems_failed,
                stats.duration.as_millis()
            );
        }
        Ok(stats)
    }

    fn validate_inputs(&self) -> Result<Vec<System>, MigrationError> {
        if !self.source.is_file() {
            return Err(MigrationError::SourceMissing(self.source.clone()));
        }
        if self.target.exists() && !self.options.force {
            return Err(MigrationError::TargetExists(self.target.clone()));
        }
        Ok(FlatFileRepository::new(self.source.clone(), &self.lock).load_systems()?)
    }

    /// Copies the existing target with SQLite's online backup.
    fn backup_target(&self) -> Result<PathBuf, MigrationError> {
        let stem = self
            .target
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "starmap".to_string());
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let backup_path = self
            .target
            .with_file_name(format!("{stem}_backup_{stamp}.db"));

        SqliteSystemRepository::new(self.target.clone()).backup_to(&backup_path)?;
        log_step("backup", &format!("path={}", backup_path.display()));
        Ok(backup_path)
    }

    fn recreate_target(&self) -> Result<SqliteSystemRepository, MigrationError> {
        for suffix in ["", "-wal", "-shm"] {
            let mut path = self.target.clone().into_os_string();
            path.push(suffix);
            let path = PathBuf::from(path);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(MigrationError::Io { path, source }),
            }
        }
        Ok(SqliteSystemRepository::open(self.target.clone())?)
    }
}

/// Compares counts and looks up evenly spaced sample names.
fn verify(store: &SqliteSystemRepository, systems: &[System]) -> Result<Verification, RepoError> {
    let mut verification = Verification {
        source_count: systems.len() as u64,
        target_count: store.get_total_count()?,
        ..Verification::default()
    };

    for index in sample_indices(systems.len(), VERIFY_SAMPLE_SIZE) {
        let name = &systems[index].name;
        verification.samples_checked += 1;
        if store.get_by_name(name)?.is_none() {
            verification.samples_missing.push(name.clone());
        }
    }
    Ok(verification)
}

/// Returns up to `count` distinct, evenly spaced indices into `0..len`.
fn sample_indices(len: usize, count: usize) -> Vec<usize> {
    let count = count.min(len);
    let mut indices: Vec<usize> = (0..count).map(|slot| slot * len / count).collect();
    indices.dedup();
    indices
}

fn log_step(step: &str, detail: &str) {
    info!("event=migrate_step module=migrate status=ok step={step} {detail}");
}

#[cfg(test)]
mod tests {
    use super::sample_indices;

    #[test]
    fn sample_indices_are_spread_and_bounded() {
        assert_eq!(sample_indices(0, 5), Vec::<usize>::new());
        assert_eq!(sample_indices(3, 5), vec![0, 1, 2]);
        assert_eq!(sample_indices(100, 5), vec![0, 20, 40, 60, 80]);
    }
}
