use crate::config::{BackendKind, EngineConfig, ImportRetryConfig};
use crate::import::discovery::normalize_discovery;
use crate::import::records::{detect_shape, normalize_system, SourceShape};
use crate::import::retry::retry_on_busy;
use crate::import::{ImportError, ImportOptions, ImportStats};
use crate::model::system::{System, SystemId, SystemPatch};
use crate::model::validate::validate_system;
use crate::repo::factory::open_repository;
use crate::repo::sqlite::SqliteSystemRepository;
use crate::repo::{DiscoveryRepository, DuplicateKey, RepoError, RepoResult, SystemRepository};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Writes export files into one store.
pub struct Importer {
    store: Box<dyn SystemRepository>,
    discoveries: Option<Box<dyn DiscoveryRepository>>,
    options: ImportOptions,
    retry: ImportRetryConfig,
}

impl Importer {
    /// Creates an importer without a discovery sink; discovery entries will
    /// be counted as failed.
    pub fn new(
        store: Box<dyn SystemRepository>,
        options: ImportOptions,
        retry: ImportRetryConfig,
    ) -> Self {
        Self {
            store,
            discoveries: None,
            options,
            retry,
        }
    }

    pub fn with_discoveries(mut self, sink: Box<dyn DiscoveryRepository>) -> Self {
        self.discoveries = Some(sink);
        self
    }

    /// Opens the store the config selects. The relational store doubles as
    /// the discovery sink.
    pub fn from_config(config: &EngineConfig, options: ImportOptions) -> RepoResult<Self> {
        let store = open_repository(config)?;
        let relational = store.backend() == BackendKind::Relational;
        let importer = Self::new(store, options, config.import.clone());
        Ok(if relational {
            importer.with_discoveries(Box::new(SqliteSystemRepository::from_config(config)))
        } else {
            importer
        })
    }

    pub fn store(&self) -> &dyn SystemRepository {
        self.store.as_ref()
    }

    /// Imports a single file, or every `*.json` file when `path` is a
    /// directory.
    pub fn import_path(&self, path: &Path) -> Result<ImportStats, ImportError> {
        if path.is_dir() {
            self.import_directory(path)
        } else {
            self.import_file(path)
        }
    }

    /// Imports one file. File-level problems are returned as errors.
    pub fn import_file(&self, path: &Path) -> Result<ImportStats, ImportError> {
        if !path.exists() {
            return Err(ImportError::SourceMissing(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let root: Value = serde_json::from_str(&text).map_err(|source| ImportError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut stats = ImportStats::default();
        self.import_value(root, path, &mut stats)?;
        stats.files_processed += 1;

        info!(
            "event=import_file module=import status=ok path={} backend={} found={} imported={} updated={} skipped={} failed={} discoveries={}",
            path.display(),
            self.store.backend().as_str(),
            stats.systems_found,
            stats.systems_imported,
            stats.systems_updated,
            stats.systems_skipped,
            stats.systems_failed,
            stats.discoveries_imported
        );
        Ok(stats)
    }

    /// Imports every `*.json` file in `dir`, in name order. A failing file
    /// is counted and the batch continues.
    pub fn import_directory(&self, dir: &Path) -> Result<ImportStats, ImportError> {
        if !dir.exists() {
            return Err(ImportError::SourceMissing(dir.to_path_buf()));
        }
        let entries = std::fs::read_dir(dir).map_err(|source| ImportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect();
        files.sort();

        let mut stats = ImportStats::default();
        for file in &files {
            match self.import_file(file) {
                Ok(file_stats) => stats.merge(file_stats),
                Err(err) => {
                    error!(
                        "event=import_file module=import status=error path={} error={}",
                        file.display(),
                        err
                    );
                    stats.files_failed += 1;
                    stats.errors.push(format!("{}: {err}", file.display()));
                }
            }
        }

        info!(
            "event=import_batch module=import status={} dir={} files={} failed_files={}",
            if stats.success() { "ok" } else { "error" },
            dir.display(),
            files.len(),
            stats.files_failed
        );
        Ok(stats)
    }

    /// Imports an already parsed document. `source` labels error messages.
    pub fn import_value(
        &self,
        root: Value,
        source: &Path,
        stats: &mut ImportStats,
    ) -> Result<(), ImportError> {
        let label = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());

        match detect_shape(root) {
            Some(SourceShape::Standard(records)) => {
                debug!(
                    "event=import_shape module=import shape=standard records={} source={}",
                    records.len(),
                    label
                );
                for (key, record) in records {
                    self.import_record(key.as_deref(), record, &label, stats);
                }
            }
            Some(SourceShape::DiscoveryLog(entries)) => {
                debug!(
                    "event=import_shape module=import shape=discovery_log entries={} source={}",
                    entries.len(),
                    label
                );
                for entry in entries {
                    self.import_discovery(entry, &label, stats);
                }
            }
            None => return Err(ImportError::UnrecognizedFormat(source.to_path_buf())),
        }
        Ok(())
    }

    fn import_record(&self, key: Option<&str>, record: Value, label: &str, stats: &mut ImportStats) {
        stats.systems_found += 1;
        let display_name = key.unwrap_or("<unnamed>").to_string();

        let system = match normalize_system(key, record) {
            Ok(system) => system,
            Err(err) => {
                record_failure(stats, label, &display_name, &err);
                return;
            }
        };
        if self.options.validate {
            if let Err(err) = validate_system(&system) {
                record_failure(stats, label, &system.name, &err);
                return;
            }
        }

        let exists = retry_on_busy(&self.retry, "exists", || self.store.exists(&system.name));
        match exists {
            Ok(true) if !self.options.allow_updates => {
                debug!(
                    "event=import_system module=import status=skipped name={}",
                    system.name
                );
                stats.systems_skipped += 1;
            }
            Ok(true) => {
                let patch = SystemPatch::replace_with(&system);
                match retry_on_busy(&self.retry, "update", || {
                    self.store.update(&system.name, &patch)
                }) {
                    Ok(()) => stats.systems_updated += 1,
                    Err(err) => record_failure(stats, label, &system.name, &err),
                }
            }
            Ok(false) => match self.insert(&system) {
                Ok(_) => stats.systems_imported += 1,
                Err(RepoError::Duplicate(DuplicateKey::Name(_))) => stats.systems_skipped += 1,
                Err(err) => record_failure(stats, label, &system.name, &err),
            },
            Err(err) => record_failure(stats, label, &system.name, &err),
        }
    }

    /// Adds `system`; an explicit id that collides is dropped and the
    /// insert retried with a generated one.
    fn insert(&self, system: &System) -> RepoResult<SystemId> {
        match retry_on_busy(&self.retry, "add", || self.store.add(system)) {
            Err(RepoError::Duplicate(DuplicateKey::Id(id))) => {
                warn!(
                    "event=import_system module=import status=retry error_code=id_collision name={} id={}",
                    system.name, id
                );
                let mut fresh = system.clone();
                fresh.id = None;
                retry_on_busy(&self.retry, "add", || self.store.add(&fresh))
            }
            result => result,
        }
    }

    fn import_discovery(&self, entry: Value, label: &str, stats: &mut ImportStats) {
        stats.discoveries_found += 1;

        let Some(discovery) = normalize_discovery(entry) else {
            stats.discoveries_failed += 1;
            stats
                .errors
                .push(format!("{label}: discovery entry is not a JSON object"));
            return;
        };
        if !discovery.has_identity() {
            warn!(
                "event=import_discovery module=import status=skipped reason=no_reference source={}",
                label
            );
            stats.discoveries_skipped += 1;
            return;
        }
        let name = discovery
            .discovery_name
            .clone()
            .or_else(|| discovery.system_name.clone())
            .unwrap_or_default();

        let Some(sink) = &self.discoveries else {
            stats.discoveries_failed += 1;
            stats.errors.push(format!(
                "{label}: {name}: discovery entries can only be stored in the relational store"
            ));
            return;
        };

        match retry_on_busy(&self.retry, "record_discovery", || {
            sink.record_discovery(&discovery)
        }) {
            Ok(stored) => {
                debug!(
                    "event=import_discovery module=import status=ok id={} system_resolved={} planet_resolved={}",
                    stored.id,
                    stored.system_id.is_some(),
                    stored.planet_id.is_some()
                );
                stats.discoveries_imported += 1;
            }
            Err(err) => {
                stats.discoveries_failed += 1;
                stats.errors.push(format!("{label}: {name}: {err}"));
            }
        }
    }
}

fn record_failure(
    stats: &mut ImportStats,
    label: &str,
    name: &str,
    err: &dyn std::error::Error,
) {
    warn!(
        "event=import_system module=import status=error source={} name={} error={}",
        label, name, err
    );
    stats.systems_failed += 1;
    stats.errors.push(format!("{label}: {name}: {err}"));
}
