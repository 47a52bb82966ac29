//! Single-file JSON system store.
//!
//! # Responsibility
//! - Hold the whole dataset as one JSON object keyed by system name.
//! - Keep the reserved `_meta` entry (format version, last-modified time).
//!
//! # Invariants
//! - Every mutation holds the file lock across reload, mutate and save.
//! - Saves are atomic: a temp file in the same directory replaces the
//!   target by rename.
//! - Unknown keys inside `_meta` survive a save; `last_modified` is
//!   refreshed on every save.
//! - A missing file is an empty dataset.

use crate::config::{BackendKind, EngineConfig, LockConfig};
use crate::lock::FileLock;
use crate::model::system::{System, SystemId, SystemPatch};
use crate::model::validate::validate_system;
use crate::repo::{
    contains_ignore_case, fold_case, DuplicateKey, Page, PageWindow, RepoError, RepoResult,
    SystemRepository,
};
use log::{debug, info};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Reserved top-level key holding file metadata.
pub const META_KEY: &str = "_meta";
/// Format version written into new files.
pub const FORMAT_VERSION: &str = "1.0";

/// In-memory image of the flat file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatDocument {
    /// Contents of the `_meta` entry.
    pub meta: Map<String, Value>,
    /// Systems keyed and ordered by name.
    pub systems: BTreeMap<String, System>,
}

impl FlatDocument {
    /// Finds the map key of the system matching `key` by id, then by name.
    fn locate(&self, key: &str) -> Option<String> {
        self.systems
            .values()
            .find(|system| system.id.as_deref() == Some(key))
            .map(|system| system.name.clone())
            .or_else(|| self.systems.contains_key(key).then(|| key.to_string()))
    }

    fn id_in_use(&self, id: &str) -> bool {
        self.systems
            .values()
            .any(|system| system.id.as_deref() == Some(id))
    }
}

/// Flat-file implementation of [`SystemRepository`].
#[derive(Debug, Clone)]
pub struct FlatFileRepository {
    path: PathBuf,
    lock: FileLock,
}

impl FlatFileRepository {
    pub fn new(path: impl Into<PathBuf>, lock_config: &LockConfig) -> Self {
        let path = path.into();
        let lock = FileLock::new(&path, lock_config);
        Self { path, lock }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.flat_file_path.clone(), &config.lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the whole file. A missing or blank file is an empty document.
    pub fn load(&self) -> RepoResult<FlatDocument> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(FlatDocument::default()),
            Err(source) => return Err(self.io_error(source)),
        };
        if text.trim().is_empty() {
            return Ok(FlatDocument::default());
        }

        let root: Value = serde_json::from_str(&text).map_err(|source| RepoError::Parse {
            path: self.path.clone(),
            source,
        })?;
        let Value::Object(entries) = root else {
            return Err(RepoError::InvalidData(format!(
                "`{}` must contain a JSON object at the top level",
                self.path.display()
            )));
        };

        let mut document = FlatDocument::default();
        for (key, value) in entries {
            if key == META_KEY {
                match value {
                    Value::Object(meta) => document.meta = meta,
                    _ => {
                        return Err(RepoError::InvalidData(format!(
                            "`{META_KEY}` entry in `{}` must be an object",
                            self.path.display()
                        )))
                    }
                }
                continue;
            }

            let system = parse_entry(&key, value).map_err(|source| RepoError::Parse {
                path: self.path.clone(),
                source,
            })?;
            if let Some(previous) = document.systems.insert(system.name.clone(), system) {
                return Err(RepoError::InvalidData(format!(
                    "duplicate system name `{}` in `{}`",
                    previous.name,
                    self.path.display()
                )));
            }
        }

        Ok(document)
    }

    /// Loads all systems in name order.
    pub fn load_systems(&self) -> RepoResult<Vec<System>> {
        Ok(self.load()?.systems.into_values().collect())
    }

    /// Writes `document` atomically, refreshing `_meta.last_modified`.
    ///
    /// The caller is responsible for holding the lock.
    pub fn save(&self, document: &mut FlatDocument) -> RepoResult<()> {
        document
            .meta
            .entry("version")
            .or_insert_with(|| Value::String(FORMAT_VERSION.to_string()));
        document.meta.insert(
            "last_modified".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );

        let mut root = Map::with_capacity(document.systems.len() + 1);
        root.insert(META_KEY.to_string(), Value::Object(document.meta.clone()));
        for (name, system) in &document.systems {
            let value = serde_json::to_value(system).map_err(|source| RepoError::Parse {
                path: self.path.clone(),
                source,
            })?;
            root.insert(name.clone(), value);
        }
        let body =
            serde_json::to_vec_pretty(&Value::Object(root)).map_err(|source| RepoError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|source| self.io_error(source))?;

        let mut temp =
            tempfile::NamedTempFile::new_in(&parent).map_err(|source| self.io_error(source))?;
        temp.write_all(&body)
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|source| self.io_error(source))?;
        temp.persist(&self.path)
            .map_err(|err| self.io_error(err.error))?;

        debug!(
            "event=flat_save module=flat_file status=ok path={} systems={}",
            self.path.display(),
            document.systems.len()
        );
        Ok(())
    }

    /// Replaces the whole dataset with `systems` under the lock.
    ///
    /// Returns the number of systems written. The existing `_meta` block is
    /// kept.
    pub fn replace_all(&self, systems: Vec<System>) -> RepoResult<usize> {
        self.mutate(|document| {
            document.systems = systems
                .into_iter()
                .map(|system| (system.name.clone(), system))
                .collect();
            Ok(document.systems.len())
        })
    }

    /// Copies the current file to a timestamped sibling.
    ///
    /// Returns `None` when there is no file to back up.
    pub fn backup(&self) -> RepoResult<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data".to_string());
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        let backup_path = self.path.with_file_name(format!("{stem}.backup_{stamp}.json"));
        std::fs::copy(&self.path, &backup_path).map_err(|source| self.io_error(source))?;
        info!(
            "event=flat_backup module=flat_file status=ok path={}",
            backup_path.display()
        );
        Ok(Some(backup_path))
    }

    /// Runs one locked reload-mutate-save cycle.
    fn mutate<T>(&self, change: impl FnOnce(&mut FlatDocument) -> RepoResult<T>) -> RepoResult<T> {
        let _guard = self.lock.acquire()?;
        let mut document = self.load()?;
        let result = change(&mut document)?;
        self.save(&mut document)?;
        Ok(result)
    }

    fn io_error(&self, source: std::io::Error) -> RepoError {
        RepoError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SystemRepository for FlatFileRepository {
    fn backend(&self) -> BackendKind {
        BackendKind::Flat
    }

    fn get_all(&self, region: Option<&str>) -> RepoResult<Vec<System>> {
        let document = self.load()?;
        Ok(document
            .systems
            .into_values()
            .filter(|system| region.map_or(true, |region| system.region == region))
            .collect())
    }

    fn get_paginated(
        &self,
        page: u32,
        per_page: u32,
        region: Option<&str>,
    ) -> RepoResult<Page<System>> {
        let window = PageWindow::normalize(page, per_page);
        let all = self.get_all(region)?;
        let total = all.len() as u64;
        let offset = usize::try_from(window.offset()).unwrap_or(usize::MAX);
        let items = all
            .into_iter()
            .skip(offset)
            .take(window.per_page as usize)
            .collect();
        Ok(Page::new(items, window, total))
    }

    fn get_by_name(&self, name: &str) -> RepoResult<Option<System>> {
        let mut document = self.load()?;
        if let Some(system) = document.systems.remove(name) {
            return Ok(Some(system));
        }
        let folded = fold_case(name);
        Ok(document
            .systems
            .into_values()
            .find(|system| fold_case(&system.name) == folded))
    }

    fn search(&self, query: &str, limit: u32) -> RepoResult<Vec<System>> {
        let needle = fold_case(query.trim());
        if needle.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let document = self.load()?;
        Ok(document
            .systems
            .into_values()
            .filter(|system| {
                fold_case(&system.name).contains(&needle)
                    || contains_ignore_case(system.materials.as_deref(), &needle)
                    || contains_ignore_case(system.attributes.as_deref(), &needle)
            })
            .take(limit as usize)
            .collect())
    }

    fn add(&self, system: &System) -> RepoResult<SystemId> {
        validate_system(system)?;

        let id = self.mutate(|document| {
            if document.systems.contains_key(&system.name) {
                return Err(RepoError::Duplicate(DuplicateKey::Name(system.name.clone())));
            }
            if let Some(id) = system.id.as_deref() {
                if document.id_in_use(id) {
                    return Err(RepoError::Duplicate(DuplicateKey::Id(id.to_string())));
                }
            }

            let mut stored = system.clone();
            let id = stored.id_or_generate();
            stored.id = Some(id.clone());
            document.systems.insert(stored.name.clone(), stored);
            Ok(id)
        })?;

        info!(
            "event=system_add module=flat_file status=ok id={} name={}",
            id, system.name
        );
        Ok(id)
    }

    fn update(&self, key: &str, patch: &SystemPatch) -> RepoResult<()> {
        self.mutate(|document| {
            let current_name = document
                .locate(key)
                .ok_or_else(|| RepoError::NotFound(key.to_string()))?;
            let mut updated = document.systems[&current_name].clone();
            updated.apply_patch(patch);
            validate_system(&updated)?;

            if updated.name != current_name && document.systems.contains_key(&updated.name) {
                return Err(RepoError::Duplicate(DuplicateKey::Name(updated.name.clone())));
            }

            document.systems.remove(&current_name);
            document.systems.insert(updated.name.clone(), updated);
            Ok(())
        })?;

        info!("event=system_update module=flat_file status=ok key={key}");
        Ok(())
    }

    fn delete(&self, key: &str) -> RepoResult<()> {
        self.mutate(|document| {
            let name = document
                .locate(key)
                .ok_or_else(|| RepoError::NotFound(key.to_string()))?;
            document.systems.remove(&name);
            Ok(())
        })?;

        info!("event=system_delete module=flat_file status=ok key={key}");
        Ok(())
    }

    fn exists(&self, name: &str) -> RepoResult<bool> {
        Ok(self.load()?.systems.contains_key(name))
    }

    fn get_regions(&self) -> RepoResult<Vec<String>> {
        let document = self.load()?;
        let regions: BTreeSet<String> = document
            .systems
            .into_values()
            .map(|system| system.region)
            .filter(|region| !region.is_empty())
            .collect();
        Ok(regions.into_iter().collect())
    }

    fn get_total_count(&self) -> RepoResult<u64> {
        Ok(self.load()?.systems.len() as u64)
    }
}

/// Parses one keyed entry, taking the name from the key when absent.
fn parse_entry(key: &str, mut value: Value) -> Result<System, serde_json::Error> {
    if let Value::Object(fields) = &mut value {
        let has_name = fields
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.trim().is_empty());
        if !has_name {
            fields.insert("name".to_string(), Value::String(key.to_string()));
        }
    }
    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::parse_entry;
    use serde_json::json;

    #[test]
    fn parse_entry_takes_name_from_key() {
        let system = parse_entry("Alpha", json!({"x": 1.0, "y": 2.0, "z": 3.0})).unwrap();
        assert_eq!(system.name, "Alpha");
        assert_eq!(system.region, "");
        assert!(system.planets.is_empty());
    }

    #[test]
    fn parse_entry_rejects_missing_coordinates() {
        assert!(parse_entry("Alpha", json!({"region": "R1"})).is_err());
    }
}
