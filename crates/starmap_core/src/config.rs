//! Engine configuration.
//!
//! # Responsibility
//! - Describe where both stores live and how they are selected.
//! - Carry lock and import retry tuning.
//!
//! # Invariants
//! - A config is built once (defaults, optional TOML file, caller
//!   overrides) and then only shared by reference; components never mutate
//!   it.
//! - Relative paths inside a TOML file resolve against that file's
//!   directory.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_FLAT_FILE: &str = "data/data.json";
const DEFAULT_DATABASE: &str = "data/starmap.db";
const DEFAULT_LOGS_DIR: &str = "logs";
const DEFAULT_AUTO_THRESHOLD: u64 = 1_000;

/// Which backend the repository factory should open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Decide from file presence and record count.
    #[default]
    Auto,
    /// Single JSON file store.
    #[serde(alias = "json")]
    Flat,
    /// SQLite store.
    #[serde(alias = "sqlite", alias = "database")]
    Relational,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Flat => "flat",
            Self::Relational => "relational",
        }
    }
}

/// File lock tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Give up acquiring after this many milliseconds.
    pub timeout_ms: u64,
    /// Delay between acquisition attempts.
    pub poll_interval_ms: u64,
    /// Sidecar files older than this are treated as abandoned.
    pub stale_after_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            poll_interval_ms: 100,
            stale_after_secs: 300,
        }
    }
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

/// Importer retry policy for busy/locked relational writes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportRetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for ImportRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
        }
    }
}

/// Immutable engine configuration shared by every component.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub flat_file_path: PathBuf,
    pub database_path: PathBuf,
    pub backend: BackendKind,
    /// Flat-file record count at which `auto` prefers the relational store.
    pub auto_threshold: u64,
    /// Destination for rolling logs and batch reports.
    pub logs_dir: PathBuf,
    pub lock: LockConfig,
    pub import: ImportRetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flat_file_path: PathBuf::from(DEFAULT_FLAT_FILE),
            database_path: PathBuf::from(DEFAULT_DATABASE),
            backend: BackendKind::Auto,
            auto_threshold: DEFAULT_AUTO_THRESHOLD,
            logs_dir: PathBuf::from(DEFAULT_LOGS_DIR),
            lock: LockConfig::default(),
            import: ImportRetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a config with both stores under `data_dir`.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            flat_file_path: data_dir.join("data.json"),
            database_path: data_dir.join("starmap.db"),
            logs_dir: data_dir.join(DEFAULT_LOGS_DIR),
            ..Self::default()
        }
    }

    /// Parses TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::Parse)
    }

    /// Loads a TOML file and resolves relative paths against its directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Loads from `path` when given, otherwise returns defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [
            &mut self.flat_file_path,
            &mut self.database_path,
            &mut self.logs_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Configuration load failure.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendKind, EngineConfig};
    use std::path::PathBuf;

    #[test]
    fn toml_overrides_only_listed_keys() {
        let config = EngineConfig::from_toml_str(
            r#"
            backend = "sqlite"
            auto_threshold = 50

            [lock]
            timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, BackendKind::Relational);
        assert_eq!(config.auto_threshold, 50);
        assert_eq!(config.lock.timeout_ms, 250);
        assert_eq!(config.lock.poll_interval_ms, 100);
        assert_eq!(config.import.max_attempts, 5);
        assert_eq!(config.flat_file_path, PathBuf::from("data/data.json"));
    }

    #[test]
    fn from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("starmap.toml");
        std::fs::write(
            &path,
            "flat_file_path = \"maps/galaxy.json\"\ndatabase_path = \"/abs/galaxy.db\"\n",
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.flat_file_path, dir.path().join("maps/galaxy.json"));
        assert_eq!(config.database_path, PathBuf::from("/abs/galaxy.db"));
    }

    #[test]
    fn backend_aliases_and_unknown_names() {
        let config = EngineConfig::from_toml_str("backend = \"json\"").unwrap();
        assert_eq!(config.backend, BackendKind::Flat);
        assert!(EngineConfig::from_toml_str("backend = \"cloud\"").is_err());
    }
}
