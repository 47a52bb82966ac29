//! Dual-format persistence engine for a star-system catalogue.
//!
//! Systems (with planets, moons and an optional space station) live in a
//! flat JSON file and in a SQLite database. Both stores implement
//! [`SystemRepository`]; the synchronizer, importer and migrator keep them
//! aligned.

pub mod config;
pub mod db;
pub mod import;
pub mod lock;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod report;
pub mod repo;
pub mod sync;

pub use config::{BackendKind, ConfigError, EngineConfig, ImportRetryConfig, LockConfig};
pub use import::{ImportError, ImportOptions, ImportStats, Importer};
pub use lock::{FileLock, LockError, LockGuard};
pub use logging::{default_log_level, init_logging, logging_status};
pub use migrate::{MigrationError, MigrationOptions, MigrationStats, Migrator};
pub use model::arena::EntityArena;
pub use model::discovery::Discovery;
pub use model::system::{Moon, Planet, SpaceStation, System, SystemId, SystemPatch};
pub use model::validate::{validate_system, ValidationError};
pub use repo::factory::{choose_backend, open_repository};
pub use repo::flat_file::FlatFileRepository;
pub use repo::sqlite::SqliteSystemRepository;
pub use repo::{
    DiscoveryRepository, DuplicateKey, Page, RepoError, RepoResult, SystemRepository,
};
pub use sync::{SyncOutcome, SyncReport, Synchronizer};
