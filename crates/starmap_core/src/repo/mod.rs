//! Storage contract shared by the flat-file and relational stores.
//!
//! # Responsibility
//! - Define the operation set every system store implements.
//! - Define the error taxonomy surfaced by store operations.
//! - Select a concrete store through an explicit factory.
//!
//! # Invariants
//! - Write paths call `validate_system` before any mutation.
//! - Both stores expose identical observable semantics; only cost differs.
//! - Lookups by key try the id first and fall back to the name.

use crate::config::BackendKind;
use crate::db::DbError;
use crate::lock::LockError;
use crate::model::discovery::{Discovery, StoredDiscovery};
use crate::model::system::{System, SystemId, SystemPatch};
use crate::model::validate::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod factory;
pub mod flat_file;
pub mod sqlite;

/// Upper bound for `per_page` in paginated listings.
pub const MAX_PER_PAGE: u32 = 500;

pub type RepoResult<T> = Result<T, RepoError>;

/// Which unique key collided on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateKey {
    Name(String),
    Id(SystemId),
}

impl Display for DuplicateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "name `{name}`"),
            Self::Id(id) => write!(f, "id `{id}`"),
        }
    }
}

/// Store error for system persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    /// Update/delete target is absent.
    NotFound(String),
    Duplicate(DuplicateKey),
    /// Flat-file write lock could not be acquired.
    Lock(LockError),
    /// Backend constraint violation not covered by other variants.
    Integrity(String),
    Db(DbError),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidData(String),
}

impl RepoError {
    /// Returns whether the relational store reported a busy/locked database.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_busy())
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(key) => write!(f, "system not found: {key}"),
            Self::Duplicate(key) => write!(f, "system with {key} already exists"),
            Self::Lock(err) => write!(f, "{err}"),
            Self::Integrity(message) => write!(f, "integrity violation: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "I/O error on `{}`: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "malformed data file `{}`: {source}", path.display())
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Lock(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::NotFound(_) | Self::Duplicate(_) | Self::Integrity(_) | Self::InvalidData(_) => {
                None
            }
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<LockError> for RepoError {
    fn from(value: LockError) -> Self {
        Self::Lock(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number actually served.
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, window: PageWindow, total: u64) -> Self {
        Self {
            items,
            page: window.page,
            per_page: window.per_page,
            total,
            total_pages: total_pages(total, window.per_page),
        }
    }
}

/// Normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageWindow {
    pub page: u32,
    pub per_page: u32,
}

impl PageWindow {
    /// Clamps `page` to at least 1 and `per_page` to `1..=MAX_PER_PAGE`.
    pub fn normalize(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

fn total_pages(total: u64, per_page: u32) -> u32 {
    let pages = total.div_ceil(u64::from(per_page.max(1)));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Store interface implemented by both backends.
pub trait SystemRepository {
    /// Backend identity, for diagnostics only.
    fn backend(&self) -> BackendKind;
    /// Lists systems, optionally restricted to one region, sorted by name.
    fn get_all(&self, region: Option<&str>) -> RepoResult<Vec<System>>;
    /// Lists one 1-based page of systems sorted by name.
    fn get_paginated(
        &self,
        page: u32,
        per_page: u32,
        region: Option<&str>,
    ) -> RepoResult<Page<System>>;
    /// Exact name match, falling back to a case-insensitive match.
    fn get_by_name(&self, name: &str) -> RepoResult<Option<System>>;
    /// Case-insensitive substring match over name, materials and attributes.
    fn search(&self, query: &str, limit: u32) -> RepoResult<Vec<System>>;
    /// Inserts a new system and returns its id.
    fn add(&self, system: &System) -> RepoResult<SystemId>;
    /// Merges `patch` into the system matching `key` (id, then name).
    fn update(&self, key: &str, patch: &SystemPatch) -> RepoResult<()>;
    /// Deletes the system matching `key` (id, then name) and its subtree.
    fn delete(&self, key: &str) -> RepoResult<()>;
    fn exists(&self, name: &str) -> RepoResult<bool>;
    /// Distinct non-empty regions, sorted.
    fn get_regions(&self) -> RepoResult<Vec<String>>;
    fn get_total_count(&self) -> RepoResult<u64>;
}

/// Sink for discovery log entries; only the relational store keeps them.
pub trait DiscoveryRepository {
    /// Stores one entry, linking it to a known system/planet by name when
    /// possible.
    fn record_discovery(&self, discovery: &Discovery) -> RepoResult<StoredDiscovery>;
}

/// Case folding shared by every backend for name lookups and search.
///
/// The relational store exposes the same rule to SQL as `starmap_fold`.
pub(crate) fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

/// Returns whether `haystack` contains `needle`, ignoring case.
///
/// `needle` must already be folded with [`fold_case`].
pub(crate) fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|value| fold_case(value).contains(needle))
}

#[cfg(test)]
mod tests {
    use super::{total_pages, PageWindow, MAX_PER_PAGE};

    #[test]
    fn page_window_clamps_inputs() {
        let window = PageWindow::normalize(0, 0);
        assert_eq!(window.page, 1);
        assert_eq!(window.per_page, 1);

        let window = PageWindow::normalize(3, 10_000);
        assert_eq!(window.per_page, MAX_PER_PAGE);
        assert_eq!(window.offset(), 2 * u64::from(MAX_PER_PAGE));
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }
}
