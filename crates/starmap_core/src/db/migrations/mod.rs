//! Versioned schema for the relational star-map store.
//!
//! # Schema
//! - `0001_init`: `systems` (text UUID key, unique `name`), `planets` and
//!   `moons` chained by `ON DELETE CASCADE`, at most one `space_stations`
//!   row per system, and the `_metadata` key/value table. Indexes cover
//!   region, coordinates and every parent foreign key.
//! - `0002_discoveries`: `discoveries`, linked to a system or planet by
//!   `ON DELETE SET NULL` so removing a system keeps the discovery text.
//!
//! # Invariants
//! - Versions are applied in ascending order inside one transaction; a
//!   failure leaves the previous version in place.
//! - The applied version is mirrored to `PRAGMA user_version` and to the
//!   `schema_version` key of `_metadata`.
//! - A database whose `user_version` is newer than [`latest_version`] is
//!   refused rather than downgraded.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("0002_discoveries.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.execute(
        "INSERT INTO _metadata (key, value, updated_at)
         VALUES ('schema_version', ?1, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at;",
        [latest.to_string()],
    )?;
    tx.commit()?;

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
