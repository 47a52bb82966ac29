//! SQLite system store.
//!
//! # Responsibility
//! - Persist systems as normalized rows (`systems`, `planets`, `moons`,
//!   `space_stations`) and compose them back into nested records.
//! - Serve indexed queries: region listing, pagination, search, spatial
//!   radius lookups, statistics.
//! - Store discovery log entries imported from the second export shape.
//!
//! # Invariants
//! - One connection is opened per logical operation and closed afterwards.
//! - Composite writes run inside one IMMEDIATE transaction.
//! - Updates replace planets/moons/station wholesale (delete, reinsert).
//! - Deleting a system cascades to its planets, moons and station.

use crate::config::{BackendKind, EngineConfig};
use crate::db::{open_db, BUSY_TIMEOUT};
use crate::model::discovery::{Discovery, StoredDiscovery};
use crate::model::system::{Moon, Planet, SpaceStation, System, SystemId, SystemPatch};
use crate::model::validate::validate_system;
use crate::repo::{
    fold_case, DiscoveryRepository, DuplicateKey, Page, PageWindow, RepoError, RepoResult,
    SystemRepository,
};
use log::info;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, DatabaseName, ErrorCode, OpenFlags, OptionalExtension,
    Row, TransactionBehavior,
};
use std::path::{Path, PathBuf};

const SYSTEM_SELECT_SQL: &str = "SELECT
    id,
    name,
    x,
    y,
    z,
    region,
    fauna,
    flora,
    sentinel,
    materials,
    base_location,
    photo,
    attributes
FROM systems";

const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%SZ', 'now')";

/// Aggregate counts for the relational store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    pub systems: u64,
    pub planets: u64,
    pub moons: u64,
    pub stations: u64,
    pub regions: u64,
    /// Database file plus WAL size on disk.
    pub size_bytes: u64,
}

/// Lightweight system row without children, used by spatial queries.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSummary {
    pub id: SystemId,
    pub name: String,
    pub region: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Spatial query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbySystem {
    pub system: SystemSummary,
    /// Euclidean distance from the query center.
    pub distance: f64,
}

/// SQLite implementation of [`SystemRepository`].
#[derive(Debug, Clone)]
pub struct SqliteSystemRepository {
    path: PathBuf,
}

impl SqliteSystemRepository {
    /// Creates a store for `path` without touching the file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.database_path.clone())
    }

    /// Creates the store and makes sure the schema exists on disk.
    pub fn open(path: impl Into<PathBuf>) -> RepoResult<Self> {
        let repo = Self::new(path);
        if let Some(parent) = repo.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| RepoError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        drop(repo.connect()?);
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> RepoResult<Connection> {
        Ok(open_db(&self.path)?)
    }

    /// Loads one composed system by id.
    pub fn get_by_id(&self, id: &str) -> RepoResult<Option<System>> {
        let conn = self.connect()?;
        load_system_where(&conn, "id = ?1", id)
    }

    /// Returns aggregate entity counts and the on-disk size.
    pub fn get_statistics(&self) -> RepoResult<StoreStatistics> {
        let conn = self.connect()?;
        let count = |sql: &str| -> RepoResult<u64> {
            let value: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(u64::try_from(value).unwrap_or(0))
        };

        let mut size_bytes = file_len(&self.path);
        let mut wal_path = self.path.clone().into_os_string();
        wal_path.push("-wal");
        size_bytes += file_len(Path::new(&wal_path));

        Ok(StoreStatistics {
            systems: count("SELECT COUNT(*) FROM systems;")?,
            planets: count("SELECT COUNT(*) FROM planets;")?,
            moons: count("SELECT COUNT(*) FROM moons;")?,
            stations: count("SELECT COUNT(*) FROM space_stations;")?,
            regions: count("SELECT COUNT(DISTINCT region) FROM systems WHERE region <> '';")?,
            size_bytes,
        })
    }

    /// Returns systems within `radius` of `center`, nearest first.
    ///
    /// A bounding-box scan on the coordinate index narrows candidates before
    /// the exact distance filter, so callers can page through a large map by
    /// viewport without loading the whole dataset.
    pub fn find_within_radius(
        &self,
        center: [f64; 3],
        radius: f64,
        limit: usize,
    ) -> RepoResult<Vec<NearbySystem>> {
        if !radius.is_finite() || radius < 0.0 || limit == 0 {
            return Ok(Vec::new());
        }
        let [cx, cy, cz] = center;

        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, region, x, y, z
             FROM systems
             WHERE x BETWEEN ?1 AND ?2
               AND y BETWEEN ?3 AND ?4
               AND z BETWEEN ?5 AND ?6;",
        )?;
        let mut rows = stmt.query(params![
            cx - radius,
            cx + radius,
            cy - radius,
            cy + radius,
            cz - radius,
            cz + radius,
        ])?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next()? {
            let system = SystemSummary {
                id: row.get("id")?,
                name: row.get("name")?,
                region: row.get("region")?,
                x: row.get("x")?,
                y: row.get("y")?,
                z: row.get("z")?,
            };
            let distance =
                ((system.x - cx).powi(2) + (system.y - cy).powi(2) + (system.z - cz).powi(2))
                    .sqrt();
            if distance <= radius {
                hits.push(NearbySystem { system, distance });
            }
        }

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.system.name.cmp(&b.system.name))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    pub fn get_metadata(&self, key: &str) -> RepoResult<Option<String>> {
        let conn = self.connect()?;
        let value = conn
            .query_row(
                "SELECT value FROM _metadata WHERE key = ?1;",
                [key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> RepoResult<()> {
        let conn = self.connect()?;
        conn.execute(
            &format!(
                "INSERT INTO _metadata (key, value, updated_at)
                 VALUES (?1, ?2, {NOW_SQL})
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at;"
            ),
            params![key, value],
        )?;
        Ok(())
    }

    /// Copies the database to `destination` with SQLite's online backup.
    ///
    /// The source is opened read-only and is not migrated, so the copy keeps
    /// whatever schema and `user_version` the file had, including versions
    /// newer than this build supports.
    pub fn backup_to(&self, destination: &Path) -> RepoResult<()> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.backup(DatabaseName::Main, destination, None)?;
        info!(
            "event=db_backup module=sqlite status=ok source={} destination={}",
            self.path.display(),
            destination.display()
        );
        Ok(())
    }

    pub fn count_discoveries(&self) -> RepoResult<u64> {
        let conn = self.connect()?;
        let value: i64 = conn.query_row("SELECT COUNT(*) FROM discoveries;", [], |row| row.get(0))?;
        Ok(u64::try_from(value).unwrap_or(0))
    }
}

impl SystemRepository for SqliteSystemRepository {
    fn backend(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn get_all(&self, region: Option<&str>) -> RepoResult<Vec<System>> {
        let conn = self.connect()?;
        let mut sql = String::from(SYSTEM_SELECT_SQL);
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(region) = region {
            sql.push_str(" WHERE region = ?");
            bind_values.push(Value::Text(region.to_string()));
        }
        sql.push_str(" ORDER BY name ASC;");
        query_systems(&conn, &sql, bind_values)
    }

    fn get_paginated(
        &self,
        page: u32,
        per_page: u32,
        region: Option<&str>,
    ) -> RepoResult<Page<System>> {
        let window = PageWindow::normalize(page, per_page);
        let conn = self.connect()?;

        let total: i64 = match region {
            Some(region) => conn.query_row(
                "SELECT COUNT(*) FROM systems WHERE region = ?1;",
                [region],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM systems;", [], |row| row.get(0))?,
        };

        let mut sql = String::from(SYSTEM_SELECT_SQL);
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(region) = region {
            sql.push_str(" WHERE region = ?");
            bind_values.push(Value::Text(region.to_string()));
        }
        sql.push_str(" ORDER BY name ASC LIMIT ? OFFSET ?;");
        bind_values.push(Value::Integer(i64::from(window.per_page)));
        bind_values.push(Value::Integer(
            i64::try_from(window.offset()).unwrap_or(i64::MAX),
        ));

        let items = query_systems(&conn, &sql, bind_values)?;
        Ok(Page::new(
            items,
            window,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    fn get_by_name(&self, name: &str) -> RepoResult<Option<System>> {
        let conn = self.connect()?;
        if let Some(system) = load_system_where(&conn, "name = ?1", name)? {
            return Ok(Some(system));
        }
        load_system_where(&conn, "starmap_fold(name) = starmap_fold(?1)", name)
    }

    fn search(&self, query: &str, limit: u32) -> RepoResult<Vec<System>> {
        let trimmed = query.trim();
        if trimmed.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", escape_like(&fold_case(trimmed)));
        let conn = self.connect()?;
        let sql = format!(
            "{SYSTEM_SELECT_SQL}
             WHERE starmap_fold(name) LIKE ?1 ESCAPE '\\'
                OR starmap_fold(materials) LIKE ?1 ESCAPE '\\'
                OR starmap_fold(attributes) LIKE ?1 ESCAPE '\\'
             ORDER BY name ASC
             LIMIT ?2;"
        );
        query_systems(
            &conn,
            &sql,
            vec![Value::Text(pattern), Value::Integer(i64::from(limit))],
        )
    }

    fn add(&self, system: &System) -> RepoResult<SystemId> {
        validate_system(system)?;
        let id = system.id_or_generate();

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if row_exists(&tx, "SELECT EXISTS(SELECT 1 FROM systems WHERE name = ?1);", &system.name)? {
            return Err(RepoError::Duplicate(DuplicateKey::Name(system.name.clone())));
        }
        if row_exists(&tx, "SELECT EXISTS(SELECT 1 FROM systems WHERE id = ?1);", &id)? {
            return Err(RepoError::Duplicate(DuplicateKey::Id(id)));
        }

        insert_system_row(&tx, &id, system)
            .and_then(|()| insert_children(&tx, &id, system))
            .map_err(|err| map_constraint_error(err, &id, system))?;
        tx.commit()?;

        info!(
            "event=system_add module=sqlite status=ok id={} name={} planets={}",
            id,
            system.name,
            system.planets.len()
        );
        Ok(id)
    }

    fn update(&self, key: &str, patch: &SystemPatch) -> RepoResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id = locate_id(&tx, key)?.ok_or_else(|| RepoError::NotFound(key.to_string()))?;
        let mut system = load_system_where(&tx, "id = ?1", &id)?
            .ok_or_else(|| RepoError::NotFound(key.to_string()))?;
        let previous_name = system.name.clone();

        system.apply_patch(patch);
        validate_system(&system)?;
        if system.name != previous_name
            && row_exists(&tx, "SELECT EXISTS(SELECT 1 FROM systems WHERE name = ?1);", &system.name)?
        {
            return Err(RepoError::Duplicate(DuplicateKey::Name(system.name.clone())));
        }

        tx.execute(
            &format!(
                "UPDATE systems
                 SET
                    name = ?2,
                    x = ?3,
                    y = ?4,
                    z = ?5,
                    region = ?6,
                    fauna = ?7,
                    flora = ?8,
                    sentinel = ?9,
                    materials = ?10,
                    base_location = ?11,
                    photo = ?12,
                    attributes = ?13,
                    modified_at = {NOW_SQL}
                 WHERE id = ?1;"
            ),
            params![
                id,
                system.name,
                system.x,
                system.y,
                system.z,
                system.region,
                system.fauna,
                system.flora,
                system.sentinel,
                system.materials,
                system.base_location,
                system.photo,
                system.attributes,
            ],
        )
        .map_err(|err| map_constraint_error(err, &id, &system))?;
        tx.execute("DELETE FROM planets WHERE system_id = ?1;", [&id])?;
        tx.execute("DELETE FROM space_stations WHERE system_id = ?1;", [&id])?;
        insert_children(&tx, &id, &system).map_err(|err| map_constraint_error(err, &id, &system))?;
        tx.commit()?;

        info!("event=system_update module=sqlite status=ok id={id} key={key}");
        Ok(())
    }

    fn delete(&self, key: &str) -> RepoResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id = locate_id(&tx, key)?.ok_or_else(|| RepoError::NotFound(key.to_string()))?;
        tx.execute("DELETE FROM systems WHERE id = ?1;", [&id])?;
        tx.commit()?;

        info!("event=system_delete module=sqlite status=ok id={id}");
        Ok(())
    }

    fn exists(&self, name: &str) -> RepoResult<bool> {
        let conn = self.connect()?;
        row_exists(&conn, "SELECT EXISTS(SELECT 1 FROM systems WHERE name = ?1);", name)
    }

    fn get_regions(&self) -> RepoResult<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT region FROM systems WHERE region <> '' ORDER BY region ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut regions = Vec::new();
        while let Some(row) = rows.next()? {
            regions.push(row.get(0)?);
        }
        Ok(regions)
    }

    fn get_total_count(&self) -> RepoResult<u64> {
        let conn = self.connect()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM systems;", [], |row| row.get(0))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }
}

impl DiscoveryRepository for SqliteSystemRepository {
    fn record_discovery(&self, discovery: &Discovery) -> RepoResult<StoredDiscovery> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let system_id = match discovery.system_name.as_deref() {
            Some(name) => resolve_system_id(&tx, name)?,
            None => None,
        };
        let planet_id = match (system_id.as_deref(), discovery.planet_name.as_deref()) {
            (Some(system_id), Some(planet)) => resolve_planet_id(&tx, system_id, planet)?,
            _ => None,
        };

        tx.execute(
            "INSERT INTO discoveries (
                system_id,
                planet_id,
                system_name,
                planet_name,
                moon_name,
                discovery_name,
                discovery_type,
                description,
                discovered_by,
                discovered_at,
                evidence,
                extra
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                system_id,
                planet_id,
                discovery.system_name,
                discovery.planet_name,
                discovery.moon_name,
                discovery.discovery_name,
                discovery.discovery_type,
                discovery.description,
                discovery.discovered_by,
                discovery.discovered_at,
                discovery.evidence,
                discovery.extra,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(StoredDiscovery {
            id,
            system_id,
            planet_id,
        })
    }
}

fn query_systems(conn: &Connection, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<System>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut systems = Vec::new();
    while let Some(row) = rows.next()? {
        systems.push(parse_system_row(row)?);
    }
    for system in &mut systems {
        attach_children(conn, system)?;
    }
    Ok(systems)
}

fn load_system_where(conn: &Connection, predicate: &str, value: &str) -> RepoResult<Option<System>> {
    let sql = format!("{SYSTEM_SELECT_SQL} WHERE {predicate} ORDER BY name ASC LIMIT 1;");
    let mut systems = query_systems(conn, &sql, vec![Value::Text(value.to_string())])?;
    Ok(systems.pop())
}

fn parse_system_row(row: &Row<'_>) -> rusqlite::Result<System> {
    Ok(System {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        region: row.get("region")?,
        x: row.get("x")?,
        y: row.get("y")?,
        z: row.get("z")?,
        fauna: row.get("fauna")?,
        flora: row.get("flora")?,
        sentinel: row.get("sentinel")?,
        materials: row.get("materials")?,
        base_location: row.get("base_location")?,
        photo: row.get("photo")?,
        attributes: row.get("attributes")?,
        planets: Vec::new(),
        space_station: None,
    })
}

/// Loads planets (with moons) and the station of one system.
fn attach_children(conn: &Connection, system: &mut System) -> RepoResult<()> {
    let Some(system_id) = system.id.clone() else {
        return Ok(());
    };

    let mut planet_rows = Vec::new();
    {
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, sentinel, fauna, flora, properties, materials, base_location, photo, notes
             FROM planets
             WHERE system_id = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([&system_id])?;
        while let Some(row) = rows.next()? {
            let planet_id: i64 = row.get("id")?;
            let planet = Planet {
                name: row.get("name")?,
                sentinel: row.get("sentinel")?,
                fauna: row.get("fauna")?,
                flora: row.get("flora")?,
                properties: row.get("properties")?,
                materials: row.get("materials")?,
                base_location: row.get("base_location")?,
                photo: row.get("photo")?,
                notes: row.get("notes")?,
                moons: Vec::new(),
            };
            planet_rows.push((planet_id, planet));
        }
    }

    let mut moon_stmt = conn.prepare_cached(
        "SELECT name, sentinel, fauna, flora, properties, materials, base_location, photo, notes,
                orbit_radius, orbit_speed
         FROM moons
         WHERE planet_id = ?1
         ORDER BY id ASC;",
    )?;
    let mut planets = Vec::with_capacity(planet_rows.len());
    for (planet_id, mut planet) in planet_rows {
        let mut rows = moon_stmt.query([planet_id])?;
        while let Some(row) = rows.next()? {
            planet.moons.push(Moon {
                name: row.get("name")?,
                sentinel: row.get("sentinel")?,
                fauna: row.get("fauna")?,
                flora: row.get("flora")?,
                properties: row.get("properties")?,
                materials: row.get("materials")?,
                base_location: row.get("base_location")?,
                photo: row.get("photo")?,
                notes: row.get("notes")?,
                orbit_radius: row.get("orbit_radius")?,
                orbit_speed: row.get("orbit_speed")?,
            });
        }
        planets.push(planet);
    }
    system.planets = planets;

    system.space_station = conn
        .prepare_cached(
            "SELECT name, x, y, z, race, sell_percent, buy_percent
             FROM space_stations
             WHERE system_id = ?1;",
        )?
        .query_row([&system_id], |row| {
            Ok(SpaceStation {
                name: row.get("name")?,
                x: row.get("x")?,
                y: row.get("y")?,
                z: row.get("z")?,
                race: row.get("race")?,
                sell_percent: row.get("sell_percent")?,
                buy_percent: row.get("buy_percent")?,
            })
        })
        .optional()?;

    Ok(())
}

fn insert_system_row(conn: &Connection, id: &str, system: &System) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO systems (
            id,
            name,
            x,
            y,
            z,
            region,
            fauna,
            flora,
            sentinel,
            materials,
            base_location,
            photo,
            attributes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
        params![
            id,
            system.name,
            system.x,
            system.y,
            system.z,
            system.region,
            system.fauna,
            system.flora,
            system.sentinel,
            system.materials,
            system.base_location,
            system.photo,
            system.attributes,
        ],
    )?;
    Ok(())
}

/// Inserts planets (capturing each generated id for its moons) and the
/// station.
fn insert_children(conn: &Connection, system_id: &str, system: &System) -> rusqlite::Result<()> {
    for planet in &system.planets {
        conn.execute(
            "INSERT INTO planets (
                system_id, name, sentinel, fauna, flora, properties, materials, base_location, photo, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                system_id,
                planet.name,
                planet.sentinel,
                planet.fauna,
                planet.flora,
                planet.properties,
                planet.materials,
                planet.base_location,
                planet.photo,
                planet.notes,
            ],
        )?;
        let planet_id = conn.last_insert_rowid();

        for moon in &planet.moons {
            conn.execute(
                "INSERT INTO moons (
                    planet_id, name, sentinel, fauna, flora, properties, materials, base_location,
                    photo, notes, orbit_radius, orbit_speed
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
                params![
                    planet_id,
                    moon.name,
                    moon.sentinel,
                    moon.fauna,
                    moon.flora,
                    moon.properties,
                    moon.materials,
                    moon.base_location,
                    moon.photo,
                    moon.notes,
                    moon.orbit_radius,
                    moon.orbit_speed,
                ],
            )?;
        }
    }

    if let Some(station) = &system.space_station {
        conn.execute(
            "INSERT INTO space_stations (
                system_id, name, x, y, z, race, sell_percent, buy_percent
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                system_id,
                station.name,
                station.x,
                station.y,
                station.z,
                station.race,
                station.sell_percent,
                station.buy_percent,
            ],
        )?;
    }

    Ok(())
}

/// Resolves `key` to a system id, matching the id first and then the name.
fn locate_id(conn: &Connection, key: &str) -> RepoResult<Option<SystemId>> {
    let by_id = conn
        .query_row("SELECT id FROM systems WHERE id = ?1;", [key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    if by_id.is_some() {
        return Ok(by_id);
    }
    Ok(conn
        .query_row("SELECT id FROM systems WHERE name = ?1;", [key], |row| {
            row.get::<_, String>(0)
        })
        .optional()?)
}

fn resolve_system_id(conn: &Connection, name: &str) -> RepoResult<Option<String>> {
    let exact = conn
        .query_row("SELECT id FROM systems WHERE name = ?1;", [name], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    if exact.is_some() {
        return Ok(exact);
    }
    Ok(conn
        .query_row(
            "SELECT id FROM systems
             WHERE starmap_fold(name) = starmap_fold(?1)
             ORDER BY name
             LIMIT 1;",
            [name],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}

fn resolve_planet_id(conn: &Connection, system_id: &str, name: &str) -> RepoResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM planets
             WHERE system_id = ?1 AND starmap_fold(name) = starmap_fold(?2)
             ORDER BY id ASC
             LIMIT 1;",
            params![system_id, name],
            |row| row.get::<_, i64>(0),
        )
        .optional()?)
}

fn row_exists(conn: &Connection, sql: &str, value: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(sql, [value], |row| row.get(0))?;
    Ok(exists == 1)
}

/// Maps SQLite constraint failures onto semantic store errors.
fn map_constraint_error(err: rusqlite::Error, id: &str, system: &System) -> RepoError {
    if let rusqlite::Error::SqliteFailure(inner, Some(message)) = &err {
        if inner.code == ErrorCode::ConstraintViolation {
            if message.contains("systems.name") {
                return RepoError::Duplicate(DuplicateKey::Name(system.name.clone()));
            }
            if message.contains("systems.id") {
                return RepoError::Duplicate(DuplicateKey::Id(id.to_string()));
            }
            return RepoError::Integrity(message.clone());
        }
    }
    RepoError::from(err)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map_or(0, |meta| meta.len())
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escape_like_protects_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
