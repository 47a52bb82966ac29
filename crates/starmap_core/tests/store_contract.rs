mod common;

use common::{bare_system, config_in, open_store, sample_system, Backend};
use rstest::rstest;
use starmap_core::{
    DuplicateKey, FlatFileRepository, RepoError, SqliteSystemRepository, SystemPatch,
    SystemRepository,
};
use tempfile::TempDir;

#[rstest]
#[case::flat(Backend::Flat)]
#[case::relational(Backend::Relational)]
fn add_then_get_round_trips_full_tree(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let store = open_store(backend, &config_in(&dir));

    let system = sample_system("Alpha");
    let id = store.add(&system).unwrap();

    let mut expected = system.clone();
    expected.id = Some(id);
    let loaded = store.get_by_name("Alpha").unwrap().unwrap();
    assert_eq!(loaded, expected);
    assert_eq!(loaded.planets[0].moons[0].orbit_speed, 0.05);
    assert_eq!(store.get_total_count().unwrap(), 1);
    assert!(store.exists("Alpha").unwrap());
}

#[rstest]
#[case::flat(Backend::Flat)]
#[case::relational(Backend::Relational)]
fn add_keeps_supplied_id_and_rejects_duplicates(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let store = open_store(backend, &config_in(&dir));

    let mut system = bare_system("Alpha", "Euclid", 1.0);
    system.id = Some("legacy-7".to_string());
    assert_eq!(store.add(&system).unwrap(), "legacy-7");

    let err = store.add(&bare_system("Alpha", "Euclid", 2.0)).unwrap_err();
    assert!(matches!(err, RepoError::Duplicate(DuplicateKey::Name(name)) if name == "Alpha"));

    let mut same_id = bare_system("Beta", "Euclid", 2.0);
    same_id.id = Some("legacy-7".to_string());
    let err = store.add(&same_id).unwrap_err();
    assert!(matches!(err, RepoError::Duplicate(DuplicateKey::Id(id)) if id == "legacy-7"));
    assert_eq!(store.get_total_count().unwrap(), 1);
}

#[rstest]
#[case::flat(Backend::Flat)]
#[case::relational(Backend::Relational)]
fn invalid_system_is_rejected_before_any_write(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let store = open_store(backend, &config_in(&dir));

    let mut system = sample_system("Alpha");
    system.planets[0].sentinel = Some("Frenzied".to_string());
    let err = store.add(&system).unwrap_err();

    assert!(matches!(err, RepoError::Validation(ref inner) if inner.field == "planets[0].sentinel"));
    assert_eq!(store.get_total_count().unwrap(), 0);
}

#[rstest]
#[case::flat(Backend::Flat)]
#[case::relational(Backend::Relational)]
fn update_merges_patch_and_supports_rename(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let store = open_store(backend, &config_in(&dir));
    let id = store.add(&sample_system("Alpha")).unwrap();
    store.add(&bare_system("Beta", "Euclid", 5.0)).unwrap();

    let patch = SystemPatch {
        name: Some("Alpha Prime".to_string()),
        x: Some(-99.5),
        fauna: Some(None),
        ..SystemPatch::default()
    };
    store.update(&id, &patch).unwrap();

    assert!(store.get_by_name("Alpha").unwrap().is_none());
    let renamed = store.get_by_name("Alpha Prime").unwrap().unwrap();
    assert_eq!(renamed.id.as_deref(), Some(id.as_str()));
    assert_eq!(renamed.x, -99.5);
    assert_eq!(renamed.fauna, None);
    assert_eq!(renamed.materials.as_deref(), Some("Copper, Gold"));
    assert_eq!(renamed.planets.len(), 2);

    let clash = SystemPatch {
        name: Some("Beta".to_string()),
        ..SystemPatch::default()
    };
    let err = store.update("Alpha Prime", &clash).unwrap_err();
    assert!(matches!(err, RepoError::Duplicate(DuplicateKey::Name(_))));

    let err = store.update("Nowhere", &SystemPatch::default()).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
}

#[rstest]
#[case::flat(Backend::Flat)]
#[case::relational(Backend::Relational)]
fn update_replaces_planets_wholesale(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let store = open_store(backend, &config_in(&dir));
    store.add(&sample_system("Alpha")).unwrap();

    let mut replacement = sample_system("Alpha");
    replacement.planets.truncate(1);
    replacement.planets[0].moons.clear();
    replacement.space_station = None;
    store
        .update("Alpha", &SystemPatch::replace_with(&replacement))
        .unwrap();

    let loaded = store.get_by_name("Alpha").unwrap().unwrap();
    assert_eq!(loaded.planets.len(), 1);
    assert!(loaded.planets[0].moons.is_empty());
    assert!(loaded.space_station.is_none());
}

#[rstest]
#[case::flat(Backend::Flat)]
#[case::relational(Backend::Relational)]
fn delete_by_id_or_name(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let store = open_store(backend, &config_in(&dir));
    let alpha_id = store.add(&sample_system("Alpha")).unwrap();
    store.add(&bare_system("Beta", "Euclid", 5.0)).unwrap();

    store.delete(&alpha_id).unwrap();
    store.delete("Beta").unwrap();

    assert_eq!(store.get_total_count().unwrap(), 0);
    let err = store.delete("Beta").unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
}

#[rstest]
#[case::flat(Backend::Flat)]
#[case::relational(Backend::Relational)]
fn pagination_is_sorted_and_clamped(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let store = open_store(backend, &config_in(&dir));
    for name in ["Echo", "Alpha", "Delta", "Charlie", "Bravo"] {
        store.add(&bare_system(name, "Euclid", 1.0)).unwrap();
    }

    let first = store.get_paginated(0, 2, None).unwrap();
    assert_eq!(first.page, 1);
    assert_eq!(first.total, 5);
    assert_eq!(first.total_pages, 3);
    let names: Vec<&str> = first.items.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Bravo"]);

    let last = store.get_paginated(3, 2, None).unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].name, "Echo");

    let beyond = store.get_paginated(9, 2, None).unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 5);
}

#[rstest]
#[case::flat(Backend::Flat)]
#[case::relational(Backend::Relational)]
fn region_filters_and_listing(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let store = open_store(backend, &config_in(&dir));
    store.add(&bare_system("Alpha", "Euclid", 1.0)).unwrap();
    store.add(&bare_system("Beta", "Hilbert", 1.0)).unwrap();
    store.add(&bare_system("Gamma", "Euclid", 1.0)).unwrap();
    store.add(&bare_system("Delta", "", 1.0)).unwrap();

    assert_eq!(store.get_regions().unwrap(), vec!["Euclid", "Hilbert"]);
    let euclid = store.get_all(Some("Euclid")).unwrap();
    let names: Vec<&str> = euclid.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Gamma"]);

    let page = store.get_paginated(1, 10, Some("Hilbert")).unwrap();
    assert_eq!(page.total, 1);
}

#[rstest]
#[case::flat(Backend::Flat)]
#[case::relational(Backend::Relational)]
fn search_matches_name_materials_and_attributes(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let store = open_store(backend, &config_in(&dir));
    store.add(&sample_system("Alpha")).unwrap();
    store.add(&bare_system("Copperfield", "Euclid", 1.0)).unwrap();
    store.add(&bare_system("Zulu", "Euclid", 1.0)).unwrap();

    let hits: Vec<String> = store
        .search("COPPER", 10)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(hits, vec!["Alpha", "Copperfield"]);

    assert_eq!(store.search("ruins", 10).unwrap().len(), 1);
    assert_eq!(store.search("copper", 1).unwrap().len(), 1);
    assert!(store.search("%", 10).unwrap().is_empty());
    assert!(store.search("   ", 10).unwrap().is_empty());
}

#[rstest]
#[case::flat(Backend::Flat)]
#[case::relational(Backend::Relational)]
fn get_by_name_falls_back_to_case_insensitive(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let store = open_store(backend, &config_in(&dir));
    store.add(&bare_system("Alpha", "Euclid", 1.0)).unwrap();

    assert_eq!(store.get_by_name("ALPHA").unwrap().unwrap().name, "Alpha");
    assert!(!store.exists("ALPHA").unwrap());
}

#[rstest]
#[case::flat(Backend::Flat)]
#[case::relational(Backend::Relational)]
fn non_ascii_names_fold_the_same_way(#[case] backend: Backend) {
    let dir = TempDir::new().unwrap();
    let store = open_store(backend, &config_in(&dir));
    let mut system = bare_system("Élan", "Ödr Expanse", 1.0);
    system.attributes = Some("ÜBERGROWTH".to_string());
    store.add(&system).unwrap();
    store.add(&bare_system("Elan", "Euclid", 2.0)).unwrap();

    assert_eq!(store.get_by_name("élan").unwrap().unwrap().name, "Élan");
    assert_eq!(store.get_by_name("ÉLAN").unwrap().unwrap().name, "Élan");

    let hits = store.search("élan", 10).unwrap();
    let names: Vec<&str> = hits.iter().map(|system| system.name.as_str()).collect();
    assert_eq!(names, vec!["Élan"]);
    assert_eq!(store.search("übergrowth", 10).unwrap().len(), 1);
}

#[test]
fn relational_delete_cascades_to_children() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let store = SqliteSystemRepository::from_config(&config);
    store.add(&sample_system("Alpha")).unwrap();

    let before = store.get_statistics().unwrap();
    assert_eq!((before.planets, before.moons, before.stations), (2, 1, 1));

    store.delete("Alpha").unwrap();

    let conn = rusqlite::Connection::open(&config.database_path).unwrap();
    for table in ["planets", "moons", "space_stations"] {
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0, "{table} kept orphan rows");
    }
}

#[test]
fn relational_radius_query_orders_by_distance() {
    let dir = TempDir::new().unwrap();
    let store = SqliteSystemRepository::from_config(&config_in(&dir));
    store.add(&bare_system("Near", "Euclid", 1.0)).unwrap();
    store.add(&bare_system("Mid", "Euclid", 4.0)).unwrap();
    store.add(&bare_system("Far", "Euclid", 50.0)).unwrap();

    let hits = store.find_within_radius([0.0, 0.0, 0.0], 5.0, 10).unwrap();
    let names: Vec<&str> = hits.iter().map(|hit| hit.system.name.as_str()).collect();
    assert_eq!(names, vec!["Near", "Mid"]);
    assert_eq!(hits[1].distance, 4.0);

    assert_eq!(store.find_within_radius([0.0, 0.0, 0.0], 100.0, 1).unwrap().len(), 1);
    assert!(store.find_within_radius([0.0, 0.0, 0.0], -1.0, 10).unwrap().is_empty());
}

#[test]
fn relational_statistics_and_metadata() {
    let dir = TempDir::new().unwrap();
    let store = SqliteSystemRepository::from_config(&config_in(&dir));
    store.add(&sample_system("Alpha")).unwrap();
    store.add(&bare_system("Beta", "Hilbert", 1.0)).unwrap();

    let stats = store.get_statistics().unwrap();
    assert_eq!(stats.systems, 2);
    assert_eq!(stats.regions, 2);
    assert!(stats.size_bytes > 0);

    assert_eq!(store.get_metadata("owner").unwrap(), None);
    store.set_metadata("owner", "cartographer").unwrap();
    store.set_metadata("owner", "navigator").unwrap();
    assert_eq!(store.get_metadata("owner").unwrap().as_deref(), Some("navigator"));
    assert_eq!(store.get_metadata("schema_version").unwrap().as_deref(), Some("2"));
}

#[test]
fn relational_get_by_id_returns_composed_tree() {
    let dir = TempDir::new().unwrap();
    let store = SqliteSystemRepository::from_config(&config_in(&dir));
    let system = sample_system("Alpha");
    let id = store.add(&system).unwrap();
    store.add(&bare_system("Beta", "Euclid", 1.0)).unwrap();

    let mut expected = system;
    expected.id = Some(id.clone());
    let loaded = store.get_by_id(&id).unwrap().unwrap();
    assert_eq!(loaded, expected);
    assert_eq!(loaded.planets[0].moons[0].name, "Pebble");
    assert_eq!(loaded.space_station.as_ref().unwrap().name, "Trade Hub");

    assert!(store.get_by_id("no-such-id").unwrap().is_none());
}

#[test]
fn flat_load_rejects_entries_sharing_a_name() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let contents = r#"{
  "A": {"name": "Twin", "region": "first", "x": 1.0, "y": 0.0, "z": 0.0},
  "B": {"name": "Twin", "region": "second", "x": 2.0, "y": 0.0, "z": 0.0}
}"#;
    std::fs::write(&config.flat_file_path, contents).unwrap();
    let store = FlatFileRepository::from_config(&config);

    let err = store.get_total_count().unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(ref message) if message.contains("Twin")));
    assert!(store.add(&bare_system("Other", "Euclid", 3.0)).is_err());

    assert_eq!(std::fs::read_to_string(&config.flat_file_path).unwrap(), contents);
}
