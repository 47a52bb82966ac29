//! Unit tests for argument parsing and command execution.

use super::import::{self, ImportCli};
use super::migrate::{self, MigrateCli};
use super::sync::{self, SyncCli, SyncCommand};
use super::{BackendArg, CliError};
use clap::Parser;
use rstest::rstest;
use starmap_core::{BackendKind, EngineConfig, FlatFileRepository, SqliteSystemRepository, System, SystemRepository};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> EngineConfig {
    EngineConfig::with_data_dir(dir.path())
}

fn write_export(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).expect("write export");
    path
}

#[rstest]
#[case("json", BackendArg::Flat)]
#[case("sqlite", BackendArg::Relational)]
#[case("auto", BackendArg::Auto)]
fn backend_flag_accepts_aliases(#[case] flag: &str, #[case] expected: BackendArg) {
    let cli = ImportCli::try_parse_from(["starmap-import", "export.json", "--backend", flag])
        .expect("parse");
    assert_eq!(cli.backend, Some(expected));
}

#[rstest]
fn common_flags_override_config() {
    let cli = SyncCli::try_parse_from([
        "starmap-sync",
        "flat-to-relational",
        "--overwrite",
        "--flat-file",
        "/tmp/galaxy.json",
        "--database",
        "/tmp/galaxy.db",
    ])
    .expect("parse");

    assert_eq!(cli.command, SyncCommand::FlatToRelational { overwrite: true });
    let config = cli.common.load_config().expect("config");
    assert_eq!(config.flat_file_path, PathBuf::from("/tmp/galaxy.json"));
    assert_eq!(config.database_path, PathBuf::from("/tmp/galaxy.db"));
    assert_eq!(BackendKind::from(BackendArg::Relational), BackendKind::Relational);
}

#[rstest]
fn unknown_sync_command_is_rejected() {
    let err = SyncCli::try_parse_from(["starmap-sync", "sideways"]).expect_err("should fail");
    let err = CliError::from(err);
    assert!(matches!(err, CliError::ArgumentParsing(_)));
}

#[rstest]
fn import_into_flat_store_writes_report() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = config_in(&dir);
    config.backend = BackendKind::Flat;
    let export = write_export(
        &dir,
        "export.json",
        r#"{"Alpha": {"x": 1, "y": 2, "z": 3}, "Beta": {"x": 200, "y": 0, "z": 0}}"#,
    );
    let report = dir.path().join("reports/import.txt");

    let cli = ImportCli::try_parse_from([
        "starmap-import".into(),
        export.into_os_string(),
        "--report".into(),
        report.clone().into_os_string(),
    ])
    .expect("parse");
    let outcome = import::execute(&cli, &config).expect("import");

    assert!(!outcome.success, "Beta is out of bounds and must fail");
    assert_eq!(outcome.report_path, report);
    let text = fs::read_to_string(&report).expect("report");
    assert!(text.contains("1 imported"));
    assert!(text.contains("1 failed"));

    let flat = FlatFileRepository::from_config(&config);
    assert!(flat.exists("Alpha").expect("exists"));
}

#[rstest]
fn import_directory_requires_batch_flag() {
    let dir = TempDir::new().expect("tempdir");
    let config = config_in(&dir);
    let cli = ImportCli::try_parse_from(["starmap-import".into(), dir.path().as_os_str().to_owned()])
        .expect("parse");

    let err = import::execute(&cli, &config).expect_err("directory without --batch");
    assert!(matches!(err, CliError::DirectoryWithoutBatch { .. }));
}

#[rstest]
fn sync_check_reports_drift_as_failure() {
    let dir = TempDir::new().expect("tempdir");
    let config = config_in(&dir);
    FlatFileRepository::from_config(&config)
        .add(&System::new("Alpha", "Euclid", 1.0, 1.0, 1.0))
        .expect("add");

    let outcome = sync::execute(SyncCommand::Check, &config).expect("check");
    assert!(!outcome.success);
    assert!(outcome.report_path.starts_with(&config.logs_dir));

    let outcome = sync::execute(SyncCommand::FlatToRelational { overwrite: false }, &config)
        .expect("sync");
    assert!(outcome.success);
    let outcome = sync::execute(SyncCommand::Check, &config).expect("check");
    assert!(outcome.success);
}

#[rstest]
fn migrate_with_verify_succeeds() {
    let dir = TempDir::new().expect("tempdir");
    let config = config_in(&dir);
    FlatFileRepository::from_config(&config)
        .add(&System::new("Alpha", "Euclid", 1.0, 1.0, 1.0))
        .expect("add");

    let cli = MigrateCli::try_parse_from(["starmap-migrate", "--verify"]).expect("parse");
    let outcome = migrate::execute(&cli, &config).expect("migrate");
    assert!(outcome.success);

    let relational = SqliteSystemRepository::from_config(&config);
    assert_eq!(relational.get_total_count().expect("count"), 1);

    let err = migrate::execute(&cli, &config).expect_err("target exists without --force");
    assert!(matches!(err, CliError::Migration(_)));
}

fn reports_in(config: &EngineConfig, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(&config.logs_dir) else {
        return Vec::new();
    };
    entries
        .map(|entry| entry.expect("dir entry").path())
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with(prefix))
        })
        .collect()
}

#[rstest]
fn migrate_without_source_still_writes_report() {
    let dir = TempDir::new().expect("tempdir");
    let config = config_in(&dir);
    let cli = MigrateCli::try_parse_from(["starmap-migrate"]).expect("parse");

    let err = migrate::execute(&cli, &config).expect_err("source is missing");
    assert!(matches!(err, CliError::Migration(_)));

    let reports = reports_in(&config, "migration_report");
    assert_eq!(reports.len(), 1);
    let text = fs::read_to_string(&reports[0]).expect("report");
    assert!(text.starts_with("migrate failed"));
    assert!(text.contains(&err.to_string()));
}

#[rstest]
fn import_of_missing_file_still_writes_report() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = config_in(&dir);
    config.backend = BackendKind::Flat;
    let missing = dir.path().join("nope.json");
    let cli = ImportCli::try_parse_from(["starmap-import".into(), missing.into_os_string()])
        .expect("parse");

    let err = import::execute(&cli, &config).expect_err("file is missing");
    assert!(matches!(err, CliError::Import(_)));

    let reports = reports_in(&config, "import_report");
    assert_eq!(reports.len(), 1);
    let text = fs::read_to_string(&reports[0]).expect("report");
    assert!(text.starts_with("import failed"));
}

#[rstest]
fn sync_failure_still_writes_report() {
    let dir = TempDir::new().expect("tempdir");
    let config = config_in(&dir);
    fs::write(&config.flat_file_path, "not json").expect("write flat file");

    sync::execute(SyncCommand::Check, &config).expect_err("flat file is corrupt");

    let reports = reports_in(&config, "sync_report");
    assert_eq!(reports.len(), 1);
    let text = fs::read_to_string(&reports[0]).expect("report");
    assert!(text.starts_with("sync failed"));
}
