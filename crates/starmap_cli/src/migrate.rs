//! `starmap-migrate`: build a fresh database from a flat file.

use crate::{emit_report, report_failure, CliError, CommandOutcome, CommonArgs};
use clap::Parser;
use log::info;
use starmap_core::{EngineConfig, MigrationOptions, Migrator};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "starmap-migrate",
    about = "Migrate a flat JSON file into a new SQLite database",
    version
)]
pub struct MigrateCli {
    /// Flat JSON file to read; defaults to the configured flat file.
    #[arg(long, value_name = "json")]
    pub source: Option<PathBuf>,
    /// Database to create; defaults to the configured database.
    #[arg(long, value_name = "db")]
    pub target: Option<PathBuf>,
    /// Do not back up an existing target.
    #[arg(long = "no-backup")]
    pub no_backup: bool,
    /// Compare counts and sample names after migrating.
    #[arg(long)]
    pub verify: bool,
    /// Replace an existing target database.
    #[arg(long)]
    pub force: bool,
    #[command(flatten)]
    pub common: CommonArgs,
}

impl MigrateCli {
    fn options(&self) -> MigrationOptions {
        MigrationOptions {
            backup: !self.no_backup,
            verify: self.verify,
            force: self.force,
        }
    }
}

/// Parses process arguments, starts logging and runs the migration.
pub fn run() -> Result<CommandOutcome, CliError> {
    let cli = MigrateCli::parse();
    let config = cli.common.load_config()?;
    cli.common.start_logging(&config)?;
    execute(&cli, &config)
}

/// Runs the migration described by `cli` against `config`.
pub fn execute(cli: &MigrateCli, config: &EngineConfig) -> Result<CommandOutcome, CliError> {
    let source = cli.source.clone().unwrap_or_else(|| config.flat_file_path.clone());
    let target = cli.target.clone().unwrap_or_else(|| config.database_path.clone());
    let migrator = Migrator::new(source.clone(), target.clone(), cli.options())
        .with_lock_config(config.lock.clone());

    info!(
        "event=cli_run module=cli status=start tool=migrate source={} target={} force={} verify={}",
        source.display(),
        target.display(),
        cli.force,
        cli.verify
    );
    println!("migrating {} -> {}", source.display(), target.display());

    let stats = match migrator.run() {
        Ok(stats) => stats,
        Err(err) => {
            return Err(report_failure(
                "migrate",
                err.into(),
                None,
                &config.logs_dir,
                "migration_report",
            ))
        }
    };
    let report_path = emit_report(&stats.report(), None, &config.logs_dir, "migration_report")?;
    Ok(CommandOutcome {
        success: stats.success(),
        report_path,
    })
}
