//! `starmap-sync`: compare or reconcile the flat file and the database.

use crate::{emit_report, report_failure, CliError, CommandOutcome, CommonArgs};
use clap::{Parser, Subcommand};
use log::info;
use starmap_core::{EngineConfig, Synchronizer};

#[derive(Debug, Parser)]
#[command(
    name = "starmap-sync",
    about = "Check or reconcile the flat JSON file and the SQLite database",
    version
)]
pub struct SyncCli {
    #[command(subcommand)]
    pub command: SyncCommand,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum SyncCommand {
    /// Report drift between the two stores without changing anything.
    Check,
    /// Copy flat-file systems into the database.
    FlatToRelational {
        /// Replace systems that already exist in the database.
        #[arg(long)]
        overwrite: bool,
    },
    /// Rebuild the flat file from the database.
    RelationalToFlat {
        /// Skip the timestamped backup of the current flat file.
        #[arg(long = "no-backup")]
        no_backup: bool,
    },
}

/// Parses process arguments, starts logging and runs the command.
pub fn run() -> Result<CommandOutcome, CliError> {
    let cli = SyncCli::parse();
    let config = cli.common.load_config()?;
    cli.common.start_logging(&config)?;
    execute(cli.command, &config)
}

/// Runs one sync command against `config`.
pub fn execute(command: SyncCommand, config: &EngineConfig) -> Result<CommandOutcome, CliError> {
    let synchronizer = Synchronizer::from_config(config);
    info!(
        "event=cli_run module=cli status=start tool=sync command={:?} flat_file={} database={}",
        command,
        config.flat_file_path.display(),
        config.database_path.display()
    );

    let (success, body) = match run_command(&synchronizer, command) {
        Ok(result) => result,
        Err(err) => {
            return Err(report_failure("sync", err, None, &config.logs_dir, "sync_report"))
        }
    };

    let report_path = emit_report(&body, None, &config.logs_dir, "sync_report")?;
    Ok(CommandOutcome {
        success,
        report_path,
    })
}

fn run_command(
    synchronizer: &Synchronizer,
    command: SyncCommand,
) -> Result<(bool, String), CliError> {
    let result = match command {
        SyncCommand::Check => {
            let report = synchronizer.check()?;
            (report.in_sync(), report.report())
        }
        SyncCommand::FlatToRelational { overwrite } => {
            let outcome = synchronizer.flat_to_relational(overwrite)?;
            (outcome.success(), outcome.report())
        }
        SyncCommand::RelationalToFlat { no_backup } => {
            let outcome = synchronizer.relational_to_flat(!no_backup)?;
            (outcome.success(), outcome.report())
        }
    };
    Ok(result)
}
