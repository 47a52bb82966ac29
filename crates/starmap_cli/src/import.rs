//! `starmap-import`: load export files into the selected store.

use crate::{emit_report, report_failure, BackendArg, CliError, CommandOutcome, CommonArgs};
use clap::Parser;
use log::info;
use starmap_core::{EngineConfig, ImportOptions, ImportStats, Importer};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "starmap-import",
    about = "Import system or discovery exports into a starmap store",
    version
)]
pub struct ImportCli {
    /// Export file, or a directory of them with --batch.
    #[arg(value_name = "path")]
    pub path: PathBuf,
    /// Import every *.json file in the directory.
    #[arg(long)]
    pub batch: bool,
    /// Replace systems whose name already exists.
    #[arg(long)]
    pub update: bool,
    /// Skip the pre-write validation pass.
    #[arg(long = "skip-validation")]
    pub skip_validation: bool,
    /// Target store; defaults to the configured backend.
    #[arg(long, value_enum, value_name = "backend")]
    pub backend: Option<BackendArg>,
    /// Write the report here instead of the logs directory.
    #[arg(long, value_name = "file")]
    pub report: Option<PathBuf>,
    #[command(flatten)]
    pub common: CommonArgs,
}

impl ImportCli {
    fn options(&self) -> ImportOptions {
        ImportOptions {
            allow_updates: self.update,
            validate: !self.skip_validation,
        }
    }
}

/// Parses process arguments, starts logging and runs the import.
pub fn run() -> Result<CommandOutcome, CliError> {
    let cli = ImportCli::parse();
    let mut config = cli.common.load_config()?;
    if let Some(backend) = cli.backend {
        config.backend = backend.into();
    }
    cli.common.start_logging(&config)?;
    execute(&cli, &config)
}

/// Runs the import described by `cli` against `config`.
pub fn execute(cli: &ImportCli, config: &EngineConfig) -> Result<CommandOutcome, CliError> {
    let stats = match import_stats(cli, config) {
        Ok(stats) => stats,
        Err(err) => {
            return Err(report_failure(
                "import",
                err,
                cli.report.as_deref(),
                &config.logs_dir,
                "import_report",
            ))
        }
    };

    let report_path = emit_report(
        &stats.report(),
        cli.report.as_deref(),
        &config.logs_dir,
        "import_report",
    )?;
    Ok(CommandOutcome {
        success: stats.success(),
        report_path,
    })
}

fn import_stats(cli: &ImportCli, config: &EngineConfig) -> Result<ImportStats, CliError> {
    if cli.path.is_dir() && !cli.batch {
        return Err(CliError::DirectoryWithoutBatch {
            path: cli.path.clone(),
        });
    }

    let importer = Importer::from_config(config, cli.options())?;
    info!(
        "event=cli_run module=cli status=start tool=import path={} backend={} batch={} update={}",
        cli.path.display(),
        importer.store().backend().as_str(),
        cli.batch,
        cli.update
    );
    println!(
        "importing {} into the {} store",
        cli.path.display(),
        importer.store().backend().as_str()
    );

    let stats = if cli.batch {
        importer.import_directory(&cli.path)?
    } else {
        importer.import_file(&cli.path)?
    };
    Ok(stats)
}
