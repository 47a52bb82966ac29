//! Entry point for `starmap-migrate`.
#![forbid(unsafe_code)]

use std::process::ExitCode;

fn main() -> ExitCode {
    match starmap_cli::migrate::run() {
        Ok(outcome) if outcome.success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("starmap-migrate: {err}");
            ExitCode::FAILURE
        }
    }
}
