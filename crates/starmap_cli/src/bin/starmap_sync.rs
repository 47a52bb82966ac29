//! Entry point for `starmap-sync`.
#![forbid(unsafe_code)]

use std::process::ExitCode;

fn main() -> ExitCode {
    match starmap_cli::sync::run() {
        Ok(outcome) if outcome.success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("starmap-sync: {err}");
            ExitCode::FAILURE
        }
    }
}
