//! Entry point for `starmap-import`.
#![forbid(unsafe_code)]

use std::process::ExitCode;

fn main() -> ExitCode {
    match starmap_cli::import::run() {
        Ok(outcome) if outcome.success => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("starmap-import: {err}");
            ExitCode::FAILURE
        }
    }
}
