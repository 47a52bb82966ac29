//! Timestamped text reports for batch jobs.

use std::path::{Path, PathBuf};

/// Writes `body` to `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.txt`, creating `dir`.
///
/// Returns the written path.
pub fn write_report(dir: &Path, prefix: &str, body: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{prefix}_{stamp}.txt"));
    std::fs::write(&path, body)?;
    log::info!(
        "event=report_write module=report status=ok path={}",
        path.display()
    );
    Ok(path)
}
