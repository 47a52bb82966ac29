//! Cross-process advisory lock for the flat-file store.
//!
//! # Responsibility
//! - Serialize load-mutate-save sequences between cooperating processes.
//! - Recover from sidecar files left behind by crashed writers.
//!
//! # Invariants
//! - The lock is keyed by the protected path plus the `.lock` suffix.
//! - A sidecar is only ever created with exclusive-create semantics.
//! - On Unix the holder also keeps an `flock` on the sidecar, so a sidecar
//!   whose `flock` can be taken belongs to a dead process.
//! - Only `EWOULDBLOCK` from `flock` means contention. Any other `flock`
//!   failure is reported as `LockError::Io` and the new sidecar is removed.
//! - Release never fails past cleanup; problems are logged.
//!
//! # Recovery
//! On Unix a sidecar nobody holds an `flock` on is removed on the first
//! poll, whatever its age. The `stale_after` mtime threshold only applies
//! where `flock` is unavailable (non-Unix targets) or to a sidecar whose
//! holder is still alive and keeps its `flock`.

use crate::config::LockConfig;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

const LOCK_SUFFIX: &str = ".lock";

/// Lock acquisition failure.
#[derive(Debug)]
pub enum LockError {
    /// The lock was still held by another writer when the timeout elapsed.
    Timeout { lock_path: PathBuf, waited: Duration },
    Io {
        lock_path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for LockError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { lock_path, waited } => write!(
                f,
                "timed out after {} ms waiting for lock `{}`",
                waited.as_millis(),
                lock_path.display()
            ),
            Self::Io { lock_path, source } => {
                write!(f, "lock file `{}` error: {source}", lock_path.display())
            }
        }
    }
}

impl Error for LockError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Timeout { .. } => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

/// Advisory lock bound to one protected file.
#[derive(Debug, Clone)]
pub struct FileLock {
    lock_path: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
    stale_after: Duration,
}

impl FileLock {
    /// Creates a lock for `target` using the configured timings.
    pub fn new(target: impl AsRef<Path>, config: &LockConfig) -> Self {
        Self {
            lock_path: lock_path_for(target.as_ref()),
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            stale_after: config.stale_after(),
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Blocks until the lock is held or the timeout elapses.
    ///
    /// # Errors
    /// - `LockError::Timeout` when another holder keeps the lock too long.
    /// - `LockError::Io` when the sidecar cannot be created or inspected.
    pub fn acquire(&self) -> Result<LockGuard, LockError> {
        let started_at = Instant::now();
        loop {
            if let Some(guard) = self.try_acquire()? {
                debug!(
                    "event=lock_acquire module=lock status=ok path={} waited_ms={}",
                    self.lock_path.display(),
                    started_at.elapsed().as_millis()
                );
                return Ok(guard);
            }

            if self.clear_abandoned()? {
                continue;
            }

            let waited = started_at.elapsed();
            if waited >= self.timeout {
                warn!(
                    "event=lock_acquire module=lock status=error error_code=lock_timeout path={} waited_ms={}",
                    self.lock_path.display(),
                    waited.as_millis()
                );
                return Err(LockError::Timeout {
                    lock_path: self.lock_path.clone(),
                    waited,
                });
            }

            std::thread::sleep(self.poll_interval.min(self.timeout - waited));
        }
    }

    /// Attempts one exclusive create of the sidecar.
    fn try_acquire(&self) -> Result<Option<LockGuard>, LockError> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(source) => return Err(self.io_error(source)),
        };

        let locked = match os::lock_exclusive(&file) {
            Ok(locked) => locked,
            Err(source) => {
                if os::still_linked(&file, &self.lock_path) {
                    let _ = std::fs::remove_file(&self.lock_path);
                }
                warn!(
                    "event=lock_acquire module=lock status=error error_code=flock_failed path={} error={}",
                    self.lock_path.display(),
                    source
                );
                return Err(self.io_error(source));
            }
        };
        // A concurrent orphan check may hold the flock briefly, or may already
        // have unlinked this sidecar; both count as contention.
        if !locked || !os::still_linked(&file, &self.lock_path) {
            return Ok(None);
        }
        // Holder details are diagnostic only.
        let _ = writeln!(
            file,
            "pid={} acquired_at={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );

        Ok(Some(LockGuard {
            lock_path: self.lock_path.clone(),
            file: Some(file),
        }))
    }

    /// Removes a sidecar whose holder is gone or which exceeded the
    /// staleness threshold. Returns whether anything was removed.
    fn clear_abandoned(&self) -> Result<bool, LockError> {
        if os::remove_if_orphaned(&self.lock_path).map_err(|source| self.io_error(source))? {
            info!(
                "event=lock_recover module=lock status=ok reason=holder_gone path={}",
                self.lock_path.display()
            );
            return Ok(true);
        }

        let modified = match std::fs::metadata(&self.lock_path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            // Released between our attempt and this check.
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
            Err(source) => return Err(self.io_error(source)),
        };

        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age <= self.stale_after {
            return Ok(false);
        }

        warn!(
            "event=lock_recover module=lock status=ok reason=stale path={} age_secs={}",
            self.lock_path.display(),
            age.as_secs()
        );
        self.remove_sidecar()
    }

    fn remove_sidecar(&self) -> Result<bool, LockError> {
        match std::fs::remove_file(&self.lock_path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(true),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> LockError {
        LockError::Io {
            lock_path: self.lock_path.clone(),
            source,
        }
    }
}

/// Held lock; dropping it releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    lock_path: PathBuf,
    file: Option<File>,
}

impl LockGuard {
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Releases the lock explicitly. Equivalent to dropping the guard.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        // Remove before closing so a waiter never locks a sidecar that is
        // about to disappear.
        if let Err(err) = std::fs::remove_file(&self.lock_path) {
            if err.kind() != ErrorKind::NotFound {
                warn!(
                    "event=lock_release module=lock status=error path={} error={}",
                    self.lock_path.display(),
                    err
                );
            }
        }
        drop(file);
        debug!(
            "event=lock_release module=lock status=ok path={}",
            self.lock_path.display()
        );
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Returns the sidecar path guarding `target`.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(LOCK_SUFFIX);
    target.with_file_name(name)
}

#[cfg(unix)]
mod os {
    use rustix::fs::{flock, FlockOperation};
    use rustix::io::Errno;
    use std::fs::{File, OpenOptions};
    use std::os::unix::fs::MetadataExt;
    use std::path::Path;

    /// Takes a non-blocking exclusive `flock`. `Ok(false)` means another
    /// descriptor holds it.
    pub(super) fn lock_exclusive(file: &File) -> std::io::Result<bool> {
        flock_outcome(flock(file, FlockOperation::NonBlockingLockExclusive))
    }

    pub(super) fn flock_outcome(result: rustix::io::Result<()>) -> std::io::Result<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(errno) if errno == Errno::WOULDBLOCK || errno == Errno::AGAIN => Ok(false),
            Err(errno) => Err(std::io::Error::from(errno)),
        }
    }

    /// Checks that `lock_path` still names the inode behind `file`.
    pub(super) fn still_linked(file: &File, lock_path: &Path) -> bool {
        match (file.metadata(), std::fs::metadata(lock_path)) {
            (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
            _ => false,
        }
    }

    /// Unlinks an existing sidecar when no live process holds its `flock`.
    /// The unlink happens while this call holds the `flock` itself, and only
    /// if the path still names the inode it locked.
    pub(super) fn remove_if_orphaned(lock_path: &Path) -> std::io::Result<bool> {
        let Ok(file) = OpenOptions::new().read(true).open(lock_path) else {
            return Ok(false);
        };
        if !lock_exclusive(&file)? || !still_linked(&file, lock_path) {
            return Ok(false);
        }
        match std::fs::remove_file(lock_path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(err) => Err(err),
        }
    }
}

#[cfg(not(unix))]
mod os {
    use std::fs::File;
    use std::path::Path;

    pub(super) fn lock_exclusive(_file: &File) -> std::io::Result<bool> {
        Ok(true)
    }

    pub(super) fn still_linked(_file: &File, _lock_path: &Path) -> bool {
        true
    }

    pub(super) fn remove_if_orphaned(_lock_path: &Path) -> std::io::Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::lock_path_for;
    use std::path::{Path, PathBuf};

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/data/galaxy.json")),
            PathBuf::from("/data/galaxy.json.lock")
        );
    }

    #[cfg(unix)]
    #[test]
    fn only_would_block_counts_as_contention() {
        use super::os::flock_outcome;
        use rustix::io::Errno;

        assert!(flock_outcome(Ok(())).unwrap());
        assert!(!flock_outcome(Err(Errno::WOULDBLOCK)).unwrap());

        for errno in [Errno::NOLCK, Errno::IO] {
            let err = flock_outcome(Err(errno)).unwrap_err();
            assert_eq!(err.raw_os_error(), Some(errno.raw_os_error()));
        }
    }
}
