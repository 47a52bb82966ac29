//! Bounded retry for busy relational writes.

use crate::config::ImportRetryConfig;
use crate::repo::RepoResult;
use log::warn;
use std::time::Duration;

/// Runs `operation`, retrying while the database reports busy/locked.
///
/// The delay starts at `base_delay_ms` and doubles after every attempt.
/// Other errors and the final busy error are returned unchanged.
pub fn retry_on_busy<T>(
    policy: &ImportRetryConfig,
    label: &str,
    mut operation: impl FnMut() -> RepoResult<T>,
) -> RepoResult<T> {
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = Duration::from_millis(policy.base_delay_ms);
    let mut attempt = 1;
    loop {
        match operation() {
            Err(err) if err.is_busy() && attempt < max_attempts => {
                warn!(
                    "event=import_retry module=import status=retry operation={} attempt={} delay_ms={}",
                    label,
                    attempt,
                    delay.as_millis()
                );
                std::thread::sleep(delay);
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::retry_on_busy;
    use crate::config::ImportRetryConfig;
    use crate::db::DbError;
    use crate::repo::RepoError;
    use rusqlite::ffi;

    fn busy() -> RepoError {
        RepoError::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_BUSY),
            None,
        )))
    }

    fn fast_policy(max_attempts: u32) -> ImportRetryConfig {
        ImportRetryConfig {
            max_attempts,
            base_delay_ms: 1,
        }
    }

    #[test]
    fn retries_busy_until_success() {
        let mut calls = 0;
        let result = retry_on_busy(&fast_policy(5), "add", || {
            calls += 1;
            if calls < 3 {
                Err(busy())
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), RepoError> = retry_on_busy(&fast_policy(3), "add", || {
            calls += 1;
            Err(busy())
        });
        assert!(result.unwrap_err().is_busy());
        assert_eq!(calls, 3);
    }

    #[test]
    fn other_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), RepoError> = retry_on_busy(&fast_policy(5), "add", || {
            calls += 1;
            Err(RepoError::NotFound("Alpha".to_string()))
        });
        assert!(matches!(result, Err(RepoError::NotFound(_))));
        assert_eq!(calls, 1);
    }
}
