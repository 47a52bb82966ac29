mod common;

use common::{bare_system, config_in};
use starmap_core::lock::lock_path_for;
use starmap_core::{FileLock, FlatFileRepository, LockConfig, LockError, RepoError, SystemRepository};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn quick_lock() -> LockConfig {
    LockConfig {
        timeout_ms: 150,
        poll_interval_ms: 10,
        stale_after_secs: 300,
    }
}

#[test]
fn second_acquire_times_out_while_guard_is_held() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("data.json");
    let lock = FileLock::new(&target, &quick_lock());

    let guard = lock.acquire().unwrap();
    assert!(guard.lock_path().exists());

    let err = FileLock::new(&target, &quick_lock()).acquire().unwrap_err();
    match err {
        LockError::Timeout { lock_path, waited } => {
            assert_eq!(lock_path, lock_path_for(&target));
            assert!(waited >= Duration::from_millis(150));
        }
        other => panic!("unexpected error: {other}"),
    }

    guard.release();
    assert!(!lock.lock_path().exists());
    let again = lock.acquire().unwrap();
    drop(again);
    assert!(!lock.lock_path().exists());
}

#[test]
fn flat_writes_fail_with_lock_error_while_locked() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.lock = quick_lock();
    let store = FlatFileRepository::from_config(&config);

    let _guard = FileLock::new(&config.flat_file_path, &config.lock)
        .acquire()
        .unwrap();
    let err = store.add(&bare_system("Alpha", "Euclid", 1.0)).unwrap_err();

    assert!(matches!(err, RepoError::Lock(LockError::Timeout { .. })));
    assert_eq!(store.get_total_count().unwrap(), 0);
}

#[cfg(unix)]
#[test]
fn fresh_unlocked_sidecar_is_recovered_without_waiting_for_staleness() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("data.json");
    let sidecar = lock_path_for(&target);
    std::fs::write(&sidecar, "pid=1 acquired_at=crashed").unwrap();

    let config = quick_lock();
    let started_at = std::time::Instant::now();
    let guard = FileLock::new(&target, &config).acquire().unwrap();
    assert_eq!(guard.lock_path(), sidecar.as_path());
    assert!(started_at.elapsed() < Duration::from_millis(config.timeout_ms));
}

#[test]
fn stale_sidecar_is_recovered() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("data.json");
    std::fs::write(lock_path_for(&target), "").unwrap();
    thread::sleep(Duration::from_millis(1_100));

    let config = LockConfig {
        stale_after_secs: 1,
        ..quick_lock()
    };
    assert!(FileLock::new(&target, &config).acquire().is_ok());
}

#[test]
fn concurrent_flat_writers_do_not_lose_updates() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.lock.timeout_ms = 10_000;
    let config = Arc::new(config);

    let handles: Vec<_> = (0..4)
        .map(|writer| {
            let config = Arc::clone(&config);
            thread::spawn(move || {
                let store = FlatFileRepository::from_config(&config);
                for index in 0..5 {
                    let name = format!("Writer {writer} System {index}");
                    store.add(&bare_system(&name, "Euclid", index as f64)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let store = FlatFileRepository::from_config(&config);
    assert_eq!(store.get_total_count().unwrap(), 20);
    assert!(!lock_path_for(&config.flat_file_path).exists());
}
