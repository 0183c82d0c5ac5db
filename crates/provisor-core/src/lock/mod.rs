//! Shared file locking for repository mutation.
//!
//! Serializes access to a filesystem path across threads of this
//! process and across cooperating processes. Per canonical path one
//! registry entry holds an in-process reentrant lock and an OS-level
//! marker file (`<file>.lock` next to files, `.lock` inside
//! directories) taken by atomic create-new and polled at a fixed
//! interval. The timeout is the only cancellation mechanism.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use log::{debug, warn};
use thiserror::Error;

/// Default acquisition timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Interval between attempts on the OS-level marker file
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Suffix of the marker file placed next to a locked file
const MARKER_SUFFIX: &str = ".lock";

#[derive(Error, Debug)]
pub enum LockError {
    /// The lock could not be acquired within the timeout. Transient
    /// I/O errors during acquisition attempts end up here as well once
    /// the budget is exhausted.
    #[error("Timeout after {}ms waiting for lock on {path}", waited.as_millis())]
    Timeout { path: PathBuf, waited: Duration },
}

#[derive(Debug)]
struct LockState {
    owner: Option<ThreadId>,
    hold_count: u32,
    /// Whether the marker file is currently held by this process
    marker_held: bool,
}

#[derive(Debug)]
struct LockEntry {
    state: Mutex<LockState>,
    available: Condvar,
    /// The path being locked (canonicalized registry key)
    path: PathBuf,
    /// The marker file taken for cross-process exclusion
    marker: PathBuf,
}

/// Cross-process/cross-thread lock service.
///
/// One service instance per process is the intended usage; every lock
/// on the same canonical path goes through the same registry entry.
#[derive(Default)]
pub struct FileLockService {
    registry: Mutex<HashMap<PathBuf, Arc<LockEntry>>>,
    /// Marker files whose deletion failed; retried on later operations
    deferred_deletes: Arc<Mutex<Vec<PathBuf>>>,
}

impl FileLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire both the in-process and the OS-level lock on a path.
    ///
    /// The in-process acquisition and the marker polling share one
    /// timeout budget. On timeout any partial acquisition is rolled
    /// back. Reentrant: the holding thread may lock the same path
    /// again without deadlocking, and a hold previously taken via
    /// [`lock_in_process_only`](Self::lock_in_process_only) is upgraded
    /// with the marker file.
    pub fn lock(&self, path: &Path, timeout: Duration) -> Result<FileLockHandle, LockError> {
        let started = Instant::now();
        let entry = self.entry_for(path);
        self.flush_deferred_deletes();

        Self::acquire_in_process(&entry, Some((started, timeout)))?;

        // The marker is per entry, not per handle; it is absent both on
        // a first hold and on reentry into an in-process-only hold.
        let marker_held = guard(entry.state.lock()).marker_held;
        if !marker_held {
            if let Err(error) = Self::acquire_marker(&entry, started, timeout) {
                Self::release_in_process(&entry, &self.deferred_deletes);
                return Err(error);
            }
        }
        Ok(self.handle(entry))
    }

    /// Acquire only the in-process lock, blocking without timeout.
    ///
    /// No marker file is taken; other processes are not excluded.
    pub fn lock_in_process_only(&self, path: &Path) -> FileLockHandle {
        let entry = self.entry_for(path);
        // Without a deadline acquisition cannot fail.
        let _ = Self::acquire_in_process(&entry, None);
        self.handle(entry)
    }

    fn handle(&self, entry: Arc<LockEntry>) -> FileLockHandle {
        FileLockHandle {
            entry,
            deferred_deletes: Arc::clone(&self.deferred_deletes),
            released: false,
        }
    }

    /// Look up or create the registry entry for a path.
    fn entry_for(&self, path: &Path) -> Arc<LockEntry> {
        let key = canonical_key(path);
        let mut registry = guard(self.registry.lock());
        Arc::clone(registry.entry(key.clone()).or_insert_with(|| {
            Arc::new(LockEntry {
                state: Mutex::new(LockState {
                    owner: None,
                    hold_count: 0,
                    marker_held: false,
                }),
                available: Condvar::new(),
                marker: marker_path(&key),
                path: key,
            })
        }))
    }

    /// Wait for the in-process lock, reentrantly for the owning thread.
    fn acquire_in_process(
        entry: &LockEntry,
        deadline: Option<(Instant, Duration)>,
    ) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut state = guard(entry.state.lock());
        loop {
            match state.owner {
                Some(owner) if owner == me => {
                    state.hold_count += 1;
                    return Ok(());
                }
                None => {
                    state.owner = Some(me);
                    state.hold_count = 1;
                    return Ok(());
                }
                Some(_) => match deadline {
                    None => {
                        state = guard(entry.available.wait(state));
                    }
                    Some((started, timeout)) => {
                        let Some(remaining) = timeout.checked_sub(started.elapsed()) else {
                            return Err(LockError::Timeout {
                                path: entry.path.clone(),
                                waited: started.elapsed(),
                            });
                        };
                        let (next, _) =
                            guard_wait_timeout(entry.available.wait_timeout(state, remaining));
                        state = next;
                        if state.owner.is_some() && started.elapsed() >= timeout {
                            return Err(LockError::Timeout {
                                path: entry.path.clone(),
                                waited: started.elapsed(),
                            });
                        }
                    }
                },
            }
        }
    }

    /// Poll for the marker file until created or the budget runs out.
    fn acquire_marker(
        entry: &LockEntry,
        started: Instant,
        timeout: Duration,
    ) -> Result<(), LockError> {
        loop {
            if let Some(parent) = entry.marker.parent() {
                // The directory may not exist yet when locking a path
                // that is about to be created.
                let _ = fs::create_dir_all(parent);
            }
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&entry.marker)
            {
                Ok(_) => {
                    guard(entry.state.lock()).marker_held = true;
                    return Ok(());
                }
                Err(error) => {
                    // Contention and transient I/O errors are retried
                    // alike until the budget is exhausted.
                    debug!(
                        "Marker {} not acquired: {error}",
                        entry.marker.display()
                    );
                }
            }
            let Some(remaining) = timeout.checked_sub(started.elapsed()) else {
                return Err(LockError::Timeout {
                    path: entry.path.clone(),
                    waited: started.elapsed(),
                });
            };
            thread::sleep(POLL_INTERVAL.min(remaining.max(Duration::from_millis(1))));
        }
    }

    fn release_in_process(entry: &LockEntry, deferred: &Mutex<Vec<PathBuf>>) {
        let mut state = guard(entry.state.lock());
        state.hold_count = state.hold_count.saturating_sub(1);
        if state.hold_count > 0 {
            return;
        }
        state.owner = None;
        if state.marker_held {
            state.marker_held = false;
            if let Err(error) = fs::remove_file(&entry.marker) {
                warn!(
                    "Could not delete lock marker {}, deferring: {error}",
                    entry.marker.display()
                );
                guard(deferred.lock()).push(entry.marker.clone());
            }
        }
        drop(state);
        entry.available.notify_one();
    }

    /// Retry marker deletions that failed earlier.
    fn flush_deferred_deletes(&self) {
        let mut deferred = guard(self.deferred_deletes.lock());
        deferred.retain(|marker| match fs::remove_file(marker) {
            Ok(()) => false,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => false,
            Err(_) => true,
        });
    }
}

/// An acquired lock. Dropping the handle releases it; explicit
/// [`release`](FileLockHandle::release) is idempotent.
#[derive(Debug)]
pub struct FileLockHandle {
    entry: Arc<LockEntry>,
    deferred_deletes: Arc<Mutex<Vec<PathBuf>>>,
    released: bool,
}

impl FileLockHandle {
    /// Release this hold. Releasing an already-released handle is a
    /// no-op.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        FileLockService::release_in_process(&self.entry, &self.deferred_deletes);
    }
}

impl Drop for FileLockHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Normalize a path into the registry key.
///
/// The target may not exist yet, so canonicalization falls back to
/// resolving the parent only.
fn canonical_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

/// Marker file location: `<file>.lock` next to files, `.lock` inside
/// directories.
fn marker_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(MARKER_SUFFIX)
    } else {
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(MARKER_SUFFIX);
        path.with_file_name(name)
    }
}

/// Mutex poisoning only happens when a holder panicked; the lock state
/// itself is still consistent, so the guard is recovered.
fn guard<'a, T>(
    result: Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(PoisonError::into_inner)
}

fn guard_wait_timeout<'a, T>(
    result: Result<
        (MutexGuard<'a, T>, std::sync::WaitTimeoutResult),
        PoisonError<(MutexGuard<'a, T>, std::sync::WaitTimeoutResult)>,
    >,
) -> (MutexGuard<'a, T>, std::sync::WaitTimeoutResult) {
    result.unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use tempfile::TempDir;

    use super::*;

    fn target(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("repository.xml");
        fs::write(&path, b"contents").unwrap();
        path
    }

    #[test]
    fn test_lock_release_relock() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        let service = FileLockService::new();

        let mut first = service.lock(&path, Duration::from_millis(1000)).unwrap();
        first.release();
        let mut second = service.lock(&path, Duration::from_millis(1000)).unwrap();
        second.release();
    }

    #[test]
    fn test_marker_file_lifecycle() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        let marker = dir.path().join("repository.xml.lock");
        let service = FileLockService::new();

        let mut handle = service.lock(&path, Duration::from_millis(1000)).unwrap();
        assert!(marker.exists());
        handle.release();
        assert!(!marker.exists());
    }

    #[test]
    fn test_directory_marker_is_inside() {
        let dir = TempDir::new().unwrap();
        let service = FileLockService::new();

        let mut handle = service
            .lock(dir.path(), Duration::from_millis(1000))
            .unwrap();
        assert!(dir.path().join(".lock").exists());
        handle.release();
    }

    #[test]
    fn test_contention_across_services_times_out() {
        // A second service instance stands in for another process: it
        // shares no registry, only the marker file.
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        let first_service = FileLockService::new();
        let second_service = FileLockService::new();

        let mut held = first_service
            .lock(&path, Duration::from_millis(1000))
            .unwrap();
        let error = second_service.lock(&path, Duration::ZERO).unwrap_err();
        assert!(matches!(error, LockError::Timeout { .. }));

        held.release();
        let mut now_free = second_service
            .lock(&path, Duration::from_millis(1000))
            .unwrap();
        now_free.release();
    }

    #[test]
    fn test_contention_across_threads_times_out() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        let service = Arc::new(FileLockService::new());

        let (acquired_tx, acquired_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let thread_service = Arc::clone(&service);
        let thread_path = path.clone();
        let holder = thread::spawn(move || {
            let mut handle = thread_service
                .lock(&thread_path, Duration::from_millis(1000))
                .unwrap();
            acquired_tx.send(()).unwrap();
            done_rx.recv().unwrap();
            handle.release();
        });

        acquired_rx.recv().unwrap();
        let error = service.lock(&path, Duration::ZERO).unwrap_err();
        assert!(matches!(error, LockError::Timeout { .. }));

        done_tx.send(()).unwrap();
        holder.join().unwrap();

        let mut free = service.lock(&path, Duration::from_millis(1000)).unwrap();
        free.release();
    }

    #[test]
    fn test_reentrant_same_thread() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        let service = FileLockService::new();
        let marker = dir.path().join("repository.xml.lock");

        let mut outer = service.lock(&path, Duration::from_millis(1000)).unwrap();
        let mut inner = service.lock(&path, Duration::from_millis(1000)).unwrap();

        inner.release();
        assert!(marker.exists()); // still held by the outer handle
        outer.release();
        assert!(!marker.exists());
    }

    #[test]
    fn test_release_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        let service = FileLockService::new();

        let mut handle = service.lock(&path, Duration::from_millis(1000)).unwrap();
        handle.release();
        handle.release();

        let mut again = service.lock(&path, Duration::from_millis(1000)).unwrap();
        again.release();
        again.release();
    }

    #[test]
    fn test_drop_releases() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        let service = FileLockService::new();

        {
            let _handle = service.lock(&path, Duration::from_millis(1000)).unwrap();
        }
        let mut free = service.lock(&path, Duration::from_millis(1000)).unwrap();
        free.release();
    }

    #[test]
    fn test_in_process_only_takes_no_marker() {
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        let marker = dir.path().join("repository.xml.lock");
        let service = FileLockService::new();

        let mut handle = service.lock_in_process_only(&path);
        assert!(!marker.exists());
        handle.release();
    }

    #[test]
    fn test_full_lock_after_in_process_only_takes_marker() {
        // Reentering an in-process-only hold with a full lock must
        // still establish cross-process exclusion.
        let dir = TempDir::new().unwrap();
        let path = target(&dir);
        let marker = dir.path().join("repository.xml.lock");
        let service = FileLockService::new();

        let mut in_process = service.lock_in_process_only(&path);
        assert!(!marker.exists());

        let mut full = service.lock(&path, Duration::from_millis(1000)).unwrap();
        assert!(marker.exists());

        // The marker stays until the last hold on the entry is gone.
        full.release();
        assert!(marker.exists());
        in_process.release();
        assert!(!marker.exists());
    }
}
