//! In-memory progress tracking for backup and restore operations.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::error::{BackupError, Result};
use crate::user::UserId;

/// The two long-running operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Backup,
    Restore,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Backup => write!(f, "backup"),
            OperationKind::Restore => write!(f, "restore"),
        }
    }
}

/// Progress of one operation, 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperationStatus {
    pub progress: u8,
    pub completed: bool,
}

impl OperationStatus {
    fn started() -> Self {
        Self {
            progress: 0,
            completed: false,
        }
    }

    /// What an untracked operation reports: nothing pending.
    pub fn idle() -> Self {
        Self {
            progress: 100,
            completed: true,
        }
    }
}

type Key = (UserId, OperationKind);

/// Per-(user, operation) progress. Readers never see progress go backwards.
#[derive(Debug, Default)]
pub struct StatusTracker {
    entries: RwLock<HashMap<Key, OperationStatus>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the entry to 0% regardless of what was there.
    pub fn start(&self, user: &UserId, kind: OperationKind) {
        let mut entries = self.write();
        entries.insert((user.clone(), kind), OperationStatus::started());
        debug!("{} started for {}", kind, user);
    }

    /// Start unless an operation of this kind is already running for the user.
    pub fn try_start(&self, user: &UserId, kind: OperationKind) -> Result<()> {
        let mut entries = self.write();
        let key = (user.clone(), kind);
        if matches!(entries.get(&key), Some(status) if !status.completed) {
            return Err(BackupError::OperationInProgress {
                user: user.to_string(),
                kind,
            });
        }
        entries.insert(key, OperationStatus::started());
        debug!("{} started for {}", kind, user);
        Ok(())
    }

    /// Raise progress. Lower values and updates after completion are ignored.
    pub fn update(&self, user: &UserId, kind: OperationKind, progress: u8) {
        let mut entries = self.write();
        let status = entries
            .entry((user.clone(), kind))
            .or_insert_with(OperationStatus::started);
        if status.completed {
            return;
        }
        status.progress = status.progress.max(progress.min(100));
    }

    /// Mark done at 100%, whether it succeeded or not.
    pub fn finish(&self, user: &UserId, kind: OperationKind) {
        let mut entries = self.write();
        entries.insert((user.clone(), kind), OperationStatus::idle());
        debug!("{} finished for {}", kind, user);
    }

    /// Forget the entry entirely.
    pub fn clear(&self, user: &UserId, kind: OperationKind) {
        self.write().remove(&(user.clone(), kind));
    }

    pub fn get(&self, user: &UserId, kind: OperationKind) -> OperationStatus {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .get(&(user.clone(), kind))
            .copied()
            .unwrap_or_else(OperationStatus::idle)
    }

    // Map updates are single inserts, so a poisoned map is still consistent
    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Key, OperationStatus>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// A running operation. Dropping the guard marks it finished, so the entry
/// completes even when the caller stops waiting for the work.
#[derive(Debug)]
pub struct OperationGuard {
    tracker: Arc<StatusTracker>,
    user: UserId,
    kind: OperationKind,
}

impl OperationGuard {
    /// [`StatusTracker::try_start`], tied to the lifetime of the guard.
    pub fn acquire(tracker: &Arc<StatusTracker>, user: &UserId, kind: OperationKind) -> Result<Self> {
        tracker.try_start(user, kind)?;
        Ok(Self {
            tracker: Arc::clone(tracker),
            user: user.clone(),
            kind,
        })
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.tracker.finish(&self.user, self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn test_unknown_operation_reports_idle() {
        let tracker = StatusTracker::new();
        assert_eq!(
            tracker.get(&user("u1"), OperationKind::Backup),
            OperationStatus {
                progress: 100,
                completed: true
            }
        );
    }

    #[test]
    fn test_progress_is_monotonic() {
        let tracker = StatusTracker::new();
        let u = user("u1");
        tracker.start(&u, OperationKind::Restore);
        tracker.update(&u, OperationKind::Restore, 40);
        tracker.update(&u, OperationKind::Restore, 20);
        assert_eq!(tracker.get(&u, OperationKind::Restore).progress, 40);

        tracker.update(&u, OperationKind::Restore, 250);
        let status = tracker.get(&u, OperationKind::Restore);
        assert_eq!(status.progress, 100);
        assert!(!status.completed);

        tracker.finish(&u, OperationKind::Restore);
        tracker.update(&u, OperationKind::Restore, 10);
        assert_eq!(tracker.get(&u, OperationKind::Restore), OperationStatus::idle());
    }

    #[test]
    fn test_kinds_and_users_are_independent() {
        let tracker = StatusTracker::new();
        tracker.start(&user("u1"), OperationKind::Backup);
        tracker.update(&user("u1"), OperationKind::Backup, 50);

        assert_eq!(tracker.get(&user("u1"), OperationKind::Restore), OperationStatus::idle());
        assert_eq!(tracker.get(&user("u2"), OperationKind::Backup), OperationStatus::idle());
        assert_eq!(tracker.get(&user("u1"), OperationKind::Backup).progress, 50);
    }

    #[test]
    fn test_try_start_rejects_concurrent_operation() {
        let tracker = StatusTracker::new();
        let u = user("u1");
        tracker.try_start(&u, OperationKind::Backup).unwrap();

        let err = tracker.try_start(&u, OperationKind::Backup).unwrap_err();
        assert!(matches!(err, BackupError::OperationInProgress { kind: OperationKind::Backup, .. }));
        tracker.try_start(&u, OperationKind::Restore).unwrap();

        tracker.finish(&u, OperationKind::Backup);
        tracker.try_start(&u, OperationKind::Backup).unwrap();
    }

    #[test]
    fn test_guard_finishes_on_drop() {
        let tracker = Arc::new(StatusTracker::new());
        let u = user("u1");

        let guard = OperationGuard::acquire(&tracker, &u, OperationKind::Restore).unwrap();
        tracker.update(&u, OperationKind::Restore, 60);
        assert!(OperationGuard::acquire(&tracker, &u, OperationKind::Restore).is_err());

        // Dropped on another thread, as a blocking worker would
        thread::spawn(move || drop(guard)).join().unwrap();
        assert_eq!(tracker.get(&u, OperationKind::Restore), OperationStatus::idle());
        OperationGuard::acquire(&tracker, &u, OperationKind::Restore).unwrap();
    }

    #[test]
    fn test_clear_resets_to_idle() {
        let tracker = StatusTracker::new();
        let u = user("u1");
        tracker.start(&u, OperationKind::Backup);
        tracker.clear(&u, OperationKind::Backup);
        assert_eq!(tracker.get(&u, OperationKind::Backup), OperationStatus::idle());
    }

    #[test]
    fn test_concurrent_updates_never_regress() {
        let tracker = Arc::new(StatusTracker::new());
        let u = user("u1");
        tracker.start(&u, OperationKind::Backup);

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                let u = u.clone();
                thread::spawn(move || {
                    for p in 0..=10u8 {
                        tracker.update(&u, OperationKind::Backup, p * 10 - i.min(p * 10));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.get(&u, OperationKind::Backup).progress, 100);
    }
}
