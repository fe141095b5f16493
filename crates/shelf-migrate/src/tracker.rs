//! One-way completion marker for the legacy -> library migration.
//!
//! States are `not-completed` and `completed`; the only transition is
//! `not-completed -> completed`, taken either by [`MigrationTracker::mark_completed`]
//! after a successful write, or implicitly by
//! [`MigrationTracker::requires_migration`] when no legacy store exists
//! (a fresh install has nothing to migrate). Callers serialize access.

use shelf_core::{CompletionFlag, FlagStore, FsProbe, PresenceProbe, StoreError};
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const COMPLETED_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("completion flag store error: {0}")]
    Flag(#[from] StoreError),
}

pub struct MigrationTracker<F, P = FsProbe> {
    flags: F,
    probe: P,
}

impl<F: FlagStore> MigrationTracker<F, FsProbe> {
    pub fn new(flags: F) -> Self {
        Self::with_probe(flags, FsProbe)
    }
}

impl<F: FlagStore, P: PresenceProbe> MigrationTracker<F, P> {
    pub fn with_probe(flags: F, probe: P) -> Self {
        Self { flags, probe }
    }

    pub fn flag(&self) -> Result<CompletionFlag, TrackerError> {
        Ok(self.flags.load()?)
    }

    pub fn is_completed(&self) -> Result<bool, TrackerError> {
        Ok(self.flag()?.completed)
    }

    /// Marks a fresh install (no legacy file at `location`) as completed as
    /// part of answering.
    pub fn requires_migration(&self, location: &Path) -> Result<bool, TrackerError> {
        if self.is_completed()? {
            return Ok(false);
        }
        if !self.probe.file_exists(location) {
            info!(
                event = "fresh_install",
                legacy_path = %location.display(),
                "no legacy store found; marking migration completed"
            );
            self.mark_completed()?;
            return Ok(false);
        }
        Ok(true)
    }

    pub fn mark_completed(&self) -> Result<(), TrackerError> {
        self.flags.store(CompletionFlag {
            completed: true,
            version: COMPLETED_VERSION,
        })?;
        Ok(())
    }

    /// Clears flag and version. Only meant for tests and manual recovery.
    pub fn reset(&self) -> Result<(), TrackerError> {
        self.flags.store(CompletionFlag::default())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_storage::{FileFlagStore, MemoryFlagStore};
    use std::cell::Cell;
    use std::path::PathBuf;

    struct CountingProbe {
        exists: bool,
        calls: Cell<usize>,
    }

    impl CountingProbe {
        fn new(exists: bool) -> Self {
            Self {
                exists,
                calls: Cell::new(0),
            }
        }
    }

    impl PresenceProbe for &CountingProbe {
        fn file_exists(&self, _location: &Path) -> bool {
            self.calls.set(self.calls.get() + 1);
            self.exists
        }
    }

    fn legacy_path() -> PathBuf {
        PathBuf::from("/nonexistent/shelf/legacy.json")
    }

    #[test]
    fn fresh_install_completes_without_rechecking_filesystem() {
        let probe = CountingProbe::new(false);
        let tracker = MigrationTracker::with_probe(MemoryFlagStore::default(), &probe);

        assert!(!tracker.requires_migration(&legacy_path()).expect("first check"));
        assert!(tracker.is_completed().expect("completed"));
        assert_eq!(tracker.flag().expect("flag").version, COMPLETED_VERSION);
        assert_eq!(probe.calls.get(), 1);

        assert!(!tracker.requires_migration(&legacy_path()).expect("second check"));
        assert!(tracker.is_completed().expect("still completed"));
        assert_eq!(probe.calls.get(), 1);
    }

    #[test]
    fn existing_legacy_store_keeps_migration_pending() {
        let probe = CountingProbe::new(true);
        let tracker = MigrationTracker::with_probe(MemoryFlagStore::default(), &probe);

        assert!(tracker.requires_migration(&legacy_path()).expect("check"));
        assert!(tracker.requires_migration(&legacy_path()).expect("check again"));
        assert!(!tracker.is_completed().expect("not completed"));
        assert_eq!(tracker.flag().expect("flag").version, 0);
    }

    #[test]
    fn mark_completed_is_idempotent() {
        let tracker = MigrationTracker::new(MemoryFlagStore::default());
        for _ in 0..2 {
            tracker.mark_completed().expect("mark");
            assert_eq!(
                tracker.flag().expect("flag"),
                CompletionFlag {
                    completed: true,
                    version: COMPLETED_VERSION
                }
            );
        }
    }

    #[test]
    fn completed_tracker_never_requires_migration() {
        let probe = CountingProbe::new(true);
        let tracker = MigrationTracker::with_probe(MemoryFlagStore::default(), &probe);
        tracker.mark_completed().expect("mark");

        assert!(!tracker.requires_migration(&legacy_path()).expect("check"));
        assert_eq!(probe.calls.get(), 0);
    }

    #[test]
    fn reset_clears_flag_and_version() {
        let tracker = MigrationTracker::new(MemoryFlagStore::default());
        tracker.mark_completed().expect("mark");
        tracker.reset().expect("reset");
        assert_eq!(tracker.flag().expect("flag"), CompletionFlag::default());
    }

    #[test]
    fn real_filesystem_probe_sees_legacy_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let legacy = dir.path().join("legacy.json");
        let tracker = MigrationTracker::new(FileFlagStore::new(dir.path().join("flag.json")));

        std::fs::write(&legacy, "{}").expect("write legacy");
        assert!(tracker.requires_migration(&legacy).expect("pending"));

        std::fs::remove_file(&legacy).expect("remove legacy");
        assert!(!tracker.requires_migration(&legacy).expect("fresh"));

        let reopened = MigrationTracker::new(FileFlagStore::new(dir.path().join("flag.json")));
        assert!(reopened.is_completed().expect("persisted"));
    }
}
