//! One-shot migration of a user's library from the legacy record store into
//! the relational library store.

pub mod config;
pub mod orchestrator;
pub mod progress;
pub mod tracker;

pub use config::{ConfigError, MigrationConfig};
pub use orchestrator::{MigrationError, MigrationReport, Migrator, DEFAULT_PROGRESS_STRIDE};
pub use progress::{MigrationProgress, ProgressReporter};
pub use tracker::{MigrationTracker, TrackerError, COMPLETED_VERSION};

use shelf_core::{FlagStore, FsProbe, LegacyStoreReader, PresenceProbe, TargetStore};
use shelf_storage::{FileFlagStore, JsonLegacyStore, LibraryStore, StorageError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
}

/// Surface the UI layer drives: ask whether a migration is pending, size a
/// progress bar, run it, and record completion.
pub struct MigrationService<L, T, F, P = FsProbe> {
    legacy_location: PathBuf,
    legacy: L,
    target: T,
    tracker: MigrationTracker<F, P>,
    migrator: Migrator,
}

pub type FileMigrationService = MigrationService<JsonLegacyStore, LibraryStore, FileFlagStore>;

impl FileMigrationService {
    pub fn open(config: &MigrationConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let migrator = Migrator::from_config(config)?;
        let target = LibraryStore::open(&config.target_path)?;
        Ok(MigrationService::new(
            config.legacy_path.clone(),
            JsonLegacyStore::new(&config.legacy_path),
            target,
            MigrationTracker::new(FileFlagStore::new(&config.flag_path)),
            migrator,
        ))
    }
}

impl<L, T, F, P> MigrationService<L, T, F, P>
where
    L: LegacyStoreReader,
    T: TargetStore,
    F: FlagStore,
    P: PresenceProbe,
{
    pub fn new(
        legacy_location: impl Into<PathBuf>,
        legacy: L,
        target: T,
        tracker: MigrationTracker<F, P>,
        migrator: Migrator,
    ) -> Self {
        Self {
            legacy_location: legacy_location.into(),
            legacy,
            target,
            tracker,
            migrator,
        }
    }

    pub fn legacy_location(&self) -> &Path {
        &self.legacy_location
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn tracker(&self) -> &MigrationTracker<F, P> {
        &self.tracker
    }

    pub fn requires_migration(&self) -> Result<bool, TrackerError> {
        self.tracker.requires_migration(&self.legacy_location)
    }

    /// Legacy books waiting to be migrated.
    pub fn book_count(&self) -> Result<usize, MigrationError> {
        self.legacy
            .fetch_all_books()
            .map(|books| books.len())
            .map_err(MigrationError::Read)
    }

    /// Runs the migration without touching the completion flag.
    pub fn perform_migration(
        &mut self,
        progress: &ProgressReporter,
    ) -> Result<MigrationReport, MigrationError> {
        self.migrator
            .migrate(&self.legacy, &mut self.target, progress)
    }

    pub fn mark_completed(&self) -> Result<(), TrackerError> {
        self.tracker.mark_completed()
    }

    /// Performs the migration if one is pending and marks completion only
    /// once the write has committed. `None` means nothing had to run.
    pub fn run_if_required(
        &mut self,
        progress: &ProgressReporter,
    ) -> Result<Option<MigrationReport>, ServiceError> {
        if !self.requires_migration()? {
            info!(event = "migration_not_required");
            return Ok(None);
        }
        let report = self.perform_migration(progress)?;
        self.mark_completed()?;
        info!(
            event = "migration_completed",
            books = report.books_converted,
            tags = report.tags_converted,
            associations = report.associations
        );
        Ok(Some(report))
    }
}
