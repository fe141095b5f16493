use crate::config::{ConfigError, MigrationConfig};
use crate::progress::{ProgressCounter, ProgressReporter};
use serde::Serialize;
use shelf_core::{
    association_rows, convert_books, convert_tags, extract_associations, filter_to_known_tags,
    LegacyStoreReader, SkippedRecord, StoreError, TargetStore, TargetTransaction,
};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_PROGRESS_STRIDE: usize = 10;

const DEFAULT_STRIDE: NonZeroUsize = match NonZeroUsize::new(DEFAULT_PROGRESS_STRIDE) {
    Some(stride) => stride,
    None => panic!("DEFAULT_PROGRESS_STRIDE must be non-zero"),
};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("reading legacy store failed: {0}")]
    Read(#[source] StoreError),
    #[error("writing target store failed: {0}")]
    Write(#[source] StoreError),
}

impl MigrationError {
    pub fn cause(&self) -> &StoreError {
        match self {
            MigrationError::Read(err) | MigrationError::Write(err) => err,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub books_converted: usize,
    pub books_skipped: usize,
    pub tags_converted: usize,
    pub tags_skipped: usize,
    pub associations: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl MigrationReport {
    pub fn rows_written(&self) -> usize {
        self.books_converted + self.tags_converted + self.associations
    }
}

/// Moves a whole legacy snapshot into the target store in one transaction.
///
/// Not retried here and not idempotent: a second run against a populated
/// target fails on primary keys, so callers gate it through the tracker.
#[derive(Debug, Clone)]
pub struct Migrator {
    progress_stride: NonZeroUsize,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new(DEFAULT_STRIDE)
    }
}

impl Migrator {
    pub fn new(progress_stride: NonZeroUsize) -> Self {
        Self { progress_stride }
    }

    /// Same stride rule as [`MigrationConfig::validate`]: zero is rejected.
    pub fn from_config(config: &MigrationConfig) -> Result<Self, ConfigError> {
        NonZeroUsize::new(config.progress_stride)
            .map(Self::new)
            .ok_or(ConfigError::InvalidStride)
    }

    pub fn progress_stride(&self) -> usize {
        self.progress_stride.get()
    }

    pub fn migrate<L, T>(
        &self,
        legacy: &L,
        target: &mut T,
        progress: &ProgressReporter,
    ) -> Result<MigrationReport, MigrationError>
    where
        L: LegacyStoreReader + ?Sized,
        T: TargetStore + ?Sized,
    {
        let legacy_books = legacy.fetch_all_books().map_err(MigrationError::Read)?;
        let legacy_tags = legacy.fetch_all_tags().map_err(MigrationError::Read)?;
        info!(
            event = "migration_extract",
            books = legacy_books.len(),
            tags = legacy_tags.len()
        );

        let (books, skipped_books) = convert_books(&legacy_books);
        let (tags, skipped_tags) = convert_tags(&legacy_tags);
        for skipped in skipped_books.iter().chain(skipped_tags.iter()) {
            warn!(
                event = "record_skipped",
                kind = %skipped.kind,
                legacy_id = ?skipped.legacy_id,
                reason = %skipped.error
            );
        }

        // Links come from the legacy graph, then lose anything whose book or
        // tag did not survive conversion.
        let known_books = books.iter().map(|book| book.id).collect::<BTreeSet<_>>();
        let known_tags = tags.iter().map(|tag| tag.id).collect::<BTreeSet<_>>();
        let links = filter_to_known_tags(
            extract_associations(&legacy_books),
            &known_books,
            &known_tags,
        );
        let associations = association_rows(&links);

        let report = MigrationReport {
            books_converted: books.len(),
            books_skipped: skipped_books.len(),
            tags_converted: tags.len(),
            tags_skipped: skipped_tags.len(),
            associations: associations.len(),
            skipped: skipped_tags.into_iter().chain(skipped_books).collect(),
        };
        info!(
            event = "migration_convert",
            books_converted = report.books_converted,
            books_skipped = report.books_skipped,
            tags_converted = report.tags_converted,
            tags_skipped = report.tags_skipped,
            associations = report.associations
        );

        let total = report.rows_written();
        let mut counter = ProgressCounter::new(progress, self.progress_stride, total);
        target
            .write(&mut |tx: &mut dyn TargetTransaction| {
                counter.restart();
                for (index, tag) in tags.iter().enumerate() {
                    tx.insert_tag(tag)?;
                    counter.row_written(index + 1, tags.len());
                }
                debug!(event = "migration_tags_written", rows = tags.len());
                for (index, book) in books.iter().enumerate() {
                    tx.insert_book(book)?;
                    counter.row_written(index + 1, books.len());
                }
                debug!(event = "migration_books_written", rows = books.len());
                for (index, link) in associations.iter().enumerate() {
                    tx.insert_association(link)?;
                    counter.row_written(index + 1, associations.len());
                }
                Ok(())
            })
            .map_err(|err| {
                warn!(event = "migration_rolled_back", error = %err);
                MigrationError::Write(err)
            })?;

        counter.finish();
        info!(event = "migration_committed", rows = total);
        Ok(report)
    }
}
