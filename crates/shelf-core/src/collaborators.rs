//! Seams between the migration engine and the stores it talks to.

use crate::records::{BookRow, BookTagRow, LegacyBookRecord, LegacyTagRecord, TagRow};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// Read side of the legacy object store.
///
/// Both lists come from one consistent snapshot, newest `created_at` first.
pub trait LegacyStoreReader {
    fn fetch_all_books(&self) -> Result<Vec<LegacyBookRecord>, StoreError>;
    fn fetch_all_tags(&self) -> Result<Vec<LegacyTagRecord>, StoreError>;
}

/// Insert handle valid for the duration of one [`TargetStore::write`] body.
pub trait TargetTransaction {
    fn insert_tag(&mut self, tag: &TagRow) -> Result<(), StoreError>;
    fn insert_book(&mut self, book: &BookRow) -> Result<(), StoreError>;
    fn insert_association(&mut self, link: &BookTagRow) -> Result<(), StoreError>;
}

pub trait TargetStore {
    /// Runs `body` inside a single transaction. Commits if `body` returns
    /// `Ok`, otherwise nothing written by `body` survives.
    fn write(
        &mut self,
        body: &mut dyn FnMut(&mut dyn TargetTransaction) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionFlag {
    pub completed: bool,
    pub version: i64,
}

/// Durable per-install key/value pair backing the migration tracker.
pub trait FlagStore {
    fn load(&self) -> Result<CompletionFlag, StoreError>;
    fn store(&self, flag: CompletionFlag) -> Result<(), StoreError>;
}

pub trait PresenceProbe {
    fn file_exists(&self, location: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl PresenceProbe for FsProbe {
    fn file_exists(&self, location: &Path) -> bool {
        location.is_file()
    }
}
