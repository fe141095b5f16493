pub mod associations;
pub mod collaborators;
pub mod convert;
pub mod records;

pub use associations::{association_rows, extract_associations, filter_to_known_tags, TagLinks};
pub use collaborators::{
    CompletionFlag, FlagStore, FsProbe, LegacyStoreReader, PresenceProbe, StoreError, TargetStore,
    TargetTransaction,
};
pub use convert::{
    convert_book, convert_books, convert_tag, convert_tags, ConversionError, RecordKind,
    SkippedRecord,
};
pub use records::{BookRow, BookTagRow, LegacyBookRecord, LegacyTagRecord, LegacyTagRef, TagRow};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    #[default]
    Unread,
    Reading,
    Read,
}

impl ReadingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::Unread => "unread",
            ReadingStatus::Reading => "reading",
            ReadingStatus::Read => "read",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, ReadingStatus::Read)
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact match only: the legacy store always wrote lowercase values, so
/// anything else is treated as corrupt rather than normalised.
impl FromStr for ReadingStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "unread" => Ok(ReadingStatus::Unread),
            "reading" => Ok(ReadingStatus::Reading),
            "read" => Ok(ReadingStatus::Read),
            other => Err(format!("Unknown reading status: {other}")),
        }
    }
}
