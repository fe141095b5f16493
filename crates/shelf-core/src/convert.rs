//! Legacy record -> target row conversion.
//!
//! Conversion is total: every input yields either a row or one of the two
//! [`ConversionError`] kinds. Callers skip failed records and keep going.

use crate::records::{BookRow, LegacyBookRecord, LegacyTagRecord, TagRow};
use crate::ReadingStatus;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum ConversionError {
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),
    #[error("invalid status value: {0}")]
    InvalidStatusValue(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Book,
    Tag,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Book => "book",
            RecordKind::Tag => "tag",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A legacy record that did not make it into the target store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub kind: RecordKind,
    pub legacy_id: Option<Uuid>,
    pub error: ConversionError,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ConversionError> {
    value.ok_or(ConversionError::MissingRequiredField(field))
}

pub fn convert_book(legacy: &LegacyBookRecord) -> Result<BookRow, ConversionError> {
    let id = required(legacy.id, "id")?;
    let title = required(legacy.title.clone(), "title")?;
    let author = required(legacy.author.clone(), "author")?;
    let price = required(legacy.price, "price")?;
    let image_url = required(legacy.image_url.clone(), "image_url")?;
    let isbn = required(legacy.isbn.clone(), "isbn")?;
    let publisher = required(legacy.publisher.clone(), "publisher")?;
    let sales_date = required(legacy.sales_date.clone(), "sales_date")?;
    let created_at = required(legacy.created_at, "created_at")?;
    let updated_at = required(legacy.updated_at, "updated_at")?;

    let status = match legacy.status.as_deref() {
        None => ReadingStatus::Unread,
        Some(raw) => raw
            .parse::<ReadingStatus>()
            .map_err(|_| ConversionError::InvalidStatusValue(raw.to_string()))?,
    };
    // A "read" book must carry its read date; there is no sensible default.
    let read_at = match status {
        ReadingStatus::Read => Some(required(legacy.read_at, "read_at")?),
        ReadingStatus::Unread | ReadingStatus::Reading => None,
    };

    Ok(BookRow {
        id,
        title,
        author,
        price,
        affiliate_url: legacy.affiliate_url.clone(),
        image_url,
        isbn,
        publisher,
        caption: legacy.caption.clone(),
        sales_date,
        bought: legacy.bought.unwrap_or(false),
        note: legacy.note.clone().unwrap_or_default(),
        status,
        read_at,
        created_at,
        updated_at,
    })
}

pub fn convert_tag(legacy: &LegacyTagRecord) -> Result<TagRow, ConversionError> {
    Ok(TagRow {
        id: required(legacy.id, "id")?,
        name: required(legacy.name.clone(), "name")?,
        created_at: required(legacy.created_at, "created_at")?,
        updated_at: required(legacy.updated_at, "updated_at")?,
    })
}

/// Converts every book independently, preserving input order in both halves.
pub fn convert_books(legacy: &[LegacyBookRecord]) -> (Vec<BookRow>, Vec<SkippedRecord>) {
    let mut rows = Vec::with_capacity(legacy.len());
    let mut skipped = Vec::new();
    for record in legacy {
        match convert_book(record) {
            Ok(row) => rows.push(row),
            Err(error) => skipped.push(SkippedRecord {
                kind: RecordKind::Book,
                legacy_id: record.id,
                error,
            }),
        }
    }
    (rows, skipped)
}

pub fn convert_tags(legacy: &[LegacyTagRecord]) -> (Vec<TagRow>, Vec<SkippedRecord>) {
    let mut rows = Vec::with_capacity(legacy.len());
    let mut skipped = Vec::new();
    for record in legacy {
        match convert_tag(record) {
            Ok(row) => rows.push(row),
            Err(error) => skipped.push(SkippedRecord {
                kind: RecordKind::Tag,
                legacy_id: record.id,
                error,
            }),
        }
    }
    (rows, skipped)
}
