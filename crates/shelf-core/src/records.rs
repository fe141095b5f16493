use crate::ReadingStatus;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A book as the legacy object store hands it out. Every field is optional
/// because the old store never enforced its schema; a value of the wrong
/// shape reads as absent so the record is skipped by conversion instead of
/// failing the whole snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegacyBookRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub price: Option<i64>,
    #[serde(default, rename = "affiliateUrl", deserialize_with = "lenient")]
    pub affiliate_url: Option<String>,
    #[serde(default, rename = "imageUrl", deserialize_with = "lenient")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub isbn: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub publisher: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub caption: Option<String>,
    #[serde(default, rename = "salesDate", deserialize_with = "lenient")]
    pub sales_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub bought: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, rename = "readAt", deserialize_with = "lenient")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "createdAt", deserialize_with = "lenient")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "updatedAt", deserialize_with = "lenient")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_tag_refs")]
    pub tags: Vec<LegacyTagRef>,
}

/// Owning side of the book/tag relationship. Only the id is kept; the
/// inverse tag -> books edge is never materialised.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegacyTagRef {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegacyTagRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, rename = "createdAt", deserialize_with = "lenient")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "updatedAt", deserialize_with = "lenient")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Reads any JSON value and keeps it only if it has the expected type.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value::<T>(value).ok())
}

/// Non-list relationship values read as "no tags"; non-object entries read
/// as a reference without an id.
fn lenient_tag_refs<'de, D>(deserializer: D) -> Result<Vec<LegacyTagRef>, D::Error>
where
    D: Deserializer<'de>,
{
    let refs = match Value::deserialize(deserializer)? {
        Value::Array(values) => values
            .into_iter()
            .map(|value| serde_json::from_value::<LegacyTagRef>(value).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    };
    Ok(refs)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookRow {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub price: i64,
    pub affiliate_url: Option<String>,
    pub image_url: String,
    pub isbn: String,
    pub publisher: String,
    pub caption: Option<String>,
    pub sales_date: String,
    pub bought: bool,
    pub note: String,
    pub status: ReadingStatus,
    /// Set iff `status` is `Read`.
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookTagRow {
    pub id: Uuid,
    pub book_id: Uuid,
    pub tag_id: Uuid,
}

impl BookTagRow {
    pub fn new(book_id: Uuid, tag_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id,
            tag_id,
        }
    }
}
