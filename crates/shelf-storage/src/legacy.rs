//! Readers for the legacy record store.
//!
//! The legacy store is exported as one JSON document:
//! `{ "books": [...], "tags": [...] }`, books carrying `tags: [{ "id": .. }]`
//! references. Both lists are returned newest first.

use crate::StorageError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shelf_core::{LegacyBookRecord, LegacyStoreReader, LegacyTagRecord, StoreError};
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LegacySnapshot {
    #[serde(default)]
    pub books: Vec<LegacyBookRecord>,
    #[serde(default)]
    pub tags: Vec<LegacyTagRecord>,
}

impl LegacySnapshot {
    /// Orders both lists by `created_at` descending. Records without a
    /// creation time sort last; ties keep their original order.
    pub fn sorted(mut self) -> Self {
        self.books.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.tags.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self
    }

    /// Only the document shape is strict. Each entry decodes on its own, and
    /// an entry that is not an object becomes an empty record, so conversion
    /// skips it instead of the whole snapshot failing.
    pub fn parse_json(raw: &str) -> Result<Self, StorageError> {
        let document = serde_json::from_str::<RawSnapshot>(raw)
            .map_err(|err| StorageError::Serialization(format!("legacy snapshot: {err}")))?;
        let snapshot = Self {
            books: decode_entries(document.books),
            tags: decode_entries(document.tags),
        };
        Ok(snapshot.sorted())
    }
}

#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    books: Vec<Value>,
    #[serde(default)]
    tags: Vec<Value>,
}

fn decode_entries<T>(entries: Vec<Value>) -> Vec<T>
where
    T: DeserializeOwned + Default,
{
    entries
        .into_iter()
        .map(|entry| match serde_json::from_value::<T>(entry) {
            Ok(record) => record,
            Err(err) => {
                warn!(event = "legacy_entry_unreadable", error = %err);
                T::default()
            }
        })
        .collect()
}

/// Reads a JSON export of the legacy store. The file is loaded once, on the
/// first fetch, so books and tags always come from the same snapshot.
pub struct JsonLegacyStore {
    path: PathBuf,
    snapshot: OnceCell<LegacySnapshot>,
}

impl JsonLegacyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot(&self) -> Result<&LegacySnapshot, StoreError> {
        if let Some(snapshot) = self.snapshot.get() {
            return Ok(snapshot);
        }
        let raw = fs::read_to_string(&self.path).map_err(StorageError::from)?;
        let loaded = LegacySnapshot::parse_json(&raw)?;
        Ok(self.snapshot.get_or_init(|| loaded))
    }
}

impl LegacyStoreReader for JsonLegacyStore {
    fn fetch_all_books(&self) -> Result<Vec<LegacyBookRecord>, StoreError> {
        Ok(self.snapshot()?.books.clone())
    }

    fn fetch_all_tags(&self) -> Result<Vec<LegacyTagRecord>, StoreError> {
        Ok(self.snapshot()?.tags.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLegacyStore {
    snapshot: LegacySnapshot,
}

impl MemoryLegacyStore {
    pub fn new(books: Vec<LegacyBookRecord>, tags: Vec<LegacyTagRecord>) -> Self {
        Self {
            snapshot: LegacySnapshot { books, tags }.sorted(),
        }
    }
}

impl LegacyStoreReader for MemoryLegacyStore {
    fn fetch_all_books(&self) -> Result<Vec<LegacyBookRecord>, StoreError> {
        Ok(self.snapshot.books.clone())
    }

    fn fetch_all_tags(&self) -> Result<Vec<LegacyTagRecord>, StoreError> {
        Ok(self.snapshot.tags.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use uuid::Uuid;

    const SNAPSHOT: &str = r#"{
        "books": [
            {"id": "00000000-0000-4000-8000-000000000001", "title": "older",
             "createdAt": "2023-01-01T00:00:00Z"},
            {"id": "00000000-0000-4000-8000-000000000002", "title": "undated"},
            {"id": "00000000-0000-4000-8000-000000000003", "title": "newer",
             "createdAt": "2024-06-01T00:00:00Z",
             "tags": [{"id": "00000000-0000-4000-8000-0000000000aa"}]}
        ],
        "tags": [
            {"id": "00000000-0000-4000-8000-0000000000aa", "name": "fiction",
             "createdAt": "2023-05-01T00:00:00Z", "updatedAt": "2023-05-01T00:00:00Z"}
        ]
    }"#;

    fn write_snapshot(raw: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(raw.as_bytes()).expect("write snapshot");
        file
    }

    #[test]
    fn json_store_returns_newest_first_with_undated_last() {
        let file = write_snapshot(SNAPSHOT);
        let store = JsonLegacyStore::new(file.path());

        let titles = store
            .fetch_all_books()
            .expect("books")
            .into_iter()
            .map(|book| book.title.unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["newer", "older", "undated"]);

        let tags = store.fetch_all_tags().expect("tags");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name.as_deref(), Some("fiction"));
    }

    #[test]
    fn json_store_keeps_relationship_refs() {
        let file = write_snapshot(SNAPSHOT);
        let store = JsonLegacyStore::new(file.path());
        let books = store.fetch_all_books().expect("books");
        let tag_id = Uuid::parse_str("00000000-0000-4000-8000-0000000000aa").expect("uuid");
        assert_eq!(books[0].tags.len(), 1);
        assert_eq!(books[0].tags[0].id, Some(tag_id));
    }

    #[test]
    fn json_store_serves_one_snapshot_even_if_file_changes() {
        let file = write_snapshot(SNAPSHOT);
        let store = JsonLegacyStore::new(file.path());
        assert_eq!(store.fetch_all_books().expect("books").len(), 3);

        std::fs::write(file.path(), r#"{"books": [], "tags": []}"#).expect("overwrite");
        assert_eq!(store.fetch_all_books().expect("books").len(), 3);
        assert_eq!(store.fetch_all_tags().expect("tags").len(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = JsonLegacyStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.fetch_all_books(), Err(StoreError::Io(_))));
    }

    #[test]
    fn malformed_snapshot_is_a_decode_error() {
        let file = write_snapshot("{ not json");
        let store = JsonLegacyStore::new(file.path());
        assert!(matches!(store.fetch_all_tags(), Err(StoreError::Decode(_))));
    }

    #[test]
    fn malformed_entries_do_not_sink_the_snapshot() {
        let file = write_snapshot(
            r#"{
                "books": [
                    {"id": "legacy-7", "title": "bad id"},
                    {"id": "00000000-0000-4000-8000-000000000004", "price": "12.00",
                     "createdAt": "2024-02-01T00:00:00Z"},
                    42,
                    {"id": "00000000-0000-4000-8000-000000000005", "createdAt": "soon"}
                ],
                "tags": ["fiction", {"id": "00000000-0000-4000-8000-0000000000bb", "name": "poetry"}]
            }"#,
        );
        let store = JsonLegacyStore::new(file.path());

        let books = store.fetch_all_books().expect("books");
        assert_eq!(books.len(), 4);
        assert!(books[0].price.is_none());
        assert!(books[0].id.is_some());
        assert_eq!(books.iter().filter(|book| book.id.is_none()).count(), 2);
        assert_eq!(
            books
                .iter()
                .filter(|book| book.title.as_deref() == Some("bad id"))
                .count(),
            1
        );

        let tags = store.fetch_all_tags().expect("tags");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.iter().filter(|tag| tag.id.is_none()).count(), 1);
    }

    #[test]
    fn memory_store_sorts_on_construction() {
        let store = MemoryLegacyStore::new(
            vec![
                LegacyBookRecord {
                    title: Some("a".to_string()),
                    ..LegacyBookRecord::default()
                },
                LegacyBookRecord {
                    title: Some("b".to_string()),
                    created_at: Some(chrono::Utc::now()),
                    ..LegacyBookRecord::default()
                },
            ],
            Vec::new(),
        );
        let books = store.fetch_all_books().expect("books");
        assert_eq!(books[0].title.as_deref(), Some("b"));
        assert_eq!(books[1].title.as_deref(), Some("a"));
    }
}
