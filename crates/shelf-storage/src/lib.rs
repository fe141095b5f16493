pub mod flags;
pub mod legacy;

pub use flags::{FileFlagStore, MemoryFlagStore};
pub use legacy::{JsonLegacyStore, LegacySnapshot, MemoryLegacyStore};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use shelf_core::{
    BookRow, BookTagRow, ReadingStatus, StoreError, TagRow, TargetStore, TargetTransaction,
};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

pub const LIBRARY_SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("timestamp parse error: {0}")]
    Timestamp(String),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(err.to_string())
            }
            StorageError::Io(_) => StoreError::Io(err.to_string()),
            StorageError::Serialization(_) | StorageError::Timestamp(_) => {
                StoreError::Decode(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

/// The relational target store: books, tags and the `book_tags` join table.
pub struct LibraryStore {
    conn: Connection,
}

impl LibraryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StorageError> {
        let current = self.schema_version()?;
        if current > LIBRARY_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: current,
                supported: LIBRARY_SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!("../migrations/0001_library_schema.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 1", [])
                .map(|_| ())?;
        }

        Ok(())
    }

    pub fn book_count(&self) -> Result<i64, StorageError> {
        self.count("SELECT COUNT(*) FROM books")
    }

    pub fn tag_count(&self) -> Result<i64, StorageError> {
        self.count("SELECT COUNT(*) FROM tags")
    }

    pub fn association_count(&self) -> Result<i64, StorageError> {
        self.count("SELECT COUNT(*) FROM book_tags")
    }

    /// Join rows whose tag or book is missing. Always zero while foreign
    /// keys are enforced; kept as an integrity probe for tests and tooling.
    pub fn dangling_association_count(&self) -> Result<i64, StorageError> {
        self.count(
            "
            SELECT COUNT(*) FROM book_tags bt
            LEFT JOIN tags t ON t.id = bt.tag_id
            LEFT JOIN books b ON b.id = bt.book_id
            WHERE t.id IS NULL OR b.id IS NULL
            ",
        )
    }

    fn count(&self, sql: &str) -> Result<i64, StorageError> {
        Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
    }

    pub fn book(&self, id: Uuid) -> Result<Option<BookRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT id, title, author, price, affiliate_url, image_url, isbn, publisher,
                       caption, sales_date, bought, note, status, read_at, created_at, updated_at
                FROM books
                WHERE id = ?1
                ",
                [id.to_string()],
                |row| {
                    let status: String = row.get(12)?;
                    let status = status.parse::<ReadingStatus>().map_err(|err| {
                        rusqlite::Error::FromSqlConversionFailure(
                            12,
                            rusqlite::types::Type::Text,
                            err.into(),
                        )
                    })?;
                    let read_at = row
                        .get::<_, Option<String>>(13)?
                        .map(|value| column_timestamp(13, value))
                        .transpose()?;

                    Ok(BookRow {
                        id: column_uuid(0, row.get(0)?)?,
                        title: row.get(1)?,
                        author: row.get(2)?,
                        price: row.get(3)?,
                        affiliate_url: row.get(4)?,
                        image_url: row.get(5)?,
                        isbn: row.get(6)?,
                        publisher: row.get(7)?,
                        caption: row.get(8)?,
                        sales_date: row.get(9)?,
                        bought: row.get(10)?,
                        note: row.get(11)?,
                        status,
                        read_at,
                        created_at: column_timestamp(14, row.get(14)?)?,
                        updated_at: column_timestamp(15, row.get(15)?)?,
                    })
                },
            )
            .optional()?;

        Ok(row)
    }

    pub fn tag(&self, id: Uuid) -> Result<Option<TagRow>, StorageError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, created_at, updated_at FROM tags WHERE id = ?1",
                [id.to_string()],
                |row| {
                    Ok(TagRow {
                        id: column_uuid(0, row.get(0)?)?,
                        name: row.get(1)?,
                        created_at: column_timestamp(2, row.get(2)?)?,
                        updated_at: column_timestamp(3, row.get(3)?)?,
                    })
                },
            )
            .optional()?;

        Ok(row)
    }

    pub fn tag_ids_for_book(&self, book_id: Uuid) -> Result<Vec<Uuid>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag_id FROM book_tags WHERE book_id = ?1 ORDER BY tag_id ASC")?;
        let rows = stmt.query_map([book_id.to_string()], |row| column_uuid(0, row.get(0)?))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool, StorageError> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table_name],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(exists)
    }
}

impl TargetStore for LibraryStore {
    fn write(
        &mut self,
        body: &mut dyn FnMut(&mut dyn TargetTransaction) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction().map_err(StorageError::from)?;
        {
            let mut handle = SqliteTransaction { conn: &tx };
            body(&mut handle)?;
        }
        // Dropping `tx` on the error path above rolls everything back.
        tx.commit().map_err(StorageError::from)?;
        Ok(())
    }
}

struct SqliteTransaction<'conn> {
    conn: &'conn Connection,
}

impl SqliteTransaction<'_> {
    fn execute(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(StorageError::from)?;
        stmt.execute(params).map_err(StorageError::from)?;
        Ok(())
    }
}

impl TargetTransaction for SqliteTransaction<'_> {
    fn insert_tag(&mut self, tag: &TagRow) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO tags (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                tag.id.to_string(),
                tag.name,
                tag.created_at.to_rfc3339(),
                tag.updated_at.to_rfc3339(),
            ],
        )
    }

    fn insert_book(&mut self, book: &BookRow) -> Result<(), StoreError> {
        self.execute(
            "
            INSERT INTO books (
                id,
                title,
                author,
                price,
                affiliate_url,
                image_url,
                isbn,
                publisher,
                caption,
                sales_date,
                bought,
                note,
                status,
                read_at,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ",
            params![
                book.id.to_string(),
                book.title,
                book.author,
                book.price,
                book.affiliate_url,
                book.image_url,
                book.isbn,
                book.publisher,
                book.caption,
                book.sales_date,
                book.bought,
                book.note,
                book.status.as_str(),
                book.read_at.map(|read_at| read_at.to_rfc3339()),
                book.created_at.to_rfc3339(),
                book.updated_at.to_rfc3339(),
            ],
        )
    }

    fn insert_association(&mut self, link: &BookTagRow) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO book_tags (id, book_id, tag_id) VALUES (?1, ?2, ?3)",
            params![
                link.id.to_string(),
                link.book_id.to_string(),
                link.tag_id.to_string(),
            ],
        )
    }
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| StorageError::Timestamp(err.to_string()))
}

fn column_timestamp(index: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    parse_timestamp(value).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })
}

fn column_uuid(index: usize, value: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })
}
