use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod document;
mod schema;

pub use document::{DOCUMENT_VERSION, Document, DocumentError, KindTag, NodeRecord};

const SCHEMA_VERSION: u32 = 1;

/// Key the current map lives under in the local store.
pub const DOCUMENT_KEY: &str = "mindmap.document";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
    #[error("Other error: {0}")]
    Other(String),
}

/// Where a session reads its initial map from and auto-saves to.
pub trait LocalStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&mut self) -> Result<Option<Document>, StorageError>;
    fn save(&mut self, document: &Document) -> Result<(), StorageError>;
}

/// SQLite-backed key/value store.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        // A second process (the CLI, say) may hold the file briefly.
        let _ = conn.busy_timeout(Duration::from_millis(2_500));
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let storage = Self { conn };
        storage.init()?;
        Ok(storage)
    }

    pub fn new_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Self { conn };
        storage.init()?;
        Ok(storage)
    }

    fn init(&self) -> Result<(), StorageError> {
        schema::create_tables(&self.conn)?;
        schema::create_indexes(&self.conn)?;
        schema::apply_schema_migrations(self)
    }

    fn schema_version(&self) -> Result<u32, StorageError> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version.max(0) as u32)
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StorageError> {
        self.conn
            .pragma_update(None, "user_version", version.to_string())?;
        Ok(())
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn updated_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT updated_at FROM kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StorageError::Other(format!("bad timestamp for {key}: {e}")))
        })
        .transpose()
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let removed = self
            .conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    pub fn save_document(&self, document: &Document) -> Result<(), StorageError> {
        let json = document.to_json()?;
        self.put(DOCUMENT_KEY, &json)?;
        tracing::debug!(
            "saved document {} ({} nodes, {} edges)",
            document.document_id,
            document.node_count(),
            document.edge_count()
        );
        Ok(())
    }

    /// Absent and empty values both read as "nothing saved".
    pub fn load_document(&self) -> Result<Option<Document>, StorageError> {
        match self.get(DOCUMENT_KEY)? {
            Some(json) if !json.trim().is_empty() => Ok(Some(Document::from_json(&json)?)),
            _ => Ok(None),
        }
    }
}

impl LocalStore for Storage {
    fn load(&mut self) -> Result<Option<Document>, StorageError> {
        self.load_document()
    }

    fn save(&mut self, document: &Document) -> Result<(), StorageError> {
        self.save_document(document)
    }
}

#[cfg(test)]
mod tests;
