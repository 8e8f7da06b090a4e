//! Document store backends: process-local memory and SQLite.
//!
//! SQLite keeps one row per document with the JSON body as text. Merging
//! happens in Rust before the upsert, so both backends share the same
//! merge semantics.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use fathom_core::FathomError;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::cache::{Document, DocumentStore};

/// Overlay `incoming` onto `existing` field by field.
fn merge_into(existing: &mut Document, incoming: Document) {
    for (field, value) in incoming {
        existing.insert(field, value);
    }
}

/// In-memory store, used when persistence is disabled and in tests.
///
/// # Examples
///
/// ```
/// use fathom_repo::store::MemoryStore;
///
/// let store = MemoryStore::new();
/// assert!(store.is_empty());
/// ```
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Document>, FathomError> {
        let docs = self
            .docs
            .lock()
            .map_err(|_| FathomError::Store("memory store lock poisoned".into()))?;
        Ok(docs.get(key).cloned())
    }

    async fn put(&self, key: &str, document: Document, merge: bool) -> Result<(), FathomError> {
        let mut docs = self
            .docs
            .lock()
            .map_err(|_| FathomError::Store("memory store lock poisoned".into()))?;
        match docs.get_mut(key) {
            Some(existing) if merge => merge_into(existing, document),
            _ => {
                docs.insert(key.to_string(), document);
            }
        }
        Ok(())
    }
}

/// SQLite-backed document store.
///
/// # Examples
///
/// ```
/// use fathom_repo::store::SqliteStore;
///
/// let store = SqliteStore::in_memory().unwrap();
/// assert_eq!(store.count().unwrap(), 0);
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`FathomError::Store`] if the database cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use fathom_repo::store::SqliteStore;
    ///
    /// let store = SqliteStore::open(Path::new(".fathom/cache.db")).unwrap();
    /// ```
    pub fn open(path: &Path) -> Result<Self, FathomError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    FathomError::Store(format!("failed to create cache directory: {e}"))
                })?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| FathomError::Store(format!("failed to open database: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`FathomError::Store`] if schema creation fails.
    pub fn in_memory() -> Result<Self, FathomError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            FathomError::Store(format!("failed to create in-memory database: {e}"))
        })?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), FathomError> {
        self.lock()?
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS documents (
                    key TEXT PRIMARY KEY,
                    body TEXT NOT NULL
                );
                ",
            )
            .map_err(|e| FathomError::Store(format!("failed to create schema: {e}")))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, FathomError> {
        self.conn
            .lock()
            .map_err(|_| FathomError::Store("database lock poisoned".into()))
    }

    /// Number of stored documents.
    ///
    /// # Errors
    ///
    /// Returns [`FathomError::Store`] on query failure.
    pub fn count(&self) -> Result<usize, FathomError> {
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(|e| FathomError::Store(format!("failed to count documents: {e}")))?;
        Ok(n as usize)
    }

    fn read(conn: &Connection, key: &str) -> Result<Option<Document>, FathomError> {
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| FathomError::Store(format!("failed to read {key}: {e}")))?;

        let Some(body) = body else {
            return Ok(None);
        };
        match serde_json::from_str::<Value>(&body)? {
            Value::Object(doc) => Ok(Some(doc)),
            _ => Err(FathomError::Store(format!("{key} is not a JSON object"))),
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Document>, FathomError> {
        let conn = self.lock()?;
        Self::read(&conn, key)
    }

    async fn put(&self, key: &str, document: Document, merge: bool) -> Result<(), FathomError> {
        let conn = self.lock()?;
        let merged = if merge {
            match Self::read(&conn, key) {
                Ok(Some(mut existing)) => {
                    merge_into(&mut existing, document);
                    existing
                }
                Ok(None) => document,
                Err(e) => {
                    tracing::warn!(%key, error = %e, "replacing unreadable document");
                    document
                }
            }
        } else {
            document
        };

        let body = serde_json::to_string(&Value::Object(merged))?;
        conn.execute(
            "INSERT INTO documents (key, body) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET body = excluded.body",
            params![key, body],
        )
        .map_err(|e| FathomError::Store(format!("failed to write {key}: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn memory_merge_preserves_unrelated_fields() {
        let store = MemoryStore::new();
        store
            .put("k", doc(&[("a", Value::from(1)), ("b", Value::from(2))]), true)
            .await
            .unwrap();
        store
            .put("k", doc(&[("b", Value::from(3))]), true)
            .await
            .unwrap();
        let got = store.get("k").await.unwrap().unwrap();
        assert_eq!(got["a"], 1);
        assert_eq!(got["b"], 3);
    }

    #[tokio::test]
    async fn memory_replace_drops_old_fields() {
        let store = MemoryStore::new();
        store.put("k", doc(&[("a", Value::from(1))]), true).await.unwrap();
        store.put("k", doc(&[("b", Value::from(2))]), false).await.unwrap();
        let got = store.get("k").await.unwrap().unwrap();
        assert!(got.get("a").is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn sqlite_roundtrip_and_merge() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get("missing").await.unwrap().is_none());

        store
            .put("repositories/a_b", doc(&[("owner", Value::from("a")), ("hits", Value::from(1))]), true)
            .await
            .unwrap();
        store
            .put("repositories/a_b", doc(&[("hits", Value::from(2))]), true)
            .await
            .unwrap();

        let got = store.get("repositories/a_b").await.unwrap().unwrap();
        assert_eq!(got["owner"], "a");
        assert_eq!(got["hits"], 2);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put("k", doc(&[("v", Value::from("x"))]), true).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let got = store.get("k").await.unwrap().unwrap();
        assert_eq!(got["v"], "x");
    }
}
