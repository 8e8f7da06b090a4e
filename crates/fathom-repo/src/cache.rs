//! TTL-bounded read-through cache over a [`DocumentStore`].
//!
//! Entries are plain JSON documents carrying a `lastUpdated` RFC 3339
//! timestamp. An entry older than the TTL is treated as absent; it is never
//! deleted here, the next successful fetch merge-writes over it.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fathom_core::FathomError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A stored document: a JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Field holding the write timestamp of a cached document.
pub const LAST_UPDATED_FIELD: &str = "lastUpdated";

/// Field holding the cached payload.
pub const PAYLOAD_FIELD: &str = "payload";

/// Hours a cached entry stays valid.
pub const CACHE_TTL_HOURS: i64 = 24;

/// Persistent key→document collaborator with a merge-write primitive.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Document>, FathomError>;

    /// Write a document. With `merge`, top-level fields of `document` replace
    /// the same fields of any existing document and all other existing fields
    /// are preserved; without it the document is replaced wholesale.
    async fn put(&self, key: &str, document: Document, merge: bool) -> Result<(), FathomError>;
}

/// What a cache entry is keyed by.
///
/// # Examples
///
/// ```
/// use fathom_repo::cache::CacheKey;
///
/// let key = CacheKey::file("octo", "demo.js", "src/app.js");
/// assert_eq!(key.document_id(), "files/octo_demo%2Ejs_src%2Fapp%2Ejs");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Branch and listing of a whole repository.
    Repository { owner: String, repo: String },
    /// Content of one file.
    File {
        owner: String,
        repo: String,
        path: String,
    },
}

impl CacheKey {
    pub fn repository(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        CacheKey::Repository {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn file(owner: impl Into<String>, repo: impl Into<String>, path: impl Into<String>) -> Self {
        CacheKey::File {
            owner: owner.into(),
            repo: repo.into(),
            path: path.into(),
        }
    }

    /// Collection the document lives in.
    pub fn collection(&self) -> &'static str {
        match self {
            CacheKey::Repository { .. } => "repositories",
            CacheKey::File { .. } => "files",
        }
    }

    /// Store key: `<collection>/<id>`. Each part is percent-encoded for `%`,
    /// `/`, `.` and `_` and the parts are joined with `_`, so distinct keys
    /// never share a document.
    pub fn document_id(&self) -> String {
        let parts: Vec<String> = match self {
            CacheKey::Repository { owner, repo } => vec![escape(owner), escape(repo)],
            CacheKey::File { owner, repo, path } => {
                vec![escape(owner), escape(repo), escape(path)]
            }
        };
        format!("{}/{}", self.collection(), parts.join("_"))
    }

    /// Descriptive fields written alongside the payload.
    fn metadata(&self) -> Document {
        let mut doc = Document::new();
        match self {
            CacheKey::Repository { owner, repo } => {
                doc.insert("owner".into(), Value::from(owner.as_str()));
                doc.insert("repo".into(), Value::from(repo.as_str()));
            }
            CacheKey::File { owner, repo, path } => {
                doc.insert("owner".into(), Value::from(owner.as_str()));
                doc.insert("repo".into(), Value::from(repo.as_str()));
                doc.insert("path".into(), Value::from(path.as_str()));
            }
        }
        doc
    }
}

fn escape(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '.' => out.push_str("%2E"),
            '_' => out.push_str("%5F"),
            _ => out.push(c),
        }
    }
    out
}

/// Read-through/write-through cache around remote fetches.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use fathom_repo::cache::{CacheKey, RepositoryCache};
/// use fathom_repo::store::MemoryStore;
///
/// # #[tokio::main]
/// # async fn main() {
/// let cache = RepositoryCache::new(Arc::new(MemoryStore::new()));
/// let key = CacheKey::repository("octo", "demo");
/// let value: u32 = cache.get_or_fetch(&key, || async { Ok(7) }).await.unwrap();
/// assert_eq!(value, 7);
/// # }
/// ```
#[derive(Clone)]
pub struct RepositoryCache {
    store: Arc<dyn DocumentStore>,
    ttl: Duration,
}

impl RepositoryCache {
    /// Cache with the standard 24 hour TTL.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            ttl: Duration::hours(CACHE_TTL_HOURS),
        }
    }

    /// Cache with a custom TTL.
    pub fn with_ttl(store: Arc<dyn DocumentStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached payload for `key` if still fresh, otherwise run
    /// `fetch`, merge-write its result and return it.
    ///
    /// Store failures never fail the call: a read failure counts as a miss
    /// and a write failure is logged. A `fetch` error propagates unchanged and
    /// leaves the stored entry untouched.
    ///
    /// # Errors
    ///
    /// Returns whatever `fetch` returns on failure.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<T, FathomError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FathomError>>,
    {
        let id = key.document_id();

        if let Some(payload) = self.lookup::<T>(&id, Utc::now()).await {
            tracing::debug!(key = %id, "cache hit");
            return Ok(payload);
        }
        tracing::debug!(key = %id, "cache miss");

        let fresh = fetch().await?;

        match serde_json::to_value(&fresh) {
            Ok(payload) => {
                let mut doc = key.metadata();
                doc.insert(PAYLOAD_FIELD.into(), payload);
                doc.insert(
                    LAST_UPDATED_FIELD.into(),
                    Value::from(Utc::now().to_rfc3339()),
                );
                if let Err(e) = self.store.put(&id, doc, true).await {
                    tracing::warn!(key = %id, error = %e, "failed to write cache entry");
                }
            }
            Err(e) => tracing::warn!(key = %id, error = %e, "failed to serialize cache payload"),
        }

        Ok(fresh)
    }

    async fn lookup<T: DeserializeOwned>(&self, id: &str, now: DateTime<Utc>) -> Option<T> {
        let doc = match self.store.get(id).await {
            Ok(Some(doc)) => doc,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %id, error = %e, "cache read failed");
                return None;
            }
        };

        if !is_fresh(&doc, now, self.ttl) {
            tracing::debug!(key = %id, "cache entry expired");
            return None;
        }

        let payload = doc.get(PAYLOAD_FIELD)?.clone();
        match serde_json::from_value(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %id, error = %e, "cached payload has unexpected shape");
                None
            }
        }
    }
}

/// Whether `doc` was written less than `ttl` before `now`.
///
/// Documents without a parseable `lastUpdated`, or stamped in the future, are
/// never fresh.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use fathom_repo::cache::{is_fresh, Document};
///
/// let now = Utc::now();
/// let mut doc = Document::new();
/// doc.insert("lastUpdated".into(), (now - Duration::hours(1)).to_rfc3339().into());
/// assert!(is_fresh(&doc, now, Duration::hours(24)));
/// assert!(!is_fresh(&doc, now, Duration::minutes(30)));
/// ```
pub fn is_fresh(doc: &Document, now: DateTime<Utc>, ttl: Duration) -> bool {
    let Some(stamp) = doc.get(LAST_UPDATED_FIELD).and_then(Value::as_str) else {
        return false;
    };
    let Ok(written) = DateTime::parse_from_rfc3339(stamp) else {
        return false;
    };
    let age = now.signed_duration_since(written.with_timezone(&Utc));
    age >= Duration::zero() && age < ttl
}
