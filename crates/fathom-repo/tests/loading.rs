//! Branch resolution and caching against an in-process fake host.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use fathom_core::{EntryKind, FathomError, FileContent, RepositoryRef, TreeEntry};
use fathom_repo::cache::{CacheKey, Document, DocumentStore, RepositoryCache};
use fathom_repo::host::RepositoryHost;
use fathom_repo::store::MemoryStore;
use fathom_repo::{branch, load_file, load_snapshot, tree};
use serde_json::Value;

struct FakeHost {
    default: Option<String>,
    branches: HashMap<String, Vec<TreeEntry>>,
    files: HashMap<String, String>,
    attempts: Mutex<Vec<String>>,
    content_calls: AtomicUsize,
}

impl FakeHost {
    fn new(default: Option<&str>) -> Self {
        Self {
            default: default.map(str::to_string),
            branches: HashMap::new(),
            files: HashMap::new(),
            attempts: Mutex::new(Vec::new()),
            content_calls: AtomicUsize::new(0),
        }
    }

    fn with_branch(mut self, name: &str, paths: &[&str]) -> Self {
        let entries = paths
            .iter()
            .map(|p| TreeEntry::new(*p, EntryKind::Blob))
            .collect();
        self.branches.insert(name.to_string(), entries);
        self
    }

    fn with_file(mut self, path: &str, text: &str) -> Self {
        self.files.insert(path.to_string(), text.to_string());
        self
    }

    fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositoryHost for FakeHost {
    async fn default_branch(&self, owner: &str, repo: &str) -> Result<String, FathomError> {
        self.default
            .clone()
            .ok_or_else(|| FathomError::TransientTransport(format!("{owner}/{repo}: offline")))
    }

    async fn list_tree(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<TreeEntry>, FathomError> {
        self.attempts.lock().unwrap().push(reference.to_string());
        self.branches
            .get(reference)
            .cloned()
            .ok_or_else(|| FathomError::FileNotFound(format!("tree {owner}/{repo}@{reference}")))
    }

    async fn get_content(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
        _reference: &str,
    ) -> Result<FileContent, FathomError> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        let text = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| FathomError::FileNotFound(path.to_string()))?;
        Ok(FileContent {
            path: path.to_string(),
            size: text.len() as u64,
            sha: "abc123".into(),
            text,
        })
    }
}

#[tokio::test]
async fn third_candidate_wins_after_ordered_attempts() {
    let host = FakeHost::new(None).with_branch("development", &["src/index.js"]);

    let snapshot = branch::resolve_branch(&host, "octo", "demo").await.unwrap();

    assert_eq!(snapshot.reference.resolved_branch, "development");
    assert_eq!(host.attempts(), vec!["main", "master", "development"]);
    assert_eq!(snapshot.entries.len(), 1);
}

#[tokio::test]
async fn declared_default_is_tried_first() {
    let host = FakeHost::new(Some("trunk"))
        .with_branch("trunk", &["a.js"])
        .with_branch("main", &["b.js"]);

    let snapshot = branch::resolve_branch(&host, "octo", "demo").await.unwrap();

    assert_eq!(snapshot.reference.resolved_branch, "trunk");
    assert_eq!(host.attempts(), vec!["trunk"]);
}

#[tokio::test]
async fn no_branch_reports_every_attempt() {
    let host = FakeHost::new(Some("main"));

    let err = branch::resolve_branch(&host, "octo", "gone").await.unwrap_err();

    match err {
        FathomError::NoResolvableBranch { tried, last_error, .. } => {
            assert_eq!(tried, vec!["main", "master", "development", "dev"]);
            assert!(last_error.contains("@dev"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn snapshot_is_fetched_once_within_ttl() {
    let host = FakeHost::new(Some("main")).with_branch("main", &["src/a.js", "src/b.js"]);
    let cache = RepositoryCache::new(Arc::new(MemoryStore::new()));

    let first = load_snapshot(&host, &cache, "octo", "demo").await.unwrap();
    let second = load_snapshot(&host, &cache, "octo", "demo").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(host.attempts(), vec!["main"]);
}

#[tokio::test]
async fn expired_entry_is_refetched() {
    let store = Arc::new(MemoryStore::new());
    let key = CacheKey::repository("octo", "demo");
    let mut stale = Document::new();
    stale.insert("payload".into(), Value::from(1));
    stale.insert(
        "lastUpdated".into(),
        Value::from((Utc::now() - Duration::hours(25)).to_rfc3339()),
    );
    store.put(&key.document_id(), stale, true).await.unwrap();

    let cache = RepositoryCache::new(store.clone());
    let calls = AtomicUsize::new(0);
    let value: u32 = cache
        .get_or_fetch(&key, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(2)
        })
        .await
        .unwrap();

    assert_eq!(value, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_ttl_always_refetches() {
    let cache = RepositoryCache::with_ttl(Arc::new(MemoryStore::new()), Duration::zero());
    let key = CacheKey::repository("octo", "demo");
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let _: u32 = cache
            .get_or_fetch(&key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await
            .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fetch_error_leaves_entry_untouched() {
    let store = Arc::new(MemoryStore::new());
    let key = CacheKey::repository("octo", "demo");
    let mut stale = Document::new();
    stale.insert("payload".into(), Value::from("old"));
    stale.insert("lastUpdated".into(), Value::from("2001-01-01T00:00:00Z"));
    store.put(&key.document_id(), stale.clone(), true).await.unwrap();

    let cache = RepositoryCache::new(store.clone());
    let result: Result<String, _> = cache
        .get_or_fetch(&key, || async {
            Err(FathomError::TransientTransport("boom".into()))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(store.get(&key.document_id()).await.unwrap(), Some(stale));
}

#[tokio::test]
async fn refresh_preserves_unrelated_fields() {
    let store = Arc::new(MemoryStore::new());
    let key = CacheKey::repository("octo", "demo");
    let mut existing = Document::new();
    existing.insert("starred".into(), Value::from(true));
    store.put(&key.document_id(), existing, true).await.unwrap();

    let cache = RepositoryCache::new(store.clone());
    let _: String = cache
        .get_or_fetch(&key, || async { Ok("fresh".to_string()) })
        .await
        .unwrap();

    let doc = store.get(&key.document_id()).await.unwrap().unwrap();
    assert_eq!(doc["starred"], true);
    assert_eq!(doc["payload"], "fresh");
    assert_eq!(doc["owner"], "octo");
    assert!(doc.contains_key("lastUpdated"));
}

#[tokio::test]
async fn file_content_goes_through_cache() {
    let host = FakeHost::new(Some("main"))
        .with_branch("main", &["src/a.js"])
        .with_file("src/a.js", "export const a = 1;");
    let cache = RepositoryCache::new(Arc::new(MemoryStore::new()));
    let reference = RepositoryRef::new("octo", "demo", "main");

    let first = load_file(&host, &cache, &reference, "src/a.js").await.unwrap();
    let second = load_file(&host, &cache, &reference, "src/a.js").await.unwrap();

    assert_eq!(first.text, "export const a = 1;");
    assert_eq!(first, second);
    assert_eq!(host.content_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_file_propagates_not_found() {
    let host = FakeHost::new(Some("main")).with_branch("main", &[]);
    let cache = RepositoryCache::new(Arc::new(MemoryStore::new()));
    let reference = RepositoryRef::new("octo", "demo", "main");

    let err = load_file(&host, &cache, &reference, "nope.js").await.unwrap_err();
    assert!(matches!(err, FathomError::FileNotFound(_)));
}

#[tokio::test]
async fn cached_listing_builds_the_same_tree() {
    let host = FakeHost::new(Some("main")).with_branch("main", &["src/lib/x.js", "src/y.js"]);
    let cache = RepositoryCache::new(Arc::new(MemoryStore::new()));

    let first = load_snapshot(&host, &cache, "octo", "demo").await.unwrap();
    let second = load_snapshot(&host, &cache, "octo", "demo").await.unwrap();

    let a = tree::build_tree(&first.entries);
    let b = tree::build_tree(&second.entries);
    assert_eq!(a, b);
    assert_eq!(a[0].file_count(), 2);
}

#[tokio::test]
async fn lookalike_paths_keep_separate_cache_entries() {
    let host = FakeHost::new(Some("main"))
        .with_branch("main", &["src/a.js", "src_a.js"])
        .with_file("src/a.js", "content of src/a.js")
        .with_file("src_a.js", "content of src_a.js");
    let cache = RepositoryCache::new(Arc::new(MemoryStore::new()));
    let reference = RepositoryRef::new("octo", "demo", "main");

    let nested = load_file(&host, &cache, &reference, "src/a.js").await.unwrap();
    let flat = load_file(&host, &cache, &reference, "src_a.js").await.unwrap();

    assert_eq!(nested.text, "content of src/a.js");
    assert_eq!(flat.text, "content of src_a.js");
    assert_eq!(host.content_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn lookalike_repositories_keep_separate_listings() {
    let dotted = FakeHost::new(Some("main")).with_branch("main", &["dotted.js"]);
    let underscored = FakeHost::new(Some("main")).with_branch("main", &["underscored.js"]);
    let cache = RepositoryCache::new(Arc::new(MemoryStore::new()));

    let first = load_snapshot(&dotted, &cache, "octo", "my.repo").await.unwrap();
    let second = load_snapshot(&underscored, &cache, "octo", "my_repo").await.unwrap();

    assert_eq!(first.entries[0].path, "dotted.js");
    assert_eq!(second.entries[0].path, "underscored.js");
}
