//! End-to-end session behavior against fake collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fathom_core::{EntryKind, FathomConfig, FathomError, FileContent, TreeEntry};
use fathom_enrich::llm::TextGenerator;
use fathom_enrich::{EnrichmentStatus, RecordKind, Session};
use fathom_repo::host::RepositoryHost;
use fathom_repo::store::MemoryStore;

const API_JS: &str = "import { request } from './http';

export async function alpha(id) {
  return request(id);
}

function beta() {
  return alpha(1);
}

const gamma = () => beta();
";

struct FakeHost {
    files: HashMap<String, String>,
}

impl FakeHost {
    fn new() -> Self {
        let mut files = HashMap::new();
        files.insert("src/api.js".to_string(), API_JS.to_string());
        files.insert("README.md".to_string(), "# demo".to_string());
        files.insert(
            "src/broken.js".to_string(),
            "class Widget extends Base {\n  render() {\n    return this.draw(\n  }\n".to_string(),
        );
        Self { files }
    }
}

#[async_trait]
impl RepositoryHost for FakeHost {
    async fn default_branch(&self, _owner: &str, _repo: &str) -> Result<String, FathomError> {
        Ok("main".into())
    }

    async fn list_tree(
        &self,
        _owner: &str,
        _repo: &str,
        reference: &str,
    ) -> Result<Vec<TreeEntry>, FathomError> {
        if reference != "main" {
            return Err(FathomError::FileNotFound(reference.into()));
        }
        let mut entries: Vec<TreeEntry> = self
            .files
            .keys()
            .map(|p| TreeEntry::new(p.clone(), EntryKind::Blob))
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn get_content(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
        _reference: &str,
    ) -> Result<FileContent, FathomError> {
        let text = self
            .files
            .get(path)
            .ok_or_else(|| FathomError::FileNotFound(path.into()))?;
        Ok(FileContent {
            path: path.into(),
            text: text.clone(),
            size: text.len() as u64,
            sha: "0000".into(),
        })
    }
}

/// Answers by construct name; earlier constructs answer more slowly.
#[derive(Default)]
struct ScriptedGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, FathomError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains("`alpha`") {
            tokio::time::sleep(Duration::from_millis(40)).await;
            Ok("```json\n{description: 'first', type: 'async function',}\n```".into())
        } else if prompt.contains("`beta`") {
            tokio::time::sleep(Duration::from_millis(15)).await;
            Ok("I am not sure what this does.".into())
        } else {
            Ok(r#"{"description": "third", "type": "Unknown"}"#.into())
        }
    }
}

/// Replies with a fixed, parsable body.
struct FixedGenerator(&'static str);

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, FathomError> {
        Ok(self.0.to_string())
    }
}

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, FathomError> {
        Err(FathomError::Llm("LLM API error 503".into()))
    }
}

fn session(generator: Arc<dyn TextGenerator>) -> Session {
    Session::new(
        Arc::new(FakeHost::new()),
        Arc::new(MemoryStore::new()),
        generator,
        &FathomConfig::default(),
    )
}

#[tokio::test]
async fn selecting_before_loading_is_an_error() {
    let session = session(Arc::new(ScriptedGenerator::default()));
    let err = session.select_file("src/api.js").await.unwrap_err();
    assert!(matches!(err, FathomError::NoRepositoryLoaded));
}

#[tokio::test]
async fn load_builds_tree_with_implied_directories() {
    let mut session = session(Arc::new(ScriptedGenerator::default()));
    let nodes = session.load_repository("octo", "demo").await.unwrap();

    let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["README.md", "src"]);
    assert!(!nodes[1].is_file());
    assert_eq!(nodes[1].children.len(), 2);
    assert_eq!(session.repository().unwrap().resolved_branch, "main");
}

#[tokio::test]
async fn readme_yields_nothing_and_sends_no_prompt() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut session = session(generator.clone());
    session.load_repository("octo", "demo").await.unwrap();

    let records = session.select_file("README.md").await.unwrap();
    assert!(records.is_empty());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn records_follow_extraction_order_not_completion_order() {
    let generator = Arc::new(ScriptedGenerator::default());
    let mut session = session(generator.clone());
    session.load_repository("octo", "demo").await.unwrap();

    let records = session.select_file("src/api.js").await.unwrap();
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 3);

    let alpha = &records[0];
    assert_eq!(alpha.description, "first");
    assert_eq!(alpha.type_name, "async function");
    assert_eq!(alpha.status, EnrichmentStatus::Complete);
    assert_eq!(alpha.dependencies.external_calls, vec!["request"]);
    assert!(alpha.flags.is_async && alpha.flags.is_exported);

    let beta = &records[1];
    assert!(matches!(beta.status, EnrichmentStatus::Degraded { .. }));
    assert_eq!(beta.return_description, "Analysis failed");
    assert_eq!(beta.dependencies.internal_calls, vec!["alpha"]);

    let gamma = &records[2];
    assert_eq!(gamma.description, "third");
    assert_eq!(gamma.type_name, "function");
    assert!(gamma.flags.is_arrow);
}

#[tokio::test]
async fn failing_generator_degrades_every_record() {
    let mut session = session(Arc::new(FailingGenerator));
    session.load_repository("octo", "demo").await.unwrap();

    let records = session.select_file("src/api.js").await.unwrap();
    assert_eq!(records.len(), 3);
    for record in &records {
        assert!(matches!(&record.status, EnrichmentStatus::Degraded { reason } if reason.contains("503")));
        assert_eq!(record.type_name, record.kind.to_string());
    }
}

#[tokio::test]
async fn empty_reply_falls_back_to_heuristics() {
    let mut session = session(Arc::new(FixedGenerator("{}")));
    session.load_repository("octo", "demo").await.unwrap();

    let records = session.select_file("src/api.js").await.unwrap();
    let beta = &records[1];
    assert_eq!(beta.name, "beta");
    assert_eq!(beta.description, "Function found in src/api.js");
    assert_eq!(beta.type_name, "function");
    assert_eq!(beta.return_description, "Unknown");
    assert_eq!(beta.status, EnrichmentStatus::Complete);
    assert_eq!(records[0].description, "Async function found in src/api.js");
}

#[tokio::test]
async fn mistyped_reply_is_reconciled_to_defaults() {
    let reply = r#"{"description": 42, "type": ["x"], "parameterDescriptions": "id", "returnDescription": null, "dependencies": ["legacy"]}"#;
    let mut session = session(Arc::new(FixedGenerator(reply)));
    session.load_repository("octo", "demo").await.unwrap();

    let records = session.select_file("src/api.js").await.unwrap();
    let beta = &records[1];
    assert_eq!(beta.description, "Function found in src/api.js");
    assert_eq!(beta.type_name, "function");
    assert!(beta.parameters.is_empty());
    assert_eq!(beta.dependencies.internal_calls, vec!["alpha"]);
    assert_eq!(beta.status, EnrichmentStatus::Complete);
}

#[tokio::test]
async fn malformed_file_is_still_analyzed() {
    let mut session = session(Arc::new(ScriptedGenerator::default()));
    session.load_repository("octo", "demo").await.unwrap();

    let records = session.select_file("src/broken.js").await.unwrap();
    let kinds: Vec<RecordKind> = records.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![RecordKind::Class, RecordKind::Method]);
    assert_eq!(records[0].superclass.as_deref(), Some("Base"));
}

#[tokio::test]
async fn missing_file_propagates_not_found() {
    let mut session = session(Arc::new(ScriptedGenerator::default()));
    session.load_repository("octo", "demo").await.unwrap();

    let err = session.select_file("src/gone.js").await.unwrap_err();
    assert!(matches!(err, FathomError::FileNotFound(_)));
}
