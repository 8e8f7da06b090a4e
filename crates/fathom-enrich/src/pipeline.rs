use std::sync::Arc;

use fathom_core::ExtractionStrategy;
use fathom_extract::{deps, ConstructCandidate, ExtractedItem, Language};
use futures::future::join_all;

use crate::llm::TextGenerator;
use crate::prompt;
use crate::record::{self, ConstructRecord};
use crate::schema::{self, EnrichmentOutcome};

/// Sends one construct at a time to the text generator and interprets the
/// reply.
#[derive(Clone)]
pub struct Enricher {
    generator: Arc<dyn TextGenerator>,
    max_source_chars: usize,
}

impl Enricher {
    pub fn new(generator: Arc<dyn TextGenerator>, max_source_chars: usize) -> Self {
        Self {
            generator,
            max_source_chars,
        }
    }

    /// Enrich one construct. A failed call or unusable reply degrades the
    /// outcome instead of failing.
    pub async fn enrich(
        &self,
        candidate: &ConstructCandidate,
        source: &str,
        file_path: &str,
        imports: &[String],
    ) -> EnrichmentOutcome {
        let prompt = prompt::build_enrichment_prompt(
            candidate,
            source,
            file_path,
            imports,
            self.max_source_chars,
        );
        match self.generator.generate(&prompt).await {
            Ok(raw) => schema::interpret(&raw),
            Err(e) => {
                tracing::warn!(construct = %candidate.name, error = %e, "enrichment request failed");
                EnrichmentOutcome::degraded(e.to_string())
            }
        }
    }
}

/// Extract, enrich and merge every construct of one file.
///
/// Enrichment requests for all constructs run concurrently; records come
/// back in extraction order. A failure to run extraction at all yields a
/// single error record.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use async_trait::async_trait;
/// use fathom_core::{ExtractionStrategy, FathomError};
/// use fathom_enrich::llm::TextGenerator;
/// use fathom_enrich::pipeline::{analyze_file, Enricher};
/// use fathom_extract::Language;
///
/// struct Canned;
///
/// #[async_trait]
/// impl TextGenerator for Canned {
///     async fn generate(&self, _prompt: &str) -> Result<String, FathomError> {
///         Ok("{description: 'Doubles a number', returnDescription: 'twice x'}".into())
///     }
/// }
///
/// # tokio_test();
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn tokio_test() {
/// let enricher = Enricher::new(Arc::new(Canned), 6000);
/// let text = "const double = (x) => x * 2;";
/// let records =
///     analyze_file(&enricher, text, "math.js", Language::JavaScript, ExtractionStrategy::Auto).await;
/// assert_eq!(records[0].name, "double");
/// assert_eq!(records[0].description, "Doubles a number");
/// # }
/// ```
pub async fn analyze_file(
    enricher: &Enricher,
    text: &str,
    file_path: &str,
    language: Language,
    strategy: ExtractionStrategy,
) -> Vec<ConstructRecord> {
    let extraction = match fathom_extract::extract(text, language, strategy) {
        Ok(extraction) => extraction,
        Err(e) => {
            tracing::warn!(file = file_path, error = %e, "extraction failed");
            return vec![ConstructRecord::failure(
                format!("Error during code analysis: {e}"),
                None,
                file_path,
            )];
        }
    };
    tracing::debug!(
        file = file_path,
        strategy = %extraction.strategy,
        items = extraction.items.len(),
        "extracted constructs"
    );

    let import_paths: Vec<String> = extraction.imports.iter().map(|i| i.path.clone()).collect();
    let imports = &extraction.imports;
    let import_paths = &import_paths;

    let tasks = extraction.items.iter().map(|item| async move {
        match item {
            ExtractedItem::Construct(candidate) => {
                let computed = deps::analyze(candidate, text, imports);
                let outcome = enricher
                    .enrich(candidate, candidate.source(text), file_path, import_paths)
                    .await;
                record::merge(candidate, outcome, computed, file_path)
            }
            ExtractedItem::Failed { span, message } => ConstructRecord::failure(
                format!("Error analyzing function: {message}"),
                Some(*span),
                file_path,
            ),
        }
    });

    join_all(tasks).await
}
