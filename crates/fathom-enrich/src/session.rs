use std::sync::Arc;

use fathom_core::{AnalysisConfig, FathomConfig, FathomError, FileNode, RepositoryRef};
use fathom_extract::Language;
use fathom_repo::cache::{DocumentStore, RepositoryCache};
use fathom_repo::host::RepositoryHost;
use fathom_repo::{tree, RepositorySnapshot};

use crate::llm::TextGenerator;
use crate::pipeline::{self, Enricher};
use crate::record::ConstructRecord;

/// Caller-facing API: load a repository, then analyze files from it.
///
/// All collaborators are injected; a session owns no global state.
pub struct Session {
    host: Arc<dyn RepositoryHost>,
    cache: RepositoryCache,
    enricher: Enricher,
    analysis: AnalysisConfig,
    current: Option<RepositorySnapshot>,
}

impl Session {
    pub fn new(
        host: Arc<dyn RepositoryHost>,
        store: Arc<dyn DocumentStore>,
        generator: Arc<dyn TextGenerator>,
        config: &FathomConfig,
    ) -> Self {
        Self::with_cache(host, RepositoryCache::new(store), generator, config)
    }

    /// Session over an already configured cache (custom TTL, shared store).
    pub fn with_cache(
        host: Arc<dyn RepositoryHost>,
        cache: RepositoryCache,
        generator: Arc<dyn TextGenerator>,
        config: &FathomConfig,
    ) -> Self {
        Self {
            host,
            cache,
            enricher: Enricher::new(generator, config.llm.max_source_chars),
            analysis: config.analysis.clone(),
            current: None,
        }
    }

    /// The repository loaded last, if any.
    pub fn repository(&self) -> Option<&RepositoryRef> {
        self.current.as_ref().map(|s| &s.reference)
    }

    /// Resolve a branch, list the repository and build its file tree.
    ///
    /// Replaces any previously loaded repository.
    ///
    /// # Errors
    ///
    /// Returns [`FathomError::NoResolvableBranch`] when no candidate branch
    /// can be listed.
    pub async fn load_repository(
        &mut self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<FileNode>, FathomError> {
        let snapshot = fathom_repo::load_snapshot(self.host.as_ref(), &self.cache, owner, repo).await?;
        tracing::info!(
            repository = %snapshot.reference,
            entries = snapshot.entries.len(),
            "repository loaded"
        );
        let nodes = tree::build_tree(&snapshot.entries);
        self.current = Some(snapshot);
        Ok(nodes)
    }

    /// Analyze one file of the loaded repository.
    ///
    /// Files whose extension is not configured for analysis yield an empty
    /// sequence without any fetch or enrichment request.
    ///
    /// # Errors
    ///
    /// Returns [`FathomError::NoRepositoryLoaded`] before
    /// [`Session::load_repository`] succeeded, and the host's fetch errors
    /// ([`FathomError::FileNotFound`], [`FathomError::AccessDenied`],
    /// [`FathomError::DecodeFailure`], [`FathomError::TransientTransport`]).
    pub async fn select_file(&self, path: &str) -> Result<Vec<ConstructRecord>, FathomError> {
        let snapshot = self.current.as_ref().ok_or(FathomError::NoRepositoryLoaded)?;

        let language = match Language::from_path(path) {
            Some(language) if self.analysis.supports(path) => language,
            _ => {
                tracing::debug!(path, "not an analyzable file");
                return Ok(Vec::new());
            }
        };

        let content =
            fathom_repo::load_file(self.host.as_ref(), &self.cache, &snapshot.reference, path).await?;
        Ok(pipeline::analyze_file(
            &self.enricher,
            &content.text,
            path,
            language,
            self.analysis.strategy,
        )
        .await)
    }
}
