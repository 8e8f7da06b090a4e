/// Errors that can occur across the Fathom workspace.
///
/// Library crates return this type directly; the binary converts to a
/// `miette` diagnostic at the boundary. Per-construct extraction failures and
/// degraded enrichment never surface here as a whole-operation failure: they
/// are folded into the affected record instead.
///
/// # Examples
///
/// ```
/// use fathom_core::FathomError;
///
/// let err = FathomError::FileNotFound("src/missing.js".into());
/// assert!(err.to_string().contains("src/missing.js"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum FathomError {
    /// Every candidate branch failed to produce a tree listing.
    #[error("no resolvable branch for {owner}/{repo} (tried: {}): {last_error}", .tried.join(", "))]
    #[diagnostic(help("check the repository name, or set GITHUB_TOKEN if it is private"))]
    NoResolvableBranch {
        owner: String,
        repo: String,
        tried: Vec<String>,
        last_error: String,
    },

    /// The remote host reported 404 for a repository, ref or path.
    #[error("not found: {0}")]
    FileNotFound(String),

    /// The remote host reported 403. Private repositories and exhausted rate
    /// limits look identical from here.
    #[error("access denied (private repository or rate limit): {0}")]
    #[diagnostic(help("set GITHUB_TOKEN or add token under [github] in .fathom.toml"))]
    AccessDenied(String),

    /// Content arrived but could not be decoded to text.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// Network failure or unexpected status from a remote collaborator.
    #[error("transport error: {0}")]
    TransientTransport(String),

    /// Analysis of a single construct failed.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Text-generation request or response failure.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Document store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A repository reference that cannot be parsed.
    #[error("invalid repository reference: {0}")]
    InvalidRepository(String),

    /// A file was selected before any repository was loaded.
    #[error("no repository loaded")]
    #[diagnostic(help("load a repository before selecting a file"))]
    NoRepositoryLoaded,

    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl FathomError {
    /// Whether the error came from the remote transport and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, FathomError::TransientTransport(_))
    }
}
