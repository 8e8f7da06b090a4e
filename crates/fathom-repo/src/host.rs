use async_trait::async_trait;
use fathom_core::{FathomError, FileContent, TreeEntry};

/// Remote repository browsing collaborator.
///
/// Implementations map transport outcomes onto the shared taxonomy: 404 →
/// [`FathomError::FileNotFound`], 403 → [`FathomError::AccessDenied`],
/// undecodable content → [`FathomError::DecodeFailure`], anything else →
/// [`FathomError::TransientTransport`].
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// The branch the repository declares as its default.
    async fn default_branch(&self, owner: &str, repo: &str) -> Result<String, FathomError>;

    /// Flat recursive listing of `reference`.
    async fn list_tree(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<TreeEntry>, FathomError>;

    /// Decoded content of one file at `reference`.
    async fn get_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<FileContent, FathomError>;
}

/// Parse a repository reference into `(owner, repo)`.
///
/// Accepts `https://github.com/owner/repo` (with optional `.git` suffix and
/// trailing path such as `/tree/main/src`), `github.com/owner/repo`, and the
/// short form `owner/repo`.
///
/// # Errors
///
/// Returns [`FathomError::InvalidRepository`] for other hosts or when the
/// owner or repository segment is missing.
///
/// # Examples
///
/// ```
/// use fathom_repo::host::parse_repository_url;
///
/// let (owner, repo) = parse_repository_url("https://github.com/rust-lang/rust.git").unwrap();
/// assert_eq!(owner, "rust-lang");
/// assert_eq!(repo, "rust");
///
/// let (owner, repo) = parse_repository_url("octocat/hello-world").unwrap();
/// assert_eq!((owner.as_str(), repo.as_str()), ("octocat", "hello-world"));
/// ```
pub fn parse_repository_url(input: &str) -> Result<(String, String), FathomError> {
    let trimmed = input.trim();
    let invalid = || {
        FathomError::InvalidRepository(format!(
            "'{trimmed}', expected https://github.com/owner/repo or owner/repo"
        ))
    };

    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);

    let path = if let Some((host, rest)) = without_scheme.split_once('/') {
        if host.contains('.') {
            let host = host.trim_start_matches("www.");
            if !host.eq_ignore_ascii_case("github.com") {
                return Err(FathomError::InvalidRepository(format!(
                    "'{trimmed}' is not a github.com URL"
                )));
            }
            rest
        } else if without_scheme.len() != trimmed.len() {
            return Err(invalid());
        } else {
            without_scheme
        }
    } else {
        return Err(invalid());
    };

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let (Some(owner), Some(repo)) = (segments.next(), segments.next()) else {
        return Err(invalid());
    };
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if repo.is_empty() {
        return Err(invalid());
    }
    Ok((owner.to_string(), repo.to_string()))
}
