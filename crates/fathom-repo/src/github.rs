use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use fathom_core::{EntryKind, FathomError, FileContent, GitHubConfig, TreeEntry};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::host::RepositoryHost;

/// Number of leading bytes inspected for binary detection.
const BINARY_CHECK_SIZE: usize = 8192;

/// GitHub REST client for repository listings and file contents.
///
/// Repository metadata goes through `octocrab`; listings and contents use
/// plain `reqwest` calls so status codes can be classified precisely.
///
/// # Examples
///
/// ```no_run
/// use fathom_core::GitHubConfig;
/// use fathom_repo::github::GitHubHost;
///
/// let host = GitHubHost::new(&GitHubConfig::default()).unwrap();
/// ```
pub struct GitHubHost {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    sha: String,
}

impl GitHubHost {
    /// Create a host client. The token is optional; anonymous access works for
    /// public repositories.
    ///
    /// # Errors
    ///
    /// Returns [`FathomError::Config`] if the API URL is invalid or a client
    /// cannot be built.
    pub fn new(config: &GitHubConfig) -> Result<Self, FathomError> {
        let mut builder = octocrab::Octocrab::builder()
            .base_uri(config.api_url.as_str())
            .map_err(|e| FathomError::Config(format!("invalid GitHub API URL: {e}")))?;
        if let Some(token) = &config.token {
            builder = builder.personal_token(token.clone());
        }
        let octocrab = builder
            .build()
            .map_err(|e| FathomError::Config(format!("failed to create GitHub client: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FathomError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            octocrab,
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: reqwest::Url,
        what: &str,
    ) -> Result<T, FathomError> {
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "fathom");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| FathomError::TransientTransport(format!("{what}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, what, &body));
        }

        response
            .json()
            .await
            .map_err(|e| FathomError::TransientTransport(format!("{what}: unexpected response: {e}")))
    }
}

#[async_trait]
impl RepositoryHost for GitHubHost {
    async fn default_branch(&self, owner: &str, repo: &str) -> Result<String, FathomError> {
        let repository = self
            .octocrab
            .repos(owner, repo)
            .get()
            .await
            .map_err(|e| FathomError::TransientTransport(format!("{owner}/{repo}: {e}")))?;
        repository
            .default_branch
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                FathomError::TransientTransport(format!("{owner}/{repo}: no default branch"))
            })
    }

    async fn list_tree(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Vec<TreeEntry>, FathomError> {
        let mut url = endpoint(&self.api_url, &["repos", owner, repo, "git", "trees", reference])?;
        url.query_pairs_mut().append_pair("recursive", "1");

        let what = format!("tree {owner}/{repo}@{reference}");
        let response: TreeResponse = self.get_json(url, &what).await?;
        if response.truncated {
            tracing::warn!(%owner, %repo, %reference, "tree listing truncated by host");
        }

        Ok(response
            .tree
            .into_iter()
            .filter_map(|item| {
                let kind = match item.kind.as_str() {
                    "blob" => EntryKind::Blob,
                    "tree" => EntryKind::Tree,
                    "commit" => EntryKind::Commit,
                    _ => return None,
                };
                Some(TreeEntry::new(item.path, kind))
            })
            .collect())
    }

    async fn get_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<FileContent, FathomError> {
        let mut segments = vec!["repos", owner, repo, "contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let mut url = endpoint(&self.api_url, &segments)?;
        url.query_pairs_mut().append_pair("ref", reference);

        let what = format!("{owner}/{repo}/{path}@{reference}");
        let value: serde_json::Value = self.get_json(url, &what).await?;
        if value.is_array() {
            return Err(FathomError::DecodeFailure(format!(
                "{path} is a directory, not a file"
            )));
        }
        let response: ContentResponse = serde_json::from_value(value)
            .map_err(|e| FathomError::DecodeFailure(format!("{path}: {e}")))?;
        if response.kind != "file" {
            return Err(FathomError::DecodeFailure(format!(
                "{path} is a {}, not a file",
                response.kind
            )));
        }

        let text = decode_content(
            path,
            response.content.as_deref().unwrap_or_default(),
            response.encoding.as_deref().unwrap_or("base64"),
        )?;

        Ok(FileContent {
            path: path.to_string(),
            text,
            size: response.size,
            sha: response.sha,
        })
    }
}

fn endpoint(api_url: &str, segments: &[&str]) -> Result<reqwest::Url, FathomError> {
    let mut url = reqwest::Url::parse(api_url)
        .map_err(|e| FathomError::Config(format!("invalid GitHub API URL: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| FathomError::Config(format!("'{api_url}' cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Map a non-success HTTP status onto the error taxonomy.
///
/// # Examples
///
/// ```
/// use fathom_core::FathomError;
/// use fathom_repo::github::classify_status;
/// use reqwest::StatusCode;
///
/// let err = classify_status(StatusCode::NOT_FOUND, "tree a/b@main", "");
/// assert!(matches!(err, FathomError::FileNotFound(_)));
/// ```
pub fn classify_status(status: StatusCode, what: &str, body: &str) -> FathomError {
    match status {
        StatusCode::NOT_FOUND => FathomError::FileNotFound(what.to_string()),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            FathomError::AccessDenied(what.to_string())
        }
        _ => FathomError::TransientTransport(format!("{what}: GitHub API error {status}: {body}")),
    }
}

/// Decode transport-encoded file content into text.
///
/// The host wraps base64 payloads at 60 columns, so whitespace is removed
/// before decoding. Payloads with NUL bytes in the first 8 KB or that are not
/// valid UTF-8 are rejected as binary.
///
/// # Errors
///
/// Returns [`FathomError::DecodeFailure`] for unsupported encodings, corrupt
/// base64, and binary content.
///
/// # Examples
///
/// ```
/// use fathom_repo::github::decode_content;
///
/// let text = decode_content("a.js", "Y29uc3QgYSA9\nIDE7", "base64").unwrap();
/// assert_eq!(text, "const a = 1;");
/// ```
pub fn decode_content(path: &str, encoded: &str, encoding: &str) -> Result<String, FathomError> {
    let bytes = match encoding {
        "base64" => {
            let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())
                .map_err(|e| FathomError::DecodeFailure(format!("{path}: corrupt base64: {e}")))?
        }
        "utf-8" | "utf8" => encoded.as_bytes().to_vec(),
        other => {
            return Err(FathomError::DecodeFailure(format!(
                "{path}: unsupported content encoding '{other}'"
            )));
        }
    };

    let check_len = bytes.len().min(BINARY_CHECK_SIZE);
    if bytes[..check_len].contains(&0) {
        return Err(FathomError::DecodeFailure(format!("{path}: binary content")));
    }

    String::from_utf8(bytes)
        .map_err(|_| FathomError::DecodeFailure(format!("{path}: content is not valid UTF-8")))
}
