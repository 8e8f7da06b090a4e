//! Remote repository access for Fathom.
//!
//! Resolves a readable branch, lists the repository, fetches file contents and
//! keeps both behind a TTL-bounded document cache. The host is reached through
//! the [`host::RepositoryHost`] trait so tests and alternate forges can stand
//! in for GitHub.

pub mod branch;
pub mod cache;
pub mod github;
pub mod host;
pub mod store;
pub mod tree;

use fathom_core::{FathomError, FileContent, RepositoryRef, TreeEntry};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, RepositoryCache};
use crate::host::RepositoryHost;

/// A resolved branch together with its flat listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySnapshot {
    pub reference: RepositoryRef,
    pub entries: Vec<TreeEntry>,
}

/// Resolve and list a repository, going through the cache.
///
/// # Errors
///
/// Returns [`FathomError::NoResolvableBranch`] when no candidate branch can be
/// listed. Cache failures never surface here.
pub async fn load_snapshot(
    host: &dyn RepositoryHost,
    cache: &RepositoryCache,
    owner: &str,
    repo: &str,
) -> Result<RepositorySnapshot, FathomError> {
    let key = CacheKey::repository(owner, repo);
    cache
        .get_or_fetch(&key, || branch::resolve_branch(host, owner, repo))
        .await
}

/// Fetch one file of a resolved repository, going through the cache.
///
/// # Errors
///
/// Propagates the host's [`FathomError::FileNotFound`],
/// [`FathomError::AccessDenied`], [`FathomError::DecodeFailure`] or
/// [`FathomError::TransientTransport`].
pub async fn load_file(
    host: &dyn RepositoryHost,
    cache: &RepositoryCache,
    reference: &RepositoryRef,
    path: &str,
) -> Result<FileContent, FathomError> {
    let key = CacheKey::file(&reference.owner, &reference.repo, path);
    cache
        .get_or_fetch(&key, || {
            host.get_content(
                &reference.owner,
                &reference.repo,
                path,
                &reference.resolved_branch,
            )
        })
        .await
}
