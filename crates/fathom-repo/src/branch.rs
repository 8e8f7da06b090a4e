use fathom_core::{FathomError, RepositoryRef};

use crate::host::RepositoryHost;
use crate::RepositorySnapshot;

/// Branches tried after the declared default, in order.
pub const FALLBACK_BRANCHES: [&str; 4] = ["main", "master", "development", "dev"];

/// Ordered, deduplicated list of branches to try.
///
/// The declared default (when known and non-empty) comes first, followed by
/// [`FALLBACK_BRANCHES`]. A name appearing twice is kept at its first position.
///
/// # Examples
///
/// ```
/// use fathom_repo::branch::candidate_branches;
///
/// assert_eq!(
///     candidate_branches(Some("master")),
///     vec!["master", "main", "development", "dev"]
/// );
/// assert_eq!(candidate_branches(None)[0], "main");
/// ```
pub fn candidate_branches(default: Option<&str>) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::with_capacity(FALLBACK_BRANCHES.len() + 1);
    let declared = default.map(str::trim).filter(|b| !b.is_empty());
    let ordered = declared
        .into_iter()
        .map(str::to_string)
        .chain(FALLBACK_BRANCHES.iter().map(|b| b.to_string()));
    for name in ordered {
        if !candidates.contains(&name) {
            candidates.push(name);
        }
    }
    candidates
}

/// Find a readable branch and return it together with its listing.
///
/// The declared default branch is queried first; failing that, the fallback
/// list is used on its own. Each candidate is tried with a full tree listing
/// and the first success wins, so the listing is never fetched twice.
///
/// # Errors
///
/// Returns [`FathomError::NoResolvableBranch`] once every candidate failed,
/// carrying the candidates in the order tried and the last failure.
pub async fn resolve_branch(
    host: &dyn RepositoryHost,
    owner: &str,
    repo: &str,
) -> Result<RepositorySnapshot, FathomError> {
    let declared = match host.default_branch(owner, repo).await {
        Ok(branch) => Some(branch),
        Err(e) => {
            tracing::debug!(%owner, %repo, error = %e, "default branch lookup failed");
            None
        }
    };

    let candidates = candidate_branches(declared.as_deref());
    let mut tried = Vec::with_capacity(candidates.len());
    let mut last_error = String::from("no candidates");

    for branch in candidates {
        tracing::debug!(%owner, %repo, %branch, "trying branch");
        match host.list_tree(owner, repo, &branch).await {
            Ok(entries) => {
                tracing::debug!(%owner, %repo, %branch, entries = entries.len(), "branch resolved");
                return Ok(RepositorySnapshot {
                    reference: RepositoryRef::new(owner, repo, branch),
                    entries,
                });
            }
            Err(e) => {
                last_error = e.to_string();
                tried.push(branch);
            }
        }
    }

    Err(FathomError::NoResolvableBranch {
        owner: owner.to_string(),
        repo: repo.to_string(),
        tried,
        last_error,
    })
}
