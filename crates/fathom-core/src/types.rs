use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of a node in the repository tree.
///
/// # Examples
///
/// ```
/// use fathom_core::NodeKind;
///
/// assert_eq!(serde_json::to_string(&NodeKind::Directory).unwrap(), "\"directory\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// A node in the hierarchical repository tree.
///
/// Every non-root node's `path` is its parent's path joined with `name` by
/// `/`. File nodes never have children.
///
/// # Examples
///
/// ```
/// use fathom_core::{FileNode, NodeKind};
///
/// let node = FileNode {
///     name: "main.js".into(),
///     path: "src/main.js".into(),
///     kind: NodeKind::File,
///     children: vec![],
/// };
/// assert!(node.is_file());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    /// Last path segment.
    pub name: String,
    /// Full `/`-delimited path from the repository root.
    pub path: String,
    /// File or directory.
    pub kind: NodeKind,
    /// Children in first-seen order.
    pub children: Vec<FileNode>,
}

impl FileNode {
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Find a descendant (or `self`) by full path.
    pub fn find(&self, path: &str) -> Option<&FileNode> {
        let mut node = self;
        loop {
            if node.path == path {
                return Some(node);
            }
            let prefix = format!("{}/", node.path);
            if !path.starts_with(&prefix) {
                return None;
            }
            node = node.children.iter().find(|c| {
                c.path == path || path.starts_with(&format!("{}/", c.path))
            })?;
        }
    }

    /// Number of file nodes in this subtree.
    pub fn file_count(&self) -> usize {
        let mut pending = vec![self];
        let mut count = 0;
        while let Some(node) = pending.pop() {
            match node.kind {
                NodeKind::File => count += 1,
                NodeKind::Directory => pending.extend(&node.children),
            }
        }
        count
    }
}

/// Kind of an entry in a flat repository listing, as reported by the host.
///
/// # Examples
///
/// ```
/// use fathom_core::EntryKind;
///
/// let kind: EntryKind = serde_json::from_str("\"blob\"").unwrap();
/// assert_eq!(kind, EntryKind::Blob);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file.
    Blob,
    /// Directory.
    Tree,
    /// Submodule pointer.
    Commit,
}

impl EntryKind {
    /// Node kind this entry becomes in the built tree.
    pub fn node_kind(self) -> NodeKind {
        match self {
            EntryKind::Tree => NodeKind::Directory,
            EntryKind::Blob | EntryKind::Commit => NodeKind::File,
        }
    }
}

/// One item of a flat, recursive repository listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeEntry {
    pub path: String,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn new(path: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// A repository together with the branch it is read from.
///
/// # Examples
///
/// ```
/// use fathom_core::RepositoryRef;
///
/// let r = RepositoryRef::new("octocat", "hello-world", "main");
/// assert_eq!(r.to_string(), "octocat/hello-world@main");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRef {
    pub owner: String,
    pub repo: String,
    pub resolved_branch: String,
}

impl RepositoryRef {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        resolved_branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            resolved_branch: resolved_branch.into(),
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.resolved_branch)
    }
}

/// Decoded content of a single repository file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    /// Path relative to the repository root.
    pub path: String,
    /// Decoded UTF-8 text.
    pub text: String,
    /// Size in bytes as reported by the host.
    pub size: u64,
    /// Content hash as reported by the host.
    pub sha: String,
}

/// How the structural extractor finds constructs.
///
/// # Examples
///
/// ```
/// use fathom_core::ExtractionStrategy;
///
/// let s: ExtractionStrategy = "patterns".parse().unwrap();
/// assert_eq!(s, ExtractionStrategy::Patterns);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionStrategy {
    /// Syntax tree when it parses cleanly, pattern scan otherwise.
    #[default]
    Auto,
    /// Always walk the syntax tree.
    SyntaxTree,
    /// Always use the pattern scan.
    Patterns,
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionStrategy::Auto => write!(f, "auto"),
            ExtractionStrategy::SyntaxTree => write!(f, "syntax-tree"),
            ExtractionStrategy::Patterns => write!(f, "patterns"),
        }
    }
}

impl FromStr for ExtractionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ExtractionStrategy::Auto),
            "syntax-tree" | "tree" => Ok(ExtractionStrategy::SyntaxTree),
            "patterns" | "regex" => Ok(ExtractionStrategy::Patterns),
            other => Err(format!("unknown extraction strategy: {other}")),
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use fathom_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> FileNode {
        FileNode {
            name: "src".into(),
            path: "src".into(),
            kind: NodeKind::Directory,
            children: vec![
                FileNode {
                    name: "lib".into(),
                    path: "src/lib".into(),
                    kind: NodeKind::Directory,
                    children: vec![FileNode {
                        name: "util.js".into(),
                        path: "src/lib/util.js".into(),
                        kind: NodeKind::File,
                        children: vec![],
                    }],
                },
                FileNode {
                    name: "index.js".into(),
                    path: "src/index.js".into(),
                    kind: NodeKind::File,
                    children: vec![],
                },
            ],
        }
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "md".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn strategy_roundtrips_through_display() {
        for s in [
            ExtractionStrategy::Auto,
            ExtractionStrategy::SyntaxTree,
            ExtractionStrategy::Patterns,
        ] {
            assert_eq!(s.to_string().parse::<ExtractionStrategy>().unwrap(), s);
        }
    }

    #[test]
    fn find_locates_nested_node() {
        let tree = sample_tree();
        let found = tree.find("src/lib/util.js").unwrap();
        assert_eq!(found.name, "util.js");
        assert!(tree.find("src/other.js").is_none());
        assert!(tree.find("srcx/lib").is_none());
    }

    #[test]
    fn file_count_ignores_directories() {
        assert_eq!(sample_tree().file_count(), 2);
    }

    #[test]
    fn commit_entries_become_files() {
        assert_eq!(EntryKind::Commit.node_kind(), NodeKind::File);
        assert_eq!(EntryKind::Tree.node_kind(), NodeKind::Directory);
    }

    #[test]
    fn repository_ref_serializes_camel_case() {
        let r = RepositoryRef::new("a", "b", "dev");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["resolvedBranch"], "dev");
        assert!(json.get("resolved_branch").is_none());
    }
}
