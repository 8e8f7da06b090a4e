//! Core types, configuration, and error handling for Fathom.
//!
//! This crate provides the shared foundation used by all other Fathom crates:
//! - [`FathomError`]: unified error type using `thiserror`
//! - [`FathomConfig`]: configuration loaded from `.fathom.toml`
//! - Shared types: [`FileNode`], [`TreeEntry`], [`RepositoryRef`],
//!   [`FileContent`], [`ExtractionStrategy`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{AnalysisConfig, CacheConfig, FathomConfig, GitHubConfig, LlmConfig};
pub use error::FathomError;
pub use types::{
    EntryKind, ExtractionStrategy, FileContent, FileNode, NodeKind, OutputFormat, RepositoryRef,
    TreeEntry,
};

/// A convenience `Result` type for Fathom operations.
pub type Result<T> = std::result::Result<T, FathomError>;
