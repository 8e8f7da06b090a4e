//! Enrichment of extracted constructs with model-generated descriptions.
//!
//! Builds a prompt per construct, sends it through a [`llm::TextGenerator`],
//! repairs the untrusted reply ([`sanitize`]), reconciles it against the fixed
//! schema ([`schema`]) and merges it with the extracted metadata
//! ([`record`]). [`session::Session`] ties repository loading and file
//! analysis together for callers.

pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod record;
pub mod sanitize;
pub mod schema;
pub mod session;

pub use record::{ConstructRecord, RecordKind};
pub use schema::{EnrichmentResult, EnrichmentStatus};
pub use session::Session;
