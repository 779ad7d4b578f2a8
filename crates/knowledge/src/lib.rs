//! Sales knowledge for the cold-call agent
//!
//! Entries are grouped by [`KnowledgeCategory`]; each call state names the
//! categories worth consulting. Retrieval is keyword based: trigger phrase
//! hits weigh most, shared words break ties.

pub mod base;

pub use base::{KnowledgeBase, KnowledgeEntry, KnowledgeFile, RetrievedEntry, NO_KNOWLEDGE};
pub use cold_call_core::KnowledgeCategory;

use thiserror::Error;

/// Knowledge errors
#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Failed to read knowledge file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse knowledge file: {0}")]
    Parse(String),

    #[error("Unsupported knowledge file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid knowledge base: {0}")]
    Invalid(String),
}
