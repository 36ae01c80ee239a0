//! Search index handoff
//!
//! Successful scrapes are published to an OpenSearch-compatible service through
//! its `_bulk` endpoint and an ingest pipeline. The index write happens after the
//! queue row is updated and is not transactional with it.

mod client;
mod document;

pub use client::{BulkItemFailure, BulkSummary, IndexClient};
pub use document::{
    document_id, handoff_operations, BulkOperation, IndexDocument, DOCUMENT_NAMESPACE,
};

use thiserror::Error;

/// Errors that fail a bulk call as a whole
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Invalid index host: {0}")]
    InvalidHost(String),

    #[error("Environment variable {0} holding the index password is not set")]
    MissingPassword(String),

    #[error("Index service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to encode bulk body: {0}")]
    Encode(#[from] serde_json::Error),
}
