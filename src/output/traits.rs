//! Output traits and error types
//!
//! An `Indexer` is the hand-off point to the external indexing step; it runs
//! once at the end of every crawl cycle.

use crate::storage::{SharedStorage, StorageError};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// What an indexer handed off
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub sites: usize,
    pub links: usize,
    pub subdomains: usize,
}

/// Receives the link graph at the end of each crawl cycle
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    async fn index(&self, storage: &SharedStorage) -> OutputResult<IndexReport>;
}
