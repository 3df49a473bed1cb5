//! Search-driven site discovery
//!
//! Sites enter the graph through an external search API queried one page at a
//! time. The position reached for each search term is persisted as cursor rows,
//! so discovery resumes where it stopped across restarts.

mod client;
mod engine;

pub use client::{GoogleSearchClient, SearchClient, SearchItem, SearchPage};
pub use engine::{DiscoveryOutcome, SearchDiscovery};

use crate::storage::StorageError;
use thiserror::Error;

/// Errors raised while querying the search API or recording its results
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode search response: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),
}
