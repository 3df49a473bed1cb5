//! Crawler module for site and page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with an https-then-http reachability check
//! - HTML parsing and link extraction
//! - Domain-partitioned parallel fetching with jitter
//! - Turning fetched documents into pages and link graph edges
//! - Cycle and daemon coordination

mod coordinator;
mod fetcher;
mod orchestrator;
mod parser;
mod partition;
mod processor;

pub use coordinator::{run_crawler, Coordinator, CycleReport};
pub use fetcher::{build_http_client, fetch_document, fetch_url, is_html_content_type, FetchResult};
pub use orchestrator::{BatchOutcome, FetchOrchestrator};
pub use parser::{parse_document, ParsedDocument};
pub use partition::{partition_by_site, FetchTarget};
pub use processor::{process_due_content, process_page_document, split_links, ProcessingOutcome};
