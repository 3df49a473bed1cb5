//! Configuration module for sitegraph
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sitegraph::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Pages per batch: {}", config.crawler.page_batch_size);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    Config, CrawlerConfig, JobsConfig, LinksConfig, LockConfig, OutputConfig, SearchConfig,
    UserAgentConfig, MAX_JOB_INTERVAL_SECS, MAX_LOCK_TTL_SECS, MAX_PROCESSING_TIME_LIMIT_SECS,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
