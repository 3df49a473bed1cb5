//! Output module for reporting on and exporting the site graph
//!
//! This module handles:
//! - Statistics over sites, pages and the link graph
//! - Exporting the current link graph for indexing

mod export;
pub mod stats;
mod traits;

pub use export::{load_link_graph, GraphLink, GraphSite, GraphSubdomain, LinkGraph, LinkGraphExport};
pub use stats::{load_statistics, print_statistics, SiteStatistics};
pub use traits::{IndexReport, Indexer, OutputError, OutputResult};
