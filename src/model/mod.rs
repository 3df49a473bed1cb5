//! Domain model shared by storage and the crawl pipeline
//!
//! - `SiteKind` / `ContentCategory`: the two classification labels of a site
//! - `SimpleLink`: an anchor's text and canonical URL

mod classification;
mod link;

pub use classification::{ContentCategory, SiteKind};
pub use link::SimpleLink;
