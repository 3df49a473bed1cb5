//! Background maintenance of the site table
//!
//! Both jobs handle a single unit of work per call and are meant to be ticked
//! frequently under a scheduler lock.

mod duplicates;
mod subdomains;

pub use duplicates::{fix_next_duplicate, MergeReport};
pub use subdomains::{build_next_subdomain_group, SubdomainGroup};
