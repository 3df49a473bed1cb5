//! URL handling module for sitegraph
//!
//! This module provides URL canonicalization, link pattern screening and
//! site classification.

mod classify;
mod normalize;
mod patterns;

pub use classify::classify_site;
pub use normalize::{normalize, site_key};
pub use patterns::LinkPatterns;
