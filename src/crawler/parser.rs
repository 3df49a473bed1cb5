//! HTML parser for extracting links and text
//!
//! This module handles parsing fetched documents to extract:
//! - The document title
//! - Visible body text
//! - Sanitized, deduplicated anchor links relative to the current site

use crate::model::SimpleLink;
use crate::url::{normalize, LinkPatterns};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Extracted information from an HTML document
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    /// The document title (from <title> tag)
    pub title: Option<String>,

    /// Visible body text, whitespace-collapsed
    pub text: String,

    /// Distinct canonical links found in anchors, in document order
    pub links: Vec<SimpleLink>,
}

/// Parses a document and extracts its title, text and links
///
/// # Link Extraction Rules
///
/// For every `<a href>`:
/// 1. The href is trimmed and lowercased, then screened: fragment-only,
///    empty, `/`, `#`, JavaScript calls, non-web schemes, addresses with `@`
///    and non-HTML resources are dropped
/// 2. A local href (see [`LinkPatterns::is_local_link`]) is rewritten to
///    `base_url/href`; anything else is treated as an absolute link
/// 3. The result is normalized and kept only if [`LinkPatterns::should_keep`]
///    accepts it
/// 4. Links with equal canonical URLs collapse to the first occurrence
///
/// # Arguments
///
/// * `html` - The document body
/// * `base_url` - Canonical URL of the site the document belongs to
/// * `patterns` - Compiled link patterns
///
/// # Example
///
/// ```
/// use sitegraph::crawler::parse_document;
/// use sitegraph::url::LinkPatterns;
///
/// let patterns = LinkPatterns::new(&[]).unwrap();
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let parsed = parse_document(html, "example.ro", &patterns);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].url, "example.ro/page");
/// ```
pub fn parse_document(html: &str, base_url: &str, patterns: &LinkPatterns) -> ParsedDocument {
    let document = Html::parse_document(html);

    ParsedDocument {
        title: extract_title(&document),
        text: extract_text(&document),
        links: extract_links(&document, base_url, patterns),
    }
}

/// Extracts the document title
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(element.text()))
        .filter(|s| !s.is_empty())
}

fn extract_text(document: &Html) -> String {
    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };

    document
        .select(&body_selector)
        .next()
        .map(|body| collapse_whitespace(body.text()))
        .unwrap_or_default()
}

fn extract_links(document: &Html, base_url: &str, patterns: &LinkPatterns) -> Vec<SimpleLink> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&a_selector) {
        let Some(link) = anchor_to_link(element, base_url, patterns) else {
            continue;
        };
        if seen.insert(link.url.clone()) {
            links.push(link);
        }
    }

    links
}

/// Turns one anchor into a canonical link, or `None` if it should be dropped
fn anchor_to_link(element: ElementRef<'_>, base_url: &str, patterns: &LinkPatterns) -> Option<SimpleLink> {
    let href = element.value().attr("href")?;
    let raw = href.trim().to_lowercase();

    if !patterns.is_plausible_href(&raw) {
        return None;
    }

    let normalized_href = normalize(&raw);
    let url = if patterns.is_local_link(&raw, &normalized_href) {
        normalize(&format!("{}/{}", base_url, normalized_href))
    } else {
        normalized_href
    };

    if !patterns.should_keep(&url) {
        return None;
    }

    Some(SimpleLink::new(collapse_whitespace(element.text()), url))
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
