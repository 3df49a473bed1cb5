use crate::model::{ContentCategory, SiteKind};
use regex::Regex;
use std::sync::LazyLock;

/// What a matching rule assigns
#[derive(Debug, Clone, Copy)]
enum Assignment {
    Kind(SiteKind),
    Category(ContentCategory),
}

/// Ordered classification table: (pattern, assignment), first match wins per label
const RULES: &[(&str, Assignment)] = &[
    // Indexing services
    (r"google\.com", Assignment::Kind(SiteKind::IndexingService)),
    (r"alexa\.com", Assignment::Kind(SiteKind::IndexingService)),
    (r"blogger\.com", Assignment::Kind(SiteKind::IndexingService)),
    (r"trustpilot\.com", Assignment::Kind(SiteKind::IndexingService)),
    (r"wordpress\.com", Assignment::Kind(SiteKind::IndexingService)),
    (r"outlook\.com", Assignment::Kind(SiteKind::IndexingService)),
    (r"blogspot\.com", Assignment::Kind(SiteKind::IndexingService)),
    (r"archive\.org", Assignment::Kind(SiteKind::IndexingService)),
    (r"creativecommons\.org", Assignment::Kind(SiteKind::IndexingService)),
    (r"webstatsdomain\.(?:org|com)", Assignment::Kind(SiteKind::IndexingService)),
    (r"gov\.uk", Assignment::Kind(SiteKind::IndexingService)),
    // Social media
    (r"facebook\.com", Assignment::Category(ContentCategory::SocialMedia)),
    (r"fb\.com", Assignment::Category(ContentCategory::SocialMedia)),
    (r"twitter\.com", Assignment::Category(ContentCategory::SocialMedia)),
    (r"instagram\.com", Assignment::Category(ContentCategory::SocialMedia)),
    (r"last\.fm", Assignment::Category(ContentCategory::SocialMedia)),
    (r"pinterest\.com", Assignment::Category(ContentCategory::SocialMedia)),
    (r"linkedin\.com", Assignment::Category(ContentCategory::SocialMedia)),
    (r"youtube\.com", Assignment::Category(ContentCategory::SocialMedia)),
    // News outlets
    (
        r"(?:adevarul|stirileprotv|libertatea|digi24|a1|antena3|cancan|evz|gsp|click|csid|sfatulmedicului|digisport|sport|stiripesurse|hotnews|mediafax|spynews|avocatnet|wowbiz|protv|zf|prosport|unica|kudika|ziaruldeiasi|gandul)\.ro",
        Assignment::Category(ContentCategory::News),
    ),
    (
        r"(?:realitatea|romaniatv|unica)\.net|(?:ziare|teotrandafir)\.com|gandul\.info",
        Assignment::Category(ContentCategory::News),
    ),
    // Home country domain
    (r"^[^/]+\.ro(?:/.*)?$", Assignment::Kind(SiteKind::Domestic)),
];

static COMPILED_RULES: LazyLock<Vec<(Regex, Assignment)>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|(pattern, assignment)| (Regex::new(pattern).unwrap(), *assignment))
        .collect()
});

/// Classifies a canonical site URL into a kind and a content category
///
/// The table is evaluated in listed order; the first rule that matches decides
/// each label. Sites matching no kind rule are `Foreign`, sites matching no
/// category rule are `Uncategorized`.
///
/// # Examples
///
/// ```
/// use sitegraph::url::classify_site;
/// use sitegraph::{ContentCategory, SiteKind};
///
/// assert_eq!(
///     classify_site("hotnews.ro"),
///     (SiteKind::Domestic, ContentCategory::News)
/// );
/// assert_eq!(
///     classify_site("example.com"),
///     (SiteKind::Foreign, ContentCategory::Uncategorized)
/// );
/// ```
pub fn classify_site(url: &str) -> (SiteKind, ContentCategory) {
    let mut kind = None;
    let mut category = None;

    for (pattern, assignment) in COMPILED_RULES.iter() {
        if kind.is_some() && category.is_some() {
            break;
        }
        if !pattern.is_match(url) {
            continue;
        }
        match assignment {
            Assignment::Kind(k) if kind.is_none() => kind = Some(*k),
            Assignment::Category(c) if category.is_none() => category = Some(*c),
            _ => {}
        }
    }

    (
        kind.unwrap_or(SiteKind::Foreign),
        category.unwrap_or(ContentCategory::Uncategorized),
    )
}
