/// Site classification definitions
///
/// A site carries two independent labels: its `kind` (where it lives and how it
/// behaves) and its `content_category` (what it publishes). Both are persisted as
/// upper-case strings.
use std::fmt;

/// Where a site lives and how the crawler should treat it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
    /// Site under the home country top-level domain
    Domestic,

    /// Any other reachable site
    Foreign,

    /// Site that only redirects elsewhere; never fetched
    Redirect,

    /// Search engines, archives, blog hosts and similar; never fetched
    IndexingService,
}

impl SiteKind {
    /// All kinds, in the order they are reported
    pub const ALL: [SiteKind; 4] = [
        Self::Domestic,
        Self::Foreign,
        Self::Redirect,
        Self::IndexingService,
    ];

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Domestic => "DOMESTIC",
            Self::Foreign => "FOREIGN",
            Self::Redirect => "REDIRECT",
            Self::IndexingService => "INDEXING_SERVICE",
        }
    }

    /// Parses a kind from its database string representation
    ///
    /// Returns None if the string doesn't match any known kind.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "DOMESTIC" => Some(Self::Domestic),
            "FOREIGN" => Some(Self::Foreign),
            "REDIRECT" => Some(Self::Redirect),
            "INDEXING_SERVICE" => Some(Self::IndexingService),
            _ => None,
        }
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

impl std::str::FromStr for SiteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_string(&s.to_uppercase().replace('-', "_"))
            .ok_or_else(|| format!("Unknown site kind '{}'", s))
    }
}

/// What a site publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentCategory {
    News,
    SocialMedia,
    Uncategorized,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 3] = [Self::News, Self::SocialMedia, Self::Uncategorized];

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::News => "NEWS",
            Self::SocialMedia => "SOCIAL_MEDIA",
            Self::Uncategorized => "UNCATEGORIZED",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "NEWS" => Some(Self::News),
            "SOCIAL_MEDIA" => Some(Self::SocialMedia),
            "UNCATEGORIZED" => Some(Self::Uncategorized),
            _ => None,
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

impl std::str::FromStr for ContentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_string(&s.to_uppercase().replace('-', "_"))
            .ok_or_else(|| format!("Unknown content category '{}'", s))
    }
}
