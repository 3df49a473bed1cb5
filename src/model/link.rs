use crate::url::site_key;

/// A link found in an anchor element, after canonicalization
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimpleLink {
    /// Visible anchor text, whitespace-collapsed
    pub title: String,

    /// Canonical URL of the link target
    pub url: String,
}

impl SimpleLink {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }

    /// The canonical URL of the site this link points into
    pub fn site_key(&self) -> &str {
        site_key(&self.url)
    }

    /// Returns true if the link points inside the site with the given canonical URL
    pub fn is_internal_to(&self, site_url: &str) -> bool {
        self.site_key() == site_url
    }
}
