use crate::ConfigError;
use regex::Regex;

/// Non-HTML resource extensions; links to these are never followed
const NON_WEB_RESOURCE: &str =
    r".*\.(?:bmp|jpg|jpeg|png|gif|svg|webp|ico|pdf|doc|docx|xls|xlsx|ppt|pptx|ashx|xml|zip|rar|mp3|mp4|avi)$";

/// Schemes that never lead to a web page
const NON_WEB_SCHEME: &str =
    r"^(?:mailto|tel|callto|sms|javascript|ftp|file|data|skype|whatsapp|viber|intent):.*";

/// Immutable set of link patterns, compiled once at startup
///
/// The pattern set decides which anchors are local to the current site and
/// which links are worth keeping at all. It is built from configuration (the
/// ignore list) and then shared by reference; nothing mutates it at runtime.
#[derive(Debug, Clone)]
pub struct LinkPatterns {
    site_relative: Regex,
    date_like: Regex,
    ip_address: Regex,
    phone_number: Regex,
    non_web_scheme: Regex,
    non_web_resource: Regex,
    ignore: Vec<Regex>,
}

impl LinkPatterns {
    /// Compiles the built-in patterns plus the configured ignore patterns
    ///
    /// # Returns
    ///
    /// * `Ok(LinkPatterns)` - All patterns compiled
    /// * `Err(ConfigError::InvalidPattern)` - An ignore pattern is not a valid regex
    pub fn new(ignore_patterns: &[String]) -> Result<Self, ConfigError> {
        let ignore = ignore_patterns
            .iter()
            .map(|pattern| compile(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            site_relative: compile(r"^/.+")?,
            date_like: compile(r"^\d{4}[-/.]\d{1,2}(?:[-/.]\d{1,2})?(?:/.*)?$")?,
            ip_address: compile(r"^(?:\d{1,3}\.){3}\d{1,3}(?::\d+)?(?:/.*)?$")?,
            phone_number: compile(r"^(?:tel:)?\+?[\d\-./() ]{7,}$")?,
            non_web_scheme: compile(NON_WEB_SCHEME)?,
            non_web_resource: compile(NON_WEB_RESOURCE)?,
            ignore,
        })
    }

    /// Returns true if an anchor's href points inside the current site
    ///
    /// `raw` is the trimmed, lowercased href as written in the document and
    /// `normalized` is its canonical form. A link is local when it is a
    /// site-relative or protocol-relative path, a bare date-like path, has no
    /// dot at all, or contains `.-` without being a `.ro` address.
    pub fn is_local_link(&self, raw: &str, normalized: &str) -> bool {
        self.site_relative.is_match(raw)
            || self.date_like.is_match(normalized)
            || !normalized.contains('.')
            || (normalized.contains(".-") && !normalized.contains(".ro"))
    }

    /// Returns true if a link should be saved
    ///
    /// A link is kept only when all of these hold:
    /// - it is not an IP address or a phone number
    /// - it matches none of the configured ignore patterns
    /// - it is a plausible web URL
    /// - it is not empty, `/` or `#`
    /// - it is not a JavaScript call
    pub fn should_keep(&self, url: &str) -> bool {
        self.is_not_ip_or_phone_number(url)
            && self.is_not_ignorable(url)
            && self.is_valid_web_url(url)
            && is_not_empty_or_useless(url)
            && is_not_javascript_call(url)
    }

    /// Screens an href before it is rewritten or normalized
    ///
    /// Normalization trims characters that carry meaning here (the `()` of a
    /// JavaScript call, the bare `#` of an in-page anchor), so those checks run
    /// on the href as written.
    pub fn is_plausible_href(&self, raw: &str) -> bool {
        self.is_valid_web_url(raw) && is_not_empty_or_useless(raw) && is_not_javascript_call(raw)
    }

    fn is_not_ip_or_phone_number(&self, url: &str) -> bool {
        !self.ip_address.is_match(url) && !self.phone_number.is_match(url)
    }

    fn is_not_ignorable(&self, url: &str) -> bool {
        !self.ignore.iter().any(|pattern| pattern.is_match(url))
    }

    fn is_valid_web_url(&self, url: &str) -> bool {
        !url.contains('@')
            && !url.starts_with('#')
            && !self.non_web_scheme.is_match(url)
            && !self.non_web_resource.is_match(url)
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern)
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}

fn is_not_empty_or_useless(url: &str) -> bool {
    !matches!(url, "" | "/" | "#")
}

fn is_not_javascript_call(url: &str) -> bool {
    !url.contains("()")
}
