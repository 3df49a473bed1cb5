/// Scheme prefixes removed during normalization, longest spelling first so that
/// `https://` is not left behind as `/` by the shorter `https:/` variant
const SCHEME_PREFIXES: &[&str] = &[
    "https://",
    "https:\\\\",
    "https:\\",
    "https:/",
    "https//",
    "http://",
    "http:\\\\",
    "http:\\",
    "http:/",
    "http//",
];

/// Normalizes a raw href or display link into a canonical URL
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Lowercase
/// 3. Remove embedded newlines, carriage returns and spaces
/// 4. Strip `http`/`https` scheme prefixes, including the malformed
///    `https//`, `https:/` and backslash spellings
/// 5. Strip leading `www.` prefixes (prefix only, never elsewhere in the string)
/// 6. Drop the query string (`?` and everything after it)
/// 7. Drop the fragment (`#` and everything after it)
/// 8. Drop a `*`-delimited suffix
/// 9. Trim non-alphanumeric padding from both ends (slashes, dots, quotes...)
///
/// The pipeline is repeated until the output stops changing, which makes the
/// function idempotent even for inputs like `"//www.example.ro"` where the
/// final trim exposes another prefix.
///
/// # Examples
///
/// ```
/// use sitegraph::url::normalize;
///
/// assert_eq!(normalize("https://WWW.Example.ro/"), "example.ro");
/// assert_eq!(normalize("example.ro"), "example.ro");
/// assert_eq!(normalize("http://blog.example.ro/post?id=3#top"), "blog.example.ro/post");
/// ```
pub fn normalize(raw: &str) -> String {
    let mut current = normalize_once(raw);

    // Input is lowercase after the first pass, so later passes only shrink it
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Runs the normalization pipeline a single time
fn normalize_once(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let compact = strip_newlines_and_spaces(&lowered);
    let without_scheme = strip_scheme_prefix(&compact);
    let without_www = strip_www_prefix(without_scheme);
    let without_query = strip_query_string(without_www);
    let without_anchor = strip_anchor(without_query);
    let without_asterisk = strip_asterisk_suffix(without_anchor);

    trim_non_alphanumeric(without_asterisk).to_string()
}

fn strip_newlines_and_spaces(url: &str) -> String {
    url.chars()
        .filter(|c| !matches!(c, '\n' | '\r' | ' '))
        .collect()
}

/// Removes any number of stacked scheme prefixes (`http://https://x` included)
fn strip_scheme_prefix(url: &str) -> &str {
    let mut rest = url;

    'outer: loop {
        for prefix in SCHEME_PREFIXES {
            if let Some(stripped) = rest.strip_prefix(prefix) {
                rest = stripped;
                continue 'outer;
            }
        }
        return rest;
    }
}

/// Removes any number of stacked `www.` prefixes
fn strip_www_prefix(url: &str) -> &str {
    let mut rest = url;
    while let Some(stripped) = rest.strip_prefix("www.") {
        rest = stripped;
    }
    rest
}

fn strip_query_string(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn strip_anchor(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

fn strip_asterisk_suffix(url: &str) -> &str {
    url.split('*').next().unwrap_or(url)
}

fn trim_non_alphanumeric(url: &str) -> &str {
    url.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Returns the canonical URL of the site owning `url`: its first path segment
///
/// # Examples
///
/// ```
/// use sitegraph::url::site_key;
///
/// assert_eq!(site_key("example.ro/news/today"), "example.ro");
/// assert_eq!(site_key("example.ro"), "example.ro");
/// ```
pub fn site_key(url: &str) -> &str {
    url.split('/').next().unwrap_or(url)
}
