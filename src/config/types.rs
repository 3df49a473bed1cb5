use serde::Deserialize;

/// Main configuration structure for sitegraph
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub links: LinksConfig,
}

/// Crawl cadence and resource limits
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum number of sites selected per fetch batch
    pub site_batch_size: u32,

    /// Maximum number of pages selected per fetch batch
    pub page_batch_size: u32,

    /// A page seen more recently than this is not fetched again (minutes)
    pub page_freshness_minutes: u32,

    /// Lower bound of the delay before a partition starts (milliseconds)
    pub jitter_min_ms: u64,

    /// Upper bound of the delay before a partition starts (milliseconds)
    pub jitter_max_ms: u64,

    /// Number of partitions fetched at the same time
    pub max_concurrent_partitions: usize,

    /// Per-request HTTP timeout (seconds)
    pub request_timeout_secs: u64,

    /// Refresh interval given to newly created sites (hours)
    pub default_refresh_hours: u32,

    /// Wall-clock budget for processing fetched site content (seconds)
    pub processing_time_limit_secs: u64,

    /// Interval between full crawl cycles (seconds)
    pub cycle_interval_secs: u64,

    /// Interval between duplicate and subdomain ticks (milliseconds)
    pub background_interval_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            site_batch_size: 100,
            page_batch_size: 1000,
            page_freshness_minutes: 60,
            jitter_min_ms: 100,
            jitter_max_ms: 1100,
            max_concurrent_partitions: 16,
            request_timeout_secs: 30,
            default_refresh_hours: 24,
            processing_time_limit_secs: 600,
            cycle_interval_secs: 4 * 60 * 60,
            background_interval_ms: 1000,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Where the link graph is exported at the end of each cycle
    #[serde(default)]
    pub link_graph_path: Option<String>,
}

/// Search API discovery settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SearchConfig {
    pub enabled: bool,
    pub api_url: String,
    pub api_key: Option<String>,
    pub engine_id: Option<String>,

    /// A term whose next start index reaches this value is exhausted
    pub max_start_index: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            api_key: None,
            engine_id: None,
            max_start_index: 101,
        }
    }
}

/// Independent on/off switches for the scheduled jobs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct JobsConfig {
    pub fetch_content: bool,
    pub process_websites: bool,
    pub fix_duplicates: bool,
    pub build_subdomains: bool,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            fetch_content: true,
            process_websites: true,
            fix_duplicates: true,
            build_subdomains: true,
        }
    }
}

/// Longest accepted processing budget: one day
pub const MAX_PROCESSING_TIME_LIMIT_SECS: u64 = 24 * 60 * 60;

/// Longest accepted interval for either scheduled job: thirty days
pub const MAX_JOB_INTERVAL_SECS: u64 = 30 * 24 * 60 * 60;

/// Longest accepted lock lease: one year
pub const MAX_LOCK_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Scheduler lock lease settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LockConfig {
    /// How long a lock is held before another instance may take it (seconds)
    pub ttl_secs: u64,

    /// Name recorded as the lock holder; defaults to one derived from the pid
    pub instance_name: Option<String>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 4 * 60 * 60,
            instance_name: None,
        }
    }
}

impl LockConfig {
    pub fn instance_name(&self) -> String {
        self.instance_name
            .clone()
            .unwrap_or_else(|| format!("sitegraph-{}", std::process::id()))
    }
}

/// Link filtering settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LinksConfig {
    /// Regular expressions; links matching any of them are never saved
    pub ignore: Vec<String>,
}
