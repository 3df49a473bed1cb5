//! Crawler coordinator - cycle and daemon orchestration
//!
//! A full cycle runs search discovery, fetches due sites and pages, processes
//! fetched site documents under a time budget and finally hands the link graph
//! to the indexer. The daemon runs the cycle on a long interval and the two
//! maintenance jobs on short ones; every job is guarded by a scheduler lock so
//! only one instance in a deployment acts at a time.

use crate::config::{Config, MAX_JOB_INTERVAL_SECS, MAX_PROCESSING_TIME_LIMIT_SECS};
use crate::crawler::fetcher::build_http_client;
use crate::crawler::orchestrator::{BatchOutcome, FetchOrchestrator};
use crate::crawler::partition::FetchTarget;
use crate::crawler::processor::{process_due_content, ProcessingOutcome};
use crate::discovery::{DiscoveryOutcome, GoogleSearchClient, SearchClient, SearchDiscovery};
use crate::lock::{
    SchedulerLock, ESTABLISH_SUBDOMAIN_RELATIONSHIPS, FETCH_WEBSITES_CONTENT,
    FIX_DUPLICATE_WEBSITES,
};
use crate::maintenance::{build_next_subdomain_group, fix_next_duplicate};
use crate::output::{IndexReport, Indexer, LinkGraphExport};
use crate::storage::{into_shared, lock_storage, open_storage, SharedStorage, Storage};
use crate::url::LinkPatterns;
use crate::SitegraphError;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// Everything one full cycle did
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub discovery: Option<DiscoveryOutcome>,
    pub sites: BatchOutcome,
    pub pages: BatchOutcome,
    pub processing: ProcessingOutcome,
    pub index: Option<IndexReport>,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SharedStorage,
    patterns: Arc<LinkPatterns>,
    orchestrator: FetchOrchestrator,
    discovery: SearchDiscovery,
    search_client: Option<Arc<dyn SearchClient>>,
    indexer: Option<Arc<dyn Indexer>>,
    lock: SchedulerLock,
}

impl Coordinator {
    /// Creates a coordinator from configuration
    ///
    /// Opens the database, builds the HTTP client and, when enabled, the
    /// search client and the link graph exporter.
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(SitegraphError)` - Failed to initialize
    pub fn new(config: Config) -> Result<Self, SitegraphError> {
        let storage = into_shared(open_storage(Path::new(&config.output.database_path))?);
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?;

        let search_client: Option<Arc<dyn SearchClient>> = if config.search.enabled {
            Some(Arc::new(GoogleSearchClient::from_config(
                client.clone(),
                &config.search,
            )?))
        } else {
            None
        };

        let indexer: Option<Arc<dyn Indexer>> = config
            .output
            .link_graph_path
            .as_ref()
            .map(|path| Arc::new(LinkGraphExport::new(path)) as Arc<dyn Indexer>);

        Self::with_parts(config, storage, client, search_client, indexer)
    }

    /// Creates a coordinator from already built collaborators
    pub fn with_parts(
        config: Config,
        storage: SharedStorage,
        client: reqwest::Client,
        search_client: Option<Arc<dyn SearchClient>>,
        indexer: Option<Arc<dyn Indexer>>,
    ) -> Result<Self, SitegraphError> {
        let patterns = Arc::new(LinkPatterns::new(&config.links.ignore)?);
        let orchestrator = FetchOrchestrator::new(
            storage.clone(),
            client,
            Arc::clone(&patterns),
            &config.crawler,
        );
        let discovery = SearchDiscovery::new(
            config.search.max_start_index,
            config.crawler.default_refresh_hours,
        );
        let lock = SchedulerLock::new(
            storage.clone(),
            config.lock.instance_name(),
            config.lock.ttl_secs,
        );

        Ok(Self {
            config: Arc::new(config),
            storage,
            patterns,
            orchestrator,
            discovery,
            search_client,
            indexer,
            lock,
        })
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Runs one full cycle without taking the scheduler lock
    ///
    /// Discovery and indexing failures are logged and do not abort the cycle;
    /// storage failures while selecting work do.
    pub async fn run_cycle(&self) -> Result<CycleReport, SitegraphError> {
        let started = Instant::now();
        let mut report = CycleReport::default();
        tracing::info!("Starting crawl cycle");

        if let Some(client) = &self.search_client {
            match self.discovery.run(&self.storage, client.as_ref()).await {
                Ok(outcome) => report.discovery = Some(outcome),
                Err(e) => tracing::warn!("Search discovery failed: {}", e),
            }
        }

        if self.config.jobs.fetch_content {
            report.sites = self.fetch_due_sites().await?;
            report.pages = self.fetch_due_pages().await?;
        }

        if self.config.jobs.process_websites {
            report.processing = self.process_websites().await?;
        }

        if let Some(indexer) = &self.indexer {
            match indexer.index(&self.storage).await {
                Ok(index) => report.index = Some(index),
                Err(e) => tracing::warn!("Indexer {} failed: {}", indexer.name(), e),
            }
        }

        tracing::info!(
            "Crawl cycle finished in {:?}: sites {}, pages {}, {} documents processed",
            started.elapsed(),
            report.sites,
            report.pages,
            report.processing.processed
        );
        Ok(report)
    }

    async fn fetch_due_sites(&self) -> Result<BatchOutcome, SitegraphError> {
        let started = Instant::now();
        let sites = lock_storage(&self.storage)?
            .get_sites_due_for_fetch(Utc::now(), self.config.crawler.site_batch_size)?;
        tracing::info!("Fetching {} due sites", sites.len());

        let outcome = self
            .orchestrator
            .fetch_batch(sites.into_iter().map(FetchTarget::Site).collect())
            .await;
        tracing::info!("Site fetch done in {:?}: {}", started.elapsed(), outcome);
        Ok(outcome)
    }

    async fn fetch_due_pages(&self) -> Result<BatchOutcome, SitegraphError> {
        let started = Instant::now();
        let pages = lock_storage(&self.storage)?.get_pages_due_for_fetch(
            Utc::now(),
            self.config.crawler.page_freshness_minutes,
            self.config.crawler.page_batch_size,
        )?;
        tracing::info!("Fetching {} due pages", pages.len());

        let outcome = self
            .orchestrator
            .fetch_batch(pages.into_iter().map(FetchTarget::Page).collect())
            .await;
        tracing::info!("Page fetch done in {:?}: {}", started.elapsed(), outcome);
        Ok(outcome)
    }

    /// Processes due site documents on a blocking thread until none are left
    /// or the processing time limit passes
    async fn process_websites(&self) -> Result<ProcessingOutcome, SitegraphError> {
        let storage = self.storage.clone();
        let patterns = Arc::clone(&self.patterns);
        let limit = self.config.crawler.site_batch_size;
        let budget = self
            .config
            .crawler
            .processing_time_limit_secs
            .min(MAX_PROCESSING_TIME_LIMIT_SECS);
        let deadline = Instant::now() + Duration::from_secs(budget);

        let outcome = tokio::task::spawn_blocking(move || -> Result<_, SitegraphError> {
            let mut total = ProcessingOutcome::default();
            loop {
                let batch = process_due_content(&storage, &patterns, limit, deadline)?;
                total.processed += batch.processed;
                total.failed += batch.failed;
                total.new_pages += batch.new_pages;
                total.new_edges += batch.new_edges;
                total.timed_out = batch.timed_out;

                let drained = (batch.processed + batch.failed) < limit as usize;
                if batch.timed_out || drained || batch.processed == 0 {
                    return Ok(total);
                }
            }
        })
        .await
        .map_err(std::io::Error::from)??;

        tracing::info!(
            "Processed {} site documents ({} failed, {} new pages, {} new edges)",
            outcome.processed,
            outcome.failed,
            outcome.new_pages,
            outcome.new_edges
        );
        Ok(outcome)
    }

    /// One tick of the full cycle job, under its scheduler lock
    pub async fn cycle_tick(&self) -> Result<Option<CycleReport>, SitegraphError> {
        if !self.lock.try_acquire(FETCH_WEBSITES_CONTENT)? {
            tracing::debug!("Crawl cycle skipped, another instance holds the lock");
            return Ok(None);
        }

        let result = self.run_cycle().await;
        self.lock.release(FETCH_WEBSITES_CONTENT)?;
        result.map(Some)
    }

    /// One tick of duplicate reconciliation; true if a merge happened
    pub fn duplicates_tick(&self) -> Result<bool, SitegraphError> {
        if !self.config.jobs.fix_duplicates {
            return Ok(false);
        }

        let merged = self.lock.run_exclusive(FIX_DUPLICATE_WEBSITES, || {
            let mut storage = lock_storage(&self.storage)?;
            fix_next_duplicate(&mut *storage)
        })?;
        match merged {
            Some(result) => Ok(result?.is_some()),
            None => Ok(false),
        }
    }

    /// One tick of the subdomain builder; true if a group was built
    pub fn subdomains_tick(&self) -> Result<bool, SitegraphError> {
        if !self.config.jobs.build_subdomains {
            return Ok(false);
        }

        let built = self.lock.run_exclusive(ESTABLISH_SUBDOMAIN_RELATIONSHIPS, || {
            let mut storage = lock_storage(&self.storage)?;
            build_next_subdomain_group(&mut *storage)
        })?;
        match built {
            Some(result) => Ok(result?.is_some()),
            None => Ok(false),
        }
    }

    /// Runs one full cycle, then maintenance until nothing is left to do
    pub async fn run_once(&self) -> Result<CycleReport, SitegraphError> {
        let report = self.cycle_tick().await?.unwrap_or_default();

        let mut merges = 0;
        while self.duplicates_tick()? {
            merges += 1;
        }
        let mut groups = 0;
        while self.subdomains_tick()? {
            groups += 1;
        }
        tracing::info!("Maintenance: {} merges, {} subdomain groups", merges, groups);

        Ok(report)
    }

    /// Runs the daemon until Ctrl-C
    ///
    /// Each job runs as its own task on its own interval; errors of a single
    /// tick are logged and the job keeps going. Held locks are released on
    /// the way out.
    pub async fn run(self: Arc<Self>) -> Result<(), SitegraphError> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let cycle_every =
            Duration::from_secs(self.config.crawler.cycle_interval_secs.min(MAX_JOB_INTERVAL_SECS));
        let background_every = Duration::from_millis(self.config.crawler.background_interval_ms)
            .min(Duration::from_secs(MAX_JOB_INTERVAL_SECS));

        let mut jobs = JoinSet::new();
        {
            let coordinator = Arc::clone(&self);
            let shutdown = shutdown_rx.clone();
            jobs.spawn(every(cycle_every, shutdown, move || {
                let coordinator = Arc::clone(&coordinator);
                async move {
                    if let Err(e) = coordinator.cycle_tick().await {
                        tracing::error!("Crawl cycle failed: {}", e);
                    }
                }
            }));
        }
        {
            let coordinator = Arc::clone(&self);
            let shutdown = shutdown_rx.clone();
            jobs.spawn(every(background_every, shutdown, move || {
                let result = coordinator.duplicates_tick();
                async move {
                    if let Err(e) = result {
                        tracing::error!("Duplicate reconciliation failed: {}", e);
                    }
                }
            }));
        }
        {
            let coordinator = Arc::clone(&self);
            let shutdown = shutdown_rx;
            jobs.spawn(every(background_every, shutdown, move || {
                let result = coordinator.subdomains_tick();
                async move {
                    if let Err(e) = result {
                        tracing::error!("Subdomain building failed: {}", e);
                    }
                }
            }));
        }

        tracing::info!(
            "Daemon started as {} (cycle every {:?}, maintenance every {:?})",
            self.lock.owner(),
            cycle_every,
            background_every
        );

        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown requested, waiting for running jobs");
        let _ = shutdown_tx.send(true);

        while let Some(joined) = jobs.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Job task failed: {}", e);
            }
        }

        for name in [
            FETCH_WEBSITES_CONTENT,
            FIX_DUPLICATE_WEBSITES,
            ESTABLISH_SUBDOMAIN_RELATIONSHIPS,
        ] {
            self.lock.release(name)?;
        }
        tracing::info!("Daemon stopped");
        Ok(())
    }
}

/// Calls `tick` on every interval tick until shutdown is signalled
///
/// A tick that runs long delays the next one instead of piling up.
async fn every<F, Fut>(period: Duration, mut shutdown: watch::Receiver<bool>, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => tick().await,
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
    }
}

/// Runs the crawler as configured: a daemon, or a single cycle with `once`
///
/// # Example
///
/// ```no_run
/// use sitegraph::config::load_config;
/// use sitegraph::crawler::run_crawler;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// run_crawler(config, true).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawler(config: Config, once: bool) -> Result<(), SitegraphError> {
    let coordinator = Coordinator::new(config)?;
    if once {
        coordinator.run_once().await?;
        Ok(())
    } else {
        Arc::new(coordinator).run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputConfig, UserAgentConfig};
    use crate::model::{ContentCategory, SiteKind};
    use crate::storage::{NewSite, SqliteStorage};

    fn create_test_config() -> Config {
        Config {
            crawler: Default::default(),
            user_agent: UserAgentConfig {
                crawler_name: "TestCrawler".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: ":memory:".to_string(),
                link_graph_path: None,
            },
            search: Default::default(),
            jobs: Default::default(),
            lock: Default::default(),
            links: Default::default(),
        }
    }

    fn coordinator(config: Config) -> Coordinator {
        let storage = into_shared(SqliteStorage::open_in_memory().unwrap());
        Coordinator::with_parts(config, storage, reqwest::Client::new(), None, None).unwrap()
    }

    fn add(coordinator: &Coordinator, url: &str) -> i64 {
        lock_storage(coordinator.storage())
            .unwrap()
            .insert_site(
                &NewSite {
                    url: url.to_string(),
                    title: None,
                    kind: SiteKind::Domestic,
                    category: ContentCategory::Uncategorized,
                    refresh_interval_hours: 24,
                },
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn test_maintenance_ticks() {
        let coordinator = coordinator(create_test_config());
        add(&coordinator, "example.ro");
        add(&coordinator, "example.ro");
        add(&coordinator, "blog.example.ro");

        assert!(coordinator.duplicates_tick().unwrap());
        assert!(!coordinator.duplicates_tick().unwrap());

        assert!(coordinator.subdomains_tick().unwrap());
        assert!(!coordinator.subdomains_tick().unwrap());

        let storage = lock_storage(coordinator.storage()).unwrap();
        assert_eq!(storage.count_sites().unwrap(), 2);
        assert_eq!(storage.count_subdomains().unwrap(), 1);
    }

    #[test]
    fn test_disabled_jobs_are_noops() {
        let mut config = create_test_config();
        config.jobs.fix_duplicates = false;
        config.jobs.build_subdomains = false;
        let coordinator = coordinator(config);
        add(&coordinator, "example.ro");
        add(&coordinator, "example.ro");
        add(&coordinator, "blog.example.ro");

        assert!(!coordinator.duplicates_tick().unwrap());
        assert!(!coordinator.subdomains_tick().unwrap());
        assert_eq!(
            lock_storage(coordinator.storage()).unwrap().count_sites().unwrap(),
            3
        );
    }

    #[test]
    fn test_tick_skipped_while_locked_elsewhere() {
        let coordinator = coordinator(create_test_config());
        add(&coordinator, "example.ro");
        add(&coordinator, "example.ro");

        let other = SchedulerLock::new(coordinator.storage().clone(), "other-instance", 60);
        assert!(other.try_acquire(FIX_DUPLICATE_WEBSITES).unwrap());

        assert!(!coordinator.duplicates_tick().unwrap());
        assert_eq!(
            lock_storage(coordinator.storage()).unwrap().count_duplicate_urls().unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_empty_cycle() {
        let mut config = create_test_config();
        config.crawler.jitter_min_ms = 0;
        config.crawler.jitter_max_ms = 0;
        let coordinator = coordinator(config);

        let report = coordinator.cycle_tick().await.unwrap().unwrap();
        assert!(report.discovery.is_none());
        assert_eq!(report.sites.attempted, 0);
        assert_eq!(report.pages.attempted, 0);
        assert_eq!(report.processing, ProcessingOutcome::default());
    }
}
