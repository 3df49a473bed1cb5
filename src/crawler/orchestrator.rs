//! Fetch orchestration: domain-partitioned parallel fetching
//!
//! A batch is split into one partition per site key. Partitions run as
//! separate tasks bounded by a semaphore; targets inside a partition are
//! fetched one after another so a single host never sees parallel requests
//! from one batch. Each partition waits a random jitter before its first
//! request.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{fetch_document, FetchResult};
use crate::crawler::parser::parse_document;
use crate::crawler::partition::{partition_by_site, FetchTarget};
use crate::crawler::processor::process_page_document;
use crate::storage::{lock_storage, PageRecord, SharedStorage, SiteRecord, Storage, StorageResult};
use crate::url::{site_key, LinkPatterns};
use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Success accounting for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub attempted: usize,
    pub successful: usize,
}

impl BatchOutcome {
    /// `successful / attempted`, or 0 when nothing was attempted
    pub fn success_ratio(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.successful as f64 / self.attempted as f64
        }
    }

    fn merge(&mut self, other: BatchOutcome) {
        self.attempted += other.attempted;
        self.successful += other.successful;
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} successful ({:.2}%)",
            self.successful,
            self.attempted,
            self.success_ratio() * 100.0
        )
    }
}

/// State shared by every partition task of a batch
struct FetchContext {
    storage: SharedStorage,
    client: Client,
    patterns: Arc<LinkPatterns>,
}

/// Fetches batches of sites or pages
pub struct FetchOrchestrator {
    context: Arc<FetchContext>,
    semaphore: Arc<Semaphore>,
    jitter_ms: RangeInclusive<u64>,
}

impl FetchOrchestrator {
    pub fn new(
        storage: SharedStorage,
        client: Client,
        patterns: Arc<LinkPatterns>,
        config: &CrawlerConfig,
    ) -> Self {
        Self {
            context: Arc::new(FetchContext {
                storage,
                client,
                patterns,
            }),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_partitions)),
            jitter_ms: config.jitter_min_ms..=config.jitter_max_ms,
        }
    }

    /// Fetches every target of the batch and reports success accounting
    ///
    /// Failures are recorded on the item and never propagate past the batch.
    pub async fn fetch_batch(&self, targets: Vec<FetchTarget>) -> BatchOutcome {
        let partitions = partition_by_site(targets);
        tracing::info!("Fetching batch in {} partitions", partitions.len());

        let mut tasks = JoinSet::new();
        for (key, partition) in partitions {
            let context = Arc::clone(&self.context);
            let semaphore = Arc::clone(&self.semaphore);
            let jitter = Duration::from_millis(rand::rng().random_range(self.jitter_ms.clone()));

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return BatchOutcome::default();
                };
                tokio::time::sleep(jitter).await;
                fetch_partition(&context, &key, partition).await
            });
        }

        let mut outcome = BatchOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(partition_outcome) => outcome.merge(partition_outcome),
                Err(e) => tracing::error!("Partition task failed: {}", e),
            }
        }

        tracing::info!("Batch finished: {}", outcome);
        outcome
    }
}

async fn fetch_partition(
    context: &FetchContext,
    key: &str,
    targets: Vec<FetchTarget>,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    tracing::debug!("Partition {} has {} targets", key, targets.len());

    for target in targets {
        outcome.attempted += 1;
        let url = target.url().to_string();

        match fetch_target(context, target).await {
            Ok(true) => outcome.successful += 1,
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to record fetch of {}: {}", url, e),
        }
    }

    outcome
}

/// Fetches one target and records the result; `Ok(true)` on a successful fetch
async fn fetch_target(context: &FetchContext, target: FetchTarget) -> StorageResult<bool> {
    match target {
        FetchTarget::Site(site) => fetch_site(context, &site).await,
        FetchTarget::Page(page) => fetch_page(context, &page).await,
    }
}

async fn fetch_site(context: &FetchContext, site: &SiteRecord) -> StorageResult<bool> {
    let result = fetch_document(&context.client, &site.url).await;
    let now = Utc::now();
    let mut storage = lock_storage(&context.storage)?;

    match result {
        FetchResult::Success {
            body, final_url, ..
        } => {
            let content_id = storage.record_site_fetch_success(site.id, &body, now)?;
            tracing::debug!("Fetched site {} from {} (content {})", site.url, final_url, content_id);
            Ok(true)
        }
        failure => {
            let reason = failure.failure_reason().unwrap_or_default();
            tracing::warn!("Fetch of site {} failed: {}", site.url, reason);
            storage.record_site_fetch_failure(site.id, &reason, now)?;
            Ok(false)
        }
    }
}

async fn fetch_page(context: &FetchContext, page: &PageRecord) -> StorageResult<bool> {
    let result = fetch_document(&context.client, &page.url).await;
    let now = Utc::now();

    match result {
        FetchResult::Success { body, .. } => {
            // Parsed before locking; the document is not needed across an await
            let parsed = parse_document(&body, site_key(&page.url), &context.patterns);
            let mut storage = lock_storage(&context.storage)?;
            storage.record_page_fetch_success(page.id, now)?;
            let summary = process_page_document(&mut *storage, page, &parsed)?;
            tracing::debug!(
                "Fetched page {}: {} new pages, {} new edges",
                page.url,
                summary.new_pages,
                summary.new_edges
            );
            Ok(true)
        }
        failure => {
            let reason = failure.failure_reason().unwrap_or_default();
            tracing::warn!("Fetch of page {} failed: {}", page.url, reason);
            lock_storage(&context.storage)?.record_page_fetch_failure(page.id, &reason, now)?;
            Ok(false)
        }
    }
}
