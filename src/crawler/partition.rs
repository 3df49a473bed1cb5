//! Domain partitioning of fetch batches

use crate::storage::{PageRecord, SiteRecord};
use crate::url::site_key;
use std::collections::BTreeMap;

/// A unit of fetch work
#[derive(Debug, Clone)]
pub enum FetchTarget {
    Site(SiteRecord),
    Page(PageRecord),
}

impl FetchTarget {
    /// Canonical URL to fetch
    pub fn url(&self) -> &str {
        match self {
            Self::Site(site) => &site.url,
            Self::Page(page) => &page.url,
        }
    }

    /// The partition this target belongs to
    pub fn partition_key(&self) -> &str {
        site_key(self.url())
    }
}

/// Groups targets by the first path segment of their URL
///
/// Every target lands in exactly one partition and keeps its relative order
/// within it. Partitions are returned sorted by key.
pub fn partition_by_site(targets: Vec<FetchTarget>) -> Vec<(String, Vec<FetchTarget>)> {
    let mut partitions: BTreeMap<String, Vec<FetchTarget>> = BTreeMap::new();

    for target in targets {
        partitions
            .entry(target.partition_key().to_string())
            .or_default()
            .push(target);
    }

    partitions.into_iter().collect()
}
