//! Statistics generation from the site database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::model::{ContentCategory, SiteKind};
use crate::storage::{Storage, StorageResult};

/// Site graph statistics summary
#[derive(Debug, Clone, Default)]
pub struct SiteStatistics {
    /// Total number of sites known
    pub total_sites: u64,

    /// Sites fetched at least once
    pub checked_sites: u64,

    /// Sites with at least one processed document
    pub processed_sites: u64,

    /// Sites whose last fetch failed
    pub errored_sites: u64,

    pub sites_by_kind: Vec<(SiteKind, u64)>,
    pub sites_by_category: Vec<(ContentCategory, u64)>,

    pub top_domains: u64,
    pub subdomains: u64,

    /// URLs shared by more than one site
    pub duplicate_urls: u64,

    pub total_pages: u64,

    /// Edges of the current link graph
    pub current_links: u64,
}

impl SiteStatistics {
    /// Share of `count` in all sites, as a percentage
    pub fn percent_of_sites(&self, count: u64) -> f64 {
        if self.total_sites == 0 {
            0.0
        } else {
            count as f64 / self.total_sites as f64 * 100.0
        }
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(SiteStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics<S: Storage + ?Sized>(storage: &S) -> StorageResult<SiteStatistics> {
    let mut sites_by_kind = Vec::with_capacity(SiteKind::ALL.len());
    for kind in SiteKind::ALL {
        sites_by_kind.push((kind, storage.count_sites_by_kind(kind)?));
    }

    let mut sites_by_category = Vec::with_capacity(ContentCategory::ALL.len());
    for category in ContentCategory::ALL {
        sites_by_category.push((category, storage.count_sites_by_category(category)?));
    }

    Ok(SiteStatistics {
        total_sites: storage.count_sites()?,
        checked_sites: storage.count_checked_sites()?,
        processed_sites: storage.count_processed_sites()?,
        errored_sites: storage.count_errored_sites()?,
        sites_by_kind,
        sites_by_category,
        top_domains: storage.count_top_domains()?,
        subdomains: storage.count_subdomains()?,
        duplicate_urls: storage.count_duplicate_urls()?,
        total_pages: storage.count_pages()?,
        current_links: storage.count_current_links()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &SiteStatistics) {
    println!("=== Site Graph Statistics ===\n");

    println!("Sites:");
    println!("  Total: {}", stats.total_sites);
    for (label, count) in [
        ("Checked", stats.checked_sites),
        ("Processed", stats.processed_sites),
        ("With errors", stats.errored_sites),
    ] {
        println!(
            "  {}: {} ({:.2}%)",
            label,
            count,
            stats.percent_of_sites(count)
        );
    }
    println!();

    println!("Sites by Kind:");
    for (kind, count) in &stats.sites_by_kind {
        println!("  {}: {} ({:.2}%)", kind, count, stats.percent_of_sites(*count));
    }
    println!();

    println!("Sites by Category:");
    for (category, count) in &stats.sites_by_category {
        println!(
            "  {}: {} ({:.2}%)",
            category,
            count,
            stats.percent_of_sites(*count)
        );
    }
    println!();

    println!("Domains:");
    println!("  Top-level domains: {}", stats.top_domains);
    println!("  Known subdomains: {}", stats.subdomains);
    println!("  Duplicated URLs: {}", stats.duplicate_urls);
    println!();

    println!("Pages: {}", stats.total_pages);
    println!("Current site links: {}", stats.current_links);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NewSite, SqliteStorage};
    use chrono::Utc;

    #[test]
    fn test_percent_of_sites() {
        assert_eq!(SiteStatistics::default().percent_of_sites(3), 0.0);

        let stats = SiteStatistics {
            total_sites: 8,
            ..Default::default()
        };
        assert!((stats.percent_of_sites(2) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        for (url, kind, category) in [
            ("stiri.ro", SiteKind::Domestic, ContentCategory::News),
            ("blog.stiri.ro", SiteKind::Domestic, ContentCategory::Uncategorized),
            ("facebook.com", SiteKind::Foreign, ContentCategory::SocialMedia),
        ] {
            storage
                .insert_site(
                    &NewSite {
                        url: url.to_string(),
                        title: None,
                        kind,
                        category,
                        refresh_interval_hours: 24,
                    },
                    Utc::now(),
                )
                .unwrap();
        }
        storage
            .record_site_fetch_failure(2, "timeout", Utc::now())
            .unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.total_sites, 3);
        assert_eq!(stats.checked_sites, 1);
        assert_eq!(stats.errored_sites, 1);
        assert_eq!(stats.processed_sites, 0);
        assert_eq!(stats.top_domains, 2);
        assert!(stats.sites_by_kind.contains(&(SiteKind::Domestic, 2)));
        assert!(stats
            .sites_by_category
            .contains(&(ContentCategory::SocialMedia, 1)));
        assert_eq!(stats.current_links, 0);
    }
}
