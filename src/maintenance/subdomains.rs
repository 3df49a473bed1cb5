//! Subdomain forest inference

use crate::storage::{Storage, StorageResult};

/// A parent site and the subdomains attached to it in one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdomainGroup {
    pub parent_id: i64,
    pub parent_url: String,
    pub child_ids: Vec<i64>,

    /// Edges that did not exist before
    pub added: usize,
}

/// Attaches every unparented subdomain of the next candidate top-level site
///
/// A candidate is an error-free site with fewer than two dots in its URL that
/// is neither parent nor child yet. Children are error-free sites with at least
/// two dots whose URL contains `.` followed by the candidate's URL. Returns
/// `None` when no candidate is left.
pub fn build_next_subdomain_group<S: Storage>(
    storage: &mut S,
) -> StorageResult<Option<SubdomainGroup>> {
    let Some(parent) = storage.get_next_subdomain_candidate()? else {
        return Ok(None);
    };

    let child_ids: Vec<i64> = storage
        .get_subdomains_for_url(&parent.url)?
        .into_iter()
        .map(|site| site.id)
        .collect();
    let added = storage.add_subdomains(parent.id, &child_ids)?;

    tracing::info!(
        "Linked {} subdomains to {} ({} new)",
        child_ids.len(),
        parent.url,
        added
    );

    Ok(Some(SubdomainGroup {
        parent_id: parent.id,
        parent_url: parent.url,
        child_ids,
        added,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentCategory, SiteKind};
    use crate::storage::{NewSite, SqliteStorage, SubdomainRecord};
    use chrono::Utc;

    fn add(storage: &mut SqliteStorage, url: &str) -> i64 {
        storage
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
    fn test_blog_subdomain() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let parent = add(&mut storage, "example.ro");
        let child = add(&mut storage, "blog.example.ro");
        add(&mut storage, "other.ro");

        let group = build_next_subdomain_group(&mut storage).unwrap().unwrap();
        assert_eq!(group.parent_id, parent);
        assert_eq!(group.child_ids, vec![child]);
        assert_eq!(group.added, 1);
        assert_eq!(
            storage.get_subdomain_edges().unwrap(),
            vec![SubdomainRecord {
                parent_id: parent,
                child_id: child
            }]
        );

        // Second run finds nothing left to do
        assert_eq!(build_next_subdomain_group(&mut storage).unwrap(), None);
        assert_eq!(storage.get_subdomain_edges().unwrap().len(), 1);
        assert_eq!(storage.count_subdomains().unwrap(), 1);
    }

    #[test]
    fn test_errored_sites_are_skipped() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        add(&mut storage, "example.ro");
        let child = add(&mut storage, "shop.example.ro");
        storage
            .record_site_fetch_failure(child, "HTTP 500", Utc::now())
            .unwrap();

        assert_eq!(build_next_subdomain_group(&mut storage).unwrap(), None);
    }

    #[test]
    fn test_groups_are_built_one_parent_at_a_time() {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        let first = add(&mut storage, "first.ro");
        let second = add(&mut storage, "second.ro");
        add(&mut storage, "a.first.ro");
        add(&mut storage, "b.first.ro");
        add(&mut storage, "www2.second.ro");

        let group = build_next_subdomain_group(&mut storage).unwrap().unwrap();
        assert_eq!(group.parent_id, first);
        assert_eq!(group.child_ids.len(), 2);

        let group = build_next_subdomain_group(&mut storage).unwrap().unwrap();
        assert_eq!(group.parent_id, second);
        assert_eq!(group.child_ids.len(), 1);

        assert_eq!(build_next_subdomain_group(&mut storage).unwrap(), None);
    }
}
