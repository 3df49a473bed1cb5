//! Link graph export for the external indexing step

use crate::model::{ContentCategory, SiteKind};
use crate::output::traits::{IndexReport, Indexer, OutputError, OutputResult};
use crate::storage::{db_timestamp, lock_storage, SharedStorage, Storage, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct GraphSite {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub kind: &'static str,
    pub category: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphLink {
    pub from: i64,
    pub to: i64,
    pub content_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphSubdomain {
    pub parent: i64,
    pub child: i64,
}

/// Snapshot of the current link graph and the subdomain forest
#[derive(Debug, Clone, Serialize)]
pub struct LinkGraph {
    pub generated_on: String,
    pub sites: Vec<GraphSite>,
    pub links: Vec<GraphLink>,
    pub subdomains: Vec<GraphSubdomain>,
}

impl LinkGraph {
    pub fn report(&self) -> IndexReport {
        IndexReport {
            sites: self.sites.len(),
            links: self.links.len(),
            subdomains: self.subdomains.len(),
        }
    }
}

/// Loads the live edges and the sites they connect
///
/// With a filter, only edges leaving sites of that kind and category are taken.
pub fn load_link_graph<S: Storage + ?Sized>(
    storage: &S,
    filter: Option<(SiteKind, ContentCategory)>,
    now: DateTime<Utc>,
) -> StorageResult<LinkGraph> {
    let sites = storage
        .get_linked_sites(filter)?
        .into_iter()
        .map(|site| GraphSite {
            id: site.id,
            url: site.url,
            title: site.title,
            kind: site.kind.to_db_string(),
            category: site.category.to_db_string(),
        })
        .collect();

    let links = storage
        .get_current_links(filter)?
        .into_iter()
        .map(|link| GraphLink {
            from: link.from_site_id,
            to: link.to_site_id,
            content_id: link.content_id,
        })
        .collect();

    let subdomains = storage
        .get_subdomain_edges()?
        .into_iter()
        .map(|edge| GraphSubdomain {
            parent: edge.parent_id,
            child: edge.child_id,
        })
        .collect();

    Ok(LinkGraph {
        generated_on: db_timestamp(now),
        sites,
        links,
        subdomains,
    })
}

/// Writes the link graph as JSON to a file
pub struct LinkGraphExport {
    path: PathBuf,
    filter: Option<(SiteKind, ContentCategory)>,
}

impl LinkGraphExport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            filter: None,
        }
    }

    /// Restricts the export to edges leaving sites of this kind and category
    pub fn with_filter(mut self, filter: Option<(SiteKind, ContentCategory)>) -> Self {
        self.filter = filter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes next to the target and renames, so readers never see a partial file
    async fn write_atomically(&self, contents: &str) -> OutputResult<()> {
        let write_error = |source| OutputError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }

        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, contents)
            .await
            .map_err(write_error)?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(write_error)?;
        Ok(())
    }
}

#[async_trait]
impl Indexer for LinkGraphExport {
    fn name(&self) -> &str {
        "link-graph-export"
    }

    async fn index(&self, storage: &SharedStorage) -> OutputResult<IndexReport> {
        let graph = {
            let storage = lock_storage(storage)?;
            load_link_graph(&*storage, self.filter, Utc::now())?
        };

        let json = serde_json::to_string_pretty(&graph)?;
        self.write_atomically(&json).await?;

        let report = graph.report();
        tracing::info!(
            "Exported {} sites, {} links and {} subdomain edges to {}",
            report.sites,
            report.links,
            report.subdomains,
            self.path.display()
        );
        Ok(report)
    }
}
