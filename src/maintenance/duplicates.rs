//! Duplicate site reconciliation

use crate::storage::{Storage, StorageResult};

/// A merge of every site sharing one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    pub url: String,
    pub survivor_id: i64,
    pub removed_ids: Vec<i64>,
}

/// Merges the sites sharing the most duplicated URL into the lowest id
///
/// Returns `None` when every URL is unique.
pub fn fix_next_duplicate<S: Storage>(storage: &mut S) -> StorageResult<Option<MergeReport>> {
    let Some(url) = storage.get_next_duplicate_url()? else {
        return Ok(None);
    };

    let sites = storage.get_sites_with_url(&url)?;
    let Some((survivor, duplicates)) = sites.split_first() else {
        return Ok(None);
    };
    let removed_ids: Vec<i64> = duplicates.iter().map(|site| site.id).collect();

    storage.merge_sites(survivor.id, &removed_ids)?;
    tracing::info!(
        "Merged {} duplicates of {} into site {}",
        removed_ids.len(),
        url,
        survivor.id
    );

    Ok(Some(MergeReport {
        url,
        survivor_id: survivor.id,
        removed_ids,
    }))
}
