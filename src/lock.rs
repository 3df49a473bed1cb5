//! Named scheduler locks
//!
//! A lock is a lease row in the shared store. Whoever holds an unexpired lease
//! runs the job; a crashed holder's lease simply runs out after the TTL.

use crate::config::MAX_LOCK_TTL_SECS;
use crate::storage::{lock_storage, SharedStorage, Storage, StorageResult};
use chrono::{Duration, Utc};

/// Guards the full fetch cycle
pub const FETCH_WEBSITES_CONTENT: &str = "fetch_websites_content";

/// Guards duplicate reconciliation
pub const FIX_DUPLICATE_WEBSITES: &str = "fix_duplicate_websites";

/// Guards the subdomain builder
pub const ESTABLISH_SUBDOMAIN_RELATIONSHIPS: &str = "establish_subdomain_relationships";

/// Acquires and releases named leases on behalf of one instance
#[derive(Clone)]
pub struct SchedulerLock {
    storage: SharedStorage,
    owner: String,
    ttl: Duration,
}

impl SchedulerLock {
    /// Leases longer than `MAX_LOCK_TTL_SECS` are cut down to it
    pub fn new(storage: SharedStorage, owner: impl Into<String>, ttl_secs: u64) -> Self {
        let ttl_secs = ttl_secs.min(MAX_LOCK_TTL_SECS) as i64;
        Self {
            storage,
            owner: owner.into(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Takes the lease unless another holder's lease is still running
    ///
    /// Re-acquiring an expired lease of our own succeeds as well.
    pub fn try_acquire(&self, name: &str) -> StorageResult<bool> {
        let now = Utc::now();
        let acquired =
            lock_storage(&self.storage)?.try_acquire_lock(name, &self.owner, now, now + self.ttl)?;

        if acquired {
            tracing::debug!("{} acquired lock {}", self.owner, name);
        } else {
            tracing::debug!("Lock {} is held elsewhere", name);
        }
        Ok(acquired)
    }

    /// Ends our lease; a no-op if someone else holds it
    pub fn release(&self, name: &str) -> StorageResult<()> {
        lock_storage(&self.storage)?.release_lock(name, &self.owner, Utc::now())
    }

    /// Runs `job` while holding the named lease
    ///
    /// Returns `None` without running the job when the lock is taken.
    pub fn run_exclusive<T>(
        &self,
        name: &str,
        job: impl FnOnce() -> T,
    ) -> StorageResult<Option<T>> {
        if !self.try_acquire(name)? {
            return Ok(None);
        }

        let result = job();
        self.release(name)?;
        Ok(Some(result))
    }
}
