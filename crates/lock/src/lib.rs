//! A named, PID-tagged, time-leased lock, used to enforce at most one
//! live worker process per role. Backed by `blocks_store::Store`; the
//! lease window itself lives in the store's queries (one hour), this
//! crate only owns the acquire/cap/renew decision.

use std::sync::Arc;

use blocks_store::Store;
use thiserror::Error;

/// Default maximum number of simultaneously live locks sharing a `name`.
pub const DEFAULT_MAX_LOCKS: u32 = 50;

/// How often the worker runtime should re-invoke `lock` to keep its
/// lease alive.
pub const RENEWAL_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("maximum locks reached for '{name}'")]
    Exists { name: String },

    #[error(transparent)]
    Store(#[from] blocks_store::StoreError),
}

pub struct LockManager<S: Store> {
    store: Arc<S>,
    max_locks: u32,
}

impl<S: Store> LockManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store, max_locks: DEFAULT_MAX_LOCKS }
    }

    pub fn with_max_locks(store: Arc<S>, max_locks: u32) -> Self {
        Self { store, max_locks }
    }

    /// Attempts to acquire (or renew) the named lock for `pid`.
    ///
    /// Succeeds if `pid` already holds any live lock (renewing it), or
    /// if fewer than `max_locks` live locks share `name`. Every success
    /// path, including renewal, writes `updated = now()` so a worker
    /// that keeps calling this every [`RENEWAL_INTERVAL_SECS`] never
    /// loses its lease to staleness.
    pub async fn lock(&self, name: &str, pid: i32) -> Result<bool, LockError> {
        if let Some(existing) = self.store.live_lock_for_pid(pid).await? {
            self.store.renew_lock(existing.lock_id).await?;
            return Ok(true);
        }

        let live = self.store.live_locks_for_name(name).await?;

        if (live.len() as u32) < self.max_locks {
            self.store.insert_lock(name, pid).await?;
            return Ok(true);
        }

        if let Some(holder) = live.first() {
            if holder.pid == pid {
                self.store.renew_lock(holder.lock_id).await?;
                return Ok(true);
            }
        }

        Err(LockError::Exists { name: name.to_string() })
    }

    pub async fn unlock(&self, name: &str, pid: i32) -> Result<(), LockError> {
        self.store.delete_lock(name, pid).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocks_store::memory::MemoryStore;

    fn manager_with_cap(cap: u32) -> LockManager<MemoryStore> {
        LockManager::with_max_locks(Arc::new(MemoryStore::new()), cap)
    }

    #[tokio::test]
    async fn first_acquire_succeeds() {
        let mgr = manager_with_cap(DEFAULT_MAX_LOCKS);
        assert!(mgr.lock("block-consumer", 100).await.unwrap());
    }

    #[tokio::test]
    async fn same_pid_renews_instead_of_failing() {
        let mgr = manager_with_cap(1);
        assert!(mgr.lock("block-consumer", 100).await.unwrap());
        assert!(mgr.lock("block-consumer", 100).await.unwrap());
    }

    #[tokio::test]
    async fn different_pid_blocked_once_cap_reached() {
        let mgr = manager_with_cap(1);
        assert!(mgr.lock("block-consumer", 100).await.unwrap());
        let err = mgr.lock("block-consumer", 200).await.unwrap_err();
        assert!(matches!(err, LockError::Exists { .. }));
    }

    #[tokio::test]
    async fn different_names_do_not_share_a_cap() {
        let mgr = manager_with_cap(1);
        assert!(mgr.lock("block-consumer", 100).await.unwrap());
        assert!(mgr.lock("tx-prime-consumer", 200).await.unwrap());
    }

    #[tokio::test]
    async fn unlock_frees_the_slot_for_another_pid() {
        let mgr = manager_with_cap(1);
        assert!(mgr.lock("block-consumer", 100).await.unwrap());
        mgr.unlock("block-consumer", 100).await.unwrap();
        assert!(mgr.lock("block-consumer", 200).await.unwrap());
    }

    #[tokio::test]
    async fn stale_lock_does_not_block_new_acquisition() {
        let mgr = LockManager::with_max_locks(
            Arc::new(MemoryStore::with_lease(chrono::Duration::seconds(-1))),
            1,
        );
        assert!(mgr.lock("block-consumer", 100).await.unwrap());
        // The first lock is already "stale" per the negative lease window above.
        assert!(mgr.lock("block-consumer", 200).await.unwrap());
    }
}
