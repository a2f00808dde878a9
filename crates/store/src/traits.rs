use async_trait::async_trait;
use blocks_types::{Block, Consumer, Lock, Transaction};
use uuid::Uuid;

use crate::error::StoreError;

/// The persistence interface the conductor and workers depend on. Kept as
/// a trait so the conductor's job-partitioning logic can be exercised
/// against an in-memory double (see the `memory` module, behind the
/// `test-util` feature) without a running database.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Applies the initial DDL if the schema doesn't exist yet. Returns
    /// `true` if it just created the schema, `false` if it already
    /// existed.
    async fn run_initial_ddl(&self) -> Result<bool, StoreError>;

    // -- blocks --

    async fn get_latest_block_number(&self) -> Result<Option<u64>, StoreError>;

    /// Streams `(block_number, primed)` pairs in `[offset, offset+limit)`,
    /// ordered by `block_number`. Used by the conductor's initialization to
    /// pull `known_block_numbers` in chunks.
    async fn get_block_numbers_chunk(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<(u64, bool)>, StoreError>;

    async fn insert_block(&self, block: &Block) -> Result<(), StoreError>;

    async fn insert_transaction_stub(
        &self,
        hash: &str,
        block_number: Option<u64>,
    ) -> Result<(), StoreError>;

    async fn mark_primed(&self, block_number: u64) -> Result<(), StoreError>;

    /// Blocks with `primed = false`, excluding `exclude`, ordered
    /// `block_number DESC`, limited to `limit`.
    async fn get_unprimed_blocks(
        &self,
        limit: u32,
        exclude: &[u64],
    ) -> Result<Vec<u64>, StoreError>;

    async fn validate_block(&self, block_number: u64) -> Result<(bool, Vec<String>), StoreError>;

    async fn validate_block_primed(
        &self,
        block_number: u64,
    ) -> Result<(bool, Vec<String>), StoreError>;

    async fn count_blocks(&self) -> Result<i64, StoreError>;

    async fn get_blocks_in_range(&self, start: u64, end: u64) -> Result<Vec<Block>, StoreError>;

    // -- transactions --

    /// Up to `limit` hashes of `dirty = true` transactions, in random
    /// order (so repeated calls don't hammer the same rows).
    async fn get_random_dirty_transactions(
        &self,
        limit: u32,
    ) -> Result<Vec<String>, StoreError>;

    async fn update_transaction_detail(&self, tx: &Transaction) -> Result<(), StoreError>;

    async fn validate_transaction(&self, hash: &str) -> Result<(bool, Vec<String>), StoreError>;

    async fn count_transactions(&self) -> Result<i64, StoreError>;

    // -- consumers --

    async fn register_consumer(&self, consumer: &Consumer) -> Result<(), StoreError>;

    async fn ping_consumer(&self, uuid: Uuid) -> Result<(), StoreError>;

    async fn deactivate_consumer(&self, uuid: Uuid) -> Result<(), StoreError>;

    // -- locks --

    async fn live_lock_for_pid(&self, pid: i32) -> Result<Option<Lock>, StoreError>;

    async fn live_locks_for_name(&self, name: &str) -> Result<Vec<Lock>, StoreError>;

    async fn insert_lock(&self, name: &str, pid: i32) -> Result<i64, StoreError>;

    async fn renew_lock(&self, lock_id: i64) -> Result<(), StoreError>;

    async fn delete_lock(&self, name: &str, pid: i32) -> Result<(), StoreError>;
}
