//! An in-memory `Store` double used by `blocks-conductor`'s tests so job
//! partitioning can be exercised without a running Postgres instance.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use blocks_types::{Block, Consumer, Lock, Transaction};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::traits::Store;

#[derive(Default)]
struct Inner {
    blocks: BTreeMap<u64, Block>,
    transactions: BTreeMap<String, Transaction>,
    consumers: BTreeMap<Uuid, Consumer>,
    locks: Vec<Lock>,
    next_lock_id: i64,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    lease: chrono::Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { next_lock_id: 1, ..Inner::default() }), lease: chrono::Duration::hours(1) }
    }

    /// Same as `new`, but with a custom lock lease window, for tests that
    /// want to exercise staleness without waiting an hour.
    pub fn with_lease(lease: chrono::Duration) -> Self {
        Self { inner: Mutex::new(Inner { next_lock_id: 1, ..Inner::default() }), lease }
    }

    pub fn seed_block(&self, block: Block) {
        self.inner.lock().unwrap().blocks.insert(block.block_number, block);
    }

    /// Test-only inspection hook: not part of `Store`, since nothing
    /// outside tests needs to read a consumer's heartbeat back out.
    pub fn consumer_last_seen_for_test(&self, uuid: Uuid) -> Option<DateTime<Utc>> {
        self.inner.lock().unwrap().consumers.get(&uuid).and_then(|c| c.last_seen)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn run_initial_ddl(&self) -> Result<bool, StoreError> {
        Ok(self.inner.lock().unwrap().blocks.is_empty())
    }

    async fn get_latest_block_number(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.inner.lock().unwrap().blocks.keys().next_back().copied())
    }

    async fn get_block_numbers_chunk(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<(u64, bool)>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .blocks
            .values()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|b| (b.block_number, b.primed))
            .collect())
    }

    async fn insert_block(&self, block: &Block) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.blocks.contains_key(&block.block_number) {
            return Err(StoreError::UniqueViolation { constraint: "block_pkey".to_string() });
        }
        inner.blocks.insert(block.block_number, block.clone());
        Ok(())
    }

    async fn insert_transaction_stub(
        &self,
        hash: &str,
        block_number: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.transactions.contains_key(hash) {
            return Err(StoreError::UniqueViolation { constraint: "transaction_pkey".to_string() });
        }
        inner.transactions.insert(
            hash.to_string(),
            Transaction {
                hash: hash.to_string(),
                dirty: true,
                block_number: block_number.map(|v| v as i64),
                from_address: None,
                to_address: None,
                value: None,
                gas_price: None,
                gas_limit: None,
                nonce: None,
                input: None,
            },
        );
        Ok(())
    }

    async fn mark_primed(&self, block_number: u64) -> Result<(), StoreError> {
        if let Some(block) = self.inner.lock().unwrap().blocks.get_mut(&block_number) {
            block.primed = true;
        }
        Ok(())
    }

    async fn get_unprimed_blocks(
        &self,
        limit: u32,
        exclude: &[u64],
    ) -> Result<Vec<u64>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut numbers: Vec<u64> = inner
            .blocks
            .values()
            .filter(|b| !b.primed && !exclude.contains(&b.block_number))
            .map(|b| b.block_number)
            .collect();
        numbers.sort_unstable_by(|a, b| b.cmp(a));
        numbers.truncate(limit as usize);
        Ok(numbers)
    }

    async fn validate_block(&self, block_number: u64) -> Result<(bool, Vec<String>), StoreError> {
        let inner = self.inner.lock().unwrap();
        match inner.blocks.get(&block_number) {
            Some(block) => Ok(block.validate()),
            None => Ok((false, vec!["No block".to_string()])),
        }
    }

    async fn validate_block_primed(
        &self,
        block_number: u64,
    ) -> Result<(bool, Vec<String>), StoreError> {
        let inner = self.inner.lock().unwrap();
        match inner.blocks.get(&block_number) {
            Some(block) if block.primed => Ok((true, vec![])),
            Some(_) => Ok((false, vec!["Not marked primed".to_string()])),
            None => Ok((false, vec!["No block".to_string()])),
        }
    }

    async fn count_blocks(&self) -> Result<i64, StoreError> {
        Ok(self.inner.lock().unwrap().blocks.len() as i64)
    }

    async fn get_blocks_in_range(&self, start: u64, end: u64) -> Result<Vec<Block>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.blocks.range(start..end).map(|(_, b)| b.clone()).collect())
    }

    async fn get_random_dirty_transactions(&self, limit: u32) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .transactions
            .values()
            .filter(|t| t.dirty)
            .take(limit as usize)
            .map(|t| t.hash.clone())
            .collect())
    }

    async fn update_transaction_detail(&self, tx: &Transaction) -> Result<(), StoreError> {
        self.inner.lock().unwrap().transactions.insert(tx.hash.clone(), tx.clone());
        Ok(())
    }

    async fn validate_transaction(&self, hash: &str) -> Result<(bool, Vec<String>), StoreError> {
        let inner = self.inner.lock().unwrap();
        match inner.transactions.get(hash) {
            Some(tx) => Ok(tx.validate()),
            None => Ok((false, vec!["No transaction".to_string()])),
        }
    }

    async fn count_transactions(&self) -> Result<i64, StoreError> {
        Ok(self.inner.lock().unwrap().transactions.len() as i64)
    }

    async fn register_consumer(&self, consumer: &Consumer) -> Result<(), StoreError> {
        // Mirrors `PgStore`'s `ON CONFLICT DO NOTHING`: a repeat
        // registration of an already-known uuid is a no-op rather than an
        // overwrite.
        let mut inner = self.inner.lock().unwrap();
        inner.consumers.entry(consumer.consumer_uuid).or_insert_with(|| consumer.clone());
        Ok(())
    }

    async fn ping_consumer(&self, uuid: Uuid) -> Result<(), StoreError> {
        if let Some(c) = self.inner.lock().unwrap().consumers.get_mut(&uuid) {
            c.last_seen = Some(Utc::now());
        }
        Ok(())
    }

    async fn deactivate_consumer(&self, uuid: Uuid) -> Result<(), StoreError> {
        if let Some(c) = self.inner.lock().unwrap().consumers.get_mut(&uuid) {
            c.active = false;
        }
        Ok(())
    }

    async fn live_lock_for_pid(&self, pid: i32) -> Result<Option<Lock>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let cutoff = Utc::now() - self.lease;
        Ok(inner.locks.iter().find(|l| l.pid == pid && l.updated > cutoff).cloned())
    }

    async fn live_locks_for_name(&self, name: &str) -> Result<Vec<Lock>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let cutoff = Utc::now() - self.lease;
        Ok(inner.locks.iter().filter(|l| l.name == name && l.updated > cutoff).cloned().collect())
    }

    async fn insert_lock(&self, name: &str, pid: i32) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let lock_id = inner.next_lock_id;
        inner.next_lock_id += 1;
        inner.locks.push(Lock { lock_id, name: name.to_string(), pid, updated: Utc::now() });
        Ok(lock_id)
    }

    async fn renew_lock(&self, lock_id: i64) -> Result<(), StoreError> {
        if let Some(l) = self.inner.lock().unwrap().locks.iter_mut().find(|l| l.lock_id == lock_id) {
            l.updated = Utc::now();
        }
        Ok(())
    }

    async fn delete_lock(&self, name: &str, pid: i32) -> Result<(), StoreError> {
        self.inner.lock().unwrap().locks.retain(|l| !(l.name == name && l.pid == pid));
        Ok(())
    }
}
