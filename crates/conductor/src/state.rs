use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use blocks_chain_client::{ChainClient, ChainClientError};
use blocks_store::{Store, StoreError};
use blocks_types::{Consumer, Job, WorkerType};
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_BATCH_SIZE: u64 = 500;

/// Chunk size used while streaming known block numbers out of the store
/// during initialization.
const BLOCK_NUMBER_CHUNK_SIZE: u64 = 1_000_000;

#[derive(Debug, Error)]
pub enum ConductorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chain(#[from] ChainClientError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConductorStatus {
    Initializing,
    Ready,
}

/// Owns the in-memory ingestion view: which block numbers and transaction
/// hashes are known, which are reserved in a live job, and the jobs
/// themselves. One instance is built at startup and shared behind a mutex
/// by the HTTP surface.
pub struct Conductor<S: Store> {
    store: Arc<S>,
    chain: Arc<ChainClient>,
    batch_size: u64,

    status: ConductorStatus,
    latest_in_db: u64,
    latest_on_chain: u64,

    known_block_numbers: HashSet<u64>,
    selected_block_numbers: HashSet<u64>,
    selected_blocks_to_prime: HashSet<u64>,
    known_transactions: HashSet<String>,
    selected_transactions: HashSet<String>,

    jobs: Vec<Job>,
    last_ping: HashMap<Uuid, DateTime<Utc>>,
}

impl<S: Store> Conductor<S> {
    /// Builds a conductor and populates its in-memory view from the
    /// store and chain client. Reads `latest_in_db`, `latest_on_chain`,
    /// and streams `known_block_numbers` in chunks, stopping at the
    /// first empty chunk.
    pub async fn new(
        store: Arc<S>,
        chain: Arc<ChainClient>,
        batch_size: u64,
    ) -> Result<Self, ConductorError> {
        let latest_in_db = store.get_latest_block_number().await?.unwrap_or(0);
        let latest_on_chain = chain.latest_block_number().await?;

        let mut known_block_numbers = HashSet::new();
        let mut offset = 0u64;
        loop {
            let chunk = store.get_block_numbers_chunk(offset, BLOCK_NUMBER_CHUNK_SIZE).await?;
            if chunk.is_empty() {
                break;
            }
            let chunk_len = chunk.len() as u64;
            known_block_numbers.extend(chunk.into_iter().map(|(number, _primed)| number));
            offset += chunk_len;
        }

        tracing::info!(
            known_blocks = known_block_numbers.len(),
            latest_in_db,
            latest_on_chain,
            "conductor initialized"
        );

        Ok(Self {
            store,
            chain,
            batch_size,
            status: ConductorStatus::Ready,
            latest_in_db,
            latest_on_chain,
            known_block_numbers,
            selected_block_numbers: HashSet::new(),
            selected_blocks_to_prime: HashSet::new(),
            known_transactions: HashSet::new(),
            selected_transactions: HashSet::new(),
            jobs: Vec::new(),
            last_ping: HashMap::new(),
        })
    }

    pub fn status(&self) -> ConductorStatus {
        self.status
    }

    pub fn known_block_count(&self) -> usize {
        self.known_block_numbers.len()
    }

    pub async fn count_blocks(&self) -> Result<i64, ConductorError> {
        Ok(self.store.count_blocks().await?)
    }

    pub async fn count_transactions(&self) -> Result<i64, ConductorError> {
        Ok(self.store.count_transactions().await?)
    }

    /// Records a heartbeat from a consumer. Used both to satisfy `/ping`
    /// and to keep that consumer's jobs from being reaped as stale.
    ///
    /// First contact (a `uuid` with no prior heartbeat in this conductor's
    /// lifetime) also registers the consumer row in the store; every
    /// contact persists the heartbeat via `ping_consumer`.
    pub async fn ping(&mut self, uuid: Uuid) -> Result<(), ConductorError> {
        if !self.last_ping.contains_key(&uuid) {
            self.store
                .register_consumer(&Consumer {
                    consumer_uuid: uuid,
                    name: None,
                    address: None,
                    port: None,
                    active: true,
                    last_seen: None,
                })
                .await?;
        }

        self.store.ping_consumer(uuid).await?;
        self.last_ping.insert(uuid, Utc::now());
        Ok(())
    }

    pub async fn remove_consumer(&mut self, uuid: Uuid) -> Result<(), ConductorError> {
        self.store.deactivate_consumer(uuid).await?;
        self.last_ping.remove(&uuid);
        Ok(())
    }

    fn find_job(&self, uuid: Uuid) -> Option<&Job> {
        self.jobs.iter().find(|job| job.consumer_uuid() == uuid || job.job_uuid() == uuid)
    }

    fn find_job_index(&self, uuid: Uuid) -> Option<usize> {
        self.jobs.iter().position(|job| job.consumer_uuid() == uuid || job.job_uuid() == uuid)
    }

    /// Removes a job by `consumer_uuid` or `job_uuid`. Reservations made
    /// for it in `selected_*` are not rolled back — an explicit choice
    /// to avoid tight re-issue loops when the same work would collide
    /// again.
    pub fn del_job(&mut self, uuid: Uuid) {
        self.jobs.retain(|job| job.consumer_uuid() != uuid && job.job_uuid() != uuid);
    }

    /// Returns the existing job for `uuid` (idempotent re-issue under
    /// retries) or builds a new one for `worker_type`.
    pub async fn generate_job(
        &mut self,
        worker_type: WorkerType,
        uuid: Uuid,
    ) -> Result<Job, ConductorError> {
        if let Some(existing) = self.find_job(uuid) {
            return Ok(existing.clone());
        }

        let job_uuid = Uuid::new_v4();

        let job = match worker_type {
            WorkerType::Block => self.generate_block_job(job_uuid, uuid).await?,
            WorkerType::TxPrime => self.generate_tx_prime_job(job_uuid, uuid).await?,
            WorkerType::TxDetail => self.generate_tx_detail_job(job_uuid, uuid).await?,
        };

        self.jobs.push(job.clone());
        Ok(job)
    }

    async fn generate_block_job(
        &mut self,
        job_uuid: Uuid,
        consumer_uuid: Uuid,
    ) -> Result<Job, ConductorError> {
        let mut block_numbers = Vec::new();

        for candidate in 0..self.latest_on_chain {
            if !self.known_block_numbers.contains(&candidate)
                && !self.selected_block_numbers.contains(&candidate)
            {
                block_numbers.push(candidate);
            }
            if block_numbers.len() as u64 >= self.batch_size {
                break;
            }
        }

        if block_numbers.is_empty() {
            self.latest_on_chain = self.chain.latest_block_number().await?;
        } else {
            self.selected_block_numbers.extend(block_numbers.iter().copied());
        }

        Ok(Job::Block { job_uuid, consumer_uuid, block_numbers })
    }

    async fn generate_tx_prime_job(
        &mut self,
        job_uuid: Uuid,
        consumer_uuid: Uuid,
    ) -> Result<Job, ConductorError> {
        let limit = (self.batch_size / 100).max(1) as u32;
        let exclude: Vec<u64> = self.selected_blocks_to_prime.iter().copied().collect();
        let block_numbers = self.store.get_unprimed_blocks(limit, &exclude).await?;

        self.selected_blocks_to_prime.extend(block_numbers.iter().copied());

        Ok(Job::TxPrime { job_uuid, consumer_uuid, block_numbers })
    }

    async fn generate_tx_detail_job(
        &mut self,
        job_uuid: Uuid,
        consumer_uuid: Uuid,
    ) -> Result<Job, ConductorError> {
        let limit = (self.batch_size * 2) as u32;
        let pool = self.store.get_random_dirty_transactions(limit).await?;

        let transactions: Vec<String> = pool
            .into_iter()
            .filter(|hash| {
                !self.known_transactions.contains(hash)
                    && !self.selected_transactions.contains(hash)
            })
            .collect();

        self.selected_transactions.extend(transactions.iter().cloned());

        Ok(Job::TxDetail { job_uuid, consumer_uuid, transactions })
    }

    /// Verifies that a job's units of work have landed in the store.
    /// On full success the job is removed; on any failure it is left in
    /// place so the worker may retry.
    pub async fn verify_job(&mut self, job_uuid: Uuid) -> Result<(bool, Vec<String>), ConductorError> {
        let Some(index) = self.find_job_index(job_uuid) else {
            return Ok((false, vec!["Invalid job UUID".to_string()]));
        };

        let job = self.jobs[index].clone();

        let result = match &job {
            Job::Block { block_numbers, .. } => self.verify_block_job(block_numbers).await?,
            Job::TxPrime { block_numbers, .. } => self.verify_tx_prime_job(block_numbers).await?,
            Job::TxDetail { transactions, .. } => self.verify_tx_detail_job(transactions).await?,
        };

        if result.0 {
            if let Job::TxPrime { block_numbers, .. } = &job {
                for number in block_numbers {
                    self.selected_blocks_to_prime.remove(number);
                }
            }
            self.jobs.remove(index);
        }

        Ok(result)
    }

    async fn verify_block_job(
        &self,
        block_numbers: &[u64],
    ) -> Result<(bool, Vec<String>), ConductorError> {
        for &number in block_numbers {
            let (ok, errors) = self.store.validate_block(number).await?;
            if !ok {
                tracing::warn!(block_number = number, "verify of block failed");
                return Ok((false, errors));
            }
        }
        Ok((true, vec![]))
    }

    async fn verify_tx_prime_job(
        &self,
        block_numbers: &[u64],
    ) -> Result<(bool, Vec<String>), ConductorError> {
        if block_numbers.is_empty() {
            return Ok((false, vec!["Job missing block numbers".to_string()]));
        }
        for &number in block_numbers {
            let (ok, errors) = self.store.validate_block_primed(number).await?;
            if !ok {
                return Ok((false, errors));
            }
        }
        Ok((true, vec![]))
    }

    async fn verify_tx_detail_job(
        &self,
        transactions: &[String],
    ) -> Result<(bool, Vec<String>), ConductorError> {
        if transactions.is_empty() {
            return Ok((false, vec!["Job missing transactions".to_string()]));
        }
        for hash in transactions {
            let (ok, errors) = self.store.validate_transaction(hash).await?;
            if !ok {
                return Ok((false, errors));
            }
        }
        Ok((true, vec![]))
    }

    /// Refreshes `latest_on_chain` unconditionally. Run on a timer so the
    /// conductor's view of the chain head doesn't go stale when no
    /// worker happens to trigger an empty-scan refresh.
    pub async fn refresh_latest_on_chain(&mut self) -> Result<(), ConductorError> {
        self.latest_on_chain = self.chain.latest_block_number().await?;
        Ok(())
    }

    /// Evicts jobs whose owning consumer hasn't pinged within `window`,
    /// freeing their reservations. A consumer that has never pinged
    /// (e.g. a job created but never picked up) is treated as stale
    /// immediately. The owning consumer of each reaped job is also
    /// deactivated in the store via `remove_consumer`, since a job going
    /// stale on the heartbeat window is exactly the signal that consumer
    /// tracking exists to catch.
    pub async fn reap_stale_jobs(&mut self, window: Duration) -> Result<(), ConductorError> {
        let cutoff = Utc::now() - window;
        let mut stale_indices = Vec::new();

        for (index, job) in self.jobs.iter().enumerate() {
            let consumer_uuid = job.consumer_uuid();
            let is_stale = match self.last_ping.get(&consumer_uuid) {
                Some(last) => *last < cutoff,
                None => true,
            };
            if is_stale {
                stale_indices.push(index);
            }
        }

        for &index in stale_indices.iter().rev() {
            let job = self.jobs.remove(index);
            match &job {
                Job::Block { block_numbers, .. } => {
                    for number in block_numbers {
                        self.selected_block_numbers.remove(number);
                    }
                }
                Job::TxPrime { block_numbers, .. } => {
                    for number in block_numbers {
                        self.selected_blocks_to_prime.remove(number);
                    }
                }
                Job::TxDetail { transactions, .. } => {
                    for hash in transactions {
                        self.selected_transactions.remove(hash);
                    }
                }
            }
            tracing::info!(job_uuid = %job.job_uuid(), "reaped stale job");
            self.remove_consumer(job.consumer_uuid()).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocks_store::memory::MemoryStore;
    use blocks_types::Block;

    fn make_block(number: u64, primed: bool) -> Block {
        Block {
            block_number: number,
            block_timestamp: Some(Utc::now()),
            difficulty: Some(1),
            hash: Some(format!("0x{:064x}", number)),
            miner: Some(format!("0x{:040x}", number)),
            gas_used: Some(21000),
            gas_limit: Some(30_000_000),
            nonce: Some(0),
            size: Some(500),
            primed,
        }
    }

    async fn conductor_with_chain_height(
        store: Arc<MemoryStore>,
        height: u64,
        batch_size: u64,
    ) -> Conductor<MemoryStore> {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "id": 0,
                "result": format!("0x{:x}", height),
            })))
            .mount(&server)
            .await;
        let chain = Arc::new(ChainClient::new(&server.uri(), None).unwrap());
        Conductor::new(store, chain, batch_size).await.unwrap()
    }

    #[tokio::test]
    async fn fresh_conductor_assigns_all_unknown_blocks_ascending() {
        let store = Arc::new(MemoryStore::new());
        let mut conductor = conductor_with_chain_height(store, 3, 10).await;

        let job = conductor.generate_job(WorkerType::Block, Uuid::new_v4()).await.unwrap();
        match job {
            Job::Block { block_numbers, .. } => assert_eq!(block_numbers, vec![0, 1, 2]),
            _ => panic!("expected a block job"),
        }
    }

    #[tokio::test]
    async fn second_block_worker_gets_no_overlap() {
        let store = Arc::new(MemoryStore::new());
        let mut conductor = conductor_with_chain_height(store, 3, 10).await;

        let first = conductor.generate_job(WorkerType::Block, Uuid::new_v4()).await.unwrap();
        let second = conductor.generate_job(WorkerType::Block, Uuid::new_v4()).await.unwrap();

        match (first, second) {
            (Job::Block { block_numbers: a, .. }, Job::Block { block_numbers: b, .. }) => {
                assert_eq!(a, vec![0, 1, 2]);
                assert!(b.is_empty());
            }
            _ => panic!("expected block jobs"),
        }
    }

    #[tokio::test]
    async fn same_uuid_requesting_twice_gets_the_same_job() {
        let store = Arc::new(MemoryStore::new());
        let mut conductor = conductor_with_chain_height(store, 5, 10).await;
        let uuid = Uuid::new_v4();

        let first = conductor.generate_job(WorkerType::Block, uuid).await.unwrap();
        let second = conductor.generate_job(WorkerType::Block, uuid).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn tx_prime_job_caps_at_one_percent_of_batch_size() {
        let store = Arc::new(MemoryStore::new());
        for n in 0..10 {
            store.seed_block(make_block(n, false));
        }
        let mut conductor = conductor_with_chain_height(store, 10, 500).await;

        let job = conductor.generate_job(WorkerType::TxPrime, Uuid::new_v4()).await.unwrap();
        match job {
            Job::TxPrime { block_numbers, .. } => assert!(block_numbers.len() <= 5),
            _ => panic!("expected a tx-prime job"),
        }
    }

    #[tokio::test]
    async fn verify_block_job_removes_job_on_success() {
        let store = Arc::new(MemoryStore::new());
        store.seed_block(make_block(7, false));
        let mut conductor = conductor_with_chain_height(Arc::clone(&store), 8, 10).await;

        let job = conductor.generate_job(WorkerType::Block, Uuid::new_v4()).await.unwrap();
        let job_uuid = job.job_uuid();

        let (ok, _) = conductor.verify_job(job_uuid).await.unwrap();
        assert!(ok);
        assert!(conductor.find_job(job_uuid).is_none());
    }

    #[tokio::test]
    async fn verify_block_job_keeps_job_on_failure() {
        let store = Arc::new(MemoryStore::new());
        let mut conductor = conductor_with_chain_height(store, 1, 10).await;

        let job = conductor.generate_job(WorkerType::Block, Uuid::new_v4()).await.unwrap();
        let job_uuid = job.job_uuid();

        let (ok, errors) = conductor.verify_job(job_uuid).await.unwrap();
        assert!(!ok);
        assert!(!errors.is_empty());
        assert!(conductor.find_job(job_uuid).is_some());
    }

    #[tokio::test]
    async fn del_job_removes_without_verification() {
        let store = Arc::new(MemoryStore::new());
        let mut conductor = conductor_with_chain_height(store, 3, 10).await;
        let uuid = Uuid::new_v4();

        let job = conductor.generate_job(WorkerType::Block, uuid).await.unwrap();
        conductor.del_job(job.job_uuid());

        assert!(conductor.find_job(uuid).is_none());
    }

    #[tokio::test]
    async fn reap_removes_jobs_whose_consumer_never_pinged() {
        let store = Arc::new(MemoryStore::new());
        let mut conductor = conductor_with_chain_height(store, 3, 10).await;
        let uuid = Uuid::new_v4();

        conductor.generate_job(WorkerType::Block, uuid).await.unwrap();
        conductor.reap_stale_jobs(Duration::seconds(300)).await.unwrap();

        assert!(conductor.find_job(uuid).is_none());
        // Reservation should have been released too.
        let second = conductor.generate_job(WorkerType::Block, Uuid::new_v4()).await.unwrap();
        match second {
            Job::Block { block_numbers, .. } => assert_eq!(block_numbers, vec![0, 1, 2]),
            _ => panic!("expected a block job"),
        }
    }

    #[tokio::test]
    async fn ping_keeps_a_job_from_being_reaped() {
        let store = Arc::new(MemoryStore::new());
        let mut conductor = conductor_with_chain_height(store, 3, 10).await;
        let uuid = Uuid::new_v4();

        conductor.generate_job(WorkerType::Block, uuid).await.unwrap();
        conductor.ping(uuid).await.unwrap();
        conductor.reap_stale_jobs(Duration::seconds(300)).await.unwrap();

        assert!(conductor.find_job(uuid).is_some());
    }

    #[tokio::test]
    async fn ping_registers_and_persists_a_heartbeat() {
        let store = Arc::new(MemoryStore::new());
        let mut conductor = conductor_with_chain_height(Arc::clone(&store), 3, 10).await;
        let uuid = Uuid::new_v4();

        conductor.ping(uuid).await.unwrap();

        let last_seen = store.consumer_last_seen_for_test(uuid);
        assert!(last_seen.is_some());
    }
}
