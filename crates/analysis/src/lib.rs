//! Offline scan for block-timestamp anomalies: a sliding window of three
//! consecutive blocks should show strictly increasing timestamps as
//! `block_number` increases. A block that breaks that ordering against
//! its neighbors is reported.

use blocks_store::{Store, StoreError};
use blocks_types::Block;

/// Number of blocks pulled from the store per `get_blocks_in_range` call.
const BLOCK_CHUNK_SIZE: u64 = 50_000;

fn compare_blocks(a: &Block, b: &Block) -> bool {
    a.block_timestamp > b.block_timestamp
}

fn compare_block_window(a: &Block, b: &Block, c: &Block) -> bool {
    compare_blocks(a, b) && compare_blocks(b, c)
}

/// A rolling window of the three most recently seen blocks, newest
/// first.
#[derive(Default)]
pub struct BlockWindow {
    values: Vec<Block>,
    size: usize,
}

impl BlockWindow {
    pub fn new() -> Self {
        Self { values: Vec::new(), size: 3 }
    }

    pub fn push(&mut self, block: Block) {
        self.values.insert(0, block);
        if self.values.len() > self.size {
            self.values.pop();
        }
    }

    pub fn full(&self) -> bool {
        self.values.len() == self.size
    }

    /// Whether the window's three blocks are in strictly decreasing
    /// timestamp order from newest to oldest (the expected shape).
    pub fn validate(&self) -> bool {
        if !self.full() {
            return false;
        }
        compare_block_window(&self.values[0], &self.values[1], &self.values[2])
    }

    /// If the window is invalid, picks out the single block responsible
    /// — the middle one, when the outer two are correctly ordered but
    /// one of the inner comparisons isn't.
    pub fn pick_invalid(&self) -> Option<&Block> {
        if !self.full() {
            return None;
        }

        if compare_block_window(&self.values[0], &self.values[1], &self.values[2]) {
            return None;
        }

        let outer_ok = compare_blocks(&self.values[0], &self.values[2]);
        let inner_broken =
            !compare_blocks(&self.values[0], &self.values[1]) || !compare_blocks(&self.values[1], &self.values[2]);

        if outer_ok && inner_broken {
            Some(&self.values[1])
        } else {
            None
        }
    }
}

pub struct AnomalyReport {
    pub invalid_block_counter: usize,
    pub invalid_blocks: Vec<Block>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("start ({start}) is greater than end ({end})")]
    InvalidRange { start: u64, end: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Scans blocks in `[start, end]` for timestamp anomalies, `end`
/// defaulting to the latest block number known to the store.
pub async fn blocktime_anomalies<S: Store>(
    store: &S,
    start: u64,
    end: Option<u64>,
) -> Result<AnomalyReport, AnalysisError> {
    let end = match end {
        Some(end) => end,
        None => store.get_latest_block_number().await?.unwrap_or(0),
    };

    if start > end {
        return Err(AnalysisError::InvalidRange { start, end });
    }

    let chunks = end / BLOCK_CHUNK_SIZE + 1;
    let mut window = BlockWindow::new();
    let mut invalid_blocks = Vec::new();

    for i in 0..chunks {
        // Matches the original scanner's chunk offset literally: `start` only
        // gates the range check above and is not folded into the chunk math,
        // so a nonzero `start` still scans from block 0 chunk-wise.
        let chunk_start = i * BLOCK_CHUNK_SIZE;
        let chunk_end = chunk_start + BLOCK_CHUNK_SIZE;

        for block in store.get_blocks_in_range(chunk_start, chunk_end).await? {
            window.push(block);

            if window.full() && !window.validate() {
                if let Some(invalid) = window.pick_invalid() {
                    tracing::warn!(block_number = invalid.block_number, "timestamp anomaly");
                    invalid_blocks.push(invalid.clone());
                }
            }
        }
    }

    Ok(AnomalyReport { invalid_block_counter: invalid_blocks.len(), invalid_blocks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocks_store::memory::MemoryStore;
    use chrono::{Duration, Utc};

    fn block_at(number: u64, offset_secs: i64) -> Block {
        Block {
            block_number: number,
            block_timestamp: Some(Utc::now() + Duration::seconds(offset_secs)),
            difficulty: Some(1),
            hash: Some(format!("0x{:064x}", number)),
            miner: Some(format!("0x{:040x}", number)),
            gas_used: Some(21000),
            gas_limit: Some(30_000_000),
            nonce: Some(0),
            size: Some(500),
            primed: true,
        }
    }

    #[tokio::test]
    async fn monotonic_timestamps_report_no_anomalies() {
        let store = MemoryStore::new();
        for n in 0..10u64 {
            store.seed_block(block_at(n, n as i64));
        }

        let report = blocktime_anomalies(&store, 0, Some(9)).await.unwrap();
        assert_eq!(report.invalid_block_counter, 0);
    }

    #[tokio::test]
    async fn a_single_out_of_order_block_is_flagged() {
        let store = MemoryStore::new();
        for n in 0..5u64 {
            store.seed_block(block_at(n, n as i64));
        }
        // Block 2 jumps back in time relative to its neighbors.
        store.seed_block(block_at(2, -100));

        let report = blocktime_anomalies(&store, 0, Some(4)).await.unwrap();
        assert!(report.invalid_block_counter >= 1);
        assert!(report.invalid_blocks.iter().any(|b| b.block_number == 2));
    }

    #[tokio::test]
    async fn start_after_end_is_an_error() {
        let store = MemoryStore::new();
        let err = blocktime_anomalies(&store, 10, Some(5)).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidRange { .. }));
    }
}
