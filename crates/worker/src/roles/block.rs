use std::time::{Duration, Instant};

use blocks_store::{Store, StoreError};
use blocks_types::{Block, Job, WorkerType};

use crate::runtime::{RoleContext, BACKOFF_SECS, PING_INTERVAL_SECS};

/// `PING → REQUEST → FETCH_AND_STORE → SUBMIT → PING`. Fetches whole
/// blocks and inserts both the header row and a `dirty=true` stub for
/// every transaction hash the block reports.
pub async fn run<S: Store>(ctx: RoleContext<S>) {
    let mut last_ping: Option<Instant> = None;

    loop {
        if ctx.is_shutting_down() {
            return;
        }

        if last_ping.map_or(true, |t| t.elapsed() >= Duration::from_secs(PING_INTERVAL_SECS)) {
            match ctx.conductor.ping(ctx.consumer_uuid).await {
                Ok(()) => last_ping = Some(Instant::now()),
                Err(err) => {
                    tracing::warn!(%err, "unable to reach the conductor");
                    tokio::time::sleep(Duration::from_secs(BACKOFF_SECS)).await;
                    continue;
                }
            }
        }

        let (job_uuid, block_numbers) =
            match ctx.conductor.job_request(ctx.consumer_uuid, WorkerType::Block).await {
                Ok(Job::Block { job_uuid, block_numbers, .. }) => (job_uuid, block_numbers),
                Ok(_) => {
                    tracing::error!("conductor returned a non-block job to a block worker");
                    tokio::time::sleep(Duration::from_secs(BACKOFF_SECS)).await;
                    continue;
                }
                Err(err) => {
                    tracing::error!(%err, "failed to request a job from the conductor");
                    tokio::time::sleep(Duration::from_secs(BACKOFF_SECS)).await;
                    continue;
                }
            };

        if block_numbers.is_empty() {
            let _ = ctx.conductor.job_submit(job_uuid).await;
            tokio::time::sleep(Duration::from_secs(BACKOFF_SECS)).await;
            continue;
        }

        let mut rejected = false;

        for block_number in block_numbers {
            if ctx.is_shutting_down() {
                break;
            }

            let chain_block = match ctx.chain.get_block(block_number).await {
                Ok(block) => block,
                Err(err) => {
                    tracing::error!(%err, block_number, "failed to fetch block from chain");
                    continue;
                }
            };

            let block = Block {
                block_number,
                block_timestamp: Some(chain_block.timestamp),
                difficulty: Some(chain_block.difficulty),
                hash: Some(chain_block.hash),
                miner: Some(chain_block.miner),
                gas_used: Some(chain_block.gas_used),
                gas_limit: Some(chain_block.gas_limit),
                nonce: Some(chain_block.nonce),
                size: Some(chain_block.size),
                primed: false,
            };

            match ctx.store.insert_block(&block).await {
                Ok(()) => {}
                Err(StoreError::UniqueViolation { .. }) => {
                    tracing::warn!(block_number, "block already exists in database");
                    let reason = format!("Block {block_number} already exists in database");
                    let _ = ctx.conductor.job_reject(job_uuid, &reason).await;
                    rejected = true;
                    break;
                }
                Err(err) => {
                    tracing::error!(%err, block_number, "failed to insert block");
                    break;
                }
            }

            for tx_hash in chain_block.transactions {
                match ctx.store.insert_transaction_stub(&tx_hash, Some(block_number)).await {
                    Ok(()) => {}
                    Err(StoreError::UniqueViolation { .. }) => {
                        tracing::debug!(hash = %tx_hash, "transaction already known");
                    }
                    Err(err) => {
                        tracing::error!(%err, hash = %tx_hash, "failed to insert transaction stub");
                    }
                }
            }
        }

        if !rejected {
            let _ = ctx.conductor.job_submit(job_uuid).await;
        }
    }
}
