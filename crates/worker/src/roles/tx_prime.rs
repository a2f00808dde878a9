use std::time::{Duration, Instant};

use blocks_store::{Store, StoreError};
use blocks_types::{Job, WorkerType};

use crate::runtime::{RoleContext, BACKOFF_SECS, PING_INTERVAL_SECS};

/// For each assigned block: fetch its header to learn the transaction
/// hashes it contains, insert each as a `dirty=true` stub, then mark
/// the block `primed`.
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
            match ctx.conductor.job_request(ctx.consumer_uuid, WorkerType::TxPrime).await {
                Ok(Job::TxPrime { job_uuid, block_numbers, .. }) => (job_uuid, block_numbers),
                Ok(_) => {
                    tracing::error!("conductor returned a non-tx-prime job to a tx-prime worker");
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

        for block_number in block_numbers.iter().copied() {
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

            if let Err(err) = ctx.store.mark_primed(block_number).await {
                tracing::error!(%err, block_number, "failed to mark block primed");
            }
        }

        let _ = ctx.conductor.job_submit(job_uuid).await;
    }
}
