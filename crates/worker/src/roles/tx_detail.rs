use std::time::{Duration, Instant};

use blocks_store::Store;
use blocks_types::{Job, Transaction, WorkerType};

use crate::runtime::{RoleContext, BACKOFF_SECS, PING_INTERVAL_SECS};

/// For each assigned transaction hash: fetch the full transaction from
/// the chain and write it back with `dirty = false`.
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

        let (job_uuid, transactions) =
            match ctx.conductor.job_request(ctx.consumer_uuid, WorkerType::TxDetail).await {
                Ok(Job::TxDetail { job_uuid, transactions, .. }) => (job_uuid, transactions),
                Ok(_) => {
                    tracing::error!("conductor returned a non-tx-detail job to a tx-detail worker");
                    tokio::time::sleep(Duration::from_secs(BACKOFF_SECS)).await;
                    continue;
                }
                Err(err) => {
                    tracing::error!(%err, "failed to request a job from the conductor");
                    tokio::time::sleep(Duration::from_secs(BACKOFF_SECS)).await;
                    continue;
                }
            };

        if transactions.is_empty() {
            let _ = ctx.conductor.job_submit(job_uuid).await;
            tokio::time::sleep(Duration::from_secs(BACKOFF_SECS)).await;
            continue;
        }

        for hash in &transactions {
            if ctx.is_shutting_down() {
                break;
            }

            let chain_tx = match ctx.chain.get_transaction(hash).await {
                Ok(tx) => tx,
                Err(err) => {
                    tracing::error!(%err, hash = %hash, "failed to fetch transaction from chain");
                    continue;
                }
            };

            let tx = Transaction {
                hash: chain_tx.hash,
                dirty: false,
                block_number: chain_tx.block_number.map(|n| n as i64),
                from_address: Some(chain_tx.from),
                to_address: chain_tx.to,
                value: Some(chain_tx.value),
                gas_price: Some(chain_tx.gas_price),
                gas_limit: Some(chain_tx.gas_limit),
                nonce: Some(chain_tx.nonce),
                input: Some(chain_tx.input),
            };

            if let Err(err) = ctx.store.update_transaction_detail(&tx).await {
                tracing::error!(%err, hash = %hash, "failed to update transaction detail");
            }
        }

        let _ = ctx.conductor.job_submit(job_uuid).await;
    }
}
