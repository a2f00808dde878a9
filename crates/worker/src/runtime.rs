use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use blocks_chain_client::ChainClient;
use blocks_lock::{LockManager, RENEWAL_INTERVAL_SECS};
use blocks_store::Store;
use blocks_types::WorkerType;
use rand::Rng;
use tokio::sync::watch;
use uuid::Uuid;

use crate::client::ConductorClient;

/// How often a role backs off after a transport or business error before
/// retrying (ping, job-request, or a chain/store call).
pub const BACKOFF_SECS: u64 = 3;

/// How often a role re-pings the conductor while otherwise busy.
pub const PING_INTERVAL_SECS: u64 = 15;

/// Everything a role loop needs: storage, the chain, the conductor
/// client, its own consumer identity, and a shutdown signal it must
/// check between units of work.
#[derive(Clone)]
pub struct RoleContext<S: Store> {
    pub store: Arc<S>,
    pub chain: Arc<ChainClient>,
    pub conductor: Arc<ConductorClient>,
    pub consumer_uuid: Uuid,
    pub shutdown: watch::Receiver<bool>,
}

impl<S: Store> RoleContext<S> {
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Supervises a single worker role for the process lifetime: acquires
/// the role's named lock, runs the role loop while the lock is held,
/// and restarts it if it dies or the lock is lost. Stops once `term`
/// fires.
pub struct WorkerRuntime<S: Store> {
    store: Arc<S>,
    lock_manager: LockManager<S>,
    chain: Arc<ChainClient>,
    conductor: Arc<ConductorClient>,
    pid: i32,
}

impl<S: Store> WorkerRuntime<S> {
    pub fn new(store: Arc<S>, chain: Arc<ChainClient>, conductor: Arc<ConductorClient>) -> Self {
        let lock_manager = LockManager::new(Arc::clone(&store));
        let pid = rand::thread_rng().gen_range(0..10_000);
        Self { store, lock_manager, chain, conductor, pid }
    }

    pub async fn run<F, Fut>(&self, role: WorkerType, role_loop: F, mut term: watch::Receiver<bool>)
    where
        F: Fn(RoleContext<S>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let lock_name = role.to_string();
        let mut renewal = tokio::time::interval(Duration::from_secs(RENEWAL_INTERVAL_SECS));

        'acquire: loop {
            if *term.borrow() {
                return;
            }

            match self.lock_manager.lock(&lock_name, self.pid).await {
                Ok(true) => {}
                Ok(false) | Err(_) => {
                    tracing::warn!(role = %role, pid = self.pid, "failed to acquire lock, retrying");
                    tokio::time::sleep(Duration::from_secs(RENEWAL_INTERVAL_SECS)).await;
                    continue 'acquire;
                }
            }

            tracing::info!(role = %role, pid = self.pid, "lock acquired, starting role loop");

            let (inner_tx, inner_rx) = watch::channel(false);
            let ctx = RoleContext {
                store: Arc::clone(&self.store),
                chain: Arc::clone(&self.chain),
                conductor: Arc::clone(&self.conductor),
                consumer_uuid: Uuid::new_v4(),
                shutdown: inner_rx,
            };
            let mut handle = tokio::spawn(role_loop(ctx));

            loop {
                tokio::select! {
                    _ = renewal.tick() => {
                        match self.lock_manager.lock(&lock_name, self.pid).await {
                            Ok(true) => {}
                            _ => {
                                tracing::warn!(role = %role, pid = self.pid, "lost lock, stopping role loop");
                                let _ = inner_tx.send(true);
                                let _ = (&mut handle).await;
                                continue 'acquire;
                            }
                        }
                    }
                    _ = term.changed() => {
                        if *term.borrow() {
                            tracing::info!(role = %role, pid = self.pid, "shutdown requested, draining role loop");
                            let _ = inner_tx.send(true);
                            let _ = (&mut handle).await;
                            let _ = self.lock_manager.unlock(&lock_name, self.pid).await;
                            return;
                        }
                    }
                    result = &mut handle => {
                        tracing::warn!(role = %role, pid = self.pid, ?result, "role loop exited unexpectedly, restarting");
                        continue 'acquire;
                    }
                }
            }
        }
    }
}
