use std::sync::Arc;

use blocks_conductor::Conductor;
use blocks_store::Store;
use tokio::sync::Mutex;

/// Shared application state: a single mutex-guarded conductor. Every
/// handler serializes through this one lock, making the conductor's
/// job-partitioning logic effectively single-threaded per request.
pub struct AppState<S: Store> {
    pub conductor: Arc<Mutex<Conductor<S>>>,
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self { conductor: Arc::clone(&self.conductor) }
    }
}

impl<S: Store> AppState<S> {
    pub fn new(conductor: Conductor<S>) -> Self {
        Self { conductor: Arc::new(Mutex::new(conductor)) }
    }
}
