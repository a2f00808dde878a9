mod client;
mod error;
pub mod roles;
mod runtime;

pub use client::ConductorClient;
pub use error::ClientError;
pub use runtime::{RoleContext, WorkerRuntime, BACKOFF_SECS, PING_INTERVAL_SECS};
