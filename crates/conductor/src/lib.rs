mod state;

pub use state::{Conductor, ConductorError, ConductorStatus, DEFAULT_BATCH_SIZE};

/// How long a job may go without its owning consumer pinging before the
/// periodic sweep reaps it and frees its reservations.
pub const STALE_CONSUMER_WINDOW_SECS: i64 = 5 * 60;

/// How often the reservation sweep and `latest_on_chain` refresh run.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// How often `latest_on_chain` is refreshed in the background, independent
/// of the empty-scan refresh that happens inline during BLOCK job
/// generation.
pub const CHAIN_HEAD_REFRESH_INTERVAL_SECS: u64 = 30;
