use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A database-backed named lease, held by at most one worker process per
/// `name`. A lock row is live while `updated` is within the configured
/// lease window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lock {
    pub lock_id: i64,
    pub name: String,
    pub pid: i32,
    pub updated: DateTime<Utc>,
}
