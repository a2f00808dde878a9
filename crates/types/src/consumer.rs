use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A worker process registered with the conductor. Heartbeated via
/// `/ping`; deactivation is soft (`active` flips to `false`, the row
/// stays).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    pub consumer_uuid: Uuid,
    pub name: Option<String>,
    pub address: Option<String>,
    pub port: Option<i32>,
    pub active: bool,
    pub last_seen: Option<DateTime<Utc>>,
}
