use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three worker roles the conductor partitions work for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerType {
    Block,
    TxPrime,
    TxDetail,
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerType::Block => "BLOCK",
            WorkerType::TxPrime => "TX_PRIME",
            WorkerType::TxDetail => "TX_DETAIL",
        };
        f.write_str(s)
    }
}

/// Error returned when a `type` string doesn't match the three-role
/// taxonomy. The historical `TRANSACTION` variant (combined prime+detail
/// role) is not accepted; new implementations only emit `BLOCK`,
/// `TX_PRIME`, and `TX_DETAIL`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown worker type: {0}")]
pub struct UnknownWorkerType(pub String);

impl FromStr for WorkerType {
    type Err = UnknownWorkerType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BLOCK" => Ok(WorkerType::Block),
            "TX_PRIME" => Ok(WorkerType::TxPrime),
            "TX_DETAIL" => Ok(WorkerType::TxDetail),
            other => Err(UnknownWorkerType(other.to_string())),
        }
    }
}
