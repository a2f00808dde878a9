use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::WorkerType;

/// A unit of reserved work handed to exactly one consumer. Jobs are owned
/// exclusively by the conductor: created on request, handed out by value to
/// workers, and destroyed on successful verification or explicit rejection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Job {
    #[serde(rename = "BLOCK")]
    Block {
        job_uuid: Uuid,
        consumer_uuid: Uuid,
        block_numbers: Vec<u64>,
    },
    #[serde(rename = "TX_PRIME")]
    TxPrime {
        job_uuid: Uuid,
        consumer_uuid: Uuid,
        block_numbers: Vec<u64>,
    },
    #[serde(rename = "TX_DETAIL")]
    TxDetail {
        job_uuid: Uuid,
        consumer_uuid: Uuid,
        transactions: Vec<String>,
    },
}

impl Job {
    pub fn job_uuid(&self) -> Uuid {
        match self {
            Job::Block { job_uuid, .. }
            | Job::TxPrime { job_uuid, .. }
            | Job::TxDetail { job_uuid, .. } => *job_uuid,
        }
    }

    pub fn consumer_uuid(&self) -> Uuid {
        match self {
            Job::Block { consumer_uuid, .. }
            | Job::TxPrime { consumer_uuid, .. }
            | Job::TxDetail { consumer_uuid, .. } => *consumer_uuid,
        }
    }

    pub fn worker_type(&self) -> WorkerType {
        match self {
            Job::Block { .. } => WorkerType::Block,
            Job::TxPrime { .. } => WorkerType::TxPrime,
            Job::TxDetail { .. } => WorkerType::TxDetail,
        }
    }

    /// Whether a job carries no units of work — the signal a worker
    /// treats as "nothing to do right now, back off".
    pub fn is_empty(&self) -> bool {
        match self {
            Job::Block { block_numbers, .. } | Job::TxPrime { block_numbers, .. } => {
                block_numbers.is_empty()
            }
            Job::TxDetail { transactions, .. } => transactions.is_empty(),
        }
    }
}
