use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chain header record, keyed by its monotonically increasing number.
///
/// Invariant B1: `block_number` is unique. Invariant B3: once `primed` is
/// `true`, every transaction hash the chain reports for this block exists
/// as a `Transaction` row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_number: u64,
    pub block_timestamp: Option<DateTime<Utc>>,
    pub difficulty: Option<u64>,
    pub hash: Option<String>,
    pub miner: Option<String>,
    pub gas_used: Option<u64>,
    pub gas_limit: Option<u64>,
    pub nonce: Option<i64>,
    pub size: Option<i64>,
    pub primed: bool,
}

impl Block {
    /// Invariant B2: a block is valid iff every field is present and
    /// well-formed.
    pub fn validate(&self) -> (bool, Vec<String>) {
        use crate::validation::{is_256bit_hash, is_address, validate_conditions};

        let hash = self.hash.as_deref().unwrap_or_default();
        let miner = self.miner.as_deref().unwrap_or_default();

        validate_conditions(&[
            (self.block_timestamp.is_some(), "block_timestamp is missing"),
            (self.difficulty.is_some(), "difficulty missing"),
            (self.hash.is_some(), "block hash missing"),
            (is_256bit_hash(hash), "block hash is not a hash"),
            (self.miner.is_some(), "miner missing"),
            (is_address(miner), "miner is not an address"),
            (self.gas_used.is_some(), "gas_used missing"),
            (self.gas_limit.is_some(), "gas_limit missing"),
            (self.nonce.is_some(), "nonce missing"),
            (self.size.is_some(), "size missing"),
        ])
    }
}
