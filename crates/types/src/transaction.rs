use serde::{Deserialize, Serialize};

/// A chain transaction record, keyed by its 32-byte hash.
///
/// Lifecycle: created by the block worker or the TX-prime worker with
/// `dirty = true` and only `hash` (and possibly `block_number`) populated;
/// moved to `dirty = false` and fully populated by the TX-detail worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub dirty: bool,
    pub block_number: Option<i64>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub value: Option<String>,
    pub gas_price: Option<String>,
    pub gas_limit: Option<i64>,
    pub nonce: Option<i64>,
    pub input: Option<String>,
}

impl Transaction {
    /// Invariant T2: valid iff `dirty = false` and all other fields are
    /// present and well-formed.
    pub fn validate(&self) -> (bool, Vec<String>) {
        use crate::validation::{is_256bit_hash, is_address, validate_conditions};

        let from = self.from_address.as_deref().unwrap_or_default();
        let to = self.to_address.as_deref().unwrap_or_default();

        validate_conditions(&[
            (is_256bit_hash(&self.hash), "transaction hash is invalid"),
            (!self.dirty, "transaction is marked dirty"),
            (self.block_number.is_some(), "block_number missing"),
            (is_address(from), "from_address is not an address"),
            (is_address(to), "to_address is not an address"),
            (self.value.is_some(), "value missing"),
            (self.gas_price.is_some(), "gas_price missing"),
            (self.gas_limit.is_some(), "gas_limit missing"),
            (self.nonce.is_some(), "nonce missing"),
            (self.input.is_some(), "input missing"),
        ])
    }
}
