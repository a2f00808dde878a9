use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::ChainClientError;

#[derive(Clone, Debug, PartialEq)]
pub struct ChainBlock {
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
    pub difficulty: u64,
    pub hash: String,
    pub miner: String,
    pub gas_used: u64,
    pub gas_limit: u64,
    pub nonce: i64,
    pub size: i64,
    pub transactions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChainTransaction {
    pub hash: String,
    pub block_number: Option<u64>,
    pub from: String,
    pub to: Option<String>,
    pub value: String,
    pub gas_price: String,
    pub gas_limit: i64,
    pub nonce: i64,
    pub input: String,
}

fn hex_str(raw: &Value, field: &'static str) -> Result<String, ChainClientError> {
    raw.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ChainClientError::MalformedField(field))
}

fn hex_u64(raw: &Value, field: &'static str) -> Result<u64, ChainClientError> {
    let s = hex_str(raw, field)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|_| ChainClientError::MalformedField(field))
}

fn hex_i64(raw: &Value, field: &'static str) -> Result<i64, ChainClientError> {
    let s = hex_str(raw, field)?;
    i64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|_| ChainClientError::MalformedField(field))
}

impl ChainBlock {
    pub(crate) fn from_json(number: u64, raw: &Value) -> Result<Self, ChainClientError> {
        let timestamp = DateTime::from_timestamp(hex_u64(raw, "timestamp")? as i64, 0)
            .ok_or(ChainClientError::MalformedField("timestamp"))?;

        let transactions = raw
            .get("transactions")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        Ok(ChainBlock {
            block_number: number,
            timestamp,
            difficulty: hex_u64(raw, "difficulty")?,
            hash: hex_str(raw, "hash")?,
            miner: hex_str(raw, "miner")?,
            gas_used: hex_u64(raw, "gasUsed")?,
            gas_limit: hex_u64(raw, "gasLimit")?,
            nonce: hex_i64(raw, "nonce")?,
            size: hex_i64(raw, "size")?,
            transactions,
        })
    }
}

impl ChainTransaction {
    pub(crate) fn from_json(raw: &Value) -> Result<Self, ChainClientError> {
        let block_number = raw
            .get("blockNumber")
            .and_then(Value::as_str)
            .map(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16))
            .transpose()
            .map_err(|_| ChainClientError::MalformedField("blockNumber"))?;

        Ok(ChainTransaction {
            hash: hex_str(raw, "hash")?,
            block_number,
            from: hex_str(raw, "from")?,
            to: raw.get("to").and_then(Value::as_str).map(str::to_string),
            value: hex_str(raw, "value")?,
            gas_price: hex_str(raw, "gasPrice")?,
            gas_limit: hex_i64(raw, "gas")?,
            nonce: hex_i64(raw, "nonce")?,
            input: hex_str(raw, "input")?,
        })
    }
}
