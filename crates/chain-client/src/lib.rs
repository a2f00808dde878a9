//! Minimal Ethereum JSON-RPC client: only the handful of methods the
//! block/tx-prime/tx-detail workers need. Deliberately not a generated
//! client — the full `eth_*` namespace isn't used.

mod types;

pub use types::{ChainBlock, ChainTransaction};

use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use thiserror::Error;

const INFURA_MAINNET_URL: &str = "https://mainnet.infura.io/v3";

#[derive(Debug, Error)]
pub enum ChainClientError {
    #[error("rpc transport error: {0}")]
    Transport(#[from] jsonrpsee::core::ClientError),

    #[error("chain returned no data for {0}")]
    NotFound(String),

    #[error("malformed response field '{0}'")]
    MalformedField(&'static str),
}

/// Talks to a single Ethereum JSON-RPC endpoint over HTTP.
///
/// If an Infura API key is supplied, requests are routed to Infura's
/// mainnet endpoint instead of the explicit node URL, mirroring the
/// `WEB3_INFURA_API_KEY` environment switch in the system this crate
/// replaces.
pub struct ChainClient {
    client: HttpClient,
}

impl ChainClient {
    pub fn new(node_url: &str, infura_api_key: Option<&str>) -> Result<Self, ChainClientError> {
        let url = match infura_api_key {
            Some(key) => format!("{INFURA_MAINNET_URL}/{key}"),
            None => node_url.to_string(),
        };

        let client = HttpClientBuilder::default().build(url)?;
        Ok(Self { client })
    }

    pub async fn latest_block_number(&self) -> Result<u64, ChainClientError> {
        let hex: String = self.client.request("eth_blockNumber", rpc_params![]).await?;
        parse_hex_u64(&hex).ok_or(ChainClientError::MalformedField("blockNumber"))
    }

    pub async fn get_block(&self, number: u64) -> Result<ChainBlock, ChainClientError> {
        let tag = format!("0x{number:x}");
        let raw: Option<serde_json::Value> =
            self.client.request("eth_getBlockByNumber", rpc_params![tag, false]).await?;

        let raw = raw.ok_or_else(|| ChainClientError::NotFound(number.to_string()))?;
        ChainBlock::from_json(number, &raw)
    }

    pub async fn get_transaction(&self, hash: &str) -> Result<ChainTransaction, ChainClientError> {
        let raw: Option<serde_json::Value> =
            self.client.request("eth_getTransactionByHash", rpc_params![hash]).await?;

        let raw = raw.ok_or_else(|| ChainClientError::NotFound(hash.to_string()))?;
        ChainTransaction::from_json(&raw)
    }
}

fn parse_hex_u64(v: &str) -> Option<u64> {
    u64::from_str_radix(v.strip_prefix("0x")?, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_response(body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn latest_block_number_parses_hex_result() {
        let server =
            server_with_response(json!({"jsonrpc": "2.0", "id": 0, "result": "0x2a"})).await;
        let client = ChainClient::new(&server.uri(), None).unwrap();
        assert_eq!(client.latest_block_number().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn get_block_parses_known_fields() {
        let server = server_with_response(json!({
            "jsonrpc": "2.0",
            "id": 0,
            "result": {
                "timestamp": "0x5f5e100",
                "difficulty": "0x1",
                "hash": "0x".to_owned() + &"a".repeat(64),
                "miner": "0x".to_owned() + &"b".repeat(40),
                "gasUsed": "0x5208",
                "gasLimit": "0x7a1200",
                "nonce": "0x1234567890abcdef",
                "size": "0x220",
                "transactions": ["0x".to_owned() + &"c".repeat(64)],
            }
        }))
        .await;

        let client = ChainClient::new(&server.uri(), None).unwrap();
        let block = client.get_block(100).await.unwrap();
        assert_eq!(block.gas_used, 0x5208);
        assert_eq!(block.transactions.len(), 1);
    }

    #[tokio::test]
    async fn infura_key_routes_to_infura_host() {
        let client = ChainClient::new("http://localhost:1", Some("test-key")).unwrap();
        // We can't introspect jsonrpsee's internal URL directly; this just
        // exercises that construction with a key succeeds.
        drop(client);
    }
}
