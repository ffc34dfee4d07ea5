// src/rpc.rs
use std::time::Duration;

use eyre::{eyre, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

#[derive(Debug, Deserialize, Clone)]
pub struct Log {
    pub topics: Vec<String>,
    pub data: String,

    #[serde(rename = "blockNumber")]
    pub block_number_hex: String,

    #[serde(rename = "transactionHash")]
    pub tx_hash: String,

    #[serde(rename = "logIndex")]
    pub log_index_hex: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    timestamp: String,
}

pub fn parse_hex_u64(s: &str) -> Result<u64> {
    Ok(u64::from_str_radix(s.trim_start_matches("0x"), 16)?)
}

/// Thin JSON-RPC client for the handful of calls the indexer needs.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: Client,
    url: String,
}

impl RpcClient {
    pub fn new(url: &str) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        debug!(method, url = %self.url, "rpc request");

        let resp = self.http.post(&self.url).json(&payload).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(eyre!("RPC error: HTTP {} on {}", resp.status(), method));
        }

        let parsed: RpcResponse<T> = resp.json().await?;
        if let Some(err) = parsed.error {
            return Err(eyre!("RPC error {} on {}: {}", err.code, method, err.message));
        }
        parsed
            .result
            .ok_or_else(|| eyre!("RPC {} returned no result", method))
    }

    /// Latest block number, with up to three attempts.
    pub async fn block_number(&self) -> Result<u64> {
        for attempt in 1..=3 {
            match self.request::<String>("eth_blockNumber", json!([])).await {
                Ok(hex) => return parse_hex_u64(&hex),
                Err(e) if attempt < 3 => {
                    warn!(attempt, error = %e, "eth_blockNumber failed, retrying");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
                Err(e) => return Err(eyre!("eth_blockNumber failed after 3 attempts: {}", e)),
            }
        }

        Err(eyre!("Unreachable: retries exhausted"))
    }

    /// Logs emitted by `address` in `[from_block, to_block]` whose first topic
    /// is any of `topics`.
    pub async fn logs(
        &self,
        address: &str,
        topics: &[String],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>> {
        let params = json!([{
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
            "address": address,
            "topics": [topics],
        }]);

        let logs: Vec<Log> = self.request("eth_getLogs", params).await?;
        debug!(from_block, to_block, count = logs.len(), "eth_getLogs");
        Ok(logs)
    }

    pub async fn block_timestamp(&self, block_number: u64) -> Result<u64> {
        let params = json!([format!("0x{:x}", block_number), false]);
        let header: BlockHeader = self.request("eth_getBlockByNumber", params).await?;
        parse_hex_u64(&header.timestamp)
    }

    /// `eth_call` against the latest block; returns the raw return data.
    pub async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>> {
        let params = json!([
            { "to": to, "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        let out: String = self.request("eth_call", params).await?;
        Ok(hex::decode(out.trim_start_matches("0x"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
        assert_eq!(parse_hex_u64("0x1b4").unwrap(), 436);
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn decodes_getlogs_result() {
        let body = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "result": [{
                "address": "0xf047ab4c75cebf0eb9ed34ae2c186f3611aeafa6",
                "topics": ["0x01"],
                "data": "0x",
                "blockNumber": "0x10",
                "transactionHash": "0xabc",
                "logIndex": "0x2"
            }]
        }"#;
        let parsed: RpcResponse<Vec<Log>> = serde_json::from_str(body).unwrap();
        let logs = parsed.result.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].log_index_hex, "0x2");
        assert!(parsed.error.is_none());
    }

    #[test]
    fn decodes_error_object() {
        let body = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "execution reverted"}
        }"#;
        let parsed: RpcResponse<String> = serde_json::from_str(body).unwrap();
        assert!(parsed.result.is_none());
        assert_eq!(parsed.error.unwrap().code, -32000);
    }
}
