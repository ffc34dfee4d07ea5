use std::collections::BTreeMap;
use std::env;

use alloy::primitives::keccak256;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcResponse<T> {
    Success { result: T },
    Error { error: RpcError },
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[allow(dead_code)]
    code: i64,
    #[allow(dead_code)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Log {
    topics: Vec<String>,

    #[serde(rename = "blockNumber")]
    block_number: String,

    #[serde(rename = "transactionHash")]
    tx_hash: String,
}

const DEFAULT_POOL: &str = "0xF047ab4c75cebf0eB9ed34Ae2c186f3611aEAfa6";

const EVENT_SIGNATURES: [(&str, &str); 11] = [
    ("Deposit(uint256,address,address,uint256)", "Deposit"),
    ("Withdraw(uint256,address,address,uint256)", "Withdraw"),
    ("TokenStakabilityChanged(address,bool)", "TokenStakabilityChanged"),
    ("BlocklistChanged(address,bool)", "BlocklistChanged"),
    (
        "Migrate(uint256,address,address[],address,address,uint256[])",
        "Migrate",
    ),
    ("Paused(address)", "Paused"),
    ("Unpaused(address)", "Unpaused"),
    ("SignerChanged(address)", "SignerChanged"),
    ("OwnershipTransferStarted(address,address)", "OwnershipTransferStarted"),
    ("OwnershipTransferred(address,address)", "OwnershipTransferred"),
    ("EIP712DomainChanged()", "EIP712DomainChanged"),
];

fn topic_name(topic: &str) -> &'static str {
    EVENT_SIGNATURES
        .iter()
        .find(|(signature, _)| format!("{:#x}", keccak256(signature)).eq_ignore_ascii_case(topic))
        .map(|(_, name)| *name)
        .unwrap_or("unknown")
}

/// Print a summary of the pool's recent logs: `pool_logs [blocks]`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let rpc_url =
        env::var("RPC_HTTP_URL").unwrap_or_else(|_| "https://eth.llamarpc.com".to_string());
    let pool = env::var("POOL_ADDRESS").unwrap_or_else(|_| DEFAULT_POOL.to_string());
    let span: u64 = env::args().nth(1).map(|s| s.parse()).transpose()?.unwrap_or(1_000);

    let client = Client::new();
    println!("Fetching pool logs from {}...", pool);

    let block_res: RpcResponse<String> = client
        .post(&rpc_url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_blockNumber",
            "params": []
        }))
        .send()
        .await?
        .json()
        .await?;

    let latest_block_hex = match block_res {
        RpcResponse::Success { result } => result,
        RpcResponse::Error { error } => {
            eprintln!("RPC error while fetching block: {:?}", error);
            return Ok(());
        }
    };

    let latest_block = u64::from_str_radix(latest_block_hex.trim_start_matches("0x"), 16)?;
    println!("Latest block: {}", latest_block);

    let logs_res: RpcResponse<Vec<Log>> = client
        .post(&rpc_url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getLogs",
            "params": [{
                "fromBlock": format!("0x{:x}", latest_block.saturating_sub(span)),
                "toBlock": format!("0x{:x}", latest_block),
                "address": pool,
            }]
        }))
        .send()
        .await?
        .json()
        .await?;

    match logs_res {
        RpcResponse::Success { result: logs } => {
            println!("Fetched {} logs over the last {} blocks", logs.len(), span);

            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for log in &logs {
                let name = log.topics.first().map(|t| topic_name(t)).unwrap_or("anonymous");
                *counts.entry(name).or_default() += 1;
            }
            for (name, count) in &counts {
                println!("  {:<24} {}", name, count);
            }

            for log in logs.iter().rev().take(5) {
                let name = log.topics.first().map(|t| topic_name(t)).unwrap_or("anonymous");
                println!("Tx: {} | Block: {} | Event: {}", log.tx_hash, log.block_number, name);
            }
        }
        RpcResponse::Error { error } => {
            eprintln!("RPC error while fetching logs: {:?}", error);
        }
    }

    Ok(())
}
