use alloy::primitives::{address, Address};
use dotenvy::dotenv;
use eyre::{Result, WrapErr};
use serde::Deserialize;
use std::env;
use tracing::info;

/// Zircuit staking pool on Ethereum mainnet.
const DEFAULT_POOL_ADDRESS: Address = address!("F047ab4c75cebf0eB9ed34Ae2c186f3611aEAfa6");

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc_http_url: String,
    pub db_path: String,
    pub pool_address: Address,
    pub start_block: u64,
    pub confirmations: u64,
    pub batch_size: u64,
}

fn env_u64(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .wrap_err_with(|| format!("{key} must be an unsigned integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

pub fn load() -> Result<Config> {
    dotenv().ok();

    // RPC endpoint (ETH_RPC accepted as an alias)
    let rpc_http_url = env::var("RPC_HTTP_URL")
        .or_else(|_| env::var("ETH_RPC"))
        .unwrap_or_else(|_| "https://eth.llamarpc.com".to_string());

    let db_path = env::var("DATABASE_URL").unwrap_or_else(|_| "staking.db".to_string());

    let pool_address = match env::var("POOL_ADDRESS") {
        Ok(raw) => raw
            .trim()
            .parse::<Address>()
            .wrap_err_with(|| format!("POOL_ADDRESS is not an address: {raw:?}"))?,
        Err(_) => DEFAULT_POOL_ADDRESS,
    };

    let start_block = env_u64("START_BLOCK", 0)?;
    let confirmations = env_u64("CONFIRMATIONS", 12)?;
    let batch_size = env_u64("BATCH_SIZE", 500)?.max(1);

    let cfg = Config {
        rpc_http_url,
        db_path,
        pool_address,
        start_block,
        confirmations,
        batch_size,
    };

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}
