mod aggregator;
mod calendar;
mod config;
mod db;
mod indexer;
mod metadata;
mod models;
mod parser;
mod rpc;
mod snapshots;
mod stakers;
mod store;
mod tokens;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // RUST_LOG wins; default to info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Staking pool indexer starting...");

    let cfg = config::load()?;
    info!("  RPC URL: {}", cfg.rpc_http_url);
    info!("  DB Path: {}", cfg.db_path);
    info!("  Pool: {:?}", cfg.pool_address);
    info!("  Confirmations: {}", cfg.confirmations);
    info!("  Batch size: {}", cfg.batch_size);

    let conn = db::connect(&cfg.db_path)?;
    db::run_migrations(&conn)?;
    let store = db::SqliteStore::new(conn);

    let rpc = rpc::RpcClient::new(&cfg.rpc_http_url)?;
    let token_metadata = metadata::RpcMetadata::new(rpc.clone());

    let indexer_handle = tokio::spawn(indexer::run(cfg, rpc, store, token_metadata));

    tokio::select! {
        res = indexer_handle => match res {
            Ok(Ok(_)) => info!("Indexer exited cleanly"),
            Ok(Err(e)) => error!("Indexer error: {:?}", e),
            Err(e) => error!("Indexer task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Staking pool indexer stopped.");
    Ok(())
}
