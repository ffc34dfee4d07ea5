use std::collections::hash_map::Entry;
use std::collections::HashMap;

use eyre::Result;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::aggregator;
use crate::config::Config;
use crate::db::{self, SqliteStore};
use crate::metadata::MetadataSource;
use crate::models::address_key;
use crate::parser::{self, PoolEvent};
use crate::rpc::{Log, RpcClient};
use crate::store::StoreError;

const MIN_RETRY_SECS: u64 = 10;
const MAX_RETRY_SECS: u64 = 120;

/// Follow the pool from the stored cursor to the confirmed head, forever.
pub async fn run<M: MetadataSource>(
    cfg: Config,
    rpc: RpcClient,
    mut store: SqliteStore,
    metadata: M,
) -> Result<()> {
    let pool = address_key(&cfg.pool_address);
    let topics = parser::pool_topics();

    let mut cursor = match db::last_indexed_block(store.connection())? {
        Some(block) => block,
        None => cfg.start_block.saturating_sub(1),
    };
    let mut retry_delay = MIN_RETRY_SECS;

    info!(pool = %pool, from_block = cursor + 1, "Indexer started");

    loop {
        let head = match rpc.block_number().await {
            Ok(head) => head,
            Err(e) => {
                warn!("RPC failed this round: {:?}", e);
                sleep(Duration::from_secs(retry_delay)).await;
                retry_delay = (retry_delay * 2).min(MAX_RETRY_SECS);
                continue;
            }
        };
        let target = head.saturating_sub(cfg.confirmations);

        if cursor >= target {
            debug!(head, target, "caught up");
            sleep(Duration::from_secs(MIN_RETRY_SECS)).await;
            continue;
        }

        let (from, to) = next_window(cursor, target, cfg.batch_size);

        match index_range(&rpc, &mut store, &metadata, &pool, &topics, from, to).await {
            Ok(processed) => {
                retry_delay = MIN_RETRY_SECS;
                db::set_last_indexed_block(store.connection(), to)?;
                cursor = to;
                info!("Indexed blocks {} → {} ({} events, head {})", from, to, processed, head);
            }
            Err(e) => {
                // persistence failures propagate, RPC failures are retried
                if is_persistence_error(&e) {
                    return Err(e);
                }
                warn!("Window {} → {} failed: {:?}", from, to, e);
                sleep(Duration::from_secs(retry_delay)).await;
                retry_delay = (retry_delay * 2).min(MAX_RETRY_SECS);
            }
        }
    }
}

/// Inclusive block window after `cursor`, at most `batch_size` blocks, capped at `target`.
fn next_window(cursor: u64, target: u64, batch_size: u64) -> (u64, u64) {
    let from = cursor.saturating_add(1);
    let to = target.min(cursor.saturating_add(batch_size));
    (from, to)
}

fn is_persistence_error(e: &eyre::Report) -> bool {
    e.downcast_ref::<StoreError>().is_some() || e.downcast_ref::<rusqlite::Error>().is_some()
}

/// Fetch and apply every pool log in `[from, to]`.
/// Returns the number of newly recorded events.
async fn index_range<M: MetadataSource>(
    rpc: &RpcClient,
    store: &mut SqliteStore,
    metadata: &M,
    pool: &str,
    topics: &[String],
    from: u64,
    to: u64,
) -> Result<usize> {
    let logs = rpc.logs(pool, topics, from, to).await?;

    let mut timestamps: HashMap<u64, u64> = HashMap::new();
    for block in logs.iter().filter_map(|log| parser::log_position(log).map(|(b, _)| b)) {
        if let Entry::Vacant(slot) = timestamps.entry(block) {
            slot.insert(rpc.block_timestamp(block).await?);
        }
    }

    apply_logs(store, metadata, logs, &timestamps).await
}

/// Order `logs` by (block, log index), then decode, record and dispatch each one.
/// Logs already in the audit table are skipped. Returns the number of newly
/// recorded events.
async fn apply_logs<M: MetadataSource>(
    store: &mut SqliteStore,
    metadata: &M,
    logs: Vec<Log>,
    timestamps: &HashMap<u64, u64>,
) -> Result<usize> {
    let mut logs: Vec<(u64, u64, Log)> = logs
        .into_iter()
        .filter_map(|log| match parser::log_position(&log) {
            Some((block, index)) => Some((block, index, log)),
            None => {
                warn!(tx = %log.tx_hash, "log without position, skipped");
                None
            }
        })
        .collect();
    logs.sort_by_key(|(block, index, _)| (*block, *index));

    let mut processed = 0;

    for (block, index, log) in logs {
        let Some(&timestamp) = timestamps.get(&block) else {
            warn!(block, index, "no timestamp for block, skipped");
            continue;
        };

        let Some(decoded) = parser::decode_pool_log(&log, timestamp) else {
            warn!(block, index, tx = %log.tx_hash, "undecodable pool log, skipped");
            continue;
        };

        if !db::record_event(store.connection(), &decoded)? {
            debug!(block, index, kind = decoded.event.kind(), "already applied, skipped");
            continue;
        }

        match &decoded.event {
            PoolEvent::Deposit { inner, .. } => {
                aggregator::handle_deposit(store, metadata, inner).await?
            }
            PoolEvent::Withdraw { inner, .. } => {
                aggregator::handle_withdraw(store, metadata, inner).await?
            }
            PoolEvent::StakabilityChanged(inner) => {
                aggregator::handle_stakability_changed(store, metadata, inner).await?
            }
            PoolEvent::BlocklistChanged { migrator, blocked } => {
                info!(migrator = %migrator, blocked, "blocklist changed");
            }
            other => {
                info!(block, index, kind = other.kind(), "pool event recorded");
            }
        }
        processed += 1;
    }

    Ok(processed)
}
