// src/db.rs
use std::str::FromStr;

use alloy::primitives::{I256, U256};
use chrono::Utc;
use eyre::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{DailySnapshot, Staker, StakerTokenMetrics, Token, TokenDailyData};
use crate::parser::{DecodedLog, PoolEvent};
use crate::store::{EntityStore, StoreError};

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tokens (
  id                      TEXT PRIMARY KEY,
  address                 TEXT NOT NULL,
  name                    TEXT NOT NULL,
  symbol                  TEXT NOT NULL,
  decimals                INTEGER NOT NULL,
  enabled                 INTEGER NOT NULL,
  deposit_count           INTEGER NOT NULL,
  withdraw_count          INTEGER NOT NULL,
  total_deposit_amount    TEXT NOT NULL, -- U256 as decimal string
  total_withdrawal_amount TEXT NOT NULL,
  current_staked_amount   TEXT NOT NULL, -- signed I256
  unique_staker_count     INTEGER NOT NULL,
  last_activity_at        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS stakers (
  id            TEXT PRIMARY KEY,
  address       TEXT NOT NULL,
  token_metrics TEXT NOT NULL -- JSON array of staker_token_metrics ids
);

CREATE TABLE IF NOT EXISTS staker_token_metrics (
  id              TEXT PRIMARY KEY,
  staker          TEXT NOT NULL,
  token           TEXT NOT NULL,
  deposit_count   INTEGER NOT NULL,
  deposit_amount  TEXT NOT NULL,
  withdraw_count  INTEGER NOT NULL,
  withdraw_amount TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS daily_snapshots (
  id         TEXT PRIMARY KEY,
  date       TEXT NOT NULL,
  token_data TEXT NOT NULL -- JSON array of token_daily_data ids
);

CREATE TABLE IF NOT EXISTS token_daily_data (
  id                    TEXT PRIMARY KEY,
  snapshot              TEXT NOT NULL,
  token                 TEXT NOT NULL,
  daily_deposit_amount  TEXT NOT NULL,
  daily_deposit_count   INTEGER NOT NULL,
  daily_withdraw_amount TEXT NOT NULL,
  daily_withdraw_count  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS pool_events (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  block_number INTEGER NOT NULL,
  tx_hash      TEXT NOT NULL,
  log_index    INTEGER NOT NULL,
  kind         TEXT NOT NULL,
  payload      TEXT NOT NULL, -- JSON of the decoded fields
  UNIQUE(tx_hash, log_index)
);

CREATE TABLE IF NOT EXISTS indexer_state (
  key        TEXT PRIMARY KEY,
  value      TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
"#;

/// Connect to SQLite (with WAL mode for performance)
pub fn connect(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Run schema migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(INIT_SQL)?;
    Ok(())
}

/// Append a decoded pool log to the audit table.
///
/// Returns `false` when `(tx_hash, log_index)` was already recorded, i.e. the
/// log has been seen before and must not be aggregated again.
pub fn record_event(conn: &Connection, log: &DecodedLog) -> Result<bool> {
    let payload = match &log.event {
        PoolEvent::Deposit { event_id, inner } => serde_json::json!({
            "eventId": event_id.to_string(),
            "depositor": format!("{:#x}", inner.depositor),
            "token": format!("{:#x}", inner.token),
            "amount": inner.amount.to_string(),
            "blockTimestamp": inner.block_timestamp,
        }),
        PoolEvent::Withdraw { event_id, inner } => serde_json::json!({
            "eventId": event_id.to_string(),
            "withdrawer": format!("{:#x}", inner.withdrawer),
            "token": format!("{:#x}", inner.token),
            "amount": inner.amount.to_string(),
            "blockTimestamp": inner.block_timestamp,
        }),
        PoolEvent::StakabilityChanged(inner) => serde_json::json!({
            "token": format!("{:#x}", inner.token),
            "enabled": inner.enabled,
            "blockTimestamp": inner.block_timestamp,
        }),
        PoolEvent::BlocklistChanged { migrator, blocked } => serde_json::json!({
            "migrator": format!("{:#x}", migrator),
            "blocked": blocked,
        }),
        PoolEvent::Migrate {
            event_id,
            user,
            tokens,
            destination,
            migrator,
            amounts,
        } => serde_json::json!({
            "eventId": event_id.to_string(),
            "user": format!("{:#x}", user),
            "tokens": tokens.iter().map(|t| format!("{t:#x}")).collect::<Vec<_>>(),
            "destination": format!("{:#x}", destination),
            "migrator": format!("{:#x}", migrator),
            "amounts": amounts.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
        }),
        PoolEvent::Paused { account } | PoolEvent::Unpaused { account } => {
            serde_json::json!({ "account": format!("{:#x}", account) })
        }
        PoolEvent::SignerChanged { new_signer } => {
            serde_json::json!({ "newSigner": format!("{:#x}", new_signer) })
        }
        PoolEvent::OwnershipTransferStarted {
            previous_owner,
            new_owner,
        }
        | PoolEvent::OwnershipTransferred {
            previous_owner,
            new_owner,
        } => serde_json::json!({
            "previousOwner": format!("{:#x}", previous_owner),
            "newOwner": format!("{:#x}", new_owner),
        }),
        PoolEvent::Eip712DomainChanged => serde_json::json!({}),
    };

    let inserted = conn.execute(
        r#"
        INSERT INTO pool_events (block_number, tx_hash, log_index, kind, payload)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(tx_hash, log_index) DO NOTHING
        "#,
        params![
            log.block_number as i64,
            log.tx_hash,
            log.log_index as i64,
            log.event.kind(),
            payload.to_string()
        ],
    )?;
    Ok(inserted == 1)
}

pub fn last_indexed_block(conn: &Connection) -> Result<Option<u64>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM indexer_state WHERE key = 'last_indexed_block'",
            [],
            |r| r.get(0),
        )
        .optional()?;
    Ok(value.map(|v| v.parse()).transpose()?)
}

pub fn set_last_indexed_block(conn: &Connection, block: u64) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO indexer_state (key, value, updated_at)
        VALUES ('last_indexed_block', ?1, ?2)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
        params![block.to_string(), Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// `EntityStore` over a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn parse_field<T: FromStr>(
    entity: &'static str,
    id: &str,
    field: &str,
    raw: &str,
) -> Result<T, StoreError> {
    raw.parse().map_err(|_| StoreError::Corrupt {
        entity,
        id: id.to_string(),
        reason: format!("{field} = {raw:?}"),
    })
}

fn u256(entity: &'static str, id: &str, field: &str, raw: &str) -> Result<U256, StoreError> {
    parse_field(entity, id, field, raw)
}

fn i256(entity: &'static str, id: &str, field: &str, raw: &str) -> Result<I256, StoreError> {
    I256::from_dec_str(raw).map_err(|_| StoreError::Corrupt {
        entity,
        id: id.to_string(),
        reason: format!("{field} = {raw:?}"),
    })
}

fn count(row: &Row, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    Ok(value as u64)
}

impl EntityStore for SqliteStore {
    fn load_token(&self, id: &str) -> Result<Option<Token>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT address, name, symbol, decimals, enabled, deposit_count, withdraw_count,
                        total_deposit_amount, total_withdrawal_amount, current_staked_amount,
                        unique_staker_count, last_activity_at
                 FROM tokens WHERE id = ?1",
                [id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, u8>(3)?,
                        r.get::<_, bool>(4)?,
                        count(r, 5)?,
                        count(r, 6)?,
                        r.get::<_, String>(7)?,
                        r.get::<_, String>(8)?,
                        r.get::<_, String>(9)?,
                        count(r, 10)?,
                        count(r, 11)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            address,
            name,
            symbol,
            decimals,
            enabled,
            deposits,
            withdrawals,
            dep,
            wd,
            staked,
            stakers,
            last,
        )) = row
        else {
            return Ok(None);
        };

        Ok(Some(Token {
            id: id.to_string(),
            address,
            name,
            symbol,
            decimals,
            enabled,
            deposit_count: deposits,
            withdraw_count: withdrawals,
            total_deposit_amount: u256("token", id, "total_deposit_amount", &dep)?,
            total_withdrawal_amount: u256("token", id, "total_withdrawal_amount", &wd)?,
            current_staked_amount: i256("token", id, "current_staked_amount", &staked)?,
            unique_staker_count: stakers,
            last_activity_at: last,
        }))
    }

    fn save_token(&mut self, token: &Token) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO tokens (
                id, address, name, symbol, decimals, enabled, deposit_count, withdraw_count,
                total_deposit_amount, total_withdrawal_amount, current_staked_amount,
                unique_staker_count, last_activity_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                enabled                 = excluded.enabled,
                deposit_count           = excluded.deposit_count,
                withdraw_count          = excluded.withdraw_count,
                total_deposit_amount    = excluded.total_deposit_amount,
                total_withdrawal_amount = excluded.total_withdrawal_amount,
                current_staked_amount   = excluded.current_staked_amount,
                unique_staker_count     = excluded.unique_staker_count,
                last_activity_at        = excluded.last_activity_at
            "#,
            params![
                token.id,
                token.address,
                token.name,
                token.symbol,
                token.decimals,
                token.enabled,
                token.deposit_count as i64,
                token.withdraw_count as i64,
                token.total_deposit_amount.to_string(),
                token.total_withdrawal_amount.to_string(),
                token.current_staked_amount.to_string(),
                token.unique_staker_count as i64,
                token.last_activity_at as i64,
            ],
        )?;
        Ok(())
    }

    fn load_staker(&self, id: &str) -> Result<Option<Staker>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT address, token_metrics FROM stakers WHERE id = ?1",
                [id],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((address, metrics)) = row else {
            return Ok(None);
        };
        Ok(Some(Staker {
            id: id.to_string(),
            address,
            token_metrics: serde_json::from_str(&metrics)?,
        }))
    }

    fn save_staker(&mut self, staker: &Staker) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO stakers (id, address, token_metrics)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET token_metrics = excluded.token_metrics
            "#,
            params![
                staker.id,
                staker.address,
                serde_json::to_string(&staker.token_metrics)?
            ],
        )?;
        Ok(())
    }

    fn load_staker_metrics(&self, id: &str) -> Result<Option<StakerTokenMetrics>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT staker, token, deposit_count, deposit_amount,
                        withdraw_count, withdraw_amount
                 FROM staker_token_metrics WHERE id = ?1",
                [id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        count(r, 2)?,
                        r.get::<_, String>(3)?,
                        count(r, 4)?,
                        r.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((staker, token, deposits, deposited, withdrawals, withdrawn)) = row else {
            return Ok(None);
        };
        Ok(Some(StakerTokenMetrics {
            id: id.to_string(),
            staker,
            token,
            deposit_count: deposits,
            deposit_amount: u256("staker_token_metrics", id, "deposit_amount", &deposited)?,
            withdraw_count: withdrawals,
            withdraw_amount: u256("staker_token_metrics", id, "withdraw_amount", &withdrawn)?,
        }))
    }

    fn save_staker_metrics(&mut self, metrics: &StakerTokenMetrics) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO staker_token_metrics (
                id, staker, token, deposit_count, deposit_amount, withdraw_count, withdraw_amount
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                deposit_count   = excluded.deposit_count,
                deposit_amount  = excluded.deposit_amount,
                withdraw_count  = excluded.withdraw_count,
                withdraw_amount = excluded.withdraw_amount
            "#,
            params![
                metrics.id,
                metrics.staker,
                metrics.token,
                metrics.deposit_count as i64,
                metrics.deposit_amount.to_string(),
                metrics.withdraw_count as i64,
                metrics.withdraw_amount.to_string(),
            ],
        )?;
        Ok(())
    }

    fn load_snapshot(&self, id: &str) -> Result<Option<DailySnapshot>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT date, token_data FROM daily_snapshots WHERE id = ?1",
                [id],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((date, token_data)) = row else {
            return Ok(None);
        };
        Ok(Some(DailySnapshot {
            id: id.to_string(),
            date,
            token_data: serde_json::from_str(&token_data)?,
        }))
    }

    fn save_snapshot(&mut self, snapshot: &DailySnapshot) -> Result<(), StoreError> {
        // date is fixed at creation; only the reference list changes
        self.conn.execute(
            r#"
            INSERT INTO daily_snapshots (id, date, token_data)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET token_data = excluded.token_data
            "#,
            params![
                snapshot.id,
                snapshot.date,
                serde_json::to_string(&snapshot.token_data)?
            ],
        )?;
        Ok(())
    }

    fn load_token_daily_data(&self, id: &str) -> Result<Option<TokenDailyData>, StoreError> {
        const ENTITY: &str = "token_daily_data";
        let row = self
            .conn
            .query_row(
                "SELECT snapshot, token, daily_deposit_amount, daily_deposit_count,
                        daily_withdraw_amount, daily_withdraw_count
                 FROM token_daily_data WHERE id = ?1",
                [id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        count(r, 3)?,
                        r.get::<_, String>(4)?,
                        count(r, 5)?,
                    ))
                },
            )
            .optional()?;

        let Some((snapshot, token, deposited, deposits, withdrawn, withdrawals)) = row else {
            return Ok(None);
        };
        Ok(Some(TokenDailyData {
            id: id.to_string(),
            snapshot,
            token,
            daily_deposit_amount: u256(ENTITY, id, "daily_deposit_amount", &deposited)?,
            daily_deposit_count: deposits,
            daily_withdraw_amount: u256(ENTITY, id, "daily_withdraw_amount", &withdrawn)?,
            daily_withdraw_count: withdrawals,
        }))
    }

    fn save_token_daily_data(&mut self, data: &TokenDailyData) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO token_daily_data (
                id, snapshot, token, daily_deposit_amount, daily_deposit_count,
                daily_withdraw_amount, daily_withdraw_count
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                daily_deposit_amount  = excluded.daily_deposit_amount,
                daily_deposit_count   = excluded.daily_deposit_count,
                daily_withdraw_amount = excluded.daily_withdraw_amount,
                daily_withdraw_count  = excluded.daily_withdraw_count
            "#,
            params![
                data.id,
                data.snapshot,
                data.token,
                data.daily_deposit_amount.to_string(),
                data.daily_deposit_count as i64,
                data.daily_withdraw_amount.to_string(),
                data.daily_withdraw_count as i64,
            ],
        )?;
        Ok(())
    }
}
