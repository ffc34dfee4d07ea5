// src/store.rs
use thiserror::Error;

use crate::models::{DailySnapshot, Staker, StakerTokenMetrics, Token, TokenDailyData};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("reference list encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("corrupt {entity} {id}: {reason}")]
    Corrupt {
        entity: &'static str,
        id: String,
        reason: String,
    },
}

/// Key-addressed storage for the aggregated entities.
///
/// Loads return `Ok(None)` for a missing key. Saves overwrite whatever was
/// stored under the entity's id and take `&mut self`: there is exactly one
/// writer, the event loop.
pub trait EntityStore {
    fn load_token(&self, id: &str) -> Result<Option<Token>, StoreError>;
    fn save_token(&mut self, token: &Token) -> Result<(), StoreError>;

    fn load_staker(&self, id: &str) -> Result<Option<Staker>, StoreError>;
    fn save_staker(&mut self, staker: &Staker) -> Result<(), StoreError>;

    fn load_staker_metrics(&self, id: &str) -> Result<Option<StakerTokenMetrics>, StoreError>;
    fn save_staker_metrics(&mut self, metrics: &StakerTokenMetrics) -> Result<(), StoreError>;

    fn load_snapshot(&self, id: &str) -> Result<Option<DailySnapshot>, StoreError>;
    fn save_snapshot(&mut self, snapshot: &DailySnapshot) -> Result<(), StoreError>;

    fn load_token_daily_data(&self, id: &str) -> Result<Option<TokenDailyData>, StoreError>;
    fn save_token_daily_data(&mut self, data: &TokenDailyData) -> Result<(), StoreError>;
}

#[cfg(test)]
pub use memory::MemoryStore;
