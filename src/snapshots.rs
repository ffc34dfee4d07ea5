// src/snapshots.rs
use alloy::primitives::U256;
use tracing::{debug, info, warn};

use crate::calendar;
use crate::models::{token_daily_data_id, DailySnapshot, Token, TokenDailyData};
use crate::store::{EntityStore, StoreError};

/// Load the day bucket for `timestamp`, creating it if needed.
///
/// The date string comes from the timestamp that created the bucket and is
/// never rewritten.
pub fn get_or_create_snapshot<S: EntityStore>(
    store: &mut S,
    timestamp: u64,
) -> Result<DailySnapshot, StoreError> {
    let id = calendar::day_index(timestamp).to_string();
    if let Some(snapshot) = store.load_snapshot(&id)? {
        return Ok(snapshot);
    }

    let snapshot = DailySnapshot {
        id,
        date: calendar::date_string(timestamp),
        token_data: Vec::new(),
    };
    store.save_snapshot(&snapshot)?;

    info!(day = %snapshot.id, date = %snapshot.date, "new daily snapshot");
    Ok(snapshot)
}

/// Fold one deposit or withdrawal into the token's rollup for that day.
///
/// The record is found by its `date-symbol` key rather than by scanning the
/// snapshot's list; a key that is absent from the store counts as a new record.
pub fn apply_daily_token_activity<S: EntityStore>(
    store: &mut S,
    token: &Token,
    amount: U256,
    timestamp: u64,
    is_deposit: bool,
) -> Result<TokenDailyData, StoreError> {
    let mut snapshot = get_or_create_snapshot(store, timestamp)?;
    let data_id = token_daily_data_id(&snapshot.date, &token.symbol);

    let mut data = match store.load_token_daily_data(&data_id)? {
        Some(data) => {
            if data.token != token.address {
                warn!(
                    id = %data_id,
                    stored = %data.token,
                    incoming = %token.address,
                    "symbol collision, merging daily data"
                );
            }
            data
        }
        None => TokenDailyData {
            id: data_id.clone(),
            snapshot: snapshot.id.clone(),
            token: token.address.clone(),
            daily_deposit_amount: U256::ZERO,
            daily_deposit_count: 0,
            daily_withdraw_amount: U256::ZERO,
            daily_withdraw_count: 0,
        },
    };

    if !snapshot.token_data.contains(&data_id) {
        snapshot.token_data.push(data_id);
    }

    if is_deposit {
        data.daily_deposit_amount = data.daily_deposit_amount.saturating_add(amount);
        data.daily_deposit_count += 1;
    } else {
        data.daily_withdraw_amount = data.daily_withdraw_amount.saturating_add(amount);
        data.daily_withdraw_count += 1;
    }

    store.save_token_daily_data(&data)?;
    store.save_snapshot(&snapshot)?;

    debug!(
        id = %data.id,
        deposits = data.daily_deposit_count,
        withdrawals = data.daily_withdraw_count,
        "daily data updated"
    );
    Ok(data)
}
