// src/stakers.rs
use alloy::primitives::{Address, U256};
use tracing::{debug, info, warn};

use crate::models::{address_key, staker_metrics_id, Staker, StakerTokenMetrics, Token};
use crate::store::{EntityStore, StoreError};

/// Fold one deposit or withdrawal into the staker's per-token metrics.
///
/// The first interaction of a staker with a token bumps
/// `token.unique_staker_count` and the token is saved again. Metrics are keyed
/// by `staker-symbol`, so two token contracts sharing a symbol share one
/// record per staker. The contract seen second under that symbol finds the
/// record already there and never counts the staker: its
/// `unique_staker_count` stays below the true number of distinct stakers.
pub fn apply_staker_activity<S: EntityStore>(
    store: &mut S,
    token: &mut Token,
    staker_address: Address,
    amount: U256,
    is_deposit: bool,
) -> Result<StakerTokenMetrics, StoreError> {
    let staker_id = address_key(&staker_address);

    let mut staker = match store.load_staker(&staker_id)? {
        Some(staker) => staker,
        None => {
            info!(staker = %staker_id, "new staker");
            Staker {
                id: staker_id.clone(),
                address: staker_id.clone(),
                token_metrics: Vec::new(),
            }
        }
    };

    let metrics_id = staker_metrics_id(&staker_id, &token.symbol);
    let mut metrics = match store.load_staker_metrics(&metrics_id)? {
        Some(metrics) => {
            if metrics.token != token.address {
                warn!(
                    id = %metrics_id,
                    stored = %metrics.token,
                    incoming = %token.address,
                    "symbol collision, merging staker metrics"
                );
            }
            metrics
        }
        None => {
            token.unique_staker_count += 1;
            store.save_token(token)?;
            StakerTokenMetrics {
                id: metrics_id.clone(),
                staker: staker_id.clone(),
                token: token.address.clone(),
                deposit_count: 0,
                deposit_amount: U256::ZERO,
                withdraw_count: 0,
                withdraw_amount: U256::ZERO,
            }
        }
    };

    if !staker.token_metrics.contains(&metrics_id) {
        staker.token_metrics.push(metrics_id);
    }

    if is_deposit {
        metrics.deposit_count += 1;
        metrics.deposit_amount = metrics.deposit_amount.saturating_add(amount);
    } else {
        metrics.withdraw_count += 1;
        metrics.withdraw_amount = metrics.withdraw_amount.saturating_add(amount);
    }

    store.save_staker(&staker)?;
    store.save_staker_metrics(&metrics)?;

    debug!(
        id = %metrics.id,
        deposited = %metrics.deposit_amount,
        withdrawn = %metrics.withdraw_amount,
        "staker metrics updated"
    );
    Ok(metrics)
}
