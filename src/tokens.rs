// src/tokens.rs
use alloy::primitives::{Address, I256, U256};
use tracing::{debug, info, warn};

use crate::metadata::MetadataSource;
use crate::models::{address_key, Token};
use crate::store::{EntityStore, StoreError};

/// Amount as a signed 256-bit value; saturates for amounts above `I256::MAX`.
fn signed(amount: U256) -> I256 {
    I256::try_from(amount).unwrap_or(I256::MAX)
}

/// Load the token, or seed it from `metadata` and persist it.
///
/// An existing token is returned untouched.
pub async fn get_or_create_token<S, M>(
    store: &mut S,
    metadata: &M,
    address: Address,
    observed_at: u64,
) -> Result<Token, StoreError>
where
    S: EntityStore,
    M: MetadataSource,
{
    let id = address_key(&address);
    if let Some(token) = store.load_token(&id)? {
        return Ok(token);
    }

    let meta = metadata.fetch_token_metadata(address).await;
    let token = Token {
        id: id.clone(),
        address: id,
        name: meta.name,
        symbol: meta.symbol,
        decimals: meta.decimals,
        enabled: false,
        deposit_count: 0,
        withdraw_count: 0,
        total_deposit_amount: U256::ZERO,
        total_withdrawal_amount: U256::ZERO,
        current_staked_amount: I256::ZERO,
        unique_staker_count: 0,
        last_activity_at: observed_at,
    };
    store.save_token(&token)?;

    info!(token = %token.address, symbol = %token.symbol, decimals = token.decimals, "new token");
    Ok(token)
}

/// Fold one deposit or withdrawal into the token's lifetime counters.
pub async fn apply_token_activity<S, M>(
    store: &mut S,
    metadata: &M,
    address: Address,
    amount: U256,
    timestamp: u64,
    is_deposit: bool,
) -> Result<Token, StoreError>
where
    S: EntityStore,
    M: MetadataSource,
{
    let mut token = get_or_create_token(store, metadata, address, timestamp).await?;

    if is_deposit {
        token.deposit_count += 1;
        token.total_deposit_amount = token.total_deposit_amount.saturating_add(amount);
        token.current_staked_amount = token.current_staked_amount.saturating_add(signed(amount));
    } else {
        token.withdraw_count += 1;
        token.total_withdrawal_amount = token.total_withdrawal_amount.saturating_add(amount);
        token.current_staked_amount = token.current_staked_amount.saturating_sub(signed(amount));
    }
    token.last_activity_at = timestamp;

    if token.current_staked_amount.is_negative() {
        warn!(
            token = %token.address,
            staked = %token.current_staked_amount,
            "withdrawals exceed deposits; event stream out of step with the chain"
        );
    }

    store.save_token(&token)?;

    debug!(
        token = %token.address,
        deposits = token.deposit_count,
        withdrawals = token.withdraw_count,
        staked = %token.current_staked_amount,
        "token updated"
    );
    Ok(token)
}

/// Record a `TokenStakabilityChanged` event.
pub async fn set_token_enabled<S, M>(
    store: &mut S,
    metadata: &M,
    address: Address,
    enabled: bool,
    timestamp: u64,
) -> Result<Token, StoreError>
where
    S: EntityStore,
    M: MetadataSource,
{
    let mut token = get_or_create_token(store, metadata, address, timestamp).await?;
    token.enabled = enabled;
    token.last_activity_at = timestamp;
    store.save_token(&token)?;

    info!(token = %token.address, symbol = %token.symbol, enabled, "stakability changed");
    Ok(token)
}
