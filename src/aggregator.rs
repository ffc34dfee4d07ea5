// src/aggregator.rs
//! Entry points for the pool events that drive aggregation.
//!
//! Each handler updates the token, then the staker, then the day bucket. Every
//! stage persists its own writes before the next begins; nothing is batched.

use alloy::primitives::{Address, U256};
use tracing::info;

use crate::metadata::MetadataSource;
use crate::models::Token;
use crate::snapshots::apply_daily_token_activity;
use crate::stakers::apply_staker_activity;
use crate::store::{EntityStore, StoreError};
use crate::tokens::{apply_token_activity, set_token_enabled};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
    pub token: Address,
    pub depositor: Address,
    pub amount: U256,
    pub block_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawEvent {
    pub token: Address,
    pub withdrawer: Address,
    pub amount: U256,
    pub block_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakabilityChangedEvent {
    pub token: Address,
    pub enabled: bool,
    pub block_timestamp: u64,
}

async fn apply_activity<S, M>(
    store: &mut S,
    metadata: &M,
    token: Address,
    staker: Address,
    amount: U256,
    timestamp: u64,
    is_deposit: bool,
) -> Result<Token, StoreError>
where
    S: EntityStore,
    M: MetadataSource,
{
    let mut token =
        apply_token_activity(store, metadata, token, amount, timestamp, is_deposit).await?;
    apply_staker_activity(store, &mut token, staker, amount, is_deposit)?;
    apply_daily_token_activity(store, &token, amount, timestamp, is_deposit)?;
    Ok(token)
}

pub async fn handle_deposit<S, M>(
    store: &mut S,
    metadata: &M,
    event: &DepositEvent,
) -> Result<(), StoreError>
where
    S: EntityStore,
    M: MetadataSource,
{
    let token = apply_activity(
        store,
        metadata,
        event.token,
        event.depositor,
        event.amount,
        event.block_timestamp,
        true,
    )
    .await?;

    match token.display_amount(event.amount) {
        Some(amount) => info!("Deposit {} {} ← {:?}", amount, token.symbol, event.depositor),
        None => info!("Deposit {} (raw) {} ← {:?}", event.amount, token.symbol, event.depositor),
    }
    Ok(())
}

pub async fn handle_withdraw<S, M>(
    store: &mut S,
    metadata: &M,
    event: &WithdrawEvent,
) -> Result<(), StoreError>
where
    S: EntityStore,
    M: MetadataSource,
{
    let token = apply_activity(
        store,
        metadata,
        event.token,
        event.withdrawer,
        event.amount,
        event.block_timestamp,
        false,
    )
    .await?;

    let withdrawer = event.withdrawer;
    match token.display_amount(event.amount) {
        Some(amount) => info!("Withdraw {} {} → {:?}", amount, token.symbol, withdrawer),
        None => info!("Withdraw {} (raw) {} → {:?}", event.amount, token.symbol, withdrawer),
    }
    Ok(())
}

pub async fn handle_stakability_changed<S, M>(
    store: &mut S,
    metadata: &M,
    event: &StakabilityChangedEvent,
) -> Result<(), StoreError>
where
    S: EntityStore,
    M: MetadataSource,
{
    set_token_enabled(store, metadata, event.token, event.enabled, event.block_timestamp).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, I256};

    use super::*;
    use crate::metadata::testing::StaticMetadata;
    use crate::models::address_key;
    use crate::store::MemoryStore;

    const TOKEN: Address = address!("0000000000000000000000000000000000000aaa");
    const STAKER: Address = address!("0000000000000000000000000000000000000bbb");
    const OTHER: Address = address!("0000000000000000000000000000000000000ccc");

    // 2024-05-01T08:00:00Z
    const T0: u64 = 1_714_550_400;

    fn deposit(staker: Address, amount: u64, ts: u64) -> DepositEvent {
        DepositEvent {
            token: TOKEN,
            depositor: staker,
            amount: U256::from(amount),
            block_timestamp: ts,
        }
    }

    fn withdraw(staker: Address, amount: u64, ts: u64) -> WithdrawEvent {
        WithdrawEvent {
            token: TOKEN,
            withdrawer: staker,
            amount: U256::from(amount),
            block_timestamp: ts,
        }
    }

    #[tokio::test]
    async fn deposit_then_withdraw_same_day() {
        let mut store = MemoryStore::default();
        let meta = StaticMetadata::default().with(TOKEN, "AAA", 18);

        handle_deposit(&mut store, &meta, &deposit(STAKER, 1000, T0)).await.unwrap();
        handle_withdraw(&mut store, &meta, &withdraw(STAKER, 400, T0 + 3600)).await.unwrap();

        let token = store.load_token(&address_key(&TOKEN)).unwrap().unwrap();
        assert_eq!(token.deposit_count, 1);
        assert_eq!(token.withdraw_count, 1);
        assert_eq!(token.current_staked_amount, I256::try_from(600i64).unwrap());
        assert_eq!(token.unique_staker_count, 1);
        assert_eq!(token.last_activity_at, T0 + 3600);

        let metrics_id = format!("{}-AAA", address_key(&STAKER));
        let metrics = store.load_staker_metrics(&metrics_id).unwrap().unwrap();
        assert_eq!(metrics.deposit_amount, U256::from(1000));
        assert_eq!(metrics.withdraw_amount, U256::from(400));
        assert_eq!(metrics.token, token.address);

        assert_eq!(store.snapshots.len(), 1);
        let snapshot = store.snapshots.values().next().unwrap();
        assert_eq!(snapshot.date, "2024-05-01");
        assert_eq!(snapshot.token_data, vec!["2024-05-01-AAA"]);

        let daily = store.load_token_daily_data("2024-05-01-AAA").unwrap().unwrap();
        assert_eq!(daily.daily_deposit_amount, U256::from(1000));
        assert_eq!(daily.daily_withdraw_amount, U256::from(400));
        assert_eq!(daily.daily_deposit_count, 1);
        assert_eq!(daily.daily_withdraw_count, 1);
    }

    #[tokio::test]
    async fn staker_and_day_totals_sum_to_token_totals() {
        let mut store = MemoryStore::default();
        let meta = StaticMetadata::default().with(TOKEN, "AAA", 18);

        handle_deposit(&mut store, &meta, &deposit(STAKER, 500, T0)).await.unwrap();
        handle_deposit(&mut store, &meta, &deposit(OTHER, 300, T0 + 86_400)).await.unwrap();
        handle_deposit(&mut store, &meta, &deposit(STAKER, 200, T0 + 2 * 86_400)).await.unwrap();
        handle_withdraw(&mut store, &meta, &withdraw(OTHER, 100, T0 + 2 * 86_400)).await.unwrap();

        let token = store.load_token(&address_key(&TOKEN)).unwrap().unwrap();
        assert_eq!(token.unique_staker_count, 2);

        let staker_deposits = store
            .staker_metrics
            .values()
            .fold(U256::ZERO, |acc, m| acc + m.deposit_amount);
        let staker_withdrawals = store
            .staker_metrics
            .values()
            .fold(U256::ZERO, |acc, m| acc + m.withdraw_amount);
        assert_eq!(staker_deposits, token.total_deposit_amount);
        assert_eq!(staker_withdrawals, token.total_withdrawal_amount);

        let daily_deposits = store
            .token_daily_data
            .values()
            .fold(U256::ZERO, |acc, d| acc + d.daily_deposit_amount);
        assert_eq!(daily_deposits, U256::from(1000));
        assert_eq!(store.snapshots.len(), 3);
        assert_eq!(token.current_staked_amount, I256::try_from(900i64).unwrap());
    }

    #[tokio::test]
    async fn stakability_change_touches_only_the_token() {
        let mut store = MemoryStore::default();
        let meta = StaticMetadata::default().with(TOKEN, "AAA", 18);

        let event = StakabilityChangedEvent {
            token: TOKEN,
            enabled: true,
            block_timestamp: T0,
        };
        handle_stakability_changed(&mut store, &meta, &event).await.unwrap();

        let token = store.load_token(&address_key(&TOKEN)).unwrap().unwrap();
        assert!(token.enabled);
        assert_eq!(token.last_activity_at, T0);
        assert!(store.stakers.is_empty());
        assert!(store.snapshots.is_empty());
    }

    #[tokio::test]
    async fn replayed_event_double_counts() {
        let mut store = MemoryStore::default();
        let meta = StaticMetadata::default().with(TOKEN, "AAA", 18);
        let event = deposit(STAKER, 10, T0);

        handle_deposit(&mut store, &meta, &event).await.unwrap();
        handle_deposit(&mut store, &meta, &event).await.unwrap();

        let token = store.load_token(&address_key(&TOKEN)).unwrap().unwrap();
        assert_eq!(token.deposit_count, 2);
        assert_eq!(token.unique_staker_count, 1);
    }
}
