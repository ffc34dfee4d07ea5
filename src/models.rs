// src/models.rs
use alloy::primitives::{Address, I256, U256};
use rust_decimal::Decimal;

/// Lifetime counters for a token the pool has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: String,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub enabled: bool,
    pub deposit_count: u64,
    pub withdraw_count: u64,
    pub total_deposit_amount: U256,
    pub total_withdrawal_amount: U256,
    pub current_staked_amount: I256, // signed: an inconsistent stream can drive it below zero
    pub unique_staker_count: u64,
    pub last_activity_at: u64,
}

impl Token {
    /// Raw amount scaled by this token's decimals, for logs.
    /// `None` when the value does not fit a `Decimal`.
    pub fn display_amount(&self, amount: U256) -> Option<Decimal> {
        let raw = i128::try_from(amount).ok()?;
        let mut value = Decimal::try_from_i128_with_scale(raw, 0).ok()?;
        value.set_scale(u32::from(self.decimals)).ok()?;
        Some(value.normalize())
    }
}

/// An address that has deposited or withdrawn at least once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staker {
    pub id: String,
    pub address: String,
    pub token_metrics: Vec<String>, // StakerTokenMetrics ids, first-interaction order
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakerTokenMetrics {
    pub id: String,
    pub staker: String,
    pub token: String,
    pub deposit_count: u64,
    pub deposit_amount: U256,
    pub withdraw_count: u64,
    pub withdraw_amount: U256,
}

/// One UTC day bucket, keyed by day index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySnapshot {
    pub id: String,
    pub date: String,
    pub token_data: Vec<String>, // TokenDailyData ids
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDailyData {
    pub id: String,
    pub snapshot: String,
    pub token: String,
    pub daily_deposit_amount: U256,
    pub daily_deposit_count: u64,
    pub daily_withdraw_amount: U256,
    pub daily_withdraw_count: u64,
}

/// Lower-case `0x` hex form used for every address-keyed entity.
pub fn address_key(address: &Address) -> String {
    format!("{address:#x}")
}

pub fn staker_metrics_id(staker_id: &str, token_symbol: &str) -> String {
    format!("{staker_id}-{token_symbol}")
}

pub fn token_daily_data_id(date: &str, token_symbol: &str) -> String {
    format!("{date}-{token_symbol}")
}
