// src/parser.rs
use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use alloy::sol;
use alloy::sol_types::SolEvent;

use crate::aggregator::{DepositEvent, StakabilityChangedEvent, WithdrawEvent};
use crate::rpc::{parse_hex_u64, Log};

sol! {
    event Deposit(
        uint256 indexed eventId,
        address indexed depositor,
        address indexed token,
        uint256 amount
    );
    event Withdraw(
        uint256 indexed eventId,
        address indexed withdrawer,
        address indexed token,
        uint256 amount
    );
    event TokenStakabilityChanged(address token, bool enabled);
    event BlocklistChanged(address migrator, bool blocked);
    event Migrate(
        uint256 indexed eventId,
        address indexed user,
        address[] tokens,
        address destination,
        address migrator,
        uint256[] amounts
    );
    event Paused(address account);
    event Unpaused(address account);
    event SignerChanged(address newSigner);
    event OwnershipTransferStarted(address indexed previousOwner, address indexed newOwner);
    event OwnershipTransferred(address indexed previousOwner, address indexed newOwner);
    event EIP712DomainChanged();
}

/// topic0 of every pool event the indexer follows.
pub fn pool_topics() -> Vec<String> {
    [
        Deposit::SIGNATURE_HASH,
        Withdraw::SIGNATURE_HASH,
        TokenStakabilityChanged::SIGNATURE_HASH,
        BlocklistChanged::SIGNATURE_HASH,
        Migrate::SIGNATURE_HASH,
        Paused::SIGNATURE_HASH,
        Unpaused::SIGNATURE_HASH,
        SignerChanged::SIGNATURE_HASH,
        OwnershipTransferStarted::SIGNATURE_HASH,
        OwnershipTransferred::SIGNATURE_HASH,
        EIP712DomainChanged::SIGNATURE_HASH,
    ]
    .iter()
    .map(|hash| format!("{hash:#x}"))
    .collect()
}

/// Decoded pool event. Only deposits, withdrawals and stakability changes
/// feed the aggregates; the rest are recorded in the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    Deposit { event_id: U256, inner: DepositEvent },
    Withdraw { event_id: U256, inner: WithdrawEvent },
    StakabilityChanged(StakabilityChangedEvent),
    BlocklistChanged { migrator: Address, blocked: bool },
    Migrate {
        event_id: U256,
        user: Address,
        tokens: Vec<Address>,
        destination: Address,
        migrator: Address,
        amounts: Vec<U256>,
    },
    Paused { account: Address },
    Unpaused { account: Address },
    SignerChanged { new_signer: Address },
    OwnershipTransferStarted { previous_owner: Address, new_owner: Address },
    OwnershipTransferred { previous_owner: Address, new_owner: Address },
    Eip712DomainChanged,
}

impl PoolEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PoolEvent::Deposit { .. } => "Deposit",
            PoolEvent::Withdraw { .. } => "Withdraw",
            PoolEvent::StakabilityChanged(_) => "TokenStakabilityChanged",
            PoolEvent::BlocklistChanged { .. } => "BlocklistChanged",
            PoolEvent::Migrate { .. } => "Migrate",
            PoolEvent::Paused { .. } => "Paused",
            PoolEvent::Unpaused { .. } => "Unpaused",
            PoolEvent::SignerChanged { .. } => "SignerChanged",
            PoolEvent::OwnershipTransferStarted { .. } => "OwnershipTransferStarted",
            PoolEvent::OwnershipTransferred { .. } => "OwnershipTransferred",
            PoolEvent::Eip712DomainChanged => "EIP712DomainChanged",
        }
    }
}

/// A pool log with its position in the chain.
#[derive(Debug, Clone)]
pub struct DecodedLog {
    pub block_number: u64,
    pub log_index: u64,
    pub tx_hash: String,
    pub event: PoolEvent,
}

/// Block number and log index of a raw log, for ordering before decode.
pub fn log_position(log: &Log) -> Option<(u64, u64)> {
    let block = parse_hex_u64(&log.block_number_hex).ok()?;
    let index = parse_hex_u64(&log.log_index_hex).ok()?;
    Some((block, index))
}

fn decode_event(topics: Vec<B256>, data: &[u8], block_timestamp: u64) -> Option<PoolEvent> {
    let topic0 = *topics.first()?;

    let event = if topic0 == Deposit::SIGNATURE_HASH {
        let d = Deposit::decode_raw_log(topics, data).ok()?;
        PoolEvent::Deposit {
            event_id: d.eventId,
            inner: DepositEvent {
                token: d.token,
                depositor: d.depositor,
                amount: d.amount,
                block_timestamp,
            },
        }
    } else if topic0 == Withdraw::SIGNATURE_HASH {
        let w = Withdraw::decode_raw_log(topics, data).ok()?;
        PoolEvent::Withdraw {
            event_id: w.eventId,
            inner: WithdrawEvent {
                token: w.token,
                withdrawer: w.withdrawer,
                amount: w.amount,
                block_timestamp,
            },
        }
    } else if topic0 == TokenStakabilityChanged::SIGNATURE_HASH {
        let s = TokenStakabilityChanged::decode_raw_log(topics, data).ok()?;
        PoolEvent::StakabilityChanged(StakabilityChangedEvent {
            token: s.token,
            enabled: s.enabled,
            block_timestamp,
        })
    } else if topic0 == BlocklistChanged::SIGNATURE_HASH {
        let b = BlocklistChanged::decode_raw_log(topics, data).ok()?;
        PoolEvent::BlocklistChanged {
            migrator: b.migrator,
            blocked: b.blocked,
        }
    } else if topic0 == Migrate::SIGNATURE_HASH {
        let m = Migrate::decode_raw_log(topics, data).ok()?;
        PoolEvent::Migrate {
            event_id: m.eventId,
            user: m.user,
            tokens: m.tokens,
            destination: m.destination,
            migrator: m.migrator,
            amounts: m.amounts,
        }
    } else if topic0 == Paused::SIGNATURE_HASH {
        let p = Paused::decode_raw_log(topics, data).ok()?;
        PoolEvent::Paused { account: p.account }
    } else if topic0 == Unpaused::SIGNATURE_HASH {
        let u = Unpaused::decode_raw_log(topics, data).ok()?;
        PoolEvent::Unpaused { account: u.account }
    } else if topic0 == SignerChanged::SIGNATURE_HASH {
        let s = SignerChanged::decode_raw_log(topics, data).ok()?;
        PoolEvent::SignerChanged {
            new_signer: s.newSigner,
        }
    } else if topic0 == OwnershipTransferStarted::SIGNATURE_HASH {
        let o = OwnershipTransferStarted::decode_raw_log(topics, data).ok()?;
        PoolEvent::OwnershipTransferStarted {
            previous_owner: o.previousOwner,
            new_owner: o.newOwner,
        }
    } else if topic0 == OwnershipTransferred::SIGNATURE_HASH {
        let o = OwnershipTransferred::decode_raw_log(topics, data).ok()?;
        PoolEvent::OwnershipTransferred {
            previous_owner: o.previousOwner,
            new_owner: o.newOwner,
        }
    } else if topic0 == EIP712DomainChanged::SIGNATURE_HASH {
        EIP712DomainChanged::decode_raw_log(topics, data).ok()?;
        PoolEvent::Eip712DomainChanged
    } else {
        return None;
    };

    Some(event)
}

/// Decode a pool log. Logs with unknown topics or malformed payloads yield `None`.
pub fn decode_pool_log(log: &Log, block_timestamp: u64) -> Option<DecodedLog> {
    let (block_number, log_index) = log_position(log)?;

    let topics = log
        .topics
        .iter()
        .map(|t| B256::from_str(t).ok())
        .collect::<Option<Vec<_>>>()?;
    let data = hex::decode(log.data.trim_start_matches("0x")).ok()?;
    let event = decode_event(topics, &data, block_timestamp)?;

    Some(DecodedLog {
        block_number,
        log_index,
        tx_hash: log.tx_hash.clone(),
        event,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    fn word(bytes: &[u8]) -> String {
        let mut padded = vec![0u8; 32 - bytes.len()];
        padded.extend_from_slice(bytes);
        hex::encode(padded)
    }

    fn raw_log(topics: Vec<String>, data: String) -> Log {
        Log {
            topics,
            data,
            block_number_hex: "0x12d687".into(),
            tx_hash: "0xdeadbeef".into(),
            log_index_hex: "0x5".into(),
        }
    }

    #[test]
    fn decodes_deposit() {
        let depositor = address!("00000000000000000000000000000000000000b0");
        let token = address!("00000000000000000000000000000000000000a0");
        let log = raw_log(
            vec![
                format!("{:#x}", Deposit::SIGNATURE_HASH),
                format!("0x{}", word(&[7])),
                format!("0x{}", word(depositor.as_slice())),
                format!("0x{}", word(token.as_slice())),
            ],
            format!("0x{}", word(&U256::from(1_000u64).to_be_bytes::<32>())),
        );

        let decoded = decode_pool_log(&log, 1_700_000_000).unwrap();
        assert_eq!(decoded.block_number, 1_234_567);
        assert_eq!(decoded.log_index, 5);
        assert_eq!(decoded.tx_hash, "0xdeadbeef");
        assert_eq!(
            decoded.event,
            PoolEvent::Deposit {
                event_id: U256::from(7),
                inner: DepositEvent {
                    token,
                    depositor,
                    amount: U256::from(1_000u64),
                    block_timestamp: 1_700_000_000,
                },
            }
        );
    }

    #[test]
    fn decodes_stakability_change() {
        let token = address!("00000000000000000000000000000000000000a0");
        let data = format!("0x{}{}", word(token.as_slice()), word(&[1]));
        let topic0 = format!("{:#x}", TokenStakabilityChanged::SIGNATURE_HASH);
        let log = raw_log(vec![topic0], data);

        let decoded = decode_pool_log(&log, 42).unwrap();
        assert_eq!(
            decoded.event,
            PoolEvent::StakabilityChanged(StakabilityChangedEvent {
                token,
                enabled: true,
                block_timestamp: 42,
            })
        );
        assert_eq!(decoded.event.kind(), "TokenStakabilityChanged");
    }

    #[test]
    fn ignores_foreign_topics() {
        let transfer = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
        let log = raw_log(vec![transfer.to_string()], "0x".into());
        assert!(decode_pool_log(&log, 0).is_none());
    }

    #[test]
    fn rejects_truncated_payload() {
        let log = raw_log(vec![format!("{:#x}", Deposit::SIGNATURE_HASH)], "0x".into());
        assert!(decode_pool_log(&log, 0).is_none());
    }

    #[test]
    fn topic_list_covers_followed_events() {
        let topics = pool_topics();
        assert_eq!(topics.len(), 11);
        assert!(topics.iter().all(|t| t.starts_with("0x") && t.len() == 66));
        let migrate = format!("{:#x}", Migrate::SIGNATURE_HASH);
        assert!(topics.contains(&migrate));
    }

    fn from_log_data(data: alloy::primitives::LogData) -> Log {
        raw_log(
            data.topics().iter().map(|t| format!("{t:#x}")).collect(),
            format!("0x{}", hex::encode(&data.data)),
        )
    }

    #[test]
    fn decodes_migrate_with_dynamic_arrays() {
        let user = address!("00000000000000000000000000000000000000b0");
        let token = address!("00000000000000000000000000000000000000a0");
        let destination = address!("00000000000000000000000000000000000000d0");
        let migrator = address!("00000000000000000000000000000000000000e0");
        let event = Migrate {
            eventId: U256::from(9),
            user,
            tokens: vec![token, Address::ZERO],
            destination,
            migrator,
            amounts: vec![U256::from(5u64), U256::from(6u64)],
        };
        let log = from_log_data(event.encode_log_data());

        let decoded = decode_pool_log(&log, 0).unwrap();
        assert_eq!(decoded.event.kind(), "Migrate");
        assert_eq!(
            decoded.event,
            PoolEvent::Migrate {
                event_id: U256::from(9),
                user,
                tokens: vec![token, Address::ZERO],
                destination,
                migrator,
                amounts: vec![U256::from(5u64), U256::from(6u64)],
            }
        );
    }

    #[test]
    fn decodes_admin_events() {
        let old = address!("0000000000000000000000000000000000000001");
        let new = address!("0000000000000000000000000000000000000002");

        let transfer = OwnershipTransferred {
            previousOwner: old,
            newOwner: new,
        };
        let decoded = decode_pool_log(&from_log_data(transfer.encode_log_data()), 0).unwrap();
        assert_eq!(
            decoded.event,
            PoolEvent::OwnershipTransferred {
                previous_owner: old,
                new_owner: new,
            }
        );

        let paused = Paused { account: old };
        let decoded = decode_pool_log(&from_log_data(paused.encode_log_data()), 0).unwrap();
        assert_eq!(decoded.event, PoolEvent::Paused { account: old });

        let domain = EIP712DomainChanged {};
        let decoded = decode_pool_log(&from_log_data(domain.encode_log_data()), 0).unwrap();
        assert_eq!(decoded.event, PoolEvent::Eip712DomainChanged);
    }
}
