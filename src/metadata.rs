// src/metadata.rs
use std::future::Future;

use alloy::primitives::{address, Address};
use alloy::sol;
use alloy::sol_types::SolCall;
use tracing::warn;

use crate::models::address_key;
use crate::rpc::RpcClient;

/// Sentinel the pool uses for native ETH deposits.
pub const NATIVE_ASSET_ADDRESS: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");
pub const NATIVE_ASSET_NAME: &str = "Ether";
pub const NATIVE_ASSET_SYMBOL: &str = "ETH";
pub const NATIVE_ASSET_DECIMALS: u8 = 18;

sol! {
    interface IERC20Metadata {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenMetadata {
    pub fn native() -> Self {
        Self {
            name: NATIVE_ASSET_NAME.to_string(),
            symbol: NATIVE_ASSET_SYMBOL.to_string(),
            decimals: NATIVE_ASSET_DECIMALS,
        }
    }
}

/// Source of a token's name, symbol and decimals.
///
/// Infallible by contract: a field that cannot be read comes back as its
/// default (`""` or `0`) without affecting the others.
pub trait MetadataSource {
    fn fetch_token_metadata(&self, token: Address) -> impl Future<Output = TokenMetadata> + Send;
}

/// Read-only contract call returning raw return data.
pub trait EthCall {
    fn eth_call(
        &self,
        to: &str,
        data: &[u8],
    ) -> impl Future<Output = eyre::Result<Vec<u8>>> + Send;
}

impl EthCall for RpcClient {
    async fn eth_call(&self, to: &str, data: &[u8]) -> eyre::Result<Vec<u8>> {
        self.call(to, data).await
    }
}

/// Reads ERC-20 metadata with `eth_call`.
#[derive(Debug, Clone)]
pub struct RpcMetadata<C = RpcClient> {
    client: C,
}

impl<C: EthCall + Sync> RpcMetadata<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    async fn read<F: SolCall>(&self, token: &str, call: F) -> Option<F::Return> {
        let out = match self.client.eth_call(token, &call.abi_encode()).await {
            Ok(out) => out,
            Err(e) => {
                warn!(token, call = F::SIGNATURE, error = %e, "metadata call failed");
                return None;
            }
        };

        match F::abi_decode_returns(&out) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(token, call = F::SIGNATURE, error = %e, "metadata decode failed");
                None
            }
        }
    }
}

impl<C: EthCall + Sync> MetadataSource for RpcMetadata<C> {
    async fn fetch_token_metadata(&self, token: Address) -> TokenMetadata {
        if token == NATIVE_ASSET_ADDRESS {
            return TokenMetadata::native();
        }

        let target = address_key(&token);
        let name = self
            .read(&target, IERC20Metadata::nameCall {})
            .await
            .unwrap_or_default();
        let symbol = self
            .read(&target, IERC20Metadata::symbolCall {})
            .await
            .unwrap_or_default();
        let decimals = self
            .read(&target, IERC20Metadata::decimalsCall {})
            .await
            .unwrap_or_default();

        TokenMetadata {
            name,
            symbol,
            decimals,
        }
    }
}
