//! Browser-style wallet signer speaking the EIP-1193 request protocol

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, H256};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::NetworkConfig;
use crate::error::{ClientResult, GameClientError};
use crate::transport::TransactionSigner;

/// Error code a wallet returns from `wallet_switchEthereumChain` for an unknown chain
pub const UNRECOGNIZED_CHAIN: i64 = 4902;

/// Error code for a request the user rejected
pub const USER_REJECTED: i64 = 4001;

/// Error object returned by a wallet provider
#[derive(Debug, Clone, Error)]
#[error("wallet error {code}: {message}")]
pub struct WalletRpcError {
    pub code: i64,
    pub message: String,
}

/// An injected wallet: one `request` entry point taking a method and JSON params
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletRpcError>;
}

/// [`TransactionSigner`] that delegates signing to an external wallet
pub struct WalletSigner<P> {
    provider: P,
    account: Address,
}

impl<P: Eip1193Provider> WalletSigner<P> {
    /// Request account access, then move the wallet onto `network`.
    ///
    /// The chain switch is best effort: when the wallet does not know the
    /// chain it is asked to add it, and any other failure is only logged.
    pub async fn connect(provider: P, network: &NetworkConfig) -> ClientResult<Self> {
        let accounts = provider
            .request("eth_requestAccounts", json!([]))
            .await
            .map_err(|e| GameClientError::InvalidCredential {
                reason: format!("wallet refused account access: {e}"),
            })?;
        let account = accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .ok_or_else(|| GameClientError::InvalidCredential {
                reason: "wallet exposed no accounts".to_string(),
            })?
            .parse::<Address>()
            .map_err(|e| GameClientError::InvalidCredential {
                reason: format!("wallet returned a malformed account: {e}"),
            })?;

        switch_chain(&provider, network).await;
        info!(account = ?account, chain_id = network.chain_id, "wallet connected");

        Ok(WalletSigner { provider, account })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

async fn switch_chain<P: Eip1193Provider>(provider: &P, network: &NetworkConfig) {
    let chain_id = format!("{:#x}", network.chain_id);
    let switched = provider
        .request(
            "wallet_switchEthereumChain",
            json!([{ "chainId": chain_id }]),
        )
        .await;

    match switched {
        Ok(_) => {}
        Err(e) if e.code == UNRECOGNIZED_CHAIN => {
            let params = json!([{
                "chainId": chain_id,
                "chainName": network.chain_name,
                "rpcUrls": [network.rpc_url],
                "nativeCurrency": {
                    "name": network.currency_name,
                    "symbol": network.currency_symbol,
                    "decimals": 18,
                },
                "blockExplorerUrls": [network.explorer_url],
            }]);
            if let Err(e) = provider.request("wallet_addEthereumChain", params).await {
                warn!(error = %e, chain_id = network.chain_id, "wallet could not add chain");
            }
        }
        Err(e) => {
            warn!(error = %e, chain_id = network.chain_id, "wallet did not switch chain");
        }
    }
}

#[async_trait]
impl<P: Eip1193Provider> TransactionSigner for WalletSigner<P> {
    fn address(&self) -> Address {
        self.account
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> ClientResult<H256> {
        let mut request = json!({ "from": self.account });
        if let Some(to) = tx.to_addr() {
            request["to"] = json!(to);
        }
        if let Some(data) = tx.data() {
            request["data"] = json!(data);
        }
        if let Some(value) = tx.value() {
            request["value"] = json!(value);
        }
        if let Some(gas) = tx.gas() {
            request["gas"] = json!(gas);
        }

        let result = self
            .provider
            .request("eth_sendTransaction", json!([request]))
            .await
            .map_err(|e| match e.code {
                USER_REJECTED => GameClientError::InvalidCredential {
                    reason: format!("user rejected the transaction: {}", e.message),
                },
                _ => GameClientError::remote(e.to_string()),
            })?;

        serde_json::from_value::<H256>(result)
            .map_err(|e| GameClientError::remote(format!("wallet returned a malformed hash: {e}")))
    }
}
