//! Local private-key signer for headless use

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, MiddlewareError, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, H256};
use tracing::debug;

use crate::error::{classify_provider_error, ClientResult, GameClientError};
use crate::transport::{HttpRpc, TransactionSigner};

/// Parse a hex private key, with or without `0x`, into a wallet bound to `chain_id`
pub fn wallet_from_key(private_key: &str, chain_id: u64) -> ClientResult<LocalWallet> {
    let trimmed = private_key.trim();
    let hex_key = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(hex_key).map_err(|e| GameClientError::InvalidCredential {
        reason: format!("private key is not hex: {e}"),
    })?;
    if bytes.len() != 32 {
        return Err(GameClientError::InvalidCredential {
            reason: format!("private key must be 32 bytes, got {}", bytes.len()),
        });
    }
    let wallet = LocalWallet::from_bytes(&bytes).map_err(|e| GameClientError::InvalidCredential {
        reason: format!("private key is not a valid secp256k1 scalar: {e}"),
    })?;
    Ok(wallet.with_chain_id(chain_id))
}

/// Signs with a key held in memory and broadcasts through the HTTP provider.
///
/// Nonce, fee and chain id are filled by `ethers`' `SignerMiddleware`.
#[derive(Debug)]
pub struct LocalSigner {
    inner: SignerMiddleware<Provider<Http>, LocalWallet>,
}

impl LocalSigner {
    pub fn new(rpc: &HttpRpc, private_key: &str, chain_id: u64) -> ClientResult<Self> {
        let wallet = wallet_from_key(private_key, chain_id)?;
        debug!(address = ?wallet.address(), chain_id, "loaded local signer");
        Ok(LocalSigner {
            inner: SignerMiddleware::new(rpc.provider().clone(), wallet),
        })
    }
}

#[async_trait]
impl TransactionSigner for LocalSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> ClientResult<H256> {
        let pending = self.inner.send_transaction(tx, None).await.map_err(|e| {
            match e.as_inner() {
                Some(provider_err) => classify_provider_error(provider_err),
                None => GameClientError::remote(format!("signing failed: {e}")),
            }
        })?;
        Ok(pending.tx_hash())
    }
}

/// Signer for clients that only read; every submission fails
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlySigner {
    address: Address,
}

impl ReadOnlySigner {
    pub fn new(address: Address) -> Self {
        ReadOnlySigner { address }
    }
}

#[async_trait]
impl TransactionSigner for ReadOnlySigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn send_transaction(&self, _tx: TypedTransaction) -> ClientResult<H256> {
        Err(GameClientError::InvalidCredential {
            reason: "no signing key configured".to_string(),
        })
    }
}
