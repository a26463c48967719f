//! JSON-RPC node access and transaction signing seams

use std::sync::Arc;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Filter, Log, TransactionReceipt, H256, U256};
use tracing::debug;

use crate::error::{ClientResult, GameClientError};

/// Read access to a JSON-RPC node
#[async_trait]
pub trait RpcBackend: Send + Sync {
    /// `eth_chainId`
    async fn chain_id(&self) -> ClientResult<u64>;

    /// `eth_call` against the latest block
    async fn call(&self, tx: &TypedTransaction) -> ClientResult<Bytes>;

    /// `eth_estimateGas`
    async fn estimate_gas(&self, tx: &TypedTransaction) -> ClientResult<U256>;

    /// `eth_getTransactionReceipt`; `None` while the transaction is pending
    async fn transaction_receipt(&self, tx_hash: H256) -> ClientResult<Option<TransactionReceipt>>;

    /// `eth_getBalance` at the latest block
    async fn balance(&self, address: Address) -> ClientResult<U256>;

    /// `eth_blockNumber`
    async fn block_number(&self) -> ClientResult<u64>;

    /// `eth_getLogs`
    async fn logs(&self, filter: &Filter) -> ClientResult<Vec<Log>>;
}

/// Something that can put a transaction on the network on behalf of an account
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Sign and broadcast `tx`, returning its hash as soon as the node accepts it
    async fn send_transaction(&self, tx: TypedTransaction) -> ClientResult<H256>;
}

#[async_trait]
impl<T: RpcBackend + ?Sized> RpcBackend for Arc<T> {
    async fn chain_id(&self) -> ClientResult<u64> {
        (**self).chain_id().await
    }

    async fn call(&self, tx: &TypedTransaction) -> ClientResult<Bytes> {
        (**self).call(tx).await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> ClientResult<U256> {
        (**self).estimate_gas(tx).await
    }

    async fn transaction_receipt(&self, tx_hash: H256) -> ClientResult<Option<TransactionReceipt>> {
        (**self).transaction_receipt(tx_hash).await
    }

    async fn balance(&self, address: Address) -> ClientResult<U256> {
        (**self).balance(address).await
    }

    async fn block_number(&self) -> ClientResult<u64> {
        (**self).block_number().await
    }

    async fn logs(&self, filter: &Filter) -> ClientResult<Vec<Log>> {
        (**self).logs(filter).await
    }
}

#[async_trait]
impl<T: TransactionSigner + ?Sized> TransactionSigner for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> ClientResult<H256> {
        (**self).send_transaction(tx).await
    }
}

#[async_trait]
impl<T: TransactionSigner + ?Sized> TransactionSigner for Box<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> ClientResult<H256> {
        (**self).send_transaction(tx).await
    }
}

/// [`RpcBackend`] over an `ethers` HTTP provider.
///
/// Construction only parses the URL; the node is first contacted by the
/// first request.
#[derive(Debug, Clone)]
pub struct HttpRpc {
    provider: Provider<Http>,
}

impl HttpRpc {
    pub fn new(url: &str) -> ClientResult<Self> {
        let provider =
            Provider::<Http>::try_from(url).map_err(|e| GameClientError::Configuration {
                message: format!("invalid RPC URL {url:?}: {e}"),
                field: "network.rpc_url".to_string(),
            })?;
        debug!(rpc_url = url, "created HTTP provider");
        Ok(HttpRpc { provider })
    }

    pub fn provider(&self) -> &Provider<Http> {
        &self.provider
    }
}

#[async_trait]
impl RpcBackend for HttpRpc {
    async fn chain_id(&self) -> ClientResult<u64> {
        Ok(self.provider.get_chainid().await?.as_u64())
    }

    async fn call(&self, tx: &TypedTransaction) -> ClientResult<Bytes> {
        Ok(self.provider.call(tx, None).await?)
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> ClientResult<U256> {
        Ok(self.provider.estimate_gas(tx, None).await?)
    }

    async fn transaction_receipt(&self, tx_hash: H256) -> ClientResult<Option<TransactionReceipt>> {
        Ok(self.provider.get_transaction_receipt(tx_hash).await?)
    }

    async fn balance(&self, address: Address) -> ClientResult<U256> {
        Ok(self.provider.get_balance(address, None).await?)
    }

    async fn block_number(&self) -> ClientResult<u64> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }

    async fn logs(&self, filter: &Filter) -> ClientResult<Vec<Log>> {
        Ok(self.provider.get_logs(filter).await?)
    }
}
