//! In-memory node and signer for driving `GameClient` without a network

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::abi::{encode, Token};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Filter, Log, TransactionReceipt, H256, U256, U64};
use monkabreak_client::{
    ClientResult, ContractInterface, GameClient, GameClientError, RpcBackend, TransactionConfig,
    TransactionSigner,
};

pub const CHAIN_ID: u64 = 10143;

pub fn contract() -> Address {
    Address::from_low_u64_be(0xbeef)
}

pub fn player() -> Address {
    Address::from_low_u64_be(0xa11ce)
}

pub fn interface() -> ContractInterface {
    ContractInterface::monkabreak().unwrap()
}

pub fn selector(function: &str) -> [u8; 4] {
    interface().function(function).unwrap().short_signature()
}

pub fn address_topic(address: Address) -> H256 {
    H256::from(address)
}

pub fn uint_topic(value: u64) -> H256 {
    H256::from_low_u64_be(value)
}

/// Contract log for `event` with the given indexed topics and ABI-encoded data
pub fn event_log(event: &str, indexed: Vec<H256>, data: Vec<Token>) -> Log {
    let mut topics = vec![interface().event_signature(event).unwrap()];
    topics.extend(indexed);
    Log {
        address: contract(),
        topics,
        data: Bytes::from(encode(&data)),
        block_number: Some(U64::from(5u64)),
        log_index: Some(U256::zero()),
        ..Default::default()
    }
}

/// Short timeouts so that waits resolve quickly in tests
pub fn fast_settings() -> TransactionConfig {
    TransactionConfig {
        confirmation_timeout: 1,
        receipt_poll_interval: 10,
        gas_padding_percent: 20,
        event_poll_interval: 10,
    }
}

/// Scripted JSON-RPC node
pub struct MockRpc {
    pub chain_id: AtomicU64,
    pub head: AtomicU64,
    /// `eth_call` responses keyed by function selector
    responses: Mutex<HashMap<[u8; 4], Bytes>>,
    /// Selectors of every `eth_call`, in order
    pub calls: Mutex<Vec<[u8; 4]>>,
    estimate: Mutex<ClientResult<U256>>,
    pub estimates: AtomicUsize,
    /// Returned for every hash; `None` keeps transactions pending forever
    receipt: Mutex<Option<TransactionReceipt>>,
    pub receipt_polls: AtomicUsize,
    /// Handed out once, on the next `eth_getLogs`
    logs: Mutex<Vec<Log>>,
    /// Returned by the next `eth_getLogs` instead of the queued logs
    logs_error: Mutex<Option<GameClientError>>,
    pub log_queries: AtomicUsize,
    balances: Mutex<HashMap<Address, U256>>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self {
            chain_id: AtomicU64::new(CHAIN_ID),
            head: AtomicU64::new(10),
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            estimate: Mutex::new(Ok(U256::from(100_000u64))),
            estimates: AtomicUsize::new(0),
            receipt: Mutex::new(Some(Self::receipt_with_status(1, Vec::new()))),
            receipt_polls: AtomicUsize::new(0),
            logs: Mutex::new(Vec::new()),
            logs_error: Mutex::new(None),
            log_queries: AtomicUsize::new(0),
            balances: Mutex::new(HashMap::new()),
        }
    }

    pub fn receipt_with_status(status: u64, logs: Vec<Log>) -> TransactionReceipt {
        TransactionReceipt {
            status: Some(U64::from(status)),
            block_number: Some(U64::from(5u64)),
            gas_used: Some(U256::from(90_000u64)),
            logs,
            ..Default::default()
        }
    }

    pub fn respond(&self, function: &str, tokens: &[Token]) {
        self.responses
            .lock()
            .unwrap()
            .insert(selector(function), Bytes::from(encode(tokens)));
    }

    pub fn set_estimate(&self, estimate: ClientResult<U256>) {
        *self.estimate.lock().unwrap() = estimate;
    }

    pub fn set_receipt(&self, receipt: Option<TransactionReceipt>) {
        *self.receipt.lock().unwrap() = receipt;
    }

    pub fn push_logs(&self, logs: Vec<Log>) {
        self.logs.lock().unwrap().extend(logs);
    }

    pub fn fail_next_logs(&self, error: GameClientError) {
        *self.logs_error.lock().unwrap() = Some(error);
    }

    pub fn set_balance(&self, address: Address, wei: U256) {
        self.balances.lock().unwrap().insert(address, wei);
    }

    pub fn called(&self, function: &str) -> usize {
        let wanted = selector(function);
        self.calls.lock().unwrap().iter().filter(|s| **s == wanted).count()
    }

    /// Number of requests of any kind that reached the node
    pub fn requests(&self) -> usize {
        self.calls.lock().unwrap().len()
            + self.estimates.load(Ordering::SeqCst)
            + self.receipt_polls.load(Ordering::SeqCst)
            + self.log_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcBackend for MockRpc {
    async fn chain_id(&self) -> ClientResult<u64> {
        Ok(self.chain_id.load(Ordering::SeqCst))
    }

    async fn call(&self, tx: &TypedTransaction) -> ClientResult<Bytes> {
        let data = tx.data().cloned().unwrap_or_default();
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&data[..4]);
        self.calls.lock().unwrap().push(selector);
        self.responses
            .lock()
            .unwrap()
            .get(&selector)
            .cloned()
            .ok_or_else(|| GameClientError::RemoteCall {
                message: format!("no response scripted for 0x{}", hex::encode(selector)),
            })
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> ClientResult<U256> {
        self.estimates.fetch_add(1, Ordering::SeqCst);
        self.estimate.lock().unwrap().clone()
    }

    async fn transaction_receipt(&self, tx_hash: H256) -> ClientResult<Option<TransactionReceipt>> {
        self.receipt_polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.receipt.lock().unwrap().clone().map(|mut receipt| {
            receipt.transaction_hash = tx_hash;
            receipt
        }))
    }

    async fn balance(&self, address: Address) -> ClientResult<U256> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn block_number(&self) -> ClientResult<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn logs(&self, _filter: &Filter) -> ClientResult<Vec<Log>> {
        self.log_queries.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.logs_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(std::mem::take(&mut *self.logs.lock().unwrap()))
    }
}

/// Signer that records transactions instead of broadcasting them
pub struct MockSigner {
    address: Address,
    pub sent: Mutex<Vec<TypedTransaction>>,
}

impl MockSigner {
    pub fn new() -> Self {
        Self {
            address: player(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<TypedTransaction> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn send_transaction(&self, tx: TypedTransaction) -> ClientResult<H256> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(tx);
        Ok(H256::from_low_u64_be(sent.len() as u64))
    }
}

pub type TestClient = GameClient<MockRpc, Arc<MockSigner>>;

pub fn client() -> (TestClient, Arc<MockRpc>, Arc<MockSigner>) {
    let rpc = Arc::new(MockRpc::new());
    let signer = Arc::new(MockSigner::new());
    let client = GameClient::new(
        Arc::clone(&rpc),
        Arc::clone(&signer),
        contract(),
        interface(),
        fast_settings(),
        CHAIN_ID,
    );
    (client, rpc, signer)
}
