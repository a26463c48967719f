//! The MonkaBreak game client

use std::sync::{Arc, RwLock};
use std::time::Instant;

use ethers::abi::Token;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256, U64};
use tracing::{debug, info, instrument, warn};

use crate::abi::{events, functions, ContractInterface};
use crate::config::{ClientConfig, TransactionConfig};
use crate::error::{ClientResult, GameClientError};
use crate::events::{EventListener, EventSubscription, GameEventHandler};
use crate::signer::{LocalSigner, ReadOnlySigner};
use crate::transport::{HttpRpc, RpcBackend, TransactionSigner};
use crate::types::{
    counter, ConfirmedReceipt, CreatedGame, GameId, GameSnapshot, GameStateView, PathChoice,
    PlayerView, Team,
};
use crate::units::Amount;
use crate::wallet::{Eip1193Provider, WalletSigner};

/// Client for one deployed MonkaBreak contract.
///
/// Reads go through the RPC backend, writes through the signer. Mutating
/// methods return only once the transaction is included. A wait that times
/// out does not retract the transaction, which may still be included later;
/// calling the same method again submits a second transaction, and nothing
/// here deduplicates the two.
pub struct GameClient<R, S> {
    rpc: Arc<R>,
    signer: S,
    contract: Address,
    interface: ContractInterface,
    settings: TransactionConfig,
    chain_id: u64,
    min_entry_fee: RwLock<Option<Amount>>,
}

impl GameClient<HttpRpc, LocalSigner> {
    /// Headless client signing with a raw private key.
    ///
    /// The node is not contacted here; an unreachable endpoint surfaces on
    /// the first call.
    pub fn connect_with_key(config: &ClientConfig, private_key: &str) -> ClientResult<Self> {
        config.validate()?;
        let rpc = HttpRpc::new(&config.network.rpc_url)?;
        let signer = LocalSigner::new(&rpc, private_key, config.network.chain_id)?;
        Self::from_config(config, Arc::new(rpc), signer)
    }
}

impl GameClient<HttpRpc, ReadOnlySigner> {
    /// Client for queries and event subscriptions only
    pub fn read_only(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let rpc = HttpRpc::new(&config.network.rpc_url)?;
        Self::from_config(config, Arc::new(rpc), ReadOnlySigner::default())
    }
}

impl<P: Eip1193Provider> GameClient<HttpRpc, WalletSigner<P>> {
    /// Client signing through an injected wallet; reads still use the configured node
    pub async fn connect_with_wallet(config: &ClientConfig, wallet: P) -> ClientResult<Self> {
        config.validate()?;
        let rpc = HttpRpc::new(&config.network.rpc_url)?;
        let signer = WalletSigner::connect(wallet, &config.network).await?;
        Self::from_config(config, Arc::new(rpc), signer)
    }
}

impl<R, S> GameClient<R, S>
where
    R: RpcBackend + 'static,
    S: TransactionSigner,
{
    pub fn new(
        rpc: Arc<R>,
        signer: S,
        contract: Address,
        interface: ContractInterface,
        settings: TransactionConfig,
        chain_id: u64,
    ) -> Self {
        GameClient {
            rpc,
            signer,
            contract,
            interface,
            settings,
            chain_id,
            min_entry_fee: RwLock::new(None),
        }
    }

    pub fn from_config(config: &ClientConfig, rpc: Arc<R>, signer: S) -> ClientResult<Self> {
        let client = Self::new(
            rpc,
            signer,
            config.contract.address,
            config.contract_interface()?,
            config.transactions.clone(),
            config.network.chain_id,
        );
        if let Some(fee) = config.min_entry_fee()? {
            client.set_cached_min_entry_fee(fee);
        }
        Ok(client)
    }

    pub fn contract_address(&self) -> Address {
        self.contract
    }

    pub fn account(&self) -> Address {
        self.signer.address()
    }

    pub fn interface(&self) -> &ContractInterface {
        &self.interface
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Fail with [`GameClientError::ChainMismatch`] unless the node serves the configured chain
    pub async fn verify_chain(&self) -> ClientResult<()> {
        let actual = self.rpc.chain_id().await?;
        if actual != self.chain_id {
            return Err(GameClientError::ChainMismatch {
                expected: self.chain_id,
                actual,
            });
        }
        Ok(())
    }

    // ---- minimum entry fee cache ----

    pub fn cached_min_entry_fee(&self) -> Option<Amount> {
        *self
            .min_entry_fee
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_cached_min_entry_fee(&self, fee: Amount) {
        *self
            .min_entry_fee
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(fee);
    }

    /// Cached minimum, fetched from the contract the first time it is needed
    async fn min_entry_fee(&self) -> ClientResult<Amount> {
        match self.cached_min_entry_fee() {
            Some(fee) => Ok(fee),
            None => self.get_min_entry_fee().await,
        }
    }

    async fn check_fee(&self, offered: Amount) -> ClientResult<()> {
        let minimum = self.min_entry_fee().await?;
        if offered < minimum {
            return Err(GameClientError::BelowMinimumFee { offered, minimum });
        }
        Ok(())
    }

    // ---- mutating operations ----

    /// Create a game and recover the id the contract assigned from its `GameCreated` log
    #[instrument(skip_all, fields(entry_fee = %entry_fee))]
    pub async fn create_game(&self, entry_fee: Amount) -> ClientResult<CreatedGame> {
        self.check_fee(entry_fee).await?;
        let receipt = self
            .submit(
                functions::CREATE_GAME,
                &[Token::Uint(entry_fee.wei())],
                None,
            )
            .await?;
        let game_id = self.created_game_id(&receipt)?;
        info!(%game_id, tx_hash = ?receipt.tx_hash, "game created");
        Ok(CreatedGame { game_id, receipt })
    }

    /// Join as `team`, paying `fee`, or the game's own entry fee when `fee` is `None`
    #[instrument(skip_all, fields(game_id = %game_id, team = %team))]
    pub async fn join_game(
        &self,
        game_id: GameId,
        nickname: &str,
        team: Team,
        fee: Option<Amount>,
    ) -> ClientResult<ConfirmedReceipt> {
        let value = match fee {
            Some(fee) => {
                self.check_fee(fee).await?;
                fee
            }
            None => self.get_game_state(game_id).await?.entry_fee,
        };
        self.submit(
            functions::JOIN_GAME,
            &[
                Token::Uint(game_id.as_u256()),
                Token::String(nickname.to_string()),
                Token::Bool(team.is_thief()),
            ],
            Some(value),
        )
        .await
    }

    /// Start a game, attaching `stake` as value when given
    #[instrument(skip_all, fields(game_id = %game_id))]
    pub async fn start_game(
        &self,
        game_id: GameId,
        stake: Option<Amount>,
    ) -> ClientResult<ConfirmedReceipt> {
        if let Some(stake) = stake {
            self.check_fee(stake).await?;
        }
        self.submit(
            functions::START_GAME,
            &[Token::Uint(game_id.as_u256())],
            stake,
        )
        .await
    }

    /// Commit this stage's path; `path` must be 0 (A), 1 (B) or 2 (C)
    #[instrument(skip_all, fields(game_id = %game_id))]
    pub async fn commit_move(&self, game_id: GameId, path: u8) -> ClientResult<ConfirmedReceipt> {
        let path = PathChoice::try_from(path)?;
        self.submit(
            functions::COMMIT_MOVE,
            &[Token::Uint(game_id.as_u256()), Token::Uint(U256::from(path.index()))],
            None,
        )
        .await
    }

    /// Vote to block a path; `path` must be 0 (A), 1 (B) or 2 (C)
    #[instrument(skip_all, fields(game_id = %game_id))]
    pub async fn vote_block(&self, game_id: GameId, path: u8) -> ClientResult<ConfirmedReceipt> {
        let path = PathChoice::try_from(path)?;
        self.submit(
            functions::VOTE_BLOCK,
            &[Token::Uint(game_id.as_u256()), Token::Uint(U256::from(path.index()))],
            None,
        )
        .await
    }

    #[instrument(skip_all, fields(game_id = %game_id))]
    pub async fn process_stage(&self, game_id: GameId) -> ClientResult<ConfirmedReceipt> {
        self.submit(functions::PROCESS_STAGE, &[Token::Uint(game_id.as_u256())], None)
            .await
    }

    #[instrument(skip_all, fields(game_id = %game_id))]
    pub async fn finalize_game(&self, game_id: GameId) -> ClientResult<ConfirmedReceipt> {
        self.submit(functions::FINALIZE_GAME, &[Token::Uint(game_id.as_u256())], None)
            .await
    }

    // ---- read-only operations ----

    pub async fn get_game_state(&self, game_id: GameId) -> ClientResult<GameStateView> {
        let mut out = self
            .query(functions::GET_GAME_STATE, &[Token::Uint(game_id.as_u256())])
            .await?
            .into_iter();
        let mut next = |field: &str| {
            out.next().ok_or_else(|| {
                GameClientError::remote(format!("getGameState returned no `{field}`"))
            })
        };

        Ok(GameStateView {
            creator: expect_address(next("creator")?, "creator")?,
            entry_fee: Amount::from_wei(expect_uint(next("entryFee")?, "entryFee")?),
            started: expect_bool(next("started")?, "started")?,
            finalized: expect_bool(next("finalized")?, "finalized")?,
            current_stage: counter(expect_uint(next("currentStage")?, "currentStage")?),
            thieves_count: counter(expect_uint(next("thievesCount")?, "thievesCount")?),
            police_count: counter(expect_uint(next("policeCount")?, "policeCount")?),
            alive_thieves: counter(expect_uint(next("aliveThieves")?, "aliveThieves")?),
            total_players: counter(expect_uint(next("totalPlayers")?, "totalPlayers")?),
        })
    }

    pub async fn get_players(&self, game_id: GameId) -> ClientResult<Vec<PlayerView>> {
        let roster = single(
            self.query(functions::GET_PLAYERS, &[Token::Uint(game_id.as_u256())])
                .await?,
            "players",
        )?;
        let entries = roster
            .into_array()
            .ok_or_else(|| GameClientError::remote("getPlayers did not return an array"))?;
        entries.into_iter().map(decode_player).collect()
    }

    pub async fn get_vault_balance(&self, game_id: GameId) -> ClientResult<Amount> {
        let balance = single(
            self.query(functions::GET_VAULT_BALANCE, &[Token::Uint(game_id.as_u256())])
                .await?,
            "balance",
        )?;
        Ok(Amount::from_wei(expect_uint(balance, "balance")?))
    }

    pub async fn is_winner(&self, game_id: GameId, player: Address) -> ClientResult<bool> {
        let won = single(
            self.query(
                functions::IS_WINNER,
                &[Token::Uint(game_id.as_u256()), Token::Address(player)],
            )
            .await?,
            "isWinner",
        )?;
        expect_bool(won, "isWinner")
    }

    pub async fn get_current_game_id(&self) -> ClientResult<GameId> {
        let id = single(self.query(functions::GET_CURRENT_GAME_ID, &[]).await?, "gameId")?;
        Ok(GameId::from(expect_uint(id, "gameId")?))
    }

    /// Minimum entry fee according to the contract; refreshes the cached value
    pub async fn get_min_entry_fee(&self) -> ClientResult<Amount> {
        let fee = single(self.query(functions::GET_MIN_ENTRY_FEE, &[]).await?, "minEntryFee")?;
        let fee = Amount::from_wei(expect_uint(fee, "minEntryFee")?);
        self.set_cached_min_entry_fee(fee);
        Ok(fee)
    }

    /// Native balance of `address`
    pub async fn get_balance(&self, address: Address) -> ClientResult<Amount> {
        Ok(Amount::from_wei(self.rpc.balance(address).await?))
    }

    /// State, vault and roster of one game; three separate queries
    pub async fn get_game_snapshot(&self, game_id: GameId) -> ClientResult<GameSnapshot> {
        let (state, vault_balance, players) = tokio::try_join!(
            self.get_game_state(game_id),
            self.get_vault_balance(game_id),
            self.get_players(game_id),
        )?;
        Ok(GameSnapshot {
            game_id,
            state,
            vault_balance,
            players,
        })
    }

    // ---- events ----

    /// Stream of decoded contract events starting at `from_block`, or at the current head
    pub fn subscribe(&self, from_block: Option<u64>) -> EventSubscription {
        EventSubscription::spawn(
            Arc::clone(&self.rpc),
            self.interface.clone(),
            self.contract,
            from_block,
            self.settings.event_poll_interval(),
        )
    }

    /// Deliver every event kind to `handler` until the listener is unsubscribed
    pub fn setup_event_listeners<H: GameEventHandler>(&self, handler: H) -> EventListener {
        EventListener::spawn(self.subscribe(None), handler)
    }

    // ---- plumbing ----

    async fn query(&self, function: &str, args: &[Token]) -> ClientResult<Vec<Token>> {
        let data = self.interface.encode_call(function, args)?;
        let tx: TypedTransaction = TransactionRequest::new().to(self.contract).data(data).into();
        let output = self.rpc.call(&tx).await?;
        debug!(function, bytes = output.len(), "eth_call returned");
        self.interface.decode_output(function, &output)
    }

    /// Submit one transaction and wait for its inclusion
    async fn submit(
        &self,
        function: &'static str,
        args: &[Token],
        value: Option<Amount>,
    ) -> ClientResult<ConfirmedReceipt> {
        let data: Bytes = self.interface.encode_call(function, args)?;
        let mut request = TransactionRequest::new()
            .from(self.signer.address())
            .to(self.contract)
            .data(data);
        if let Some(value) = value {
            request = request.value(value.wei());
        }
        let mut tx: TypedTransaction = request.into();

        let estimate = self.rpc.estimate_gas(&tx).await.map_err(|e| match e {
            GameClientError::RemoteCall { message } if message.contains("revert") => {
                GameClientError::TransactionReverted {
                    tx_hash: None,
                    block_number: None,
                    reason: message,
                }
            }
            other => other,
        })?;
        tx.set_gas(pad_gas(estimate, self.settings.gas_padding_percent));

        let tx_hash = self.signer.send_transaction(tx).await?;
        info!(function, tx_hash = ?tx_hash, gas_estimate = %estimate, "transaction submitted");

        let receipt = self.wait_for_inclusion(tx_hash).await?;
        if receipt.status == Some(U64::zero()) {
            let block_number = receipt.block_number.map(|n| n.as_u64());
            warn!(function, tx_hash = ?tx_hash, ?block_number, "transaction reverted");
            return Err(GameClientError::TransactionReverted {
                tx_hash: Some(tx_hash),
                block_number,
                reason: format!("{function} reverted on chain"),
            });
        }

        let receipt = ConfirmedReceipt::from(receipt);
        info!(
            function,
            tx_hash = ?tx_hash,
            block_number = ?receipt.block_number,
            "transaction included"
        );
        Ok(receipt)
    }

    /// Poll for the receipt of `tx_hash` until the confirmation timeout
    pub async fn wait_for_inclusion(&self, tx_hash: H256) -> ClientResult<TransactionReceipt> {
        let timeout = self.settings.confirmation_timeout();
        let interval = self.settings.receipt_poll_interval();
        let started = Instant::now();

        let polled = tokio::time::timeout(timeout, async {
            loop {
                if let Some(receipt) = self.rpc.transaction_receipt(tx_hash).await? {
                    return Ok::<_, GameClientError>(receipt);
                }
                tokio::time::sleep(interval).await;
            }
        })
        .await;

        match polled {
            Ok(result) => result,
            Err(_) => {
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(tx_hash = ?tx_hash, waited_ms, "no receipt before timeout");
                Err(GameClientError::TransactionDropped { tx_hash, waited_ms })
            }
        }
    }

    fn created_game_id(&self, receipt: &ConfirmedReceipt) -> ClientResult<GameId> {
        let signature = self.interface.event_signature(events::GAME_CREATED)?;
        let log = receipt
            .logs
            .iter()
            .find(|log| log.address == self.contract && log.topics.first() == Some(&signature))
            .ok_or_else(|| GameClientError::EventNotFound {
                event: events::GAME_CREATED.to_string(),
                tx_hash: receipt.tx_hash,
            })?;
        let id_topic = log.topics.get(1).ok_or_else(|| GameClientError::EventDecode {
            event: events::GAME_CREATED.to_string(),
            message: "missing indexed gameId".to_string(),
        })?;
        Ok(GameId::from(U256::from_big_endian(id_topic.as_bytes())))
    }
}

/// Estimate plus `percent` percent, rounded down
pub fn pad_gas(estimate: U256, percent: u64) -> U256 {
    let factor = U256::from(100u64).saturating_add(U256::from(percent));
    estimate.saturating_mul(factor) / U256::from(100u64)
}

fn single(tokens: Vec<Token>, what: &str) -> ClientResult<Token> {
    tokens
        .into_iter()
        .next()
        .ok_or_else(|| GameClientError::remote(format!("empty response, expected {what}")))
}

fn expect_uint(token: Token, field: &str) -> ClientResult<U256> {
    token
        .into_uint()
        .ok_or_else(|| GameClientError::remote(format!("`{field}` is not an integer")))
}

fn expect_bool(token: Token, field: &str) -> ClientResult<bool> {
    token
        .into_bool()
        .ok_or_else(|| GameClientError::remote(format!("`{field}` is not a bool")))
}

fn expect_address(token: Token, field: &str) -> ClientResult<Address> {
    token
        .into_address()
        .ok_or_else(|| GameClientError::remote(format!("`{field}` is not an address")))
}

fn decode_player(token: Token) -> ClientResult<PlayerView> {
    let mut fields = token
        .into_tuple()
        .ok_or_else(|| GameClientError::remote("player entry is not a tuple"))?
        .into_iter();
    let mut next = |field: &str| {
        fields
            .next()
            .ok_or_else(|| GameClientError::remote(format!("player entry has no `{field}`")))
    };

    let address = expect_address(next("addr")?, "addr")?;
    let nickname = next("nickname")?
        .into_string()
        .ok_or_else(|| GameClientError::remote("`nickname` is not a string"))?;
    let team = Team::from_is_thief(expect_bool(next("isThief")?, "isThief")?);
    let eliminated = expect_bool(next("eliminated")?, "eliminated")?;
    let moves = next("moves")?
        .into_array()
        .ok_or_else(|| GameClientError::remote("`moves` is not an array"))?
        .into_iter()
        .map(|m| expect_uint(m, "moves").map(|v| counter(v).min(u8::MAX as u64) as u8))
        .collect::<ClientResult<Vec<u8>>>()?;

    Ok(PlayerView {
        address,
        nickname,
        team,
        eliminated,
        moves,
    })
}
