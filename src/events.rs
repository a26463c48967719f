//! Decoding of contract logs and push-style event delivery

use std::sync::Arc;
use std::time::Duration;

use ethers::abi::{LogParam, RawLog, Token};
use ethers::types::{Address, Filter, Log, ValueOrArray, H256, U256};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::abi::{events, ContractInterface};
use crate::error::{ClientResult, GameClientError};
use crate::transport::RpcBackend;
use crate::types::{counter, BlockedPath, GameId, Team};
use crate::units::Amount;

/// A decoded MonkaBreak event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum GameEvent {
    GameCreated {
        game_id: GameId,
        creator: Address,
        entry_fee: Amount,
    },
    PlayerJoined {
        game_id: GameId,
        player: Address,
        nickname: String,
        team: Team,
    },
    GameStarted {
        game_id: GameId,
        start_block: u64,
    },
    MoveCommitted {
        game_id: GameId,
        player: Address,
        stage: u64,
    },
    VoteCast {
        game_id: GameId,
        voter: Address,
        stage: u64,
        blocked_path: BlockedPath,
    },
    StageCompleted {
        game_id: GameId,
        stage: u64,
        blocked_path: BlockedPath,
        eliminated_players: Vec<Address>,
    },
    GameFinalized {
        game_id: GameId,
        winners: Vec<Address>,
        prize_per_winner: Amount,
    },
}

impl GameEvent {
    pub fn game_id(&self) -> GameId {
        match self {
            GameEvent::GameCreated { game_id, .. }
            | GameEvent::PlayerJoined { game_id, .. }
            | GameEvent::GameStarted { game_id, .. }
            | GameEvent::MoveCommitted { game_id, .. }
            | GameEvent::VoteCast { game_id, .. }
            | GameEvent::StageCompleted { game_id, .. }
            | GameEvent::GameFinalized { game_id, .. } => *game_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::GameCreated { .. } => events::GAME_CREATED,
            GameEvent::PlayerJoined { .. } => events::PLAYER_JOINED,
            GameEvent::GameStarted { .. } => events::GAME_STARTED,
            GameEvent::MoveCommitted { .. } => events::MOVE_COMMITTED,
            GameEvent::VoteCast { .. } => events::VOTE_CAST,
            GameEvent::StageCompleted { .. } => events::STAGE_COMPLETED,
            GameEvent::GameFinalized { .. } => events::GAME_FINALIZED,
        }
    }
}

/// A decoded event with its position in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggedEvent {
    pub event: GameEvent,
    pub block_number: Option<u64>,
    pub log_index: Option<u64>,
    pub transaction_hash: Option<H256>,
}

/// Named parameters of one parsed log
struct Params {
    event: &'static str,
    params: Vec<LogParam>,
}

impl Params {
    fn take(&mut self, name: &str) -> ClientResult<Token> {
        let position = self
            .params
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| self.error(format!("missing field `{name}`")))?;
        Ok(self.params.swap_remove(position).value)
    }

    fn uint(&mut self, name: &str) -> ClientResult<U256> {
        let token = self.take(name)?;
        token
            .into_uint()
            .ok_or_else(|| self.error(format!("`{name}` is not an integer")))
    }

    fn address(&mut self, name: &str) -> ClientResult<Address> {
        let token = self.take(name)?;
        token
            .into_address()
            .ok_or_else(|| self.error(format!("`{name}` is not an address")))
    }

    fn string(&mut self, name: &str) -> ClientResult<String> {
        let token = self.take(name)?;
        token
            .into_string()
            .ok_or_else(|| self.error(format!("`{name}` is not a string")))
    }

    fn boolean(&mut self, name: &str) -> ClientResult<bool> {
        let token = self.take(name)?;
        token
            .into_bool()
            .ok_or_else(|| self.error(format!("`{name}` is not a bool")))
    }

    fn addresses(&mut self, name: &str) -> ClientResult<Vec<Address>> {
        let token = self.take(name)?;
        let items = token
            .into_array()
            .ok_or_else(|| self.error(format!("`{name}` is not an array")))?;
        items
            .into_iter()
            .map(|item| {
                item.into_address()
                    .ok_or_else(|| self.error(format!("`{name}` holds a non-address")))
            })
            .collect()
    }

    fn path(&mut self, name: &str) -> ClientResult<BlockedPath> {
        Ok(BlockedPath::new(counter(self.uint(name)?)))
    }

    fn error(&self, message: String) -> GameClientError {
        GameClientError::EventDecode {
            event: self.event.to_string(),
            message,
        }
    }
}

/// Decode one raw log emitted by the contract
pub fn decode_log(interface: &ContractInterface, log: &Log) -> ClientResult<LoggedEvent> {
    let topic0 = log.topics.first().ok_or_else(|| GameClientError::EventDecode {
        event: "unknown".to_string(),
        message: "log has no topics".to_string(),
    })?;
    let name = interface
        .event_name(topic0)
        .and_then(|found| events::ALL.into_iter().find(|known| *known == found))
        .ok_or_else(|| GameClientError::EventDecode {
            event: "unknown".to_string(),
            message: format!("no game event has signature {topic0:?}"),
        })?;

    let raw = RawLog {
        topics: log.topics.clone(),
        data: log.data.to_vec(),
    };
    let parsed = interface
        .event(name)?
        .parse_log(raw)
        .map_err(|e| GameClientError::EventDecode {
            event: name.to_string(),
            message: e.to_string(),
        })?;
    let mut p = Params {
        event: name,
        params: parsed.params,
    };

    let game_id = GameId::from(p.uint("gameId")?);
    let event = match name {
        events::GAME_CREATED => GameEvent::GameCreated {
            game_id,
            creator: p.address("creator")?,
            entry_fee: Amount::from_wei(p.uint("entryFee")?),
        },
        events::PLAYER_JOINED => GameEvent::PlayerJoined {
            game_id,
            player: p.address("player")?,
            nickname: p.string("nickname")?,
            team: Team::from_is_thief(p.boolean("isThief")?),
        },
        events::GAME_STARTED => GameEvent::GameStarted {
            game_id,
            start_block: counter(p.uint("startBlock")?),
        },
        events::MOVE_COMMITTED => GameEvent::MoveCommitted {
            game_id,
            player: p.address("player")?,
            stage: counter(p.uint("stage")?),
        },
        events::VOTE_CAST => GameEvent::VoteCast {
            game_id,
            voter: p.address("voter")?,
            stage: counter(p.uint("stage")?),
            blocked_path: p.path("blockedPath")?,
        },
        events::STAGE_COMPLETED => GameEvent::StageCompleted {
            game_id,
            stage: counter(p.uint("stage")?),
            blocked_path: p.path("blockedPath")?,
            eliminated_players: p.addresses("eliminatedPlayers")?,
        },
        events::GAME_FINALIZED => GameEvent::GameFinalized {
            game_id,
            winners: p.addresses("winners")?,
            prize_per_winner: Amount::from_wei(p.uint("prizePerWinner")?),
        },
        other => return Err(p.error(format!("`{other}` is not a game event"))),
    };

    Ok(LoggedEvent {
        event,
        block_number: log.block_number.map(|n| n.as_u64()),
        log_index: log.log_index.map(counter),
        transaction_hash: log.transaction_hash,
    })
}

/// Callbacks for each event kind.
///
/// Every method has a default that logs the event, so a handler only
/// overrides the kinds it cares about.
pub trait GameEventHandler: Send + 'static {
    fn on_game_created(&mut self, game_id: GameId, creator: Address, entry_fee: Amount) {
        info!(%game_id, ?creator, entry_fee = %entry_fee, "Game Created");
    }

    fn on_player_joined(&mut self, game_id: GameId, player: Address, nickname: &str, team: Team) {
        info!(%game_id, ?player, nickname, %team, "Player Joined");
    }

    fn on_game_started(&mut self, game_id: GameId, start_block: u64) {
        info!(%game_id, start_block, "Game Started");
    }

    fn on_move_committed(&mut self, game_id: GameId, player: Address, stage: u64) {
        info!(%game_id, ?player, stage, "Move Committed");
    }

    fn on_vote_cast(
        &mut self,
        game_id: GameId,
        voter: Address,
        stage: u64,
        blocked_path: BlockedPath,
    ) {
        info!(%game_id, ?voter, stage, %blocked_path, "Vote Cast");
    }

    fn on_stage_completed(
        &mut self,
        game_id: GameId,
        stage: u64,
        blocked_path: BlockedPath,
        eliminated_players: &[Address],
    ) {
        info!(
            %game_id,
            stage,
            %blocked_path,
            eliminated_count = eliminated_players.len(),
            "Stage Completed"
        );
    }

    fn on_game_finalized(
        &mut self,
        game_id: GameId,
        winners: &[Address],
        prize_per_winner: Amount,
    ) {
        info!(
            %game_id,
            winner_count = winners.len(),
            prize_per_winner = %prize_per_winner,
            "Game Finalized"
        );
    }

    fn on_error(&mut self, error: &GameClientError) {
        warn!(%error, "event listener error");
    }
}

/// Handler that only logs, the equivalent of the default listeners
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl GameEventHandler for LoggingHandler {}

/// Route one decoded event to its handler method
pub fn dispatch<H: GameEventHandler + ?Sized>(handler: &mut H, logged: &LoggedEvent) {
    match &logged.event {
        GameEvent::GameCreated {
            game_id,
            creator,
            entry_fee,
        } => handler.on_game_created(*game_id, *creator, *entry_fee),
        GameEvent::PlayerJoined {
            game_id,
            player,
            nickname,
            team,
        } => handler.on_player_joined(*game_id, *player, nickname, *team),
        GameEvent::GameStarted {
            game_id,
            start_block,
        } => handler.on_game_started(*game_id, *start_block),
        GameEvent::MoveCommitted {
            game_id,
            player,
            stage,
        } => handler.on_move_committed(*game_id, *player, *stage),
        GameEvent::VoteCast {
            game_id,
            voter,
            stage,
            blocked_path,
        } => handler.on_vote_cast(*game_id, *voter, *stage, *blocked_path),
        GameEvent::StageCompleted {
            game_id,
            stage,
            blocked_path,
            eliminated_players,
        } => handler.on_stage_completed(*game_id, *stage, *blocked_path, eliminated_players),
        GameEvent::GameFinalized {
            game_id,
            winners,
            prize_per_winner,
        } => handler.on_game_finalized(*game_id, winners, *prize_per_winner),
    }
}

/// Stream of decoded contract events.
///
/// Items arrive in the node's order and are neither reordered nor
/// deduplicated. A log that fails to decode, or a failed poll, shows up as
/// an `Err` item and the stream keeps going. The stream ends only after
/// [`EventSubscription::unsubscribe`] or when it is dropped.
pub struct EventSubscription {
    receiver: mpsc::UnboundedReceiver<ClientResult<LoggedEvent>>,
    task: JoinHandle<()>,
}

impl EventSubscription {
    pub(crate) fn spawn<R>(
        rpc: Arc<R>,
        interface: ContractInterface,
        contract: Address,
        from_block: Option<u64>,
        poll_interval: Duration,
    ) -> Self
    where
        R: RpcBackend + ?Sized + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(poll_logs(
            rpc,
            interface,
            contract,
            from_block,
            poll_interval,
            sender,
        ));
        EventSubscription { receiver, task }
    }

    /// Next event, or `None` once the subscription has stopped
    pub async fn next(&mut self) -> Option<ClientResult<LoggedEvent>> {
        self.receiver.recv().await
    }

    /// Stop polling and release the subscription
    pub fn unsubscribe(self) {
        self.task.abort();
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn poll_logs<R>(
    rpc: Arc<R>,
    interface: ContractInterface,
    contract: Address,
    from_block: Option<u64>,
    poll_interval: Duration,
    sender: mpsc::UnboundedSender<ClientResult<LoggedEvent>>,
) where
    R: RpcBackend + ?Sized,
{
    let signatures = interface.event_signatures();
    let mut next_block = from_block;
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        ticker.tick().await;
        if sender.is_closed() {
            break;
        }

        let head = match rpc.block_number().await {
            Ok(head) => head,
            Err(e) => {
                if sender.send(Err(e)).is_err() {
                    break;
                }
                continue;
            }
        };
        // Without a start block, only logs from the first observed head onwards.
        let start = *next_block.get_or_insert(head);
        if start > head {
            continue;
        }

        let filter = Filter::new()
            .address(contract)
            .topic0(ValueOrArray::Array(signatures.iter().copied().map(Some).collect()))
            .from_block(start)
            .to_block(head);

        match rpc.logs(&filter).await {
            Ok(logs) => {
                debug!(from = start, to = head, count = logs.len(), "polled contract logs");
                for log in &logs {
                    if sender.send(decode_log(&interface, log)).is_err() {
                        return;
                    }
                }
                next_block = Some(head + 1);
            }
            Err(e) => {
                if sender.send(Err(e)).is_err() {
                    break;
                }
            }
        }
    }
}

/// Background task feeding a [`GameEventHandler`] from a subscription
pub struct EventListener {
    task: JoinHandle<()>,
}

impl EventListener {
    pub(crate) fn spawn<H: GameEventHandler>(
        mut subscription: EventSubscription,
        mut handler: H,
    ) -> Self {
        let task = tokio::spawn(async move {
            while let Some(item) = subscription.next().await {
                match item {
                    Ok(logged) => dispatch(&mut handler, &logged),
                    Err(e) => handler.on_error(&e),
                }
            }
        });
        EventListener { task }
    }

    /// Stop delivering events
    pub fn unsubscribe(self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PathChoice;
    use ethers::abi::encode;
    use ethers::types::{Bytes, U64};

    fn interface() -> ContractInterface {
        ContractInterface::monkabreak().unwrap()
    }

    fn id_topic(id: u64) -> H256 {
        H256::from_low_u64_be(id)
    }

    fn address_topic(address: Address) -> H256 {
        H256::from(address)
    }

    fn log(name: &str, mut topics: Vec<H256>, data: Vec<Token>) -> Log {
        topics.insert(0, interface().event_signature(name).unwrap());
        Log {
            topics,
            data: Bytes::from(encode(&data)),
            block_number: Some(U64::from(12u64)),
            log_index: Some(U256::from(3u64)),
            ..Default::default()
        }
    }

    #[test]
    fn decodes_game_created() {
        let creator = Address::from_low_u64_be(0xc0);
        let raw = log(
            events::GAME_CREATED,
            vec![id_topic(7), address_topic(creator)],
            vec![Token::Uint(U256::exp10(18) * 3)],
        );
        let logged = decode_log(&interface(), &raw).unwrap();
        assert_eq!(
            logged.event,
            GameEvent::GameCreated {
                game_id: GameId::from(7u64),
                creator,
                entry_fee: Amount::parse("3").unwrap(),
            }
        );
        assert_eq!(logged.block_number, Some(12));
        assert_eq!(logged.log_index, Some(3));
    }

    #[test]
    fn decodes_player_joined_team() {
        let player = Address::from_low_u64_be(0xaa);
        let raw = log(
            events::PLAYER_JOINED,
            vec![id_topic(1), address_topic(player)],
            vec![Token::String("Alice".to_string()), Token::Bool(false)],
        );
        match decode_log(&interface(), &raw).unwrap().event {
            GameEvent::PlayerJoined { nickname, team, .. } => {
                assert_eq!(nickname, "Alice");
                assert_eq!(team, Team::Police);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decodes_stage_completed_paths_and_eliminations() {
        let eliminated = vec![Address::from_low_u64_be(1), Address::from_low_u64_be(2)];
        let raw = log(
            events::STAGE_COMPLETED,
            vec![id_topic(4)],
            vec![
                Token::Uint(U256::from(2u64)),
                Token::Uint(U256::from(1u64)),
                Token::Array(eliminated.iter().copied().map(Token::Address).collect()),
            ],
        );
        assert_eq!(
            decode_log(&interface(), &raw).unwrap().event,
            GameEvent::StageCompleted {
                game_id: GameId::from(4u64),
                stage: 2,
                blocked_path: BlockedPath::from(PathChoice::B),
                eliminated_players: eliminated,
            }
        );
    }

    #[test]
    fn out_of_range_path_keeps_the_rest_of_the_event() {
        let voter = Address::from_low_u64_be(9);
        let raw = log(
            events::VOTE_CAST,
            vec![id_topic(4), address_topic(voter)],
            vec![Token::Uint(U256::from(1u64)), Token::Uint(U256::from(5u64))],
        );
        match decode_log(&interface(), &raw).unwrap().event {
            GameEvent::VoteCast {
                voter: decoded,
                stage,
                blocked_path,
                ..
            } => {
                assert_eq!(decoded, voter);
                assert_eq!(stage, 1);
                assert_eq!(blocked_path.index(), 5);
                assert_eq!(blocked_path.to_string(), "Unknown");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_signature_is_a_decode_error() {
        let raw = Log {
            topics: vec![H256::repeat_byte(0xee)],
            ..Default::default()
        };
        assert!(matches!(
            decode_log(&interface(), &raw),
            Err(GameClientError::EventDecode { .. })
        ));
    }

    #[derive(Default)]
    struct Recorder {
        names: Vec<&'static str>,
        errors: usize,
    }

    impl GameEventHandler for Recorder {
        fn on_game_started(&mut self, _game_id: GameId, _start_block: u64) {
            self.names.push("started");
        }

        fn on_game_finalized(&mut self, _game_id: GameId, winners: &[Address], _prize: Amount) {
            assert_eq!(winners.len(), 1);
            self.names.push("finalized");
        }

        fn on_error(&mut self, _error: &GameClientError) {
            self.errors += 1;
        }
    }

    #[test]
    fn dispatch_routes_by_kind() {
        let mut recorder = Recorder::default();
        let started = decode_log(
            &interface(),
            &log(events::GAME_STARTED, vec![id_topic(1)], vec![Token::Uint(U256::from(99u64))]),
        )
        .unwrap();
        let finalized = decode_log(
            &interface(),
            &log(
                events::GAME_FINALIZED,
                vec![id_topic(1)],
                vec![
                    Token::Array(vec![Token::Address(Address::from_low_u64_be(5))]),
                    Token::Uint(U256::from(10u64)),
                ],
            ),
        )
        .unwrap();
        dispatch(&mut recorder, &started);
        dispatch(&mut recorder, &finalized);
        assert_eq!(recorder.names, vec!["started", "finalized"]);
        assert_eq!(recorder.errors, 0);
    }
}
