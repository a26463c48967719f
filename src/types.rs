//! Domain views decoded from the MonkaBreak contract

use std::fmt;
use std::str::FromStr;

use ethers::types::{Address, Log, TransactionReceipt, H256, U256};
use serde::Serialize;

use crate::error::GameClientError;
use crate::units::Amount;

/// Identifier of one game instance on the contract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameId(U256);

impl GameId {
    pub fn new(id: impl Into<U256>) -> Self {
        GameId(id.into())
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GameId {
    type Err = GameClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_dec_str(s.trim())
            .map(GameId)
            .map_err(|e| GameClientError::InvalidArgument {
                argument: "game_id",
                message: format!("{s:?} is not a game id: {e}"),
            })
    }
}

impl From<u64> for GameId {
    fn from(id: u64) -> Self {
        GameId(U256::from(id))
    }
}

impl From<U256> for GameId {
    fn from(id: U256) -> Self {
        GameId(id)
    }
}

impl Serialize for GameId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One of the three paths a player can take at each stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PathChoice {
    A,
    B,
    C,
}

impl PathChoice {
    pub const ALL: [PathChoice; 3] = [PathChoice::A, PathChoice::B, PathChoice::C];

    pub fn index(self) -> u8 {
        u8::from(self)
    }
}

impl TryFrom<u8> for PathChoice {
    type Error = GameClientError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PathChoice::A),
            1 => Ok(PathChoice::B),
            2 => Ok(PathChoice::C),
            other => Err(GameClientError::InvalidArgument {
                argument: "path_choice",
                message: format!("{other} is not a path; must be 0 (A), 1 (B), or 2 (C)"),
            }),
        }
    }
}

impl TryFrom<U256> for PathChoice {
    type Error = GameClientError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        if value > U256::from(u8::MAX) {
            return Err(GameClientError::InvalidArgument {
                argument: "path_choice",
                message: format!("{value} is not a path"),
            });
        }
        PathChoice::try_from(value.low_u32() as u8)
    }
}

impl From<PathChoice> for u8 {
    fn from(path: PathChoice) -> Self {
        match path {
            PathChoice::A => 0,
            PathChoice::B => 1,
            PathChoice::C => 2,
        }
    }
}

impl fmt::Display for PathChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            PathChoice::A => "A",
            PathChoice::B => "B",
            PathChoice::C => "C",
        };
        f.write_str(letter)
    }
}

/// Letter for a raw path index, `"Unknown"` when out of range
pub fn path_to_string(index: u64) -> &'static str {
    match index {
        0 => "A",
        1 => "B",
        2 => "C",
        _ => "Unknown",
    }
}

/// Path index reported in an event, kept as-is even when out of range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockedPath(u64);

impl BlockedPath {
    pub fn new(index: u64) -> Self {
        BlockedPath(index)
    }

    pub fn index(self) -> u64 {
        self.0
    }

    /// The path, or `None` for an index the game does not define
    pub fn choice(self) -> Option<PathChoice> {
        u8::try_from(self.0)
            .ok()
            .and_then(|index| PathChoice::try_from(index).ok())
    }
}

impl From<PathChoice> for BlockedPath {
    fn from(path: PathChoice) -> Self {
        BlockedPath(u64::from(path.index()))
    }
}

impl fmt::Display for BlockedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(path_to_string(self.0))
    }
}

impl Serialize for BlockedPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Team {
    Thieves,
    Police,
}

impl Team {
    pub fn from_is_thief(is_thief: bool) -> Self {
        if is_thief {
            Team::Thieves
        } else {
            Team::Police
        }
    }

    pub fn is_thief(self) -> bool {
        self == Team::Thieves
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Thieves => f.write_str("Thieves"),
            Team::Police => f.write_str("Police"),
        }
    }
}

/// Snapshot of `getGameState` for one game
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameStateView {
    pub creator: Address,
    pub entry_fee: Amount,
    pub started: bool,
    pub finalized: bool,
    pub current_stage: u64,
    pub thieves_count: u64,
    pub police_count: u64,
    pub alive_thieves: u64,
    pub total_players: u64,
}

/// One entry of `getPlayers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub address: Address,
    pub nickname: String,
    pub team: Team,
    pub eliminated: bool,
    /// Path index chosen at each stage, in stage order
    pub moves: Vec<u8>,
}

/// State, vault and roster of one game, fetched with three separate queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub state: GameStateView,
    pub vault_balance: Amount,
    pub players: Vec<PlayerView>,
}

/// Receipt of an included, successful transaction
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
    pub logs: Vec<Log>,
}

impl From<TransactionReceipt> for ConfirmedReceipt {
    fn from(receipt: TransactionReceipt) -> Self {
        ConfirmedReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            gas_used: receipt.gas_used,
            logs: receipt.logs,
        }
    }
}

/// Result of `createGame`: the receipt plus the id the contract assigned
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedGame {
    pub game_id: GameId,
    pub receipt: ConfirmedReceipt,
}

/// Saturating conversion for counters the contract stores as uint256
pub(crate) fn counter(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_path_keeps_unknown_indices() {
        assert_eq!(BlockedPath::new(1).choice(), Some(PathChoice::B));
        assert_eq!(BlockedPath::from(PathChoice::C).to_string(), "C");

        let odd = BlockedPath::new(3);
        assert_eq!(odd.choice(), None);
        assert_eq!(odd.index(), 3);
        assert_eq!(odd.to_string(), "Unknown");
        assert_eq!(BlockedPath::new(300).choice(), None);
    }

    #[test]
    fn path_choice_accepts_only_three_paths() {
        assert_eq!(PathChoice::try_from(0u8).unwrap(), PathChoice::A);
        assert_eq!(PathChoice::try_from(2u8).unwrap(), PathChoice::C);
        assert!(matches!(
            PathChoice::try_from(3u8),
            Err(GameClientError::InvalidArgument { argument: "path_choice", .. })
        ));
        assert!(PathChoice::try_from(U256::from(256u64)).is_err());
    }

    #[test]
    fn path_letters() {
        assert_eq!(PathChoice::B.to_string(), "B");
        assert_eq!(path_to_string(2), "C");
        assert_eq!(path_to_string(7), "Unknown");
    }

    #[test]
    fn game_id_parses_decimal() {
        let id: GameId = "42".parse().unwrap();
        assert_eq!(id, GameId::from(42u64));
        assert_eq!(id.to_string(), "42");
        assert!("0x2a".parse::<GameId>().is_err());
    }

    #[test]
    fn counters_saturate() {
        assert_eq!(counter(U256::from(5u64)), 5);
        assert_eq!(counter(U256::MAX), u64::MAX);
    }
}
