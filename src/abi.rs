//! Contract interface description: the MonkaBreak JSON ABI

use std::fs;
use std::path::Path;

use ethers::abi::{Abi, Event, Function, Token};
use ethers::types::{Bytes, H256};

use crate::error::{ClientResult, GameClientError};

/// ABI shipped with the crate
pub const MONKABREAK_ABI: &str = include_str!("../abi/MonkaBreak.abi.json");

pub mod functions {
    pub const CREATE_GAME: &str = "createGame";
    pub const JOIN_GAME: &str = "joinGame";
    pub const START_GAME: &str = "startGame";
    pub const COMMIT_MOVE: &str = "commitMove";
    pub const VOTE_BLOCK: &str = "voteBlock";
    pub const PROCESS_STAGE: &str = "processStage";
    pub const FINALIZE_GAME: &str = "finalizeGame";
    pub const GET_GAME_STATE: &str = "getGameState";
    pub const GET_PLAYERS: &str = "getPlayers";
    pub const GET_VAULT_BALANCE: &str = "getVaultBalance";
    pub const IS_WINNER: &str = "isWinner";
    pub const GET_CURRENT_GAME_ID: &str = "getCurrentGameId";
    pub const GET_MIN_ENTRY_FEE: &str = "getMinEntryFee";

    pub const ALL: [&str; 13] = [
        CREATE_GAME,
        JOIN_GAME,
        START_GAME,
        COMMIT_MOVE,
        VOTE_BLOCK,
        PROCESS_STAGE,
        FINALIZE_GAME,
        GET_GAME_STATE,
        GET_PLAYERS,
        GET_VAULT_BALANCE,
        IS_WINNER,
        GET_CURRENT_GAME_ID,
        GET_MIN_ENTRY_FEE,
    ];
}

pub mod events {
    pub const GAME_CREATED: &str = "GameCreated";
    pub const PLAYER_JOINED: &str = "PlayerJoined";
    pub const GAME_STARTED: &str = "GameStarted";
    pub const MOVE_COMMITTED: &str = "MoveCommitted";
    pub const VOTE_CAST: &str = "VoteCast";
    pub const STAGE_COMPLETED: &str = "StageCompleted";
    pub const GAME_FINALIZED: &str = "GameFinalized";

    pub const ALL: [&str; 7] = [
        GAME_CREATED,
        PLAYER_JOINED,
        GAME_STARTED,
        MOVE_COMMITTED,
        VOTE_CAST,
        STAGE_COMPLETED,
        GAME_FINALIZED,
    ];
}

/// Parsed ABI, checked to contain every function and event the client uses
#[derive(Debug, Clone)]
pub struct ContractInterface {
    abi: Abi,
}

impl ContractInterface {
    /// The ABI embedded in the crate
    pub fn monkabreak() -> ClientResult<Self> {
        Self::from_json(MONKABREAK_ABI)
    }

    pub fn from_json(json: &str) -> ClientResult<Self> {
        let abi: Abi = serde_json::from_str(json).map_err(|e| GameClientError::Interface {
            message: format!("failed to parse ABI: {e}"),
        })?;
        Self::from_abi(abi)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ClientResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| GameClientError::Interface {
            message: format!("failed to read ABI file {}: {e}", path.display()),
        })?;
        Self::from_json(&json)
    }

    pub fn from_abi(abi: Abi) -> ClientResult<Self> {
        for name in functions::ALL {
            if abi.function(name).is_err() {
                return Err(GameClientError::Interface {
                    message: format!("ABI has no function `{name}`"),
                });
            }
        }
        for name in events::ALL {
            if abi.event(name).is_err() {
                return Err(GameClientError::Interface {
                    message: format!("ABI has no event `{name}`"),
                });
            }
        }
        Ok(ContractInterface { abi })
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    pub fn function(&self, name: &str) -> ClientResult<&Function> {
        self.abi.function(name).map_err(|_| GameClientError::Interface {
            message: format!("ABI has no function `{name}`"),
        })
    }

    pub fn event(&self, name: &str) -> ClientResult<&Event> {
        self.abi.event(name).map_err(|_| GameClientError::Interface {
            message: format!("ABI has no event `{name}`"),
        })
    }

    /// Calldata for `name(args...)`
    pub fn encode_call(&self, name: &str, args: &[Token]) -> ClientResult<Bytes> {
        let function = self.function(name)?;
        let data = function
            .encode_input(args)
            .map_err(|e| GameClientError::InvalidArgument {
                argument: "call",
                message: format!("cannot encode {name}: {e}"),
            })?;
        Ok(Bytes::from(data))
    }

    /// Return values of `name`, in declaration order
    pub fn decode_output(&self, name: &str, data: &[u8]) -> ClientResult<Vec<Token>> {
        let function = self.function(name)?;
        function
            .decode_output(data)
            .map_err(|e| GameClientError::remote(format!("undecodable {name} response: {e}")))
    }

    pub fn event_signature(&self, name: &str) -> ClientResult<H256> {
        Ok(self.event(name)?.signature())
    }

    /// Topic0 values of every game event, in [`events::ALL`] order
    pub fn event_signatures(&self) -> Vec<H256> {
        events::ALL
            .into_iter()
            .filter_map(|name| self.abi.event(name).ok())
            .map(|event| event.signature())
            .collect()
    }

    /// Name of the game event whose signature is `topic0`
    pub fn event_name(&self, topic0: &H256) -> Option<&str> {
        self.abi
            .events()
            .find(|event| &event.signature() == topic0)
            .map(|event| event.name.as_str())
    }
}
