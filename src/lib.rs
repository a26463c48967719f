// MonkaBreak client
//
// A typed client for the deployed MonkaBreak contract, a staged thieves-and-police
// game where thieves pick one of three paths per stage and police vote to block one.
// The game rules live in the contract; this crate only talks to it.
//
// Layout:
// 1. `abi` holds the contract's JSON interface and the call/return encoding.
// 2. `transport` defines the two seams: `RpcBackend` for reads and `TransactionSigner` for writes.
// 3. `signer` and `wallet` implement the signer for a local key and for an EIP-1193 wallet.
// 4. `client` turns game actions into calls, waits for inclusion and decodes the results.
// 5. `events` decodes logs and delivers them as a subscription or to a handler.
// 6. `units` converts between wei and MON; `config` loads the TOML settings.

pub mod abi;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod signer;
pub mod transport;
pub mod types;
pub mod units;
pub mod wallet;

pub use abi::ContractInterface;
pub use client::GameClient;
pub use config::{ClientConfig, ContractConfig, NetworkConfig, TransactionConfig};
pub use error::{ClientResult, GameClientError};
pub use events::{
    EventListener, EventSubscription, GameEvent, GameEventHandler, LoggedEvent, LoggingHandler,
};
pub use signer::{LocalSigner, ReadOnlySigner};
pub use transport::{HttpRpc, RpcBackend, TransactionSigner};
pub use types::{
    path_to_string, BlockedPath, ConfirmedReceipt, CreatedGame, GameId, GameSnapshot,
    GameStateView, PathChoice, PlayerView, Team,
};
pub use units::{parse_amount, to_decimal_string, Amount};
pub use wallet::{Eip1193Provider, WalletRpcError, WalletSigner};

// Re-exported so callers can name addresses and hashes without depending on ethers directly
pub use ethers::types::{Address, H256, U256};
