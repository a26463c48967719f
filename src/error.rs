//! Error types for the MonkaBreak client

use ethers::providers::{ProviderError, RpcError};
use ethers::types::H256;
use thiserror::Error;

use crate::units::Amount;

/// Main error type for every client operation
#[derive(Debug, Clone, Error)]
pub enum GameClientError {
    #[error("Invalid credential: {reason}")]
    InvalidCredential { reason: String },

    #[error("Endpoint unreachable: {message}")]
    EndpointUnreachable { message: String },

    #[error("Invalid argument `{argument}`: {message}")]
    InvalidArgument {
        argument: &'static str,
        message: String,
    },

    #[error("Entry fee {offered} MON is below the minimum of {minimum} MON")]
    BelowMinimumFee { offered: Amount, minimum: Amount },

    #[error("Transaction reverted: {reason}")]
    TransactionReverted {
        tx_hash: Option<H256>,
        block_number: Option<u64>,
        reason: String,
    },

    #[error("Transaction {tx_hash:?} was not included within {waited_ms}ms")]
    TransactionDropped { tx_hash: H256, waited_ms: u64 },

    #[error("No {event} log found in receipt of {tx_hash:?}")]
    EventNotFound { event: String, tx_hash: H256 },

    #[error("Invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: String },

    #[error("Remote call failed: {message}")]
    RemoteCall { message: String },

    #[error("Connected to chain {actual}, expected chain {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Failed to decode {event} event: {message}")]
    EventDecode { event: String, message: String },

    #[error("Contract interface error: {message}")]
    Interface { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String, field: String },
}

impl GameClientError {
    pub(crate) fn remote(message: impl Into<String>) -> Self {
        GameClientError::RemoteCall {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_amount(input: impl Into<String>, reason: impl Into<String>) -> Self {
        GameClientError::InvalidAmount {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// True when the node answered but refused or could not decode the request
    pub fn is_remote(&self) -> bool {
        matches!(self, GameClientError::RemoteCall { .. })
    }
}

/// Sort a provider failure into the client taxonomy.
///
/// A JSON-RPC error response means the node was reached; anything the node
/// sent back that does not parse is a remote call failure too. Everything
/// else is treated as a transport failure.
pub fn classify_provider_error(err: &ProviderError) -> GameClientError {
    if let Some(response) = err.as_error_response() {
        return GameClientError::remote(format!("{} (code {})", response.message, response.code));
    }
    if err.as_serde_error().is_some() {
        return GameClientError::remote(err.to_string());
    }
    match err {
        ProviderError::JsonRpcClientError(_) | ProviderError::HTTPError(_) => {
            GameClientError::EndpointUnreachable {
                message: err.to_string(),
            }
        }
        _ => GameClientError::remote(err.to_string()),
    }
}

impl From<ProviderError> for GameClientError {
    fn from(err: ProviderError) -> Self {
        classify_provider_error(&err)
    }
}

impl From<ethers::abi::Error> for GameClientError {
    fn from(err: ethers::abi::Error) -> Self {
        GameClientError::remote(format!("undecodable response: {err}"))
    }
}

/// Type alias for the result type used throughout the library
pub type ClientResult<T> = Result<T, GameClientError>;
