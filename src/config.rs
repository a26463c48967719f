//! Configuration management for the MonkaBreak client

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::abi::ContractInterface;
use crate::error::{ClientResult, GameClientError};
use crate::units::Amount;

/// Largest accepted `gas_padding_percent`
pub const MAX_GAS_PADDING_PERCENT: u64 = 1000;

/// Main configuration for the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Network configuration
    #[serde(default)]
    pub network: NetworkConfig,
    /// Contract configuration
    pub contract: ContractConfig,
    /// Transaction configuration
    #[serde(default)]
    pub transactions: TransactionConfig,
}

/// Chain and node settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Chain id the contract lives on
    pub chain_id: u64,
    /// Display name used when asking a wallet to add the chain
    pub chain_name: String,
    /// Block explorer base URL
    pub explorer_url: String,
    /// Native currency name
    pub currency_name: String,
    /// Native currency symbol
    pub currency_symbol: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://testnet-rpc.monad.xyz".to_string(),
            chain_id: 10143,
            chain_name: "Monad Testnet".to_string(),
            explorer_url: "https://testnet.monadexplorer.com".to_string(),
            currency_name: "MON".to_string(),
            currency_symbol: "MON".to_string(),
        }
    }
}

/// Deployed contract settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Address of the deployed MonkaBreak contract
    pub address: Address,
    /// JSON ABI to use instead of the embedded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi_path: Option<PathBuf>,
    /// Minimum entry fee in MON, used to seed the client-side fee check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_entry_fee: Option<String>,
}

/// Submission and inclusion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// How long to wait for a receipt before reporting the transaction dropped (seconds)
    pub confirmation_timeout: u64,
    /// Receipt polling interval (milliseconds)
    pub receipt_poll_interval: u64,
    /// Extra gas on top of the node's estimate (percent)
    pub gas_padding_percent: u64,
    /// Log polling interval for event subscriptions (milliseconds)
    pub event_poll_interval: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: 120,
            receipt_poll_interval: 1000,
            gas_padding_percent: 20,
            event_poll_interval: 2000,
        }
    }
}

impl TransactionConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval)
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval)
    }
}

impl ClientConfig {
    /// Defaults for Monad testnet pointed at `address`
    pub fn new(address: Address) -> Self {
        Self {
            network: NetworkConfig::default(),
            contract: ContractConfig {
                address,
                abi_path: None,
                min_entry_fee: None,
            },
            transactions: TransactionConfig::default(),
        }
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ClientResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| GameClientError::Configuration {
            message: format!("Failed to read config file: {}", e),
            field: "config_file".to_string(),
        })?;

        let config: ClientConfig =
            toml::from_str(&content).map_err(|e| GameClientError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                field: "config_format".to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> ClientResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| GameClientError::Configuration {
            message: format!("Failed to serialize config: {}", e),
            field: "config_serialization".to_string(),
        })?;

        fs::write(path, content).map_err(|e| GameClientError::Configuration {
            message: format!("Failed to write config file: {}", e),
            field: "config_write".to_string(),
        })?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> ClientResult<()> {
        if self.network.rpc_url.trim().is_empty() {
            return Err(GameClientError::Configuration {
                message: "RPC URL must not be empty".to_string(),
                field: "network.rpc_url".to_string(),
            });
        }

        if self.network.chain_id == 0 {
            return Err(GameClientError::Configuration {
                message: "Chain id must be greater than 0".to_string(),
                field: "network.chain_id".to_string(),
            });
        }

        if self.contract.address.is_zero() {
            return Err(GameClientError::Configuration {
                message: "Contract address must not be the zero address".to_string(),
                field: "contract.address".to_string(),
            });
        }

        if let Some(fee) = &self.contract.min_entry_fee {
            Amount::parse(fee).map_err(|e| GameClientError::Configuration {
                message: format!("Minimum entry fee is not an amount: {}", e),
                field: "contract.min_entry_fee".to_string(),
            })?;
        }

        if self.transactions.confirmation_timeout == 0 {
            return Err(GameClientError::Configuration {
                message: "Confirmation timeout must be greater than 0".to_string(),
                field: "transactions.confirmation_timeout".to_string(),
            });
        }

        if self.transactions.gas_padding_percent > MAX_GAS_PADDING_PERCENT {
            return Err(GameClientError::Configuration {
                message: format!(
                    "Gas padding must be at most {}%, got {}%",
                    MAX_GAS_PADDING_PERCENT, self.transactions.gas_padding_percent
                ),
                field: "transactions.gas_padding_percent".to_string(),
            });
        }

        if self.transactions.receipt_poll_interval == 0
            || self.transactions.event_poll_interval == 0
        {
            return Err(GameClientError::Configuration {
                message: "Poll intervals must be greater than 0".to_string(),
                field: "transactions".to_string(),
            });
        }

        Ok(())
    }

    /// Minimum entry fee from configuration, if any
    pub fn min_entry_fee(&self) -> ClientResult<Option<Amount>> {
        self.contract
            .min_entry_fee
            .as_deref()
            .map(Amount::parse)
            .transpose()
    }

    /// Contract interface from `abi_path`, or the embedded ABI
    pub fn contract_interface(&self) -> ClientResult<ContractInterface> {
        match &self.contract.abi_path {
            Some(path) => ContractInterface::from_file(path),
            None => ContractInterface::monkabreak(),
        }
    }
}
