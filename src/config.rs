//! Wallet and server configuration
//!
//! A wallet is configured with a JSON file such as:
//!
//! ```json
//! {
//!   "owners": [
//!     "0x2ce7756b09e0be1306ac18d0968d36f259c76447",
//!     "0x1234567890123456789012345678901234567890",
//!     "0x1234567890123456789012345678901234567891"
//!   ],
//!   "required_confirmations": 2,
//!   "label": "Treasury"
//! }
//! ```

use crate::core::Address;
use crate::multisig::{MultisigError, MultisigWallet, OwnerRegistry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Owners of a freshly initialized wallet when none are given
pub const DEFAULT_OWNERS: [&str; 3] = [
    "0x2CE7756B09e0BE1306aC18d0968D36F259c76447",
    "0x1234567890123456789012345678901234567890",
    "0x1234567890123456789012345678901234567891",
];

pub const DEFAULT_REQUIRED_CONFIRMATIONS: usize = 2;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid wallet configuration: {0}")]
    Invalid(#[from] MultisigError),
}

/// Owners, threshold and label of a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub owners: Vec<Address>,
    pub required_confirmations: usize,
    #[serde(default)]
    pub label: Option<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            owners: DEFAULT_OWNERS
                .iter()
                .filter_map(|s| Address::from_hex(s).ok())
                .collect(),
            required_confirmations: DEFAULT_REQUIRED_CONFIRMATIONS,
            label: None,
        }
    }
}

impl WalletConfig {
    pub fn new(owners: Vec<Address>, required_confirmations: usize) -> Self {
        Self {
            owners,
            required_confirmations,
            label: None,
        }
    }

    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Validate owners and threshold
    pub fn registry(&self) -> Result<OwnerRegistry, ConfigError> {
        Ok(OwnerRegistry::new(
            self.owners.clone(),
            self.required_confirmations,
        )?)
    }

    /// Build the wallet this configuration describes
    pub fn build(&self) -> Result<MultisigWallet, ConfigError> {
        let wallet = MultisigWallet::from_registry(self.registry()?);
        Ok(match &self.label {
            Some(label) => wallet.with_label(label.clone()),
            None => wallet,
        })
    }
}

/// REST API server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ApiConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
