//! Contract deployment and invocation

use crate::contract::vm::{ExecutionContext, ExecutionResult, VmError, DEFAULT_GAS_LIMIT, VM};
use crate::core::{Address, Amount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Contract errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Contract not found: {0}")]
    NotFound(Address),
    #[error("Contract already exists: {0}")]
    AlreadyExists(Address),
    #[error("VM error: {0}")]
    Vm(#[from] VmError),
    #[error("Empty bytecode")]
    InvalidBytecode,
}

/// A deployed contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub address: Address,
    pub code: Vec<u8>,
    /// Word-addressed storage
    pub storage: BTreeMap<u64, u64>,
    pub deployer: Address,
    pub deployed_at: DateTime<Utc>,
}

/// Inputs for a single contract call
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub caller: Address,
    pub value: Amount,
    /// Contract balance before the call
    pub balance: Amount,
    pub args: Vec<u64>,
    pub gas_limit: Option<u64>,
}

impl Contract {
    pub fn new(address: Address, code: Vec<u8>, deployer: Address) -> Self {
        Self {
            address,
            code,
            storage: BTreeMap::new(),
            deployer,
            deployed_at: Utc::now(),
        }
    }

    /// Run the contract; storage is only updated if the run succeeds
    pub fn execute(&mut self, invocation: Invocation) -> Result<ExecutionResult, VmError> {
        let context = ExecutionContext {
            caller: invocation.caller.to_word(),
            address: self.address.to_word(),
            call_value: saturate(invocation.value),
            self_balance: saturate(invocation.balance),
            args: invocation.args,
            gas_limit: invocation.gas_limit.unwrap_or(DEFAULT_GAS_LIMIT),
        };

        let result = VM::new(&self.code, &self.storage, context).execute()?;
        self.storage
            .extend(result.storage_changes.iter().map(|(k, v)| (*k, *v)));

        Ok(result)
    }

    /// Read a storage slot, zero if unset
    pub fn storage_at(&self, key: u64) -> u64 {
        self.storage.get(&key).copied().unwrap_or(0)
    }
}

fn saturate(amount: Amount) -> u64 {
    u64::try_from(amount).unwrap_or(u64::MAX)
}

/// Manages all deployed contracts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractManager {
    contracts: HashMap<Address, Contract>,
    /// Deployment counter for address generation
    nonce: u64,
}

impl ContractManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy bytecode and return the new contract's address
    pub fn deploy(&mut self, code: Vec<u8>, deployer: Address) -> Result<Address, ContractError> {
        if code.is_empty() {
            return Err(ContractError::InvalidBytecode);
        }

        let address = self.generate_address(&deployer);
        self.nonce += 1;

        if self.contracts.contains_key(&address) {
            return Err(ContractError::AlreadyExists(address));
        }

        self.contracts
            .insert(address, Contract::new(address, code, deployer));

        log::info!("Contract deployed at {} by {}", address, deployer);
        Ok(address)
    }

    pub fn call(
        &mut self,
        address: &Address,
        invocation: Invocation,
    ) -> Result<ExecutionResult, ContractError> {
        let contract = self
            .contracts
            .get_mut(address)
            .ok_or(ContractError::NotFound(*address))?;

        Ok(contract.execute(invocation)?)
    }

    pub fn get(&self, address: &Address) -> Option<&Contract> {
        self.contracts.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.contracts.contains_key(address)
    }

    /// All contract addresses, sorted
    pub fn list(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.contracts.keys().copied().collect();
        addresses.sort();
        addresses
    }

    pub fn count(&self) -> usize {
        self.contracts.len()
    }

    /// Address = HASH160(deployer || nonce)
    fn generate_address(&self, deployer: &Address) -> Address {
        let mut data = deployer.as_bytes().to_vec();
        data.extend_from_slice(&self.nonce.to_be_bytes());
        Address::derive(&data)
    }
}
