//! In-memory host
//!
//! Accounts with native balances plus deployed VM contracts. A call either
//! applies completely (contract storage writes and the credit to the target)
//! or not at all.

use crate::contract::{Contract, ContractError, ContractManager, Invocation};
use crate::core::{Address, Amount};
use crate::host::{CallError, CallHost, CallOutput, CallRequest};
use crate::multisig::MultisigWallet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Size of one call argument in the payload
pub const WORD_LEN: usize = 8;

/// Accounts and contracts the wallet can interact with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chain {
    balances: HashMap<Address, Amount>,
    contracts: ContractManager,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account out of thin air
    pub fn fund(&mut self, address: Address, amount: Amount) -> Result<Amount, CallError> {
        let balance = self
            .balance_of(&address)
            .checked_add(amount)
            .ok_or(CallError::BalanceOverflow(address))?;
        self.balances.insert(address, balance);
        Ok(balance)
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Deploy bytecode on behalf of `deployer`
    pub fn deploy(&mut self, code: Vec<u8>, deployer: Address) -> Result<Address, ContractError> {
        self.contracts.deploy(code, deployer)
    }

    pub fn contract(&self, address: &Address) -> Option<&Contract> {
        self.contracts.get(address)
    }

    pub fn contracts(&self) -> &ContractManager {
        &self.contracts
    }

    /// Read a contract storage slot; zero for unknown contracts or slots
    pub fn storage_at(&self, address: &Address, key: u64) -> u64 {
        self.contracts
            .get(address)
            .map(|contract| contract.storage_at(key))
            .unwrap_or(0)
    }

    /// Split call data into big-endian argument words
    pub fn decode_args(payload: &[u8]) -> Result<Vec<u64>, CallError> {
        if payload.len() % WORD_LEN != 0 {
            return Err(CallError::MalformedPayload(format!(
                "{} bytes is not a whole number of {}-byte words",
                payload.len(),
                WORD_LEN
            )));
        }

        Ok(payload
            .chunks_exact(WORD_LEN)
            .map(|chunk| {
                let mut word = [0u8; WORD_LEN];
                word.copy_from_slice(chunk);
                u64::from_be_bytes(word)
            })
            .collect())
    }

    /// Encode argument words as call data
    pub fn encode_args(args: &[u64]) -> Vec<u8> {
        args.iter().flat_map(|arg| arg.to_be_bytes()).collect()
    }
}

impl CallHost for Chain {
    fn call(
        &mut self,
        wallet: &mut MultisigWallet,
        request: &CallRequest,
    ) -> Result<CallOutput, CallError> {
        log::debug!(
            "Call from {} to {} with value {} ({} bytes)",
            request.from,
            request.target,
            request.value,
            request.payload.len()
        );

        // Sending to the wallet itself is a deposit
        if request.target == wallet.address() {
            wallet
                .deposit(request.from, request.value)
                .map_err(|e| CallError::Rejected(e.to_string()))?;
            return Ok(CallOutput::empty());
        }

        let previous = self.balance_of(&request.target);
        let credited = previous
            .checked_add(request.value)
            .ok_or(CallError::BalanceOverflow(request.target))?;

        let output = if self.contracts.contains(&request.target) {
            let invocation = Invocation {
                caller: request.from,
                value: request.value,
                balance: previous,
                args: Self::decode_args(&request.payload)?,
                gas_limit: None,
            };
            let result = self
                .contracts
                .call(&request.target, invocation)
                .map_err(|e| CallError::Reverted(e.to_string()))?;

            CallOutput {
                return_value: result.return_value,
                data: result
                    .return_value
                    .map(|v| v.to_be_bytes().to_vec())
                    .unwrap_or_default(),
                gas_used: result.gas_used,
            }
        } else {
            CallOutput::empty()
        };

        self.balances.insert(request.target, credited);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Compiler;

    fn owner(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    /// 1-of-2 wallet holding 1000 with transaction 0 confirmed
    fn ready_wallet(target: Address, value: Amount, payload: Vec<u8>) -> MultisigWallet {
        let mut wallet = MultisigWallet::new(vec![owner(1), owner(2)], 1).unwrap();
        wallet.deposit(owner(9), 1_000).unwrap();
        let tx_id = wallet.submit(owner(1), target, value, payload).unwrap();
        wallet.confirm(owner(1), tx_id).unwrap();
        wallet
    }

    #[test]
    fn test_decode_args() {
        assert_eq!(Chain::decode_args(&[]).unwrap(), Vec::<u64>::new());
        assert_eq!(
            Chain::decode_args(&Chain::encode_args(&[1, 42])).unwrap(),
            vec![1, 42]
        );
        assert!(matches!(
            Chain::decode_args(&[1, 2, 3]),
            Err(CallError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_plain_transfer_credits_target() {
        let mut chain = Chain::new();
        let mut wallet = ready_wallet(owner(5), 300, vec![]);

        wallet.execute(owner(2), 0, &mut chain).unwrap();
        assert_eq!(chain.balance_of(&owner(5)), 300);
        assert_eq!(wallet.balance(), 700);
    }

    #[test]
    fn test_payload_to_plain_account_is_accepted() {
        let mut chain = Chain::new();
        let mut wallet = ready_wallet(owner(5), 0, vec![0xff]);

        let output = wallet.execute(owner(1), 0, &mut chain).unwrap();
        assert_eq!(output, CallOutput::empty());
    }

    #[test]
    fn test_contract_call_sees_wallet_and_value() {
        let mut chain = Chain::new();
        let code = Compiler::new()
            .compile(
                "
            PUSH 0
            CALLER
            SSTORE
            CALLVALUE
            ARG 0
            ADD
            RETURN
        ",
            )
            .unwrap();
        let contract = chain.deploy(code, owner(1)).unwrap();

        let mut wallet = ready_wallet(contract, 10, Chain::encode_args(&[5]));
        let output = wallet.execute(owner(1), 0, &mut chain).unwrap();

        assert_eq!(output.return_value, Some(15));
        assert_eq!(output.data, 15u64.to_be_bytes().to_vec());
        assert_eq!(chain.storage_at(&contract, 0), wallet.address().to_word());
        assert_eq!(chain.balance_of(&contract), 10);
    }

    #[test]
    fn test_reverting_contract_leaves_no_trace() {
        let mut chain = Chain::new();
        let code = Compiler::new()
            .compile(
                "
            PUSH 0
            PUSH 7
            SSTORE
            REVERT
        ",
            )
            .unwrap();
        let contract = chain.deploy(code, owner(1)).unwrap();

        let mut wallet = ready_wallet(contract, 10, vec![]);
        let result = wallet.execute(owner(1), 0, &mut chain);

        assert!(matches!(
            result,
            Err(crate::multisig::MultisigError::TransactionFailed {
                reason: CallError::Reverted(_),
                ..
            })
        ));
        assert_eq!(chain.storage_at(&contract, 0), 0);
        assert_eq!(chain.balance_of(&contract), 0);
        assert_eq!(wallet.balance(), 1_000);
        assert!(!wallet.transaction(0).unwrap().is_executed());
    }

    #[test]
    fn test_malformed_payload_to_contract() {
        let mut chain = Chain::new();
        let code = Compiler::new().compile("HALT").unwrap();
        let contract = chain.deploy(code, owner(1)).unwrap();

        let mut wallet = ready_wallet(contract, 0, vec![1, 2, 3]);
        assert!(matches!(
            wallet.execute(owner(1), 0, &mut chain),
            Err(crate::multisig::MultisigError::TransactionFailed {
                reason: CallError::MalformedPayload(_),
                ..
            })
        ));
    }

    #[test]
    fn test_send_to_self_is_a_deposit() {
        let mut chain = Chain::new();
        let mut wallet = MultisigWallet::new(vec![owner(1)], 1).unwrap();
        wallet.deposit(owner(9), 500).unwrap();
        let tx_id = wallet.submit(owner(1), wallet.address(), 200, vec![]).unwrap();
        wallet.confirm(owner(1), tx_id).unwrap();

        wallet.execute(owner(1), tx_id, &mut chain).unwrap();
        assert_eq!(wallet.balance(), 500);
        assert_eq!(chain.balance_of(&wallet.address()), 0);
    }

    #[test]
    fn test_fund_overflow() {
        let mut chain = Chain::new();
        chain.fund(owner(1), Amount::MAX).unwrap();
        assert_eq!(
            chain.fund(owner(1), 1),
            Err(CallError::BalanceOverflow(owner(1)))
        );
    }
}
