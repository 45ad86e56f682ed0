//! Wallet Integration Tests
//!
//! End-to-end flows through the public API: a wallet driving transfers and
//! contract calls on the in-memory chain, persisted and reloaded from disk.

use quorum_wallet::config::{WalletConfig, DEFAULT_OWNERS, DEFAULT_REQUIRED_CONFIRMATIONS};
use quorum_wallet::contract::Compiler;
use quorum_wallet::core::{Address, Amount};
use quorum_wallet::host::{CallError, Chain};
use quorum_wallet::multisig::{EventLog, MultisigError, MultisigWallet, TxStatus, WalletEvent};
use quorum_wallet::storage::{Storage, WalletState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::sync::Arc;

const ONE_UNIT: Amount = 1_000_000_000_000_000_000;

/// Selector 1 stores its argument, selector 2 reverts, anything else returns slot 0
const TEST_CONTRACT: &str = "
    ARG 0
    PUSH 1
    EQ
    JUMPIF set_value
    ARG 0
    PUSH 2
    EQ
    JUMPIF fail
    PUSH 0
    SLOAD
    RETURN

:set_value
    PUSH 0
    ARG 1
    SSTORE
    ARG 1
    RETURN

:fail
    REVERT
";

fn default_owners() -> Vec<Address> {
    DEFAULT_OWNERS
        .iter()
        .map(|s| s.parse().unwrap())
        .collect()
}

fn deploy_test_contract(chain: &mut Chain) -> Address {
    let code = Compiler::new().compile(TEST_CONTRACT).unwrap();
    chain.deploy(code, Address::from_low_u64_be(1)).unwrap()
}

/// Default 2-of-3 wallet funded with 10 units
fn funded_wallet() -> MultisigWallet {
    let mut wallet = WalletConfig::default().build().unwrap();
    wallet
        .deposit(Address::from_low_u64_be(1000), 10 * ONE_UNIT)
        .unwrap();
    wallet
}

#[test]
fn test_default_deployment() {
    let wallet = WalletConfig::default().build().unwrap();

    assert_eq!(wallet.owners(), default_owners().as_slice());
    assert_eq!(
        wallet.required_confirmations(),
        DEFAULT_REQUIRED_CONFIRMATIONS
    );
    for owner in default_owners() {
        assert!(wallet.is_owner(&owner));
    }
    assert!(!wallet.is_owner(&Address::from_low_u64_be(1)));
    assert_eq!(wallet.owner_count(), 3);
    assert_eq!(wallet.description(), "2-of-3");
}

#[test]
fn test_transfer_lifecycle() {
    let owners = default_owners();
    let recipient = Address::from_low_u64_be(0xbeef);
    let mut chain = Chain::new();
    let mut wallet = funded_wallet();

    let log = EventLog::new();
    wallet.subscribe(Arc::new(log.clone()));

    let tx_id = wallet.submit(owners[0], recipient, ONE_UNIT, vec![]).unwrap();
    assert_eq!(tx_id, 0);
    assert_eq!(wallet.status(tx_id).unwrap(), TxStatus::Pending);

    wallet.confirm(owners[0], tx_id).unwrap();
    assert!(matches!(
        wallet.execute(owners[0], tx_id, &mut chain),
        Err(MultisigError::InsufficientConfirmations { have: 1, need: 2, .. })
    ));

    wallet.confirm(owners[1], tx_id).unwrap();
    assert_eq!(wallet.status(tx_id).unwrap(), TxStatus::Ready);

    // The third owner never confirmed but may still execute
    wallet.execute(owners[2], tx_id, &mut chain).unwrap();
    assert_eq!(wallet.status(tx_id).unwrap(), TxStatus::Executed);
    assert_eq!(chain.balance_of(&recipient), ONE_UNIT);
    assert_eq!(wallet.balance(), 9 * ONE_UNIT);

    let kinds: Vec<_> = log.events().iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "TransactionSubmitted",
            "TransactionConfirmed",
            "TransactionConfirmed",
            "TransactionExecuted",
        ]
    );

    assert_eq!(
        wallet.execute(owners[0], tx_id, &mut chain),
        Err(MultisigError::TransactionAlreadyExecuted(tx_id))
    );
}

#[test]
fn test_contract_set_value() {
    let owners = default_owners();
    let mut chain = Chain::new();
    let contract = deploy_test_contract(&mut chain);
    let mut wallet = funded_wallet();

    let tx_id = wallet
        .submit(owners[0], contract, 0, Chain::encode_args(&[1, 42]))
        .unwrap();
    wallet.confirm(owners[0], tx_id).unwrap();
    wallet.confirm(owners[1], tx_id).unwrap();

    let output = wallet.execute(owners[0], tx_id, &mut chain).unwrap();
    assert_eq!(output.return_value, Some(42));
    assert_eq!(chain.storage_at(&contract, 0), 42);
    assert!(wallet.transaction(tx_id).unwrap().is_executed());
}

#[test]
fn test_contract_revert_rolls_back() {
    let owners = default_owners();
    let mut chain = Chain::new();
    let contract = deploy_test_contract(&mut chain);
    let mut wallet = funded_wallet();

    let log = EventLog::new();
    wallet.subscribe(Arc::new(log.clone()));

    let tx_id = wallet
        .submit(owners[0], contract, ONE_UNIT, Chain::encode_args(&[2]))
        .unwrap();
    wallet.confirm(owners[0], tx_id).unwrap();
    wallet.confirm(owners[1], tx_id).unwrap();
    log.clear();

    let result = wallet.execute(owners[0], tx_id, &mut chain);
    assert!(matches!(
        result,
        Err(MultisigError::TransactionFailed {
            reason: CallError::Reverted(_),
            ..
        })
    ));

    // Nothing changed and nothing was announced
    assert!(!wallet.transaction(tx_id).unwrap().is_executed());
    assert_eq!(wallet.confirmation_count(tx_id).unwrap(), 2);
    assert_eq!(wallet.balance(), 10 * ONE_UNIT);
    assert_eq!(chain.balance_of(&contract), 0);
    assert!(log.is_empty());

    // The same record stays executable once the cause goes away
    let retry = wallet
        .submit(owners[0], contract, 0, Chain::encode_args(&[1, 7]))
        .unwrap();
    wallet.confirm(owners[1], retry).unwrap();
    wallet.confirm(owners[2], retry).unwrap();
    wallet.execute(owners[1], retry, &mut chain).unwrap();
    assert_eq!(chain.storage_at(&contract, 0), 7);
    assert_eq!(wallet.status(tx_id).unwrap(), TxStatus::Ready);
}

#[test]
fn test_randomized_quorum_invariants() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..20 {
        let owner_count = rng.gen_range(1..=6u64);
        let owners: Vec<Address> = (1..=owner_count).map(Address::from_low_u64_be).collect();
        let required = rng.gen_range(1..=owners.len());

        let mut wallet = MultisigWallet::new(owners.clone(), required).unwrap();
        wallet.deposit(Address::from_low_u64_be(1000), 100).unwrap();
        let mut chain = Chain::new();

        let tx_id = wallet
            .submit(owners[0], Address::from_low_u64_be(500), 1, vec![])
            .unwrap();
        let mut confirmed = BTreeSet::new();

        for _ in 0..40 {
            let who = owners[rng.gen_range(0..owners.len())];
            match rng.gen_range(0..3) {
                0 => {
                    let result = wallet.confirm(who, tx_id);
                    if confirmed.insert(who) {
                        assert_eq!(result, Ok(()), "round {}", round);
                    } else {
                        assert!(matches!(
                            result,
                            Err(MultisigError::TransactionAlreadyConfirmed { .. })
                        ));
                    }
                }
                1 => {
                    let result = wallet.revoke(who, tx_id);
                    if confirmed.remove(&who) {
                        assert_eq!(result, Ok(()), "round {}", round);
                    } else {
                        assert!(matches!(
                            result,
                            Err(MultisigError::TransactionNotConfirmed { .. })
                        ));
                    }
                }
                _ => {
                    let result = wallet.execute(who, tx_id, &mut chain);
                    if confirmed.len() >= required {
                        assert!(result.is_ok(), "round {}: {:?}", round, result);
                        break;
                    }
                    assert!(matches!(
                        result,
                        Err(MultisigError::InsufficientConfirmations { .. })
                    ));
                }
            }

            // Cached count always matches the confirming set
            assert_eq!(wallet.confirmation_count(tx_id).unwrap(), confirmed.len());
            for owner in &owners {
                assert_eq!(
                    wallet.is_confirmed_by(tx_id, owner).unwrap(),
                    confirmed.contains(owner)
                );
            }
        }

        let executed = wallet.transaction(tx_id).unwrap().is_executed();
        if executed {
            assert!(wallet.confirmation_count(tx_id).unwrap() >= required);
            assert_eq!(wallet.balance(), 99);
        } else {
            assert_eq!(wallet.balance(), 100);
        }
    }
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let owners = default_owners();
    let recipient = Address::from_low_u64_be(0xbeef);

    let address = {
        let storage = Storage::open(dir.path()).unwrap();
        let mut state = WalletState::new(funded_wallet());
        let contract = deploy_test_contract(&mut state.chain);

        let paid = state
            .wallet
            .submit(owners[0], recipient, ONE_UNIT, vec![])
            .unwrap();
        state.wallet.confirm(owners[0], paid).unwrap();
        state.wallet.confirm(owners[2], paid).unwrap();
        let WalletState { wallet, chain } = &mut state;
        wallet.execute(owners[1], paid, chain).unwrap();

        let call = state
            .wallet
            .submit(owners[1], contract, 0, Chain::encode_args(&[1, 42]))
            .unwrap();
        state.wallet.confirm(owners[1], call).unwrap();

        storage.save(&state).unwrap();
        state.wallet.address()
    };

    let storage = Storage::open(dir.path()).unwrap();
    let mut state = storage.load().unwrap();

    assert_eq!(state.wallet.address(), address);
    assert_eq!(state.wallet.transaction_count(), 2);
    assert_eq!(state.wallet.status(0).unwrap(), TxStatus::Executed);
    assert_eq!(state.wallet.status(1).unwrap(), TxStatus::Pending);
    assert_eq!(state.chain.balance_of(&recipient), ONE_UNIT);

    // Work continues where it left off
    let log = EventLog::new();
    state.wallet.subscribe(Arc::new(log.clone()));
    state.wallet.confirm(owners[0], 1).unwrap();
    let WalletState { wallet, chain } = &mut state;
    wallet.execute(owners[0], 1, chain).unwrap();

    let contract = state.chain.contracts().list()[0];
    assert_eq!(state.chain.storage_at(&contract, 0), 42);
    assert_eq!(
        log.events().last(),
        Some(&WalletEvent::Executed { tx_id: 1 })
    );
}
