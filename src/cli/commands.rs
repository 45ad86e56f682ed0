//! CLI commands for the wallet
//!
//! Implements all command handlers for the CLI interface. Every mutating
//! command loads the saved state, applies one operation and saves it again.

use crate::config::{WalletConfig, DEFAULT_REQUIRED_CONFIRMATIONS};
use crate::contract::{disassemble, Compiler};
use crate::core::{Address, Amount};
use crate::multisig::{LogSink, TransactionRecord, TxId};
use crate::storage::{Storage, StorageConfig, WalletState};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub wallet_state: WalletState,
    pub storage: Storage,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load the wallet saved in `data_dir`
    pub fn load(data_dir: PathBuf) -> CliResult<Self> {
        let storage = open_storage(&data_dir)?;
        if !storage.exists() {
            return Err(format!(
                "No wallet found in {:?}. Run `quorum-wallet init` first.",
                data_dir
            )
            .into());
        }

        let mut wallet_state = storage.load()?;
        wallet_state.wallet.subscribe(Arc::new(LogSink));

        Ok(Self {
            wallet_state,
            storage,
            data_dir,
        })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.wallet_state)?;
        Ok(())
    }
}

fn open_storage(data_dir: &Path) -> CliResult<Storage> {
    let storage_config = StorageConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    };
    Ok(Storage::new(storage_config)?)
}

/// How `init` learns the owners and threshold
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub config: Option<PathBuf>,
    pub owners: Vec<Address>,
    pub threshold: Option<usize>,
    pub label: Option<String>,
    pub force: bool,
}

impl InitOptions {
    /// Config file first, then explicit flags, then the defaults
    fn wallet_config(&self) -> CliResult<WalletConfig> {
        let mut config = match &self.config {
            Some(path) => WalletConfig::load(path)?,
            None if self.owners.is_empty() => WalletConfig::default(),
            None => WalletConfig::new(
                self.owners.clone(),
                self.owners.len().min(DEFAULT_REQUIRED_CONFIRMATIONS),
            ),
        };

        if let Some(threshold) = self.threshold {
            config.required_confirmations = threshold;
        }
        if self.label.is_some() {
            config.label = self.label.clone();
        }
        Ok(config)
    }
}

/// Initialize a new wallet
pub fn cmd_init(data_dir: &Path, options: &InitOptions) -> CliResult<()> {
    let storage = open_storage(data_dir)?;

    if storage.exists() && !options.force {
        println!("⚠️  Wallet already exists at {:?}", data_dir);
        println!("   Use --force to reinitialize (this will delete existing data)");
        return Ok(());
    }

    let wallet = options.wallet_config()?.build()?;
    let state = WalletState::new(wallet);
    storage.save(&state)?;

    let wallet = &state.wallet;
    println!("✅ Multisig wallet initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   🔐 Address: {}", wallet.address());
    println!("   👥 Policy: {}", wallet.description());
    for (i, owner) in wallet.owners().iter().enumerate() {
        println!("      {}. {}", i + 1, owner);
    }

    Ok(())
}

/// Show wallet overview
pub fn cmd_info(state: &AppState) -> CliResult<()> {
    let wallet = &state.wallet_state.wallet;

    println!("🔐 Multisig Wallet");
    if let Some(label) = wallet.label() {
        println!("   Label: {}", label);
    }
    println!("   Address: {}", wallet.address());
    println!("   Policy: {}", wallet.description());
    println!("   Balance: {}", wallet.balance());
    println!("   Transactions: {}", wallet.transaction_count());
    println!("   Pending: {}", wallet.pending_transactions().len());
    println!("   Created: {}", wallet.created_at().format("%Y-%m-%d %H:%M:%S UTC"));
    println!("\n👥 Owners:");
    for owner in wallet.owners() {
        println!("   {}", owner);
    }

    Ok(())
}

/// Fund the wallet
pub fn cmd_deposit(state: &mut AppState, from: Address, amount: Amount) -> CliResult<()> {
    state.wallet_state.wallet.deposit(from, amount)?;
    state.save()?;

    println!("💰 Deposited {} from {}", amount, from);
    println!("   New balance: {}", state.wallet_state.wallet.balance());
    Ok(())
}

/// Parse hex call data; empty or missing means a plain transfer
pub fn parse_payload(data: Option<&str>) -> CliResult<Vec<u8>> {
    match data.map(str::trim) {
        None | Some("") => Ok(Vec::new()),
        Some(hex_data) => {
            let digits = hex_data.strip_prefix("0x").unwrap_or(hex_data);
            Ok(hex::decode(digits)?)
        }
    }
}

/// Submit a new transaction
pub fn cmd_submit(
    state: &mut AppState,
    caller: Address,
    to: Address,
    value: Amount,
    data: Option<&str>,
) -> CliResult<()> {
    let payload = parse_payload(data)?;
    let tx_id = state.wallet_state.wallet.submit(caller, to, value, payload)?;
    state.save()?;

    println!("📝 Transaction {} submitted", tx_id);
    println!("   To: {}", to);
    println!("   Value: {}", value);
    println!(
        "   Needs {} confirmation(s) before execution",
        state.wallet_state.wallet.required_confirmations()
    );
    Ok(())
}

/// Confirm a transaction
pub fn cmd_confirm(state: &mut AppState, caller: Address, tx_id: TxId) -> CliResult<()> {
    state.wallet_state.wallet.confirm(caller, tx_id)?;
    state.save()?;

    let wallet = &state.wallet_state.wallet;
    println!(
        "✍️  {} confirmed transaction {} ({}/{})",
        caller,
        tx_id,
        wallet.confirmation_count(tx_id)?,
        wallet.required_confirmations()
    );
    Ok(())
}

/// Revoke a confirmation
pub fn cmd_revoke(state: &mut AppState, caller: Address, tx_id: TxId) -> CliResult<()> {
    state.wallet_state.wallet.revoke(caller, tx_id)?;
    state.save()?;

    let wallet = &state.wallet_state.wallet;
    println!(
        "↩️  {} revoked confirmation of transaction {} ({}/{})",
        caller,
        tx_id,
        wallet.confirmation_count(tx_id)?,
        wallet.required_confirmations()
    );
    Ok(())
}

/// Execute a confirmed transaction
pub fn cmd_execute(state: &mut AppState, caller: Address, tx_id: TxId) -> CliResult<()> {
    let WalletState { wallet, chain } = &mut state.wallet_state;
    let output = wallet.execute(caller, tx_id, chain)?;
    state.save()?;

    println!("🚀 Transaction {} executed", tx_id);
    if let Some(value) = output.return_value {
        println!("   Return value: {}", value);
    }
    if output.gas_used > 0 {
        println!("   Gas used: {}", output.gas_used);
    }
    println!("   Wallet balance: {}", state.wallet_state.wallet.balance());
    Ok(())
}

fn print_transaction(tx: &TransactionRecord, required: usize) {
    println!("📄 Transaction {}", tx.id());
    println!("   Status: {:?}", tx.status(required));
    println!("   To: {}", tx.target());
    println!("   Value: {}", tx.value());
    if !tx.is_plain_transfer() {
        println!("   Data: 0x{}", hex::encode(tx.payload()));
    }
    println!("   Submitted by: {}", tx.submitted_by());
    println!("   Submitted at: {}", tx.submitted_at().format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(at) = tx.executed_at() {
        println!("   Executed at: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("   Confirmations: {}/{}", tx.confirmation_count(), required);
    for owner in tx.confirmations() {
        println!("      ✓ {}", owner);
    }
}

/// Show one transaction
pub fn cmd_tx_show(state: &AppState, tx_id: TxId) -> CliResult<()> {
    let wallet = &state.wallet_state.wallet;
    print_transaction(wallet.transaction(tx_id)?, wallet.required_confirmations());
    Ok(())
}

/// List transactions
pub fn cmd_tx_list(state: &AppState, pending_only: bool) -> CliResult<()> {
    let wallet = &state.wallet_state.wallet;
    let required = wallet.required_confirmations();
    let transactions: Vec<&TransactionRecord> = if pending_only {
        wallet.pending_transactions()
    } else {
        wallet.transactions().iter().collect()
    };

    if transactions.is_empty() {
        println!("📭 No transactions");
        return Ok(());
    }

    println!("📋 Transactions ({}):", transactions.len());
    for tx in transactions {
        println!(
            "   #{:<4} {:<9} {} -> {} [{}/{}]",
            tx.id(),
            format!("{:?}", tx.status(required)),
            tx.value(),
            tx.target(),
            tx.confirmation_count(),
            required
        );
    }
    Ok(())
}

/// Compile and deploy a contract
pub fn cmd_contract_deploy(state: &mut AppState, file: &Path, deployer: Address) -> CliResult<()> {
    let source = fs::read_to_string(file)?;
    let bytecode = Compiler::new().compile(&source)?;
    let size = bytecode.len();

    let address = state.wallet_state.chain.deploy(bytecode, deployer)?;
    state.save()?;

    println!("📜 Contract deployed");
    println!("   Address: {}", address);
    println!("   Code size: {} bytes", size);
    Ok(())
}

/// Show a deployed contract
pub fn cmd_contract_info(state: &AppState, address: Address) -> CliResult<()> {
    let chain = &state.wallet_state.chain;
    let contract = chain
        .contract(&address)
        .ok_or_else(|| format!("Contract not found: {}", address))?;

    println!("📜 Contract {}", contract.address);
    println!("   Deployer: {}", contract.deployer);
    println!("   Deployed: {}", contract.deployed_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("   Balance: {}", chain.balance_of(&address));
    println!("   Storage slots: {}", contract.storage.len());
    for (key, value) in &contract.storage {
        println!("      [{}] = {}", key, value);
    }
    println!("\n{}", disassemble(&contract.code));
    Ok(())
}

/// List deployed contracts
pub fn cmd_contract_list(state: &AppState) -> CliResult<()> {
    let contracts = state.wallet_state.chain.contracts().list();
    if contracts.is_empty() {
        println!("📭 No contracts deployed");
        return Ok(());
    }

    println!("📜 Contracts ({}):", contracts.len());
    for address in contracts {
        println!("   {}", address);
    }
    Ok(())
}

/// Balance of any account; the wallet's own address reports the wallet balance
pub fn cmd_balance(state: &AppState, address: Address) -> CliResult<()> {
    let wallet = &state.wallet_state.wallet;
    let balance = if address == wallet.address() {
        wallet.balance()
    } else {
        state.wallet_state.chain.balance_of(&address)
    };

    println!("💰 {}: {}", address, balance);
    Ok(())
}

/// List the state file and its backups
pub fn cmd_backup_list(data_dir: &Path) -> CliResult<()> {
    let storage = open_storage(data_dir)?;
    let stats = storage.stats()?;

    println!("💾 Storage: {:?}", stats.data_dir);
    println!("   State file: {} bytes", stats.file_size);

    let backups = storage.list_backups();
    if backups.is_empty() {
        println!("   No backups");
        return Ok(());
    }

    println!("   Backups ({}):", stats.backup_count);
    for index in backups {
        match storage.restore_backup(index) {
            Ok(state) => println!(
                "      [{}] balance {} / {} transaction(s)",
                index,
                state.wallet.balance(),
                state.wallet.transaction_count()
            ),
            Err(e) => println!("      [{}] unreadable: {}", index, e),
        }
    }
    Ok(())
}

/// Make a backup the current state; the replaced state becomes backup 0
pub fn cmd_backup_restore(data_dir: &Path, index: usize) -> CliResult<()> {
    let storage = open_storage(data_dir)?;
    let state = storage.restore_backup(index)?;
    storage.save(&state)?;

    println!("♻️  Restored backup {}", index);
    println!("   Balance: {}", state.wallet.balance());
    println!("   Transactions: {}", state.wallet.transaction_count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn init_options() -> InitOptions {
        InitOptions {
            owners: vec![owner(1), owner(2), owner(3)],
            threshold: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_payload() {
        assert!(parse_payload(None).unwrap().is_empty());
        assert!(parse_payload(Some("  ")).unwrap().is_empty());
        assert_eq!(parse_payload(Some("0xdead")).unwrap(), vec![0xde, 0xad]);
        assert!(parse_payload(Some("0xzz")).is_err());
    }

    #[test]
    fn test_init_requires_state() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppState::load(dir.path().to_path_buf()).is_err());

        cmd_init(dir.path(), &init_options()).unwrap();
        let state = AppState::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(state.wallet_state.wallet.description(), "2-of-3");
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path(), &init_options()).unwrap();

        let other = InitOptions {
            owners: vec![owner(7)],
            threshold: Some(1),
            ..Default::default()
        };
        cmd_init(dir.path(), &other).unwrap();
        let state = AppState::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(state.wallet_state.wallet.owners().len(), 3);

        cmd_init(dir.path(), &InitOptions { force: true, ..other }).unwrap();
        let state = AppState::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(state.wallet_state.wallet.owners(), &[owner(7)]);
    }

    #[test]
    fn test_command_flow_persists() {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path(), &init_options()).unwrap();

        let mut state = AppState::load(dir.path().to_path_buf()).unwrap();
        cmd_deposit(&mut state, owner(9), 1_000).unwrap();
        cmd_submit(&mut state, owner(1), owner(5), 250, None).unwrap();
        cmd_confirm(&mut state, owner(1), 0).unwrap();
        cmd_confirm(&mut state, owner(2), 0).unwrap();
        cmd_revoke(&mut state, owner(2), 0).unwrap();
        assert!(cmd_execute(&mut state, owner(1), 0).is_err());
        cmd_confirm(&mut state, owner(3), 0).unwrap();
        cmd_execute(&mut state, owner(2), 0).unwrap();

        // Reload from disk
        let state = AppState::load(dir.path().to_path_buf()).unwrap();
        let wallet = &state.wallet_state.wallet;
        assert_eq!(wallet.balance(), 750);
        assert!(wallet.transaction(0).unwrap().is_executed());
        assert_eq!(state.wallet_state.chain.balance_of(&owner(5)), 250);
        cmd_tx_list(&state, false).unwrap();
        cmd_tx_show(&state, 0).unwrap();
        cmd_balance(&state, owner(5)).unwrap();
    }

    #[test]
    fn test_contract_commands() {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path(), &init_options()).unwrap();
        let mut state = AppState::load(dir.path().to_path_buf()).unwrap();

        let source = dir.path().join("store.asm");
        fs::write(&source, "PUSH 1\nARG 0\nSSTORE\nHALT\n").unwrap();
        cmd_contract_deploy(&mut state, &source, owner(1)).unwrap();

        let address = state.wallet_state.chain.contracts().list()[0];
        cmd_contract_info(&state, address).unwrap();
        cmd_contract_list(&state).unwrap();
        assert!(cmd_contract_info(&state, owner(42)).is_err());
    }

    #[test]
    fn test_backup_restore() {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path(), &init_options()).unwrap();

        let mut state = AppState::load(dir.path().to_path_buf()).unwrap();
        cmd_deposit(&mut state, owner(9), 100).unwrap();
        cmd_deposit(&mut state, owner(9), 50).unwrap();
        cmd_backup_list(dir.path()).unwrap();

        // Backup 0 is the state before the last deposit
        cmd_backup_restore(dir.path(), 0).unwrap();
        let state = AppState::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(state.wallet_state.wallet.balance(), 100);

        let storage = Storage::open(dir.path()).unwrap();
        assert_eq!(storage.restore_backup(0).unwrap().wallet.balance(), 150);
        assert!(cmd_backup_restore(dir.path(), 4).is_err());
    }
}
