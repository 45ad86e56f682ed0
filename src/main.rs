//! quorum-wallet CLI Application
//!
//! A command-line interface for a multi-signature wallet.

use clap::{Parser, Subcommand};
use quorum_wallet::api::{create_router, ApiState};
use quorum_wallet::cli::{self, AppState, InitOptions};
use quorum_wallet::config::ApiConfig;
use quorum_wallet::core::{Address, Amount};
use quorum_wallet::multisig::TxId;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "quorum-wallet")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "An M-of-N multi-signature wallet", long_about = None)]
struct Cli {
    /// Data directory for wallet storage
    #[arg(short, long, default_value = ".quorum_wallet")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new wallet
    Init {
        /// JSON wallet configuration (owners, required_confirmations, label)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Owner address (repeatable)
        #[arg(short, long = "owner")]
        owners: Vec<Address>,

        /// Number of confirmations required to execute
        #[arg(short, long)]
        threshold: Option<usize>,

        /// Wallet label
        #[arg(short, long)]
        label: Option<String>,

        /// Overwrite an existing wallet
        #[arg(long)]
        force: bool,
    },

    /// Display wallet information
    Info,

    /// Fund the wallet
    Deposit {
        /// Sender address
        #[arg(short, long)]
        from: Address,

        /// Amount to deposit
        #[arg(short, long)]
        amount: Amount,
    },

    /// Submit a transaction
    Submit {
        /// Submitting owner
        #[arg(short, long)]
        caller: Address,

        /// Destination address
        #[arg(short, long)]
        to: Address,

        /// Amount to send
        #[arg(short, long, default_value = "0")]
        value: Amount,

        /// Hex call data
        #[arg(long)]
        data: Option<String>,
    },

    /// Confirm a transaction
    Confirm {
        #[arg(short, long)]
        caller: Address,

        #[arg(short, long)]
        tx: TxId,
    },

    /// Revoke a confirmation
    Revoke {
        #[arg(short, long)]
        caller: Address,

        #[arg(short, long)]
        tx: TxId,
    },

    /// Execute a confirmed transaction
    Execute {
        #[arg(short, long)]
        caller: Address,

        #[arg(short, long)]
        tx: TxId,
    },

    /// Transaction queries
    Tx {
        #[command(subcommand)]
        action: TxCommands,
    },

    /// Contract operations
    Contract {
        #[command(subcommand)]
        action: ContractCommands,
    },

    /// Balance of an address
    Balance {
        #[arg(short, long)]
        address: Address,
    },

    /// REST API server
    Api {
        #[command(subcommand)]
        action: ApiCommands,
    },

    /// Saved state backups
    Backup {
        #[command(subcommand)]
        action: BackupCommands,
    },
}

#[derive(Subcommand)]
enum TxCommands {
    /// Show a transaction
    Show {
        #[arg(short, long)]
        id: TxId,
    },

    /// List transactions
    List {
        /// Only transactions not yet executed
        #[arg(long)]
        pending: bool,
    },
}

#[derive(Subcommand)]
enum ContractCommands {
    /// Deploy a contract from assembly source
    Deploy {
        /// Contract source file (.asm)
        #[arg(short, long)]
        file: PathBuf,

        /// Deployer address
        #[arg(long, default_value = "0x0000000000000000000000000000000000000001")]
        deployer: Address,
    },

    /// Show contract info
    Info {
        #[arg(short, long)]
        address: Address,
    },

    /// List all contracts
    List,
}

#[derive(Subcommand)]
enum BackupCommands {
    /// List backups of the saved state
    List,

    /// Replace the saved state with a backup
    Restore {
        /// Backup index, 0 is the most recent
        #[arg(short, long)]
        index: usize,
    },
}

#[derive(Subcommand)]
enum ApiCommands {
    /// Start the REST API server
    Start {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        // Init creates the state the other commands load
        Commands::Init {
            config,
            owners,
            threshold,
            label,
            force,
        } => {
            let options = InitOptions {
                config,
                owners,
                threshold,
                label,
                force,
            };
            cli::cmd_init(&cli.data_dir, &options)
        }
        Commands::Api { action } => run_api_command(&action, &cli.data_dir),
        // Works even when the current state no longer loads
        Commands::Backup { action } => match action {
            BackupCommands::List => cli::cmd_backup_list(&cli.data_dir),
            BackupCommands::Restore { index } => cli::cmd_backup_restore(&cli.data_dir, index),
        },
        command => run_wallet_command(command, cli.data_dir),
    }
}

fn run_wallet_command(command: Commands, data_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut state = AppState::load(data_dir)?;

    match command {
        Commands::Info => cli::cmd_info(&state)?,

        Commands::Deposit { from, amount } => cli::cmd_deposit(&mut state, from, amount)?,

        Commands::Submit {
            caller,
            to,
            value,
            data,
        } => cli::cmd_submit(&mut state, caller, to, value, data.as_deref())?,

        Commands::Confirm { caller, tx } => cli::cmd_confirm(&mut state, caller, tx)?,

        Commands::Revoke { caller, tx } => cli::cmd_revoke(&mut state, caller, tx)?,

        Commands::Execute { caller, tx } => cli::cmd_execute(&mut state, caller, tx)?,

        Commands::Tx { action } => match action {
            TxCommands::Show { id } => cli::cmd_tx_show(&state, id)?,
            TxCommands::List { pending } => cli::cmd_tx_list(&state, pending)?,
        },

        Commands::Contract { action } => match action {
            ContractCommands::Deploy { file, deployer } => {
                cli::cmd_contract_deploy(&mut state, &file, deployer)?
            }
            ContractCommands::Info { address } => cli::cmd_contract_info(&state, address)?,
            ContractCommands::List => cli::cmd_contract_list(&state)?,
        },

        Commands::Balance { address } => cli::cmd_balance(&state, address)?,

        Commands::Init { .. } | Commands::Api { .. } | Commands::Backup { .. } => {
            return Err("command does not operate on a loaded wallet".into())
        }
    }

    Ok(())
}

fn run_api_command(action: &ApiCommands, data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        match action {
            ApiCommands::Start { port } => {
                let AppState {
                    wallet_state,
                    storage,
                    ..
                } = AppState::load(data_dir.to_path_buf())?;
                println!("📂 Loaded wallet {}", wallet_state.wallet.address());

                let app = create_router(ApiState::new(wallet_state, storage));

                let config = ApiConfig {
                    port: *port,
                    ..Default::default()
                };
                let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
                println!("🚀 REST API server starting on http://localhost:{}", port);
                println!("\n📚 Endpoints:");
                println!("   GET  /api/wallet                              - Wallet info");
                println!("   POST /api/wallet/deposit                      - Fund the wallet");
                println!("   GET  /api/transactions                        - List transactions");
                println!("   POST /api/transactions                        - Submit transaction");
                println!("   GET  /api/transactions/{{id}}                   - Get transaction");
                println!("   POST /api/transactions/{{id}}/confirm           - Confirm");
                println!("   POST /api/transactions/{{id}}/revoke            - Revoke");
                println!("   POST /api/transactions/{{id}}/execute           - Execute");
                println!("   GET  /api/transactions/{{id}}/confirmations/{{owner}}");
                println!("   GET  /ws                                      - Event stream");

                axum::serve(listener, app).await?;
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
