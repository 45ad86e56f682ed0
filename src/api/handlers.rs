//! REST API handlers for wallet operations

use crate::api::websocket::EventBroadcaster;
use crate::core::{Address, Amount};
use crate::multisig::{EventLog, MultisigError, TransactionRecord, TxId, TxStatus};
use crate::storage::{Storage, WalletState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub wallet_state: Arc<RwLock<WalletState>>,
    pub storage: Arc<Storage>,
    pub broadcaster: Arc<EventBroadcaster>,
}

impl ApiState {
    /// Wrap loaded state, wiring the broadcaster into the wallet
    pub fn new(mut wallet_state: WalletState, storage: Storage) -> Self {
        let broadcaster = Arc::new(EventBroadcaster::new());
        wallet_state.wallet.subscribe(broadcaster.clone());

        Self {
            wallet_state: Arc::new(RwLock::new(wallet_state)),
            storage: Arc::new(storage),
            broadcaster,
        }
    }
}

type ApiFailure = (StatusCode, Json<ApiError>);
type ApiResult<T> = Result<Json<T>, ApiFailure>;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
    pub kind: String,
}

#[derive(Serialize)]
pub struct WalletInfo {
    pub address: Address,
    pub label: Option<String>,
    pub owners: Vec<Address>,
    pub required_confirmations: usize,
    pub balance: Amount,
    pub transaction_count: usize,
    pub pending_count: usize,
}

#[derive(Serialize)]
pub struct TransactionInfo {
    pub id: TxId,
    pub to: Address,
    pub value: Amount,
    pub data: String,
    pub executed: bool,
    pub confirmations: usize,
    pub confirmed_by: Vec<Address>,
    pub status: TxStatus,
    pub submitted_by: Address,
    pub submitted_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl TransactionInfo {
    fn new(tx: &TransactionRecord, required_confirmations: usize) -> Self {
        Self {
            id: tx.id(),
            to: tx.target(),
            value: tx.value(),
            data: format!("0x{}", hex::encode(tx.payload())),
            executed: tx.is_executed(),
            confirmations: tx.confirmation_count(),
            confirmed_by: tx.confirmations().copied().collect(),
            status: tx.status(required_confirmations),
            submitted_by: tx.submitted_by(),
            submitted_at: tx.submitted_at(),
            executed_at: tx.executed_at(),
        }
    }
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: Address,
    pub balance: Amount,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub tx_id: TxId,
}

#[derive(Serialize)]
pub struct ConfirmationResponse {
    pub tx_id: TxId,
    pub owner: Address,
    pub confirmed: bool,
    pub confirmations: usize,
}

#[derive(Serialize)]
pub struct ExecuteResponse {
    pub tx_id: TxId,
    pub return_value: Option<u64>,
    pub gas_used: u64,
    pub balance: Amount,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct DepositRequest {
    pub from: Address,
    pub amount: Amount,
}

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub caller: Address,
    pub to: Address,
    #[serde(default)]
    pub value: Amount,
    /// Hex call data, `0x` prefix optional
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Deserialize)]
pub struct CallerRequest {
    pub caller: Address,
}

// ============================================================================
// Error mapping
// ============================================================================

fn api_error(status: StatusCode, kind: &str, error: impl ToString) -> ApiFailure {
    (
        status,
        Json(ApiError {
            error: error.to_string(),
            kind: kind.to_string(),
        }),
    )
}

/// Map an engine error onto an HTTP status
pub fn multisig_error(e: MultisigError) -> (StatusCode, Json<ApiError>) {
    let status = match &e {
        MultisigError::NotOwner(_) => StatusCode::FORBIDDEN,
        MultisigError::TransactionNotExists(_) => StatusCode::NOT_FOUND,
        MultisigError::TransactionAlreadyExecuted(_)
        | MultisigError::TransactionAlreadyConfirmed { .. }
        | MultisigError::TransactionNotConfirmed { .. }
        | MultisigError::InsufficientConfirmations { .. } => StatusCode::CONFLICT,
        MultisigError::TransactionFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        MultisigError::InvalidOwner
        | MultisigError::ZeroAddress
        | MultisigError::DuplicateOwner(_)
        | MultisigError::InvalidRequiredConfirmations { .. }
        | MultisigError::BalanceOverflow { .. } => StatusCode::BAD_REQUEST,
    };
    api_error(status, e.kind(), e)
}

/// Apply a mutation all-or-nothing
///
/// The operation runs on a detached copy of the state. The copy is saved and
/// only then swapped in, after which its events go out to the live sinks. A
/// failed operation or save leaves the served state and the sinks untouched.
async fn transact<T>(
    state: &ApiState,
    operation: impl FnOnce(&mut WalletState) -> Result<T, ApiFailure>,
) -> Result<T, ApiFailure> {
    let mut guard = state.wallet_state.write().await;

    let mut staged = guard.detached();
    let events = EventLog::new();
    staged.wallet.subscribe(Arc::new(events.clone()));

    let output = operation(&mut staged)?;

    state.storage.save(&staged).map_err(|e| {
        log::error!("Failed to persist wallet state, change discarded: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "StorageError", e)
    })?;

    staged.wallet.adopt_sinks(&mut guard.wallet);
    *guard = staged;
    guard.wallet.publish(&events.events());

    Ok(output)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/wallet - Wallet overview
pub async fn get_wallet(State(state): State<ApiState>) -> Json<WalletInfo> {
    let guard = state.wallet_state.read().await;
    let wallet = &guard.wallet;

    Json(WalletInfo {
        address: wallet.address(),
        label: wallet.label().map(str::to_string),
        owners: wallet.owners().to_vec(),
        required_confirmations: wallet.required_confirmations(),
        balance: wallet.balance(),
        transaction_count: wallet.transaction_count(),
        pending_count: wallet.pending_transactions().len(),
    })
}

/// POST /api/wallet/deposit - Fund the wallet
pub async fn deposit(
    State(state): State<ApiState>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<BalanceResponse> {
    let response = transact(&state, |staged| {
        staged
            .wallet
            .deposit(req.from, req.amount)
            .map_err(multisig_error)?;
        Ok(BalanceResponse {
            address: staged.wallet.address(),
            balance: staged.wallet.balance(),
        })
    })
    .await?;

    Ok(Json(response))
}

/// GET /api/transactions - Whole ledger
pub async fn list_transactions(State(state): State<ApiState>) -> Json<Vec<TransactionInfo>> {
    let guard = state.wallet_state.read().await;
    let required = guard.wallet.required_confirmations();

    Json(
        guard
            .wallet
            .transactions()
            .iter()
            .map(|tx| TransactionInfo::new(tx, required))
            .collect(),
    )
}

/// GET /api/transactions/{id}
pub async fn get_transaction(
    State(state): State<ApiState>,
    Path(id): Path<TxId>,
) -> ApiResult<TransactionInfo> {
    let guard = state.wallet_state.read().await;
    let tx = guard.wallet.transaction(id).map_err(multisig_error)?;
    Ok(Json(TransactionInfo::new(
        tx,
        guard.wallet.required_confirmations(),
    )))
}

/// POST /api/transactions - Submit a transaction
pub async fn submit_transaction(
    State(state): State<ApiState>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<SubmitResponse> {
    let payload = match req.data.as_deref().map(str::trim) {
        None | Some("") | Some("0x") => Vec::new(),
        Some(data) => hex::decode(data.strip_prefix("0x").unwrap_or(data))
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, "InvalidPayload", e))?,
    };

    let tx_id = transact(&state, |staged| {
        staged
            .wallet
            .submit(req.caller, req.to, req.value, payload)
            .map_err(multisig_error)
    })
    .await?;

    Ok(Json(SubmitResponse { tx_id }))
}

/// POST /api/transactions/{id}/confirm
pub async fn confirm_transaction(
    State(state): State<ApiState>,
    Path(id): Path<TxId>,
    Json(req): Json<CallerRequest>,
) -> ApiResult<ConfirmationResponse> {
    let response = transact(&state, |staged| {
        staged.wallet.confirm(req.caller, id).map_err(multisig_error)?;
        confirmation_status(staged, id, req.caller)
    })
    .await?;

    Ok(Json(response))
}

/// POST /api/transactions/{id}/revoke
pub async fn revoke_confirmation(
    State(state): State<ApiState>,
    Path(id): Path<TxId>,
    Json(req): Json<CallerRequest>,
) -> ApiResult<ConfirmationResponse> {
    let response = transact(&state, |staged| {
        staged.wallet.revoke(req.caller, id).map_err(multisig_error)?;
        confirmation_status(staged, id, req.caller)
    })
    .await?;

    Ok(Json(response))
}

/// POST /api/transactions/{id}/execute
pub async fn execute_transaction(
    State(state): State<ApiState>,
    Path(id): Path<TxId>,
    Json(req): Json<CallerRequest>,
) -> ApiResult<ExecuteResponse> {
    let response = transact(&state, |staged| {
        let WalletState { wallet, chain } = staged;
        let output = wallet
            .execute(req.caller, id, chain)
            .map_err(multisig_error)?;

        Ok(ExecuteResponse {
            tx_id: id,
            return_value: output.return_value,
            gas_used: output.gas_used,
            balance: wallet.balance(),
        })
    })
    .await?;

    Ok(Json(response))
}

/// GET /api/transactions/{id}/confirmations/{owner}
pub async fn get_confirmation(
    State(state): State<ApiState>,
    Path((id, owner)): Path<(TxId, String)>,
) -> ApiResult<ConfirmationResponse> {
    let owner = Address::from_hex(&owner)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "InvalidAddress", e))?;
    let guard = state.wallet_state.read().await;
    Ok(Json(confirmation_status(&guard, id, owner)?))
}

fn confirmation_status(
    wallet_state: &WalletState,
    tx_id: TxId,
    owner: Address,
) -> Result<ConfirmationResponse, ApiFailure> {
    let wallet = &wallet_state.wallet;
    Ok(ConfirmationResponse {
        tx_id,
        owner,
        confirmed: wallet.is_confirmed_by(tx_id, &owner).map_err(multisig_error)?,
        confirmations: wallet.confirmation_count(tx_id).map_err(multisig_error)?,
    })
}
