//! REST API module
//!
//! HTTP access to a single wallet.
//!
//! # Endpoints
//!
//! ## Wallet
//! - `GET /api/wallet` - Address, owners, threshold and balance
//! - `POST /api/wallet/deposit` - Fund the wallet
//!
//! ## Transactions
//! - `GET /api/transactions` - List the ledger
//! - `POST /api/transactions` - Submit a transaction
//! - `GET /api/transactions/{id}` - Get transaction
//! - `POST /api/transactions/{id}/confirm` - Confirm as an owner
//! - `POST /api/transactions/{id}/revoke` - Withdraw a confirmation
//! - `POST /api/transactions/{id}/execute` - Execute once confirmed
//! - `GET /api/transactions/{id}/confirmations/{owner}` - Confirmation status
//!
//! ## WebSocket
//! - `GET /ws` - Real-time wallet events

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::ApiState;
pub use routes::create_router;
pub use websocket::EventBroadcaster;
