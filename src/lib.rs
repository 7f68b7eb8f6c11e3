pub mod api;
pub mod core;
pub mod ingest;
pub mod ledger;
pub mod preflight;
pub mod storage;
pub mod store;
pub mod window;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::core::CoreSubmitter;
use crate::ledger::close::LedgerHead;
use crate::preflight::PreflightEngine;
use crate::storage::ReadTxFactory;
use crate::store::events::EventStore;
use crate::store::transactions::TransactionStore;

/// Shared server state: the two in-memory stores written by the single
/// ingestion task and read by concurrent RPC handlers, the collaborator
/// seams, and the handler configuration knobs.
pub struct AppState {
    pub transactions: TransactionStore,
    pub events: EventStore,
    /// Newest ledger whose data is visible in every store.
    pub head: RwLock<Option<LedgerHead>>,
    pub storage: Arc<dyn ReadTxFactory>,
    pub core: Arc<dyn CoreSubmitter>,
    pub preflight: Arc<dyn PreflightEngine>,
    pub network_passphrase: String,
    pub friendbot_url: Option<String>,
    pub default_events_limit: u32,
    pub max_events_limit: u32,
    pub max_healthy_latency: Duration,
}

/// Application-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XDR error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ledger {0} not found")]
    LedgerNotFound(u32),

    #[error("ledger not contiguous: expected {expected}, received {received}")]
    NotContiguous { expected: u32, received: u32 },

    #[error("bucket index {index} out of range for window of length {len}")]
    OutOfRange { index: u32, len: u32 },

    #[error("invalid cursor: {0}")]
    BadCursor(String),

    #[error("start is before the oldest ledger: start {start}, oldest {oldest}")]
    StartBeforeOldest { start: u32, oldest: u32 },

    #[error("start is after the newest ledger: start {start}, newest {newest}")]
    StartAfterNewest { start: u32, newest: u32 },

    #[error("transaction submission failed: {0}")]
    CoreSubmission(String),

    #[error("transaction simulation is not available")]
    PreflightUnavailable,

    #[error("internal error: {0}")]
    Internal(String),
}
