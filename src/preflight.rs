use async_trait::async_trait;
use stellar_xdr::curr::{MuxedAccount, Operation};

use crate::storage::ReadTx;
use crate::Error;

/// Outcome of simulating one host-function invocation. All XDR values
/// are carried pre-encoded so the engine seam stays transport-free.
#[derive(Debug, Clone, Default)]
pub struct PreflightHostResult {
    /// Base64 `ScVal` return value.
    pub xdr: String,
    /// Base64 `SorobanAuthorizationEntry` values.
    pub auth: Vec<String>,
    /// Base64 `DiagnosticEvent` values.
    pub events: Vec<String>,
    /// Base64 `LedgerFootprint`.
    pub footprint: String,
}

/// Resource and auth estimate produced by simulating a transaction
/// against current ledger state.
#[derive(Debug, Clone, Default)]
pub struct PreflightResult {
    /// Host-side failure, reported to the client rather than as a
    /// server error.
    pub error: Option<String>,
    pub results: Vec<PreflightHostResult>,
    pub cpu_instructions: u64,
    pub memory_bytes: u64,
    pub min_resource_fee: u64,
}

/// Simulation engine seam. The real engine runs the soroban host
/// against a [`ReadTx`] snapshot; this crate only consumes its output.
#[async_trait]
pub trait PreflightEngine: Send + Sync {
    async fn preflight(
        &self,
        read_tx: &dyn ReadTx,
        source_account: &MuxedAccount,
        operation: &Operation,
    ) -> Result<PreflightResult, Error>;
}

/// Engine used when no host VM is wired in; every simulation reports
/// cleanly that the capability is unavailable.
pub struct DisabledPreflight;

#[async_trait]
impl PreflightEngine for DisabledPreflight {
    async fn preflight(
        &self,
        _read_tx: &dyn ReadTx,
        _source_account: &MuxedAccount,
        _operation: &Operation,
    ) -> Result<PreflightResult, Error> {
        Err(Error::PreflightUnavailable)
    }
}
