use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use stellar_xdr::curr::{Limits, ReadXdr, Transaction, TransactionEnvelope};

use super::{parse_params, to_value};
use crate::api::error::RpcError;
use crate::api::types::{
    SendTransactionParams, SendTransactionResponse, SimulateCost, SimulateHostFunctionResult,
    SimulateTransactionParams, SimulateTransactionResponse,
};
use crate::ledger::close::{envelope_hash, network_id, upgrade_v0};
use crate::AppState;

fn decode_envelope(raw: &str) -> Result<TransactionEnvelope, RpcError> {
    BASE64
        .decode(raw)
        .ok()
        .and_then(|bytes| TransactionEnvelope::from_xdr(bytes, Limits::none()).ok())
        .ok_or_else(|| RpcError::invalid_params("cannot unmarshal transaction envelope"))
}

/// sendTransaction: forward the raw envelope to core and echo the hash
/// it will be queryable under plus a latest-ledger snapshot.
pub async fn send_transaction(
    state: &AppState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let params: SendTransactionParams = parse_params(params)?;
    let envelope = decode_envelope(&params.transaction)?;

    let nid = network_id(&state.network_passphrase);
    let hash = envelope_hash(&envelope, &nid).map_err(RpcError::from)?;

    let submission = state
        .core
        .submit_transaction(&params.transaction)
        .await
        .map_err(RpcError::from)?;

    let latest = state.transactions.latest_ledger().unwrap_or_default();
    to_value(SendTransactionResponse {
        status: submission.status.as_str().to_string(),
        hash: hex::encode(hash),
        latest_ledger: latest.sequence,
        latest_ledger_close_time: latest.close_time,
        error_result_xdr: submission.error_result_xdr,
    })
}

/// The transaction a simulation runs: a plain envelope's own
/// transaction, with legacy v0 envelopes upgraded. Fee bumps cannot be
/// simulated.
fn simulation_transaction(envelope: &TransactionEnvelope) -> Result<Transaction, RpcError> {
    match envelope {
        TransactionEnvelope::Tx(e) => Ok(e.tx.clone()),
        TransactionEnvelope::TxV0(e) => Ok(upgrade_v0(&e.tx)),
        TransactionEnvelope::TxFeeBump(_) => Err(RpcError::invalid_params(
            "simulation of fee-bump transactions is not supported",
        )),
    }
}

/// simulateTransaction: run the preflight engine against a storage
/// snapshot and report footprint, auth, events, and cost.
pub async fn simulate_transaction(
    state: &AppState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let params: SimulateTransactionParams = parse_params(params)?;
    let envelope = decode_envelope(&params.transaction)?;
    let tx = simulation_transaction(&envelope)?;

    if tx.operations.len() != 1 {
        return Err(RpcError::invalid_params(
            "transaction must contain exactly one operation",
        ));
    }
    let operation = &tx.operations.as_slice()[0];

    let read_tx = state.storage.read_tx().await.map_err(RpcError::from)?;
    let latest_ledger = read_tx.latest_ledger_sequence();

    let preflight = state
        .preflight
        .preflight(read_tx.as_ref(), &tx.source_account, operation)
        .await
        .map_err(RpcError::from)?;

    to_value(SimulateTransactionResponse {
        error: preflight.error,
        results: preflight
            .results
            .into_iter()
            .map(|r| SimulateHostFunctionResult {
                auth: r.auth,
                events: r.events,
                footprint: r.footprint,
                xdr: r.xdr,
            })
            .collect(),
        cost: SimulateCost {
            cpu_insns: preflight.cpu_instructions,
            mem_bytes: preflight.memory_bytes,
        },
        min_resource_fee: preflight.min_resource_fee,
        latest_ledger,
    })
}
