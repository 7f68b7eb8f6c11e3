use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use stellar_xdr::curr::{LedgerKey, Limits, ReadXdr};

use super::{parse_params, to_value, xdr_base64};
use crate::api::error::RpcError;
use crate::api::types::{
    GetLatestLedgerResponse, GetLedgerEntriesParams, GetLedgerEntriesResponse,
    GetLedgerEntryParams, GetLedgerEntryResponse, GetNetworkResponse, LedgerEntryResult,
};
use crate::ledger::close::LedgerHead;
use crate::storage::EntryResult;
use crate::AppState;

/// Most keys accepted by one getLedgerEntries request.
const MAX_KEYS: usize = 200;

fn head(state: &AppState) -> Result<LedgerHead, RpcError> {
    let head = *state.head.read().expect("head lock poisoned");
    head.ok_or_else(|| RpcError::internal("no ledgers ingested yet"))
}

/// getLatestLedger: identity of the newest fully ingested ledger.
pub async fn get_latest_ledger(state: &AppState) -> Result<serde_json::Value, RpcError> {
    let head = head(state)?;
    to_value(GetLatestLedgerResponse {
        id: hex::encode(head.hash),
        protocol_version: head.protocol_version,
        sequence: head.sequence,
    })
}

/// getNetwork: the network this server ingests and submits to.
pub async fn get_network(state: &AppState) -> Result<serde_json::Value, RpcError> {
    let head = head(state)?;
    to_value(GetNetworkResponse {
        friendbot_url: state.friendbot_url.clone(),
        passphrase: state.network_passphrase.clone(),
        protocol_version: head.protocol_version,
    })
}

fn decode_key(raw: &str) -> Result<LedgerKey, RpcError> {
    BASE64
        .decode(raw)
        .ok()
        .and_then(|bytes| LedgerKey::from_xdr(bytes, Limits::none()).ok())
        .ok_or_else(|| RpcError::invalid_params(format!("cannot unmarshal key value {raw}")))
}

fn entry_result(found: &EntryResult) -> Result<LedgerEntryResult, RpcError> {
    Ok(LedgerEntryResult {
        xdr: xdr_base64(&found.entry)?,
        last_modified_ledger_seq: found.entry.last_modified_ledger_seq,
        live_until_ledger_seq: found.live_until_ledger_seq,
    })
}

/// getLedgerEntries: point lookups against a consistent storage
/// snapshot, position-aligned with the requested keys.
pub async fn get_ledger_entries(
    state: &AppState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let params: GetLedgerEntriesParams = parse_params(params)?;
    if params.keys.is_empty() {
        return Err(RpcError::invalid_params("no keys provided"));
    }
    if params.keys.len() > MAX_KEYS {
        return Err(RpcError::invalid_params(format!(
            "key count ({}) exceeds maximum of {MAX_KEYS}",
            params.keys.len()
        )));
    }
    let keys = params
        .keys
        .iter()
        .map(|raw| decode_key(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let read_tx = state.storage.read_tx().await.map_err(RpcError::from)?;
    let latest_ledger = read_tx.latest_ledger_sequence();
    let found = read_tx.ledger_entries(&keys).map_err(RpcError::from)?;

    let entries = found
        .iter()
        .map(|maybe| maybe.as_ref().map(entry_result).transpose())
        .collect::<Result<Vec<_>, _>>()?;

    to_value(GetLedgerEntriesResponse {
        entries,
        latest_ledger,
    })
}

/// getLedgerEntry (deprecated): single-key lookup where a miss is an
/// invalid-request error rather than a null entry.
pub async fn get_ledger_entry(
    state: &AppState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let params: GetLedgerEntryParams = parse_params(params)?;
    let key = decode_key(&params.key)?;

    let read_tx = state.storage.read_tx().await.map_err(RpcError::from)?;
    let latest_ledger = read_tx.latest_ledger_sequence();
    let found = read_tx
        .ledger_entries(std::slice::from_ref(&key))
        .map_err(RpcError::from)?;

    match found.into_iter().next().flatten() {
        Some(found) => to_value(GetLedgerEntryResponse {
            xdr: xdr_base64(&found.entry)?,
            last_modified_ledger_seq: found.entry.last_modified_ledger_seq,
            latest_ledger,
        }),
        None => Err(RpcError::invalid_request("not found")),
    }
}
