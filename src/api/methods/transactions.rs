use super::{parse_params, to_value, xdr_base64};
use crate::api::error::RpcError;
use crate::api::types::{
    GetTransactionParams, GetTransactionResponse, TX_STATUS_FAILED, TX_STATUS_NOT_FOUND,
    TX_STATUS_SUCCESS,
};
use crate::AppState;

/// getTransaction: point lookup by hash. A miss is a successful
/// response with status NOT_FOUND; the store's retention range rides
/// along either way so clients can tell "never seen" from "evicted".
pub async fn get_transaction(
    state: &AppState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let params: GetTransactionParams = parse_params(params)?;
    let hash: [u8; 32] = hex::decode(&params.hash)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            RpcError::invalid_params(format!(
                "transaction hash must be 32 bytes of hex: {}",
                params.hash
            ))
        })?;

    let (entry, range) = state.transactions.get_transaction(&hash);

    let mut response = GetTransactionResponse {
        status: TX_STATUS_NOT_FOUND.to_string(),
        ..Default::default()
    };
    if let Some(range) = range {
        response.latest_ledger = range.last.sequence;
        response.latest_ledger_close_time = range.last.close_time;
        response.oldest_ledger = range.first.sequence;
        response.oldest_ledger_close_time = range.first.close_time;
    }

    if let Some(entry) = entry {
        response.status = if entry.successful {
            TX_STATUS_SUCCESS.to_string()
        } else {
            TX_STATUS_FAILED.to_string()
        };
        response.application_order = Some(entry.application_order);
        response.fee_bump = Some(entry.fee_bump);
        response.envelope_xdr = Some(xdr_base64(&entry.envelope)?);
        response.result_xdr = Some(xdr_base64(&entry.result)?);
        response.result_meta_xdr = Some(xdr_base64(&entry.meta)?);
        response.ledger = Some(entry.ledger.sequence);
        response.created_at = Some(entry.ledger.close_time);
    }

    to_value(response)
}
