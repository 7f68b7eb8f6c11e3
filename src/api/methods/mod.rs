pub mod events;
pub mod health;
pub mod ledgers;
pub mod submit;
pub mod transactions;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;
use stellar_xdr::curr::{Limits, WriteXdr};

use super::error::{RpcError, INTERNAL_ERROR};
use super::types::{RpcRequest, RpcResponse};
use crate::AppState;

/// Entry point for the JSON-RPC POST endpoint: parse the envelope,
/// route to a method handler, and wrap the outcome.
pub async fn dispatch(State(state): State<Arc<AppState>>, body: Bytes) -> Json<RpcResponse> {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => {
            return Json(RpcResponse::error(
                serde_json::Value::Null,
                RpcError::parse_error(),
            ))
        }
    };

    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return Json(RpcResponse::error(
            id,
            RpcError::invalid_request("jsonrpc must be \"2.0\""),
        ));
    }

    let start = std::time::Instant::now();
    let outcome = route(&state, &request.method, request.params).await;

    metrics::counter!("rpc_requests_total", "method" => request.method.clone()).increment(1);
    metrics::histogram!("rpc_request_duration_seconds", "method" => request.method.clone())
        .record(start.elapsed().as_secs_f64());

    match outcome {
        Ok(result) => Json(RpcResponse::result(id, result)),
        Err(err) => {
            if err.code == INTERNAL_ERROR {
                tracing::info!(method = %request.method, message = %err.message, "request failed");
            } else {
                tracing::debug!(method = %request.method, code = err.code, message = %err.message, "request rejected");
            }
            Json(RpcResponse::error(id, err))
        }
    }
}

async fn route(
    state: &AppState,
    method: &str,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    match method {
        "getHealth" => health::get_health(state).await,
        "getLatestLedger" => ledgers::get_latest_ledger(state).await,
        "getNetwork" => ledgers::get_network(state).await,
        "getLedgerEntries" => ledgers::get_ledger_entries(state, params).await,
        "getLedgerEntry" => ledgers::get_ledger_entry(state, params).await,
        "getTransaction" => transactions::get_transaction(state, params).await,
        "sendTransaction" => submit::send_transaction(state, params).await,
        "simulateTransaction" => submit::simulate_transaction(state, params).await,
        "getEvents" => events::get_events(state, params).await,
        other => Err(RpcError::method_not_found(other)),
    }
}

/// Deserialize a method's params, mapping failures to invalid-params.
fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, RpcError> {
    serde_json::from_value(params)
        .map_err(|e| RpcError::invalid_params(format!("invalid parameters: {e}")))
}

fn to_value<T: Serialize>(value: T) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal(e.to_string()))
}

/// Base64-encode a value's XDR form.
fn xdr_base64<T: WriteXdr>(value: &T) -> Result<String, RpcError> {
    let bytes = value
        .to_xdr(Limits::none())
        .map_err(|e| RpcError::internal(format!("XDR encoding failed: {e}")))?;
    Ok(BASE64.encode(bytes))
}
