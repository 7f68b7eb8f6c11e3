use std::fmt::Display;

use serde::{Deserialize, Serialize, Serializer};
use serde_aux::prelude::deserialize_option_number_from_string;

use super::error::RpcError;
use super::filters::EventFilter;

/// Serialize an integer as its decimal string, for the response fields
/// the wire schema types as string-encoded numbers.
pub fn as_string<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

pub fn opt_as_string<T: Display, S: Serializer>(
    value: &Option<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.collect_str(v),
        None => serializer.serialize_none(),
    }
}

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: serde_json::Value,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A JSON-RPC 2.0 response envelope carrying either a result or an
/// error.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn result(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GetHealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct GetLatestLedgerResponse {
    /// Hex-encoded hash of the latest ledger header.
    pub id: String,
    #[serde(rename = "protocolVersion", serialize_with = "as_string")]
    pub protocol_version: u32,
    pub sequence: u32,
}

#[derive(Debug, Serialize)]
pub struct GetNetworkResponse {
    #[serde(rename = "friendbotUrl", skip_serializing_if = "Option::is_none")]
    pub friendbot_url: Option<String>,
    pub passphrase: String,
    #[serde(rename = "protocolVersion")]
    pub protocol_version: u32,
}

#[derive(Debug, Deserialize)]
pub struct GetLedgerEntriesParams {
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LedgerEntryResult {
    /// Base64 `LedgerEntry`.
    pub xdr: String,
    #[serde(rename = "lastModifiedLedgerSeq", serialize_with = "as_string")]
    pub last_modified_ledger_seq: u32,
    #[serde(rename = "liveUntilLedgerSeq", skip_serializing_if = "Option::is_none")]
    pub live_until_ledger_seq: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct GetLedgerEntriesResponse {
    pub entries: Vec<Option<LedgerEntryResult>>,
    #[serde(rename = "latestLedger", serialize_with = "as_string")]
    pub latest_ledger: u32,
}

#[derive(Debug, Deserialize)]
pub struct GetLedgerEntryParams {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct GetLedgerEntryResponse {
    pub xdr: String,
    #[serde(rename = "lastModifiedLedgerSeq", serialize_with = "as_string")]
    pub last_modified_ledger_seq: u32,
    #[serde(rename = "latestLedger", serialize_with = "as_string")]
    pub latest_ledger: u32,
}

#[derive(Debug, Deserialize)]
pub struct GetTransactionParams {
    /// Hex-encoded 32-byte transaction hash.
    pub hash: String,
}

pub const TX_STATUS_SUCCESS: &str = "SUCCESS";
pub const TX_STATUS_FAILED: &str = "FAILED";
pub const TX_STATUS_NOT_FOUND: &str = "NOT_FOUND";

#[derive(Debug, Default, Serialize)]
pub struct GetTransactionResponse {
    pub status: String,
    #[serde(rename = "latestLedger", serialize_with = "as_string")]
    pub latest_ledger: u32,
    #[serde(rename = "latestLedgerCloseTime", serialize_with = "as_string")]
    pub latest_ledger_close_time: i64,
    #[serde(rename = "oldestLedger", serialize_with = "as_string")]
    pub oldest_ledger: u32,
    #[serde(rename = "oldestLedgerCloseTime", serialize_with = "as_string")]
    pub oldest_ledger_close_time: i64,
    #[serde(rename = "applicationOrder", skip_serializing_if = "Option::is_none")]
    pub application_order: Option<i32>,
    #[serde(rename = "feeBump", skip_serializing_if = "Option::is_none")]
    pub fee_bump: Option<bool>,
    #[serde(rename = "envelopeXdr", skip_serializing_if = "Option::is_none")]
    pub envelope_xdr: Option<String>,
    #[serde(rename = "resultXdr", skip_serializing_if = "Option::is_none")]
    pub result_xdr: Option<String>,
    #[serde(rename = "resultMetaXdr", skip_serializing_if = "Option::is_none")]
    pub result_meta_xdr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<u32>,
    #[serde(
        rename = "createdAt",
        serialize_with = "opt_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SendTransactionParams {
    /// Base64 `TransactionEnvelope`.
    pub transaction: String,
}

#[derive(Debug, Serialize)]
pub struct SendTransactionResponse {
    pub status: String,
    /// Hex-encoded hash under which the submission will appear.
    pub hash: String,
    #[serde(rename = "latestLedger")]
    pub latest_ledger: u32,
    #[serde(rename = "latestLedgerCloseTime", serialize_with = "as_string")]
    pub latest_ledger_close_time: i64,
    #[serde(rename = "errorResultXdr", skip_serializing_if = "Option::is_none")]
    pub error_result_xdr: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SimulateTransactionParams {
    /// Base64 `TransactionEnvelope`.
    pub transaction: String,
}

#[derive(Debug, Serialize)]
pub struct SimulateHostFunctionResult {
    pub auth: Vec<String>,
    pub events: Vec<String>,
    pub footprint: String,
    pub xdr: String,
}

#[derive(Debug, Default, Serialize)]
pub struct SimulateCost {
    #[serde(rename = "cpuInsns", serialize_with = "as_string")]
    pub cpu_insns: u64,
    #[serde(rename = "memBytes", serialize_with = "as_string")]
    pub mem_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct SimulateTransactionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<SimulateHostFunctionResult>,
    pub cost: SimulateCost,
    #[serde(rename = "minResourceFee", serialize_with = "as_string")]
    pub min_resource_fee: u64,
    #[serde(rename = "latestLedger")]
    pub latest_ledger: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetEventsParams {
    #[serde(
        rename = "startLedger",
        default,
        deserialize_with = "deserialize_option_number_from_string"
    )]
    pub start_ledger: Option<u32>,
    #[serde(default)]
    pub filters: Vec<EventFilter>,
    #[serde(default)]
    pub pagination: Option<PaginationOptions>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationOptions {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct EventInfo {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    #[serde(serialize_with = "as_string")]
    pub ledger: u32,
    /// RFC3339 UTC close time of the emitting ledger.
    #[serde(rename = "ledgerClosedAt")]
    pub ledger_closed_at: String,
    /// Hex-encoded contract id, empty for events without one.
    #[serde(rename = "contractId")]
    pub contract_id: String,
    pub id: String,
    #[serde(rename = "pagingToken")]
    pub paging_token: String,
    /// Base64 `ScVal` topics.
    pub topic: Vec<String>,
    pub value: EventValue,
    #[serde(rename = "inSuccessfulContractCall")]
    pub in_successful_contract_call: bool,
}

#[derive(Debug, Serialize)]
pub struct EventValue {
    /// Base64 `ScVal`.
    pub xdr: String,
}

#[derive(Debug, Serialize)]
pub struct GetEventsResponse {
    pub events: Vec<EventInfo>,
    #[serde(rename = "latestLedger")]
    pub latest_ledger: u32,
}
