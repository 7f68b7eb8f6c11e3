use super::to_value;
use crate::api::error::RpcError;
use crate::api::types::GetHealthResponse;
use crate::AppState;

/// getHealth: healthy iff a ledger has been ingested and its close
/// time is within the configured latency threshold of now.
pub async fn get_health(state: &AppState) -> Result<serde_json::Value, RpcError> {
    let head = *state.head.read().expect("head lock poisoned");
    let Some(head) = head else {
        return Err(RpcError::internal("no ledgers ingested yet"));
    };

    let now = chrono::Utc::now().timestamp();
    let latency = now.saturating_sub(head.close_time);
    let threshold = state.max_healthy_latency.as_secs() as i64;
    if latency > threshold {
        return Err(RpcError::internal(format!(
            "latest ledger {} closed {latency}s ago, over the {threshold}s healthy threshold",
            head.sequence
        )));
    }

    to_value(GetHealthResponse { status: "healthy" })
}
