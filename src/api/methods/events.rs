use chrono::SecondsFormat;
use stellar_xdr::curr::{ContractEventBody, ContractEventType};

use super::{parse_params, to_value, xdr_base64};
use crate::api::error::RpcError;
use crate::api::filters::{matches_any, CompiledFilter, MAX_FILTERS};
use crate::api::types::{EventInfo, EventValue, GetEventsParams, GetEventsResponse};
use crate::ledger::cursor::Cursor;
use crate::store::events::{EventEntry, ScanRange};
use crate::AppState;

/// getEvents: forward scan over retained events with filter matching
/// and cursor pagination.
pub async fn get_events(
    state: &AppState,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let params: GetEventsParams = parse_params(params)?;

    if params.filters.len() > MAX_FILTERS {
        return Err(RpcError::invalid_params(format!(
            "maximum {MAX_FILTERS} filters per request"
        )));
    }
    let filters: Vec<CompiledFilter> = params
        .filters
        .iter()
        .enumerate()
        .map(|(i, f)| f.compile(i).map_err(RpcError::invalid_params))
        .collect::<Result<_, _>>()?;

    let pagination = params.pagination.unwrap_or_default();
    let limit = pagination.limit.unwrap_or(state.default_events_limit);
    if limit > state.max_events_limit {
        return Err(RpcError::invalid_request(format!(
            "limit must not exceed {}",
            state.max_events_limit
        )));
    }

    // A paging token resumes strictly after the event it names; a
    // start ledger begins at that ledger's first event.
    let start = match (&pagination.cursor, params.start_ledger) {
        (Some(_), Some(_)) => {
            return Err(RpcError::invalid_request(
                "startLedger and cursor cannot both be set",
            ))
        }
        (Some(cursor), None) => cursor.parse::<Cursor>().map_err(RpcError::from)?.successor(),
        (None, Some(0)) => {
            return Err(RpcError::invalid_params("startLedger must be at least 1"))
        }
        (None, Some(sequence)) => Cursor::ledger_start(sequence),
        (None, None) => {
            return Err(RpcError::invalid_params(
                "startLedger must be set when no cursor is provided",
            ))
        }
    };

    let mut events: Vec<EventInfo> = Vec::new();
    let mut encode_err: Option<RpcError> = None;
    state
        .events
        .scan(
            ScanRange {
                start,
                clamp_start: false,
                end: Cursor::MAX,
                clamp_end: true,
            },
            |entry, close_time| {
                if !matches_any(&filters, &entry.event) {
                    return true;
                }
                if events.len() >= limit as usize {
                    return false;
                }
                match event_info(entry, close_time) {
                    Ok(info) => {
                        events.push(info);
                        true
                    }
                    Err(e) => {
                        encode_err = Some(e);
                        false
                    }
                }
            },
        )
        .map_err(RpcError::from)?;
    if let Some(err) = encode_err {
        return Err(err);
    }

    let latest_ledger = state.events.latest_ledger().map_or(0, |l| l.sequence);
    to_value(GetEventsResponse {
        events,
        latest_ledger,
    })
}

fn event_info(entry: &EventEntry, close_time: i64) -> Result<EventInfo, RpcError> {
    let id = entry.cursor.to_string();
    let ContractEventBody::V0(body) = &entry.event.body;

    let topic = body
        .topics
        .iter()
        .map(xdr_base64)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EventInfo {
        event_type: match entry.event.type_ {
            ContractEventType::Contract => "contract",
            ContractEventType::System => "system",
            ContractEventType::Diagnostic => "diagnostic",
        },
        ledger: entry.cursor.ledger,
        ledger_closed_at: chrono::DateTime::from_timestamp(close_time, 0)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default(),
        contract_id: entry
            .event
            .contract_id
            .as_ref()
            .map(|id| hex::encode(id.0 .0))
            .unwrap_or_default(),
        paging_token: id.clone(),
        id,
        topic,
        value: EventValue {
            xdr: xdr_base64(&body.data)?,
        },
        in_successful_contract_call: entry.in_successful_contract_call,
    })
}
