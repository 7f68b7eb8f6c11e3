use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use stellar_xdr::curr::{
    BumpSequenceOp, ContractEvent, ContractEventBody, ContractEventType, ContractEventV0,
    ContractDataDurability, ContractDataEntry, ContractId, ExtensionPoint, Hash, LedgerEntry,
    LedgerEntryChanges, LedgerEntryData, LedgerEntryExt, LedgerKey, LedgerKeyContractData, Limits,
    Memo, MuxedAccount, Operation, OperationBody, Preconditions, ScAddress, ScVal, SequenceNumber,
    Transaction, TransactionEnvelope, TransactionExt, TransactionMeta, TransactionMetaV3,
    TransactionResult, TransactionResultExt, TransactionResultResult, TransactionV1Envelope,
    Uint256, VecM, WriteXdr,
};

use stellar_ledger_rpc::api;
use stellar_ledger_rpc::core::{CoreStatus, CoreSubmission, CoreSubmitter};
use stellar_ledger_rpc::ledger::close::{
    envelope_hash, network_id, ClosedLedger, ClosedTransaction, ExtractedEvent, LedgerHead,
    OperationEvents,
};
use stellar_ledger_rpc::ledger::cursor::Cursor;
use stellar_ledger_rpc::preflight::{
    DisabledPreflight, PreflightEngine, PreflightHostResult, PreflightResult,
};
use stellar_ledger_rpc::storage::{MemoryEntryStore, ReadTx, ReadTxFactory};
use stellar_ledger_rpc::store::events::EventStore;
use stellar_ledger_rpc::store::transactions::TransactionStore;
use stellar_ledger_rpc::{AppState, Error};

const PASSPHRASE: &str = "Test SDF Network ; September 2015";

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn sym(s: &str) -> ScVal {
    ScVal::Symbol(s.try_into().unwrap())
}

fn contract_event(contract: [u8; 32], topics: Vec<ScVal>, data: ScVal) -> ContractEvent {
    ContractEvent {
        ext: ExtensionPoint::V0,
        contract_id: Some(ContractId(Hash(contract))),
        type_: ContractEventType::Contract,
        body: ContractEventBody::V0(ContractEventV0 {
            topics: topics.try_into().unwrap(),
            data,
        }),
    }
}

fn envelope(seq: i64) -> TransactionEnvelope {
    envelope_with_operations(seq, Vec::new())
}

fn envelope_with_operations(seq: i64, operations: Vec<Operation>) -> TransactionEnvelope {
    TransactionEnvelope::Tx(TransactionV1Envelope {
        tx: Transaction {
            source_account: MuxedAccount::Ed25519(Uint256([7; 32])),
            fee: 100,
            seq_num: SequenceNumber(seq),
            cond: Preconditions::None,
            memo: Memo::None,
            operations: operations.try_into().unwrap(),
            ext: TransactionExt::V0,
        },
        signatures: VecM::default(),
    })
}

fn bump_sequence_op() -> Operation {
    Operation {
        source_account: None,
        body: OperationBody::BumpSequence(BumpSequenceOp {
            bump_to: SequenceNumber(0),
        }),
    }
}

fn closed_tx(
    hash_byte: u8,
    order: i32,
    successful: bool,
    events: Vec<ContractEvent>,
) -> ClosedTransaction {
    ClosedTransaction {
        hash: [hash_byte; 32],
        inner_hash: None,
        envelope: Some(envelope(order as i64)),
        result: TransactionResult {
            fee_charged: 100,
            result: if successful {
                TransactionResultResult::TxSuccess(VecM::default())
            } else {
                TransactionResultResult::TxFailed(VecM::default())
            },
            ext: TransactionResultExt::V0,
        },
        meta: TransactionMeta::V3(TransactionMetaV3 {
            ext: ExtensionPoint::V0,
            tx_changes_before: LedgerEntryChanges(VecM::default()),
            operations: VecM::default(),
            tx_changes_after: LedgerEntryChanges(VecM::default()),
            soroban_meta: None,
        }),
        application_order: order,
        successful,
        events: if events.is_empty() {
            Vec::new()
        } else {
            vec![OperationEvents {
                op_index: 0,
                events: events
                    .into_iter()
                    .map(|event| ExtractedEvent {
                        event,
                        in_successful_call: successful,
                    })
                    .collect(),
            }]
        },
    }
}

fn closed_ledger(seq: u32, close_time: i64, transactions: Vec<ClosedTransaction>) -> ClosedLedger {
    ClosedLedger {
        head: LedgerHead {
            sequence: seq,
            close_time,
            hash: [seq as u8; 32],
            protocol_version: 21,
        },
        transactions,
    }
}

fn ingest(state: &AppState, ledger: &ClosedLedger) {
    state.transactions.ingest(ledger).expect("ingest transactions");
    state.events.ingest(ledger).expect("ingest events");
    *state.head.write().unwrap() = Some(ledger.head);
}

// ---------------------------------------------------------------------------
// Mock collaborators
// ---------------------------------------------------------------------------

enum MockCore {
    Respond(CoreStatus, Option<String>),
    Fail,
}

#[async_trait]
impl CoreSubmitter for MockCore {
    async fn submit_transaction(&self, _envelope_xdr: &str) -> Result<CoreSubmission, Error> {
        match self {
            MockCore::Respond(status, error) => Ok(CoreSubmission {
                status: *status,
                error_result_xdr: error.clone(),
            }),
            MockCore::Fail => Err(Error::CoreSubmission("cannot reach core".to_string())),
        }
    }
}

struct MockPreflight;

#[async_trait]
impl PreflightEngine for MockPreflight {
    async fn preflight(
        &self,
        _read_tx: &dyn ReadTx,
        _source_account: &MuxedAccount,
        _operation: &Operation,
    ) -> Result<PreflightResult, Error> {
        Ok(PreflightResult {
            error: None,
            results: vec![PreflightHostResult {
                xdr: "AAAAAQ==".to_string(),
                auth: vec!["AUTH".to_string()],
                events: Vec::new(),
                footprint: "FOOT".to_string(),
            }],
            cpu_instructions: 123_456,
            memory_bytes: 7_890,
            min_resource_fee: 42,
        })
    }
}

// ---------------------------------------------------------------------------
// Server plumbing
// ---------------------------------------------------------------------------

struct TestServer {
    state: Arc<AppState>,
    entries: Arc<MemoryEntryStore>,
    base_url: String,
}

async fn serve(state: Arc<AppState>) -> String {
    let app = api::router(Arc::clone(&state), None);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("failed to get addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(25)).await;
    format!("http://{}", addr)
}

async fn start_server_with(
    retention: u32,
    core: Arc<dyn CoreSubmitter>,
    preflight: Arc<dyn PreflightEngine>,
) -> TestServer {
    let entries = Arc::new(MemoryEntryStore::new());
    let state = Arc::new(AppState {
        transactions: TransactionStore::new(retention),
        events: EventStore::new(retention),
        head: RwLock::new(None),
        storage: Arc::clone(&entries) as Arc<dyn ReadTxFactory>,
        core,
        preflight,
        network_passphrase: PASSPHRASE.to_string(),
        friendbot_url: Some("https://friendbot.example.org".to_string()),
        default_events_limit: 100,
        max_events_limit: 10000,
        max_healthy_latency: Duration::from_secs(30),
    });
    let base_url = serve(Arc::clone(&state)).await;
    TestServer {
        state,
        entries,
        base_url,
    }
}

async fn start_server() -> TestServer {
    start_server_with(
        16,
        Arc::new(MockCore::Respond(CoreStatus::Pending, None)),
        Arc::new(DisabledPreflight),
    )
    .await
}

async fn rpc(base_url: &str, method: &str, params: Value) -> Value {
    reqwest::Client::new()
        .post(base_url)
        .json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }))
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("response was not JSON")
}

fn result(response: &Value) -> &Value {
    assert!(
        response.get("error").is_none(),
        "unexpected error: {response}"
    );
    &response["result"]
}

fn error_code(response: &Value) -> i64 {
    response["error"]["code"]
        .as_i64()
        .unwrap_or_else(|| panic!("expected an error, got: {response}"))
}

// ---------------------------------------------------------------------------
// Envelope and routing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unknown_method() {
    let server = start_server().await;
    let response = rpc(&server.base_url, "getSomethingElse", json!({})).await;
    assert_eq!(error_code(&response), -32601);
}

#[tokio::test]
async fn test_malformed_json_body() {
    let server = start_server().await;
    let response: Value = reqwest::Client::new()
        .post(&server.base_url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn test_wrong_jsonrpc_version() {
    let server = start_server().await;
    let response: Value = reqwest::Client::new()
        .post(&server.base_url)
        .json(&json!({"jsonrpc": "1.0", "id": 7, "method": "getHealth"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(response["id"], 7);
}

#[tokio::test]
async fn test_cors_echoes_request_origin() {
    let server = start_server().await;
    let response = reqwest::Client::new()
        .post(&server.base_url)
        .header("origin", "https://example.org")
        .json(&json!({"jsonrpc": "2.0", "id": 1, "method": "getHealth"}))
        .send()
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("https://example.org")
    );
}

// ---------------------------------------------------------------------------
// getHealth / getLatestLedger / getNetwork
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_before_any_ledger() {
    let server = start_server().await;
    let response = rpc(&server.base_url, "getHealth", json!({})).await;
    assert_eq!(error_code(&response), -32603);
}

#[tokio::test]
async fn test_health_fresh_and_stale() {
    let server = start_server().await;
    let now = chrono::Utc::now().timestamp();
    ingest(&server.state, &closed_ledger(100, now, vec![]));

    let response = rpc(&server.base_url, "getHealth", json!({})).await;
    assert_eq!(result(&response)["status"], "healthy");

    // An hour-old latest ledger is over the 30s threshold.
    ingest(&server.state, &closed_ledger(101, now - 3600, vec![]));
    let response = rpc(&server.base_url, "getHealth", json!({})).await;
    assert_eq!(error_code(&response), -32603);
    let message = response["error"]["message"].as_str().unwrap();
    assert!(message.contains("30s"), "unexpected message: {message}");
}

#[tokio::test]
async fn test_get_latest_ledger() {
    let server = start_server().await;
    ingest(&server.state, &closed_ledger(42, 1_700_000_000, vec![]));

    let response = rpc(&server.base_url, "getLatestLedger", json!({})).await;
    let result = result(&response);
    assert_eq!(result["sequence"], 42);
    assert_eq!(result["protocolVersion"], "21");
    assert_eq!(result["id"], hex::encode([42u8; 32]));
}

#[tokio::test]
async fn test_get_network() {
    let server = start_server().await;
    ingest(&server.state, &closed_ledger(42, 1_700_000_000, vec![]));

    let response = rpc(&server.base_url, "getNetwork", json!({})).await;
    let result = result(&response);
    assert_eq!(result["passphrase"], PASSPHRASE);
    assert_eq!(result["protocolVersion"], 21);
    assert_eq!(result["friendbotUrl"], "https://friendbot.example.org");
}

// ---------------------------------------------------------------------------
// getEvents
// ---------------------------------------------------------------------------

/// One ledger, ten transactions, one COUNTER event each.
fn counter_ledger() -> ClosedLedger {
    let transactions = (1..=10)
        .map(|order| {
            closed_tx(
                order as u8,
                order,
                true,
                vec![contract_event([0; 32], vec![sym("COUNTER")], sym("COUNTER"))],
            )
        })
        .collect();
    closed_ledger(1, 1_700_000_000, transactions)
}

#[tokio::test]
async fn test_get_events_without_filters() {
    let server = start_server().await;
    ingest(&server.state, &counter_ledger());

    let response = rpc(&server.base_url, "getEvents", json!({"startLedger": "1"})).await;
    let result = result(&response);
    assert_eq!(result["latestLedger"], 1);

    let events = result["events"].as_array().unwrap();
    assert_eq!(events.len(), 10);

    let counter_xdr = BASE64.encode(sym("COUNTER").to_xdr(Limits::none()).unwrap());
    for (i, event) in events.iter().enumerate() {
        let expected_id = Cursor {
            ledger: 1,
            tx: i as u32 + 1,
            op: 0,
            event: 0,
        }
        .to_string();
        assert_eq!(event["id"], expected_id);
        assert_eq!(event["pagingToken"], expected_id);
        assert!(expected_id.ends_with("-0000000001"));
        assert_eq!(event["type"], "contract");
        assert_eq!(event["ledger"], "1");
        assert_eq!(event["ledgerClosedAt"], "2023-11-14T22:13:20Z");
        assert_eq!(event["contractId"], "0".repeat(64));
        assert_eq!(event["topic"][0], counter_xdr);
        assert_eq!(event["value"]["xdr"], counter_xdr);
        assert_eq!(event["inSuccessfulContractCall"], true);
    }

    // Ids are strictly increasing in byte order.
    let ids: Vec<&str> = events.iter().map(|e| e["id"].as_str().unwrap()).collect();
    for pair in ids.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

/// Ledger 5 with two transactions emitting two events each.
fn two_by_two_ledger() -> ClosedLedger {
    let transactions = (1..=2)
        .map(|order| {
            closed_tx(
                order as u8,
                order,
                true,
                vec![
                    contract_event([1; 32], vec![sym("transfer")], ScVal::U64(1)),
                    contract_event([1; 32], vec![sym("transfer")], ScVal::U64(2)),
                ],
            )
        })
        .collect();
    closed_ledger(5, 1_700_000_000, transactions)
}

#[tokio::test]
async fn test_get_events_cursor_and_limit() {
    let server = start_server().await;
    ingest(&server.state, &two_by_two_ledger());

    let cursor = Cursor { ledger: 5, tx: 1, op: 0, event: 0 }.to_string();
    let response = rpc(
        &server.base_url,
        "getEvents",
        json!({"pagination": {"cursor": cursor, "limit": 2}}),
    )
    .await;
    let events = result(&response)["events"].as_array().unwrap().clone();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0]["id"],
        Cursor { ledger: 5, tx: 1, op: 0, event: 1 }.to_string()
    );
    // The event component of the id is 1-based.
    assert_eq!(events[0]["id"], "0000000021474840576-0000000002");
    assert_eq!(
        events[1]["id"],
        Cursor { ledger: 5, tx: 2, op: 0, event: 0 }.to_string()
    );

    // Paging from the very last event returns nothing.
    let last = Cursor { ledger: 5, tx: 2, op: 0, event: 1 }.to_string();
    let response = rpc(
        &server.base_url,
        "getEvents",
        json!({"pagination": {"cursor": last, "limit": 2}}),
    )
    .await;
    assert!(result(&response)["events"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_events_pagination_is_idempotent() {
    let server = start_server().await;
    ingest(&server.state, &two_by_two_ledger());

    let all = rpc(
        &server.base_url,
        "getEvents",
        json!({"startLedger": 5, "pagination": {"limit": 4}}),
    )
    .await;
    let all_ids: Vec<String> = result(&all)["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(all_ids.len(), 4);

    // Two pages of two, the second resuming from the first's last id.
    let first = rpc(
        &server.base_url,
        "getEvents",
        json!({"startLedger": 5, "pagination": {"limit": 2}}),
    )
    .await;
    let first_ids: Vec<String> = result(&first)["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect();
    let second = rpc(
        &server.base_url,
        "getEvents",
        json!({"pagination": {"cursor": first_ids.last().unwrap(), "limit": 2}}),
    )
    .await;
    let second_ids: Vec<String> = result(&second)["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect();

    let paged: Vec<String> = first_ids.into_iter().chain(second_ids).collect();
    assert_eq!(paged, all_ids);
}

#[tokio::test]
async fn test_get_events_filters() {
    let server = start_server().await;
    let transfer = contract_event([1; 32], vec![sym("x"), sym("transfer")], ScVal::U64(1));
    let mint = contract_event([2; 32], vec![sym("mint")], ScVal::U64(2));
    let mut system = contract_event([3; 32], vec![sym("core")], ScVal::Void);
    system.type_ = ContractEventType::System;
    let ledger = closed_ledger(
        9,
        1_700_000_000,
        vec![
            closed_tx(1, 1, true, vec![transfer]),
            closed_tx(2, 2, true, vec![mint]),
            closed_tx(3, 3, true, vec![system]),
        ],
    );
    ingest(&server.state, &ledger);

    // Type filter.
    let response = rpc(
        &server.base_url,
        "getEvents",
        json!({"startLedger": 9, "filters": [{"type": "system"}]}),
    )
    .await;
    let events = result(&response)["events"].as_array().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "system");

    // Contract id filter.
    let response = rpc(
        &server.base_url,
        "getEvents",
        json!({"startLedger": 9, "filters": [{"contractIds": [hex::encode([2u8; 32])]}]}),
    )
    .await;
    let events = result(&response)["events"].as_array().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["contractId"], hex::encode([2u8; 32]));

    // Wildcard topic filter "*/transfer" matches only the two-topic
    // transfer event.
    let transfer_xdr = BASE64.encode(sym("transfer").to_xdr(Limits::none()).unwrap());
    let response = rpc(
        &server.base_url,
        "getEvents",
        json!({"startLedger": 9, "filters": [{"topics": [["*", transfer_xdr]]}]}),
    )
    .await;
    let events = result(&response)["events"].as_array().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["contractId"], hex::encode([1u8; 32]));

    // Two filters OR together.
    let response = rpc(
        &server.base_url,
        "getEvents",
        json!({"startLedger": 9, "filters": [
            {"type": "system"},
            {"contractIds": [hex::encode([2u8; 32])]},
        ]}),
    )
    .await;
    assert_eq!(result(&response)["events"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_events_validation() {
    let server = start_server().await;
    ingest(&server.state, &counter_ledger());
    let base = &server.base_url;

    // Request-semantic failures are invalid requests.
    for params in [
        json!({"startLedger": 1, "pagination": {"cursor": Cursor::ledger_start(1).to_string()}}),
        json!({"startLedger": 1, "pagination": {"limit": 10001}}),
        json!({"startLedger": 2}),
    ] {
        let response = rpc(base, "getEvents", params.clone()).await;
        assert_eq!(error_code(&response), -32600, "params: {params}");
    }

    // Malformed or missing request values are invalid params.
    let six_filters: Vec<Value> = (0..6).map(|_| json!({"type": "contract"})).collect();
    for params in [
        json!({"startLedger": 0}),
        json!({}),
        json!({"startLedger": 1, "filters": six_filters}),
        json!({"startLedger": 1, "filters": [{"type": "bogus"}]}),
        json!({"startLedger": 1, "filters": [{"contractIds": ["xyz"]}]}),
        json!({"startLedger": 1, "filters": [{"topics": [[]]}]}),
        json!({"startLedger": 1, "filters": [{"topics": [["not-base64!"]]}]}),
        json!({"pagination": {"cursor": "garbage"}}),
    ] {
        let response = rpc(base, "getEvents", params.clone()).await;
        assert_eq!(error_code(&response), -32602, "params: {params}");
    }
}

#[tokio::test]
async fn test_get_events_outside_retention() {
    let server = start_server_with(
        2,
        Arc::new(MockCore::Respond(CoreStatus::Pending, None)),
        Arc::new(DisabledPreflight),
    )
    .await;
    for seq in 20..23 {
        ingest(
            &server.state,
            &closed_ledger(
                seq,
                1_700_000_000,
                vec![closed_tx(seq as u8, 1, true, vec![contract_event(
                    [0; 32],
                    vec![sym("COUNTER")],
                    ScVal::Void,
                )])],
            ),
        );
    }

    // Ledger 20 was evicted.
    let response = rpc(&server.base_url, "getEvents", json!({"startLedger": 20})).await;
    assert_eq!(error_code(&response), -32600);
    let response = rpc(&server.base_url, "getEvents", json!({"startLedger": 21})).await;
    assert_eq!(result(&response)["events"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_events_empty_store() {
    let server = start_server().await;
    let response = rpc(&server.base_url, "getEvents", json!({"startLedger": 1})).await;
    let result = result(&response);
    assert!(result["events"].as_array().unwrap().is_empty());
    assert_eq!(result["latestLedger"], 0);
}

// ---------------------------------------------------------------------------
// getTransaction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_get_transaction_empty_store() {
    let server = start_server().await;
    let response = rpc(
        &server.base_url,
        "getTransaction",
        json!({"hash": hex::encode([9u8; 32])}),
    )
    .await;
    let result = result(&response);
    assert_eq!(result["status"], "NOT_FOUND");
    assert_eq!(result["latestLedger"], "0");
    assert_eq!(result["oldestLedger"], "0");
    assert!(result.get("applicationOrder").is_none());
}

#[tokio::test]
async fn test_get_transaction_success_and_failed() {
    let server = start_server().await;
    ingest(
        &server.state,
        &closed_ledger(
            100,
            1_700_000_000,
            vec![closed_tx(1, 1, true, vec![]), closed_tx(2, 2, false, vec![])],
        ),
    );

    let response = rpc(
        &server.base_url,
        "getTransaction",
        json!({"hash": hex::encode([1u8; 32])}),
    )
    .await;
    let found = result(&response);
    assert_eq!(found["status"], "SUCCESS");
    assert_eq!(found["applicationOrder"], 1);
    assert_eq!(found["feeBump"], false);
    assert_eq!(found["ledger"], 100);
    assert_eq!(found["createdAt"], "1700000000");
    assert_eq!(found["latestLedger"], "100");
    assert_eq!(found["oldestLedger"], "100");
    assert!(found["envelopeXdr"].as_str().is_some());
    assert!(found["resultXdr"].as_str().is_some());
    assert!(found["resultMetaXdr"].as_str().is_some());

    let response = rpc(
        &server.base_url,
        "getTransaction",
        json!({"hash": hex::encode([2u8; 32])}),
    )
    .await;
    assert_eq!(result(&response)["status"], "FAILED");

    // A miss still reports the range.
    let response = rpc(
        &server.base_url,
        "getTransaction",
        json!({"hash": hex::encode([9u8; 32])}),
    )
    .await;
    let missing = result(&response);
    assert_eq!(missing["status"], "NOT_FOUND");
    assert_eq!(missing["latestLedger"], "100");
}

#[tokio::test]
async fn test_get_transaction_fee_bump_inner_hash() {
    let server = start_server().await;
    let mut fee_bump = closed_tx(5, 1, true, vec![]);
    fee_bump.inner_hash = Some([6; 32]);
    ingest(
        &server.state,
        &closed_ledger(100, 1_700_000_000, vec![fee_bump]),
    );

    let by_outer = rpc(
        &server.base_url,
        "getTransaction",
        json!({"hash": hex::encode([5u8; 32])}),
    )
    .await;
    let by_inner = rpc(
        &server.base_url,
        "getTransaction",
        json!({"hash": hex::encode([6u8; 32])}),
    )
    .await;
    assert_eq!(result(&by_outer)["status"], "SUCCESS");
    assert_eq!(result(&by_outer)["feeBump"], true);
    assert_eq!(
        result(&by_outer)["envelopeXdr"],
        result(&by_inner)["envelopeXdr"]
    );
}

#[tokio::test]
async fn test_get_transaction_bad_hash() {
    let server = start_server().await;
    for bad in ["zzzz", "abcd", ""] {
        let response = rpc(&server.base_url, "getTransaction", json!({"hash": bad})).await;
        assert_eq!(error_code(&response), -32602, "hash: {bad}");
    }
}

// ---------------------------------------------------------------------------
// sendTransaction
// ---------------------------------------------------------------------------

fn envelope_b64(envelope: &TransactionEnvelope) -> String {
    BASE64.encode(envelope.to_xdr(Limits::none()).unwrap())
}

#[tokio::test]
async fn test_send_transaction_pending() {
    let server = start_server().await;
    ingest(&server.state, &closed_ledger(50, 1_700_000_000, vec![]));

    let env = envelope(1);
    let response = rpc(
        &server.base_url,
        "sendTransaction",
        json!({"transaction": envelope_b64(&env)}),
    )
    .await;
    let result = result(&response);
    assert_eq!(result["status"], "PENDING");
    let expected_hash = envelope_hash(&env, &network_id(PASSPHRASE)).unwrap();
    assert_eq!(result["hash"], hex::encode(expected_hash));
    assert_eq!(result["latestLedger"], 50);
    assert_eq!(result["latestLedgerCloseTime"], "1700000000");
    assert!(result.get("errorResultXdr").is_none());
}

#[tokio::test]
async fn test_send_transaction_rejected() {
    let server = start_server_with(
        16,
        Arc::new(MockCore::Respond(
            CoreStatus::Error,
            Some("AAAAAAAAAGT////7AAAAAA==".to_string()),
        )),
        Arc::new(DisabledPreflight),
    )
    .await;

    let response = rpc(
        &server.base_url,
        "sendTransaction",
        json!({"transaction": envelope_b64(&envelope(1))}),
    )
    .await;
    let result = result(&response);
    assert_eq!(result["status"], "ERROR");
    assert_eq!(result["errorResultXdr"], "AAAAAAAAAGT////7AAAAAA==");
}

#[tokio::test]
async fn test_send_transaction_core_failure() {
    let server = start_server_with(16, Arc::new(MockCore::Fail), Arc::new(DisabledPreflight)).await;
    let response = rpc(
        &server.base_url,
        "sendTransaction",
        json!({"transaction": envelope_b64(&envelope(1))}),
    )
    .await;
    assert_eq!(error_code(&response), -32603);
}

#[tokio::test]
async fn test_send_transaction_bad_envelope() {
    let server = start_server().await;
    for bad in ["###", "AAAA"] {
        let response = rpc(
            &server.base_url,
            "sendTransaction",
            json!({"transaction": bad}),
        )
        .await;
        assert_eq!(error_code(&response), -32602, "envelope: {bad}");
    }
}

// ---------------------------------------------------------------------------
// simulateTransaction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_simulate_transaction() {
    let server = start_server_with(
        16,
        Arc::new(MockCore::Respond(CoreStatus::Pending, None)),
        Arc::new(MockPreflight),
    )
    .await;
    server.entries.seed(77, &[]).unwrap();

    let env = envelope_with_operations(1, vec![bump_sequence_op()]);
    let response = rpc(
        &server.base_url,
        "simulateTransaction",
        json!({"transaction": envelope_b64(&env)}),
    )
    .await;
    let result = result(&response);
    assert_eq!(result["latestLedger"], 77);
    assert_eq!(result["cost"]["cpuInsns"], "123456");
    assert_eq!(result["cost"]["memBytes"], "7890");
    assert_eq!(result["minResourceFee"], "42");
    let results = result["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["xdr"], "AAAAAQ==");
    assert_eq!(results[0]["auth"][0], "AUTH");
    assert_eq!(results[0]["footprint"], "FOOT");
}

#[tokio::test]
async fn test_simulate_transaction_requires_one_operation() {
    let server = start_server_with(
        16,
        Arc::new(MockCore::Respond(CoreStatus::Pending, None)),
        Arc::new(MockPreflight),
    )
    .await;

    let response = rpc(
        &server.base_url,
        "simulateTransaction",
        json!({"transaction": envelope_b64(&envelope(1))}),
    )
    .await;
    assert_eq!(error_code(&response), -32602);

    let two_ops = envelope_with_operations(1, vec![bump_sequence_op(), bump_sequence_op()]);
    let response = rpc(
        &server.base_url,
        "simulateTransaction",
        json!({"transaction": envelope_b64(&two_ops)}),
    )
    .await;
    assert_eq!(error_code(&response), -32602);
}

#[tokio::test]
async fn test_simulate_transaction_engine_unavailable() {
    let server = start_server().await;
    let env = envelope_with_operations(1, vec![bump_sequence_op()]);
    let response = rpc(
        &server.base_url,
        "simulateTransaction",
        json!({"transaction": envelope_b64(&env)}),
    )
    .await;
    assert_eq!(error_code(&response), -32603);
}

// ---------------------------------------------------------------------------
// getLedgerEntries / getLedgerEntry
// ---------------------------------------------------------------------------

fn data_entry(key: u32, val: u32) -> LedgerEntry {
    LedgerEntry {
        last_modified_ledger_seq: 33,
        data: LedgerEntryData::ContractData(ContractDataEntry {
            ext: ExtensionPoint::V0,
            contract: ScAddress::Contract(ContractId(Hash([1; 32]))),
            key: ScVal::U32(key),
            durability: ContractDataDurability::Persistent,
            val: ScVal::U32(val),
        }),
        ext: LedgerEntryExt::V0,
    }
}

fn data_key_b64(key: u32) -> String {
    let key = LedgerKey::ContractData(LedgerKeyContractData {
        contract: ScAddress::Contract(ContractId(Hash([1; 32]))),
        key: ScVal::U32(key),
        durability: ContractDataDurability::Persistent,
    });
    BASE64.encode(key.to_xdr(Limits::none()).unwrap())
}

#[tokio::test]
async fn test_get_ledger_entries() {
    let server = start_server().await;
    server.entries.seed(33, &[data_entry(7, 42)]).unwrap();

    let response = rpc(
        &server.base_url,
        "getLedgerEntries",
        json!({"keys": [data_key_b64(7), data_key_b64(8)]}),
    )
    .await;
    let result = result(&response);
    assert_eq!(result["latestLedger"], "33");
    let entries = result["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["lastModifiedLedgerSeq"], "33");
    assert_eq!(
        entries[0]["xdr"],
        BASE64.encode(data_entry(7, 42).to_xdr(Limits::none()).unwrap())
    );
    assert!(entries[1].is_null());
}

#[tokio::test]
async fn test_get_ledger_entries_validation() {
    let server = start_server().await;
    let response = rpc(&server.base_url, "getLedgerEntries", json!({"keys": []})).await;
    assert_eq!(error_code(&response), -32602);
    let response = rpc(
        &server.base_url,
        "getLedgerEntries",
        json!({"keys": ["not base64"]}),
    )
    .await;
    assert_eq!(error_code(&response), -32602);
}

#[tokio::test]
async fn test_get_ledger_entry_deprecated() {
    let server = start_server().await;
    server.entries.seed(33, &[data_entry(7, 42)]).unwrap();

    let response = rpc(
        &server.base_url,
        "getLedgerEntry",
        json!({"key": data_key_b64(7)}),
    )
    .await;
    let found = result(&response);
    assert_eq!(found["latestLedger"], "33");
    assert_eq!(found["lastModifiedLedgerSeq"], "33");

    // A miss is an invalid-request error on this deprecated path.
    let response = rpc(
        &server.base_url,
        "getLedgerEntry",
        json!({"key": data_key_b64(8)}),
    )
    .await;
    assert_eq!(error_code(&response), -32600);
    assert_eq!(response["error"]["message"], "not found");
}
