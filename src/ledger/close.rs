use std::collections::HashMap;

use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    ContractEvent, ContractEventType, FeeBumpTransaction, FeeBumpTransactionInnerTx,
    GeneralizedTransactionSet, Hash, LedgerCloseMeta, Limits, MuxedAccount, Preconditions,
    Transaction, TransactionEnvelope, TransactionExt, TransactionMeta, TransactionPhase,
    TransactionResult, TransactionResultResult, TransactionSignaturePayload,
    TransactionSignaturePayloadTaggedTransaction, TransactionV0, TxSetComponent, WriteXdr,
};

use crate::Error;

/// Sequence and close time of a single ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerInfo {
    pub sequence: u32,
    /// Close time, unix seconds.
    pub close_time: i64,
}

/// Identity of the newest ingested ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerHead {
    pub sequence: u32,
    pub close_time: i64,
    /// Hash of the ledger header.
    pub hash: [u8; 32],
    pub protocol_version: u32,
}

impl LedgerHead {
    pub fn info(&self) -> LedgerInfo {
        LedgerInfo {
            sequence: self.sequence,
            close_time: self.close_time,
        }
    }
}

/// A contract event with the flag recording whether the call that
/// emitted it ultimately succeeded.
#[derive(Debug, Clone)]
pub struct ExtractedEvent {
    pub event: ContractEvent,
    pub in_successful_call: bool,
}

/// Events emitted by one operation, in emission order.
#[derive(Debug, Clone)]
pub struct OperationEvents {
    pub op_index: u32,
    pub events: Vec<ExtractedEvent>,
}

/// One applied transaction of a closed ledger.
#[derive(Debug, Clone)]
pub struct ClosedTransaction {
    pub hash: [u8; 32],
    /// Hash of the wrapped transaction when the envelope is a fee bump.
    pub inner_hash: Option<[u8; 32]>,
    /// Absent when the envelope could not be paired out of the tx set.
    pub envelope: Option<TransactionEnvelope>,
    pub result: TransactionResult,
    pub meta: TransactionMeta,
    /// 1-based application order within the ledger.
    pub application_order: i32,
    pub successful: bool,
    pub events: Vec<OperationEvents>,
}

/// A finalized ledger decoded into the form the stores ingest.
#[derive(Debug, Clone)]
pub struct ClosedLedger {
    pub head: LedgerHead,
    /// Transactions in application order.
    pub transactions: Vec<ClosedTransaction>,
}

impl ClosedLedger {
    pub fn info(&self) -> LedgerInfo {
        self.head.info()
    }
}

/// SHA-256 of the network passphrase, the domain separator for all
/// transaction hashes on a network.
pub fn network_id(passphrase: &str) -> [u8; 32] {
    Sha256::digest(passphrase.as_bytes()).into()
}

fn payload_hash(
    tagged: TransactionSignaturePayloadTaggedTransaction,
    network_id: &[u8; 32],
) -> Result<[u8; 32], Error> {
    let payload = TransactionSignaturePayload {
        network_id: Hash(*network_id),
        tagged_transaction: tagged,
    };
    Ok(Sha256::digest(payload.to_xdr(Limits::none())?).into())
}

/// Network-specific hash of a v1 transaction.
pub fn transaction_hash(tx: &Transaction, network_id: &[u8; 32]) -> Result<[u8; 32], Error> {
    payload_hash(
        TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
        network_id,
    )
}

/// Network-specific hash of a fee-bump wrapper transaction.
pub fn fee_bump_transaction_hash(
    tx: &FeeBumpTransaction,
    network_id: &[u8; 32],
) -> Result<[u8; 32], Error> {
    payload_hash(
        TransactionSignaturePayloadTaggedTransaction::TxFeeBump(tx.clone()),
        network_id,
    )
}

/// Hash of whatever transaction an envelope carries. Legacy v0
/// envelopes hash as their upgraded v1 form.
pub fn envelope_hash(env: &TransactionEnvelope, network_id: &[u8; 32]) -> Result<[u8; 32], Error> {
    match env {
        TransactionEnvelope::TxV0(e) => transaction_hash(&upgrade_v0(&e.tx), network_id),
        TransactionEnvelope::Tx(e) => transaction_hash(&e.tx, network_id),
        TransactionEnvelope::TxFeeBump(e) => fee_bump_transaction_hash(&e.tx, network_id),
    }
}

/// Hash of the wrapped transaction for fee-bump envelopes, `None`
/// otherwise.
pub fn inner_envelope_hash(
    env: &TransactionEnvelope,
    network_id: &[u8; 32],
) -> Result<Option<[u8; 32]>, Error> {
    match env {
        TransactionEnvelope::TxFeeBump(e) => match &e.tx.inner_tx {
            FeeBumpTransactionInnerTx::Tx(inner) => {
                Ok(Some(transaction_hash(&inner.tx, network_id)?))
            }
        },
        _ => Ok(None),
    }
}

/// Lift a legacy v0 transaction into the v1 form, the shape hashing
/// and simulation operate on.
pub fn upgrade_v0(tx: &TransactionV0) -> Transaction {
    Transaction {
        source_account: MuxedAccount::Ed25519(tx.source_account_ed25519.clone()),
        fee: tx.fee,
        seq_num: tx.seq_num.clone(),
        cond: match &tx.time_bounds {
            Some(tb) => Preconditions::Time(tb.clone()),
            None => Preconditions::None,
        },
        memo: tx.memo.clone(),
        operations: tx.operations.clone(),
        ext: TransactionExt::V0,
    }
}

fn is_success(result: &TransactionResult) -> bool {
    matches!(
        result.result,
        TransactionResultResult::TxSuccess(_) | TransactionResultResult::TxFeeBumpInnerSuccess(_)
    )
}

/// Collect the envelopes of a ledger's transaction set. Post-V0 phases
/// (parallel execution stages) are not traversed.
fn tx_set_envelopes(meta: &LedgerCloseMeta) -> Vec<&TransactionEnvelope> {
    match meta {
        LedgerCloseMeta::V0(v0) => v0.tx_set.txs.iter().collect(),
        LedgerCloseMeta::V1(v1) => generalized_envelopes(&v1.tx_set),
        LedgerCloseMeta::V2(v2) => generalized_envelopes(&v2.tx_set),
    }
}

fn generalized_envelopes(set: &GeneralizedTransactionSet) -> Vec<&TransactionEnvelope> {
    let mut envelopes = Vec::new();
    match set {
        GeneralizedTransactionSet::V1(v1) => {
            for phase in v1.phases.iter() {
                match phase {
                    TransactionPhase::V0(components) => {
                        for component in components.iter() {
                            match component {
                                TxSetComponent::TxsetCompTxsMaybeDiscountedFee(c) => {
                                    envelopes.extend(c.txs.iter());
                                }
                            }
                        }
                    }
                    _ => {
                        tracing::debug!("skipping non-v0 transaction phase in tx set");
                    }
                }
            }
        }
    }
    envelopes
}

/// Flatten a transaction's meta into per-operation event groups.
///
/// V3 metas carry a single flat soroban event list (operation index 0)
/// plus diagnostics; V4 metas carry events per operation and
/// transaction-stage events, which take the slot after the last
/// operation so cursor order matches emission order.
fn extract_tx_events(meta: &TransactionMeta, tx_successful: bool) -> Vec<OperationEvents> {
    match meta {
        TransactionMeta::V3(v3) => {
            let Some(soroban) = &v3.soroban_meta else {
                return Vec::new();
            };
            let mut events: Vec<ExtractedEvent> = soroban
                .events
                .iter()
                .map(|e| ExtractedEvent {
                    event: e.clone(),
                    in_successful_call: tx_successful,
                })
                .collect();
            for diag in soroban.diagnostic_events.iter() {
                if diag.event.type_ == ContractEventType::Diagnostic {
                    events.push(ExtractedEvent {
                        event: diag.event.clone(),
                        in_successful_call: diag.in_successful_contract_call,
                    });
                }
            }
            if events.is_empty() {
                Vec::new()
            } else {
                vec![OperationEvents {
                    op_index: 0,
                    events,
                }]
            }
        }
        TransactionMeta::V4(v4) => {
            let mut groups = Vec::new();
            for (op_index, op) in v4.operations.iter().enumerate() {
                if op.events.is_empty() {
                    continue;
                }
                groups.push(OperationEvents {
                    op_index: op_index as u32,
                    events: op
                        .events
                        .iter()
                        .map(|e| ExtractedEvent {
                            event: e.clone(),
                            in_successful_call: tx_successful,
                        })
                        .collect(),
                });
            }
            if !v4.events.is_empty() {
                groups.push(OperationEvents {
                    op_index: v4.operations.len() as u32,
                    events: v4
                        .events
                        .iter()
                        .map(|te| ExtractedEvent {
                            event: te.event.clone(),
                            in_successful_call: tx_successful,
                        })
                        .collect(),
                });
            }
            groups
        }
        _ => Vec::new(),
    }
}

fn ledger_head(meta: &LedgerCloseMeta) -> LedgerHead {
    let entry = match meta {
        LedgerCloseMeta::V0(v0) => &v0.ledger_header,
        LedgerCloseMeta::V1(v1) => &v1.ledger_header,
        LedgerCloseMeta::V2(v2) => &v2.ledger_header,
    };
    LedgerHead {
        sequence: entry.header.ledger_seq,
        close_time: entry.header.scp_value.close_time.0 as i64,
        hash: entry.hash.0,
        protocol_version: entry.header.ledger_version,
    }
}

fn closed_transaction(
    index: usize,
    tx_hash: [u8; 32],
    result: &TransactionResult,
    tx_meta: &TransactionMeta,
    envelopes: &mut HashMap<[u8; 32], &TransactionEnvelope>,
    network_id: &[u8; 32],
    ledger_seq: u32,
) -> Result<ClosedTransaction, Error> {
    let envelope = envelopes.remove(&tx_hash).cloned();
    if envelope.is_none() {
        tracing::debug!(
            ledger = ledger_seq,
            tx = index,
            "transaction envelope not found in tx set"
        );
    }
    let inner_hash = match &envelope {
        Some(env) => inner_envelope_hash(env, network_id)?,
        None => None,
    };
    let successful = is_success(result);
    Ok(ClosedTransaction {
        hash: tx_hash,
        inner_hash,
        envelope,
        result: result.clone(),
        meta: tx_meta.clone(),
        application_order: (index + 1) as i32,
        successful,
        events: extract_tx_events(tx_meta, successful),
    })
}

/// Decode a ledger close meta into the domain form, pairing tx-set
/// envelopes with application-ordered results by transaction hash.
pub fn close_ledger(meta: &LedgerCloseMeta, network_id: &[u8; 32]) -> Result<ClosedLedger, Error> {
    let head = ledger_head(meta);

    let mut envelopes: HashMap<[u8; 32], &TransactionEnvelope> = HashMap::new();
    for env in tx_set_envelopes(meta) {
        envelopes.insert(envelope_hash(env, network_id)?, env);
    }

    let mut transactions = Vec::new();
    match meta {
        LedgerCloseMeta::V0(v0) => {
            for (i, trm) in v0.tx_processing.iter().enumerate() {
                transactions.push(closed_transaction(
                    i,
                    trm.result.transaction_hash.0,
                    &trm.result.result,
                    &trm.tx_apply_processing,
                    &mut envelopes,
                    network_id,
                    head.sequence,
                )?);
            }
        }
        LedgerCloseMeta::V1(v1) => {
            for (i, trm) in v1.tx_processing.iter().enumerate() {
                transactions.push(closed_transaction(
                    i,
                    trm.result.transaction_hash.0,
                    &trm.result.result,
                    &trm.tx_apply_processing,
                    &mut envelopes,
                    network_id,
                    head.sequence,
                )?);
            }
        }
        LedgerCloseMeta::V2(v2) => {
            for (i, trm) in v2.tx_processing.iter().enumerate() {
                transactions.push(closed_transaction(
                    i,
                    trm.result.transaction_hash.0,
                    &trm.result.result,
                    &trm.tx_apply_processing,
                    &mut envelopes,
                    network_id,
                    head.sequence,
                )?);
            }
        }
    }

    Ok(ClosedLedger { head, transactions })
}
