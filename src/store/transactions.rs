use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stellar_xdr::curr::{TransactionEnvelope, TransactionMeta, TransactionResult};

use super::StoreRange;
use crate::ledger::close::{ClosedLedger, LedgerInfo};
use crate::window::{LedgerBucket, LedgerBucketWindow};
use crate::Error;

/// A retained transaction, keyed by hash. Fee-bump transactions are
/// reachable under both the wrapper and the wrapped hash, sharing one
/// entry.
#[derive(Debug, Clone)]
pub struct TransactionEntry {
    pub envelope: TransactionEnvelope,
    pub result: TransactionResult,
    pub meta: TransactionMeta,
    pub successful: bool,
    pub fee_bump: bool,
    /// 1-based position within the ledger.
    pub application_order: i32,
    pub ledger: LedgerInfo,
}

struct Inner {
    /// Per-ledger lists of every hash indexed for that ledger, so an
    /// evicted bucket names exactly the map entries to drop.
    window: LedgerBucketWindow<Vec<[u8; 32]>>,
    by_hash: HashMap<[u8; 32], Arc<TransactionEntry>>,
}

/// In-memory index of the transactions of recently closed ledgers.
///
/// One lock guards the window and the hash index together: ingestion
/// takes it for writing across the whole append/evict/insert sequence,
/// so readers never observe a ledger's transactions partially.
pub struct TransactionStore {
    inner: RwLock<Inner>,
}

impl TransactionStore {
    /// Create a store retaining up to `retention_window` ledgers.
    pub fn new(retention_window: u32) -> Self {
        Self {
            inner: RwLock::new(Inner {
                window: LedgerBucketWindow::new(retention_window),
                by_hash: HashMap::new(),
            }),
        }
    }

    /// Ingest a closed ledger's transactions. Fails with
    /// [`Error::NotContiguous`], leaving the store untouched, when the
    /// ledger does not directly follow the newest one retained.
    #[tracing::instrument(skip_all, fields(ledger = ledger.head.sequence))]
    pub fn ingest(&self, ledger: &ClosedLedger) -> Result<(), Error> {
        let mut hashes = Vec::new();
        let mut entries: Vec<([u8; 32], Arc<TransactionEntry>)> = Vec::new();

        for tx in &ledger.transactions {
            let Some(envelope) = &tx.envelope else {
                tracing::warn!(
                    ledger = ledger.head.sequence,
                    tx = tx.application_order,
                    "transaction without an envelope, not indexing"
                );
                continue;
            };
            let entry = Arc::new(TransactionEntry {
                envelope: envelope.clone(),
                result: tx.result.clone(),
                meta: tx.meta.clone(),
                successful: tx.successful,
                fee_bump: tx.inner_hash.is_some(),
                application_order: tx.application_order,
                ledger: ledger.info(),
            });
            hashes.push(tx.hash);
            entries.push((tx.hash, Arc::clone(&entry)));
            if let Some(inner_hash) = tx.inner_hash {
                hashes.push(inner_hash);
                entries.push((inner_hash, entry));
            }
        }

        let mut inner = self.inner.write().expect("transaction store lock poisoned");
        let evicted = inner.window.append(LedgerBucket {
            ledger_seq: ledger.head.sequence,
            close_timestamp: ledger.head.close_time,
            content: hashes,
        })?;
        if let Some(evicted) = evicted {
            for hash in &evicted.content {
                inner.by_hash.remove(hash);
            }
        }
        let count = entries.len();
        for (hash, entry) in entries {
            inner.by_hash.insert(hash, entry);
        }

        metrics::counter!("transactions_ingested_total").increment(count as u64);
        metrics::gauge!("transactions_indexed").set(inner.by_hash.len() as f64);
        tracing::debug!(indexed = count, "ingested ledger transactions");
        Ok(())
    }

    /// Look up a transaction by hash. The store's current range rides
    /// along with every answer, found or not.
    pub fn get_transaction(
        &self,
        hash: &[u8; 32],
    ) -> (Option<Arc<TransactionEntry>>, Option<StoreRange>) {
        let inner = self.inner.read().expect("transaction store lock poisoned");
        (inner.by_hash.get(hash).cloned(), range_of(&inner.window))
    }

    /// Sequence and close time of the newest retained ledger.
    pub fn latest_ledger(&self) -> Option<LedgerInfo> {
        let inner = self.inner.read().expect("transaction store lock poisoned");
        inner.window.last().map(|b| LedgerInfo {
            sequence: b.ledger_seq,
            close_time: b.close_timestamp,
        })
    }

    pub fn range(&self) -> Option<StoreRange> {
        let inner = self.inner.read().expect("transaction store lock poisoned");
        range_of(&inner.window)
    }
}

fn range_of(window: &LedgerBucketWindow<Vec<[u8; 32]>>) -> Option<StoreRange> {
    let first = window.first()?;
    let last = window.last()?;
    Some(StoreRange {
        first: LedgerInfo {
            sequence: first.ledger_seq,
            close_time: first.close_timestamp,
        },
        last: LedgerInfo {
            sequence: last.ledger_seq,
            close_time: last.close_timestamp,
        },
    })
}
