use std::sync::RwLock;

use stellar_xdr::curr::ContractEvent;

use crate::ledger::close::{ClosedLedger, LedgerInfo};
use crate::ledger::cursor::Cursor;
use crate::window::{LedgerBucket, LedgerBucketWindow};
use crate::Error;

/// A contract event at its totally ordered position in the stream.
#[derive(Debug, Clone)]
pub struct EventEntry {
    pub cursor: Cursor,
    pub event: ContractEvent,
    /// 1-based application order of the emitting transaction.
    pub tx_index: u32,
    pub in_successful_contract_call: bool,
}

/// Half-open scan interval over cursors.
///
/// `clamp_start` pulls a start below the retention window up to the
/// oldest retained ledger instead of failing; `clamp_end` caps the end
/// at the position just past the newest retained ledger.
#[derive(Debug, Clone, Copy)]
pub struct ScanRange {
    pub start: Cursor,
    pub clamp_start: bool,
    pub end: Cursor,
    pub clamp_end: bool,
}

/// In-memory retention of the contract events of recently closed
/// ledgers, scanned in cursor order.
pub struct EventStore {
    window: RwLock<LedgerBucketWindow<Vec<EventEntry>>>,
}

impl EventStore {
    /// Create a store retaining up to `retention_window` ledgers of
    /// events.
    pub fn new(retention_window: u32) -> Self {
        Self {
            window: RwLock::new(LedgerBucketWindow::new(retention_window)),
        }
    }

    /// Ingest a closed ledger's events in deterministic
    /// (tx, op, event) order. Eviction needs no extra bookkeeping:
    /// entries live only inside their bucket.
    #[tracing::instrument(skip_all, fields(ledger = ledger.head.sequence))]
    pub fn ingest(&self, ledger: &ClosedLedger) -> Result<(), Error> {
        let sequence = ledger.head.sequence;
        let mut entries = Vec::new();
        for tx in &ledger.transactions {
            let tx_index = tx.application_order as u32;
            for group in &tx.events {
                for (event_index, extracted) in group.events.iter().enumerate() {
                    entries.push(EventEntry {
                        cursor: Cursor {
                            ledger: sequence,
                            tx: tx_index,
                            op: group.op_index,
                            event: event_index as u32,
                        },
                        event: extracted.event.clone(),
                        tx_index,
                        in_successful_contract_call: extracted.in_successful_call,
                    });
                }
            }
        }
        let count = entries.len();

        let mut window = self.window.write().expect("event store lock poisoned");
        window.append(LedgerBucket {
            ledger_seq: sequence,
            close_timestamp: ledger.head.close_time,
            content: entries,
        })?;

        metrics::counter!("events_ingested_total").increment(count as u64);
        tracing::debug!(events = count, "ingested ledger events");
        Ok(())
    }

    /// Walk events in cursor order from the first entry at or past
    /// `range.start` up to (exclusive) the first entry at or past
    /// `range.end`, feeding each to `visit` together with its ledger's
    /// close timestamp. Visiting stops when `visit` returns `false`.
    ///
    /// The whole walk runs under the store's read lock, so it observes
    /// ledgers wholly or not at all; `visit` must not call back into
    /// this store. An empty store yields no events and no error.
    pub fn scan(
        &self,
        range: ScanRange,
        mut visit: impl FnMut(&EventEntry, i64) -> bool,
    ) -> Result<(), Error> {
        let window = self.window.read().expect("event store lock poisoned");
        let (Some(first), Some(last)) = (window.first_ledger_seq(), window.last_ledger_seq())
        else {
            return Ok(());
        };

        let mut start = range.start;
        if start.ledger < first {
            if !range.clamp_start {
                return Err(Error::StartBeforeOldest {
                    start: start.ledger,
                    oldest: first,
                });
            }
            start = Cursor::ledger_start(first);
        }
        if start.ledger > last {
            return Err(Error::StartAfterNewest {
                start: start.ledger,
                newest: last,
            });
        }

        let mut end = range.end;
        if range.clamp_end {
            end = end.min(Cursor::ledger_start(last.saturating_add(1)));
        }
        if start >= end {
            return Ok(());
        }

        // Buckets are contiguous, so the start ledger's logical index
        // is a direct offset.
        for idx in (start.ledger - first)..window.len() {
            let bucket = window.get(idx)?;
            let begin = bucket.content.partition_point(|e| e.cursor < start);
            for entry in &bucket.content[begin..] {
                if entry.cursor >= end {
                    return Ok(());
                }
                if !visit(entry, bucket.close_timestamp) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Sequence and close time of the newest retained ledger.
    pub fn latest_ledger(&self) -> Option<LedgerInfo> {
        let window = self.window.read().expect("event store lock poisoned");
        window.last().map(|b| LedgerInfo {
            sequence: b.ledger_seq,
            close_time: b.close_timestamp,
        })
    }
}
