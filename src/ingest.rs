use std::sync::Arc;
use std::time::Duration;

use crate::ledger::close::ClosedLedger;
use crate::ledger::source::LedgerSource;
use crate::storage::MemoryEntryStore;
use crate::{AppState, Error};

/// Pause after a source or apply failure before retrying.
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Fallback starting ledger when discovery fails: a recent pubnet
/// sequence, so a fresh server does not crawl from genesis.
const FALLBACK_START_LEDGER: u32 = 58_000_000;

/// Single-writer ingestion loop: pulls closed ledgers from the source
/// in sequence and applies each one to the transaction store, the
/// event store, and the ledger-entry view before publishing it as the
/// head.
pub async fn run_ingest(
    source: Arc<dyn LedgerSource>,
    state: Arc<AppState>,
    entries: Arc<MemoryEntryStore>,
    start_ledger: Option<u32>,
) {
    let mut sequence = match start_ledger {
        Some(sequence) => sequence,
        None => match source.discover_start().await {
            Some(sequence) => {
                tracing::info!(ledger = sequence, "discovered latest ledger");
                // Back off a little so the window opens with some data.
                sequence.saturating_sub(10).max(2)
            }
            None => {
                tracing::warn!("could not discover a starting ledger, using fallback");
                FALLBACK_START_LEDGER
            }
        },
    };

    tracing::info!(start = sequence, "starting ledger ingestion");

    loop {
        let ledger = match source.next_ledger(sequence).await {
            Ok(ledger) => ledger,
            Err(e) => {
                tracing::error!(ledger = sequence, error = %e, "ledger source failed");
                tokio::time::sleep(RETRY_INTERVAL).await;
                continue;
            }
        };

        match apply(&state, &entries, &ledger) {
            Ok(()) => {
                sequence += 1;
            }
            Err(Error::NotContiguous { expected, received }) => {
                // The stores fell out of step with the requested
                // sequence. Reads keep serving the retained window;
                // ingestion resumes from the sequence the stores
                // expect.
                tracing::error!(
                    expected,
                    received,
                    "ingestion lost contiguity, resuming from last good ledger"
                );
                sequence = expected;
            }
            Err(e) => {
                tracing::error!(ledger = ledger.head.sequence, error = %e, "failed to apply ledger");
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
        }
    }
}

/// Apply one closed ledger everywhere. A store that already holds the
/// sequence is skipped, which makes re-applying after a partial
/// failure safe.
fn apply(state: &AppState, entries: &MemoryEntryStore, ledger: &ClosedLedger) -> Result<(), Error> {
    let sequence = ledger.head.sequence;

    if state
        .transactions
        .latest_ledger()
        .is_none_or(|l| l.sequence < sequence)
    {
        state.transactions.ingest(ledger)?;
    }
    if state
        .events
        .latest_ledger()
        .is_none_or(|l| l.sequence < sequence)
    {
        state.events.ingest(ledger)?;
    }
    entries.apply(ledger)?;

    *state.head.write().expect("head lock poisoned") = Some(ledger.head);

    metrics::counter!("ledgers_ingested_total").increment(1);
    metrics::gauge!("latest_ledger_sequence").set(sequence as f64);
    tracing::info!(
        ledger = sequence,
        transactions = ledger.transactions.len(),
        "ingested ledger"
    );
    Ok(())
}
