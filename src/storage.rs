use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    LedgerEntry, LedgerEntryChange, LedgerEntryData, LedgerKey, LedgerKeyAccount,
    LedgerKeyContractCode, LedgerKeyContractData, LedgerKeyTrustLine, LedgerKeyTtl, Limits,
    TransactionMeta, WriteXdr,
};

use crate::ledger::close::ClosedLedger;
use crate::Error;

/// A ledger entry as served to clients, with its TTL when the entry
/// kind has one.
#[derive(Debug, Clone)]
pub struct EntryResult {
    pub entry: LedgerEntry,
    pub live_until_ledger_seq: Option<u32>,
}

/// A consistent point-in-time view of the ledger-entry storage. The
/// snapshot is released when the value is dropped.
pub trait ReadTx: Send + Sync {
    fn latest_ledger_sequence(&self) -> u32;

    /// Fetch entries for the given keys, position-aligned with the
    /// input; `None` where a key has no live entry.
    fn ledger_entries(&self, keys: &[LedgerKey]) -> Result<Vec<Option<EntryResult>>, Error>;
}

/// Source of [`ReadTx`] snapshots; the seam between the RPC handlers
/// and whatever storage backend holds ledger entries.
#[async_trait]
pub trait ReadTxFactory: Send + Sync {
    async fn read_tx(&self) -> Result<Box<dyn ReadTx>, Error>;
}

#[derive(Debug, Default, Clone)]
struct Snapshot {
    latest_ledger: u32,
    /// Key XDR bytes to the latest live entry under that key.
    entries: BTreeMap<Vec<u8>, LedgerEntry>,
    /// SHA-256 of key XDR to live-until sequence, from `Ttl` entries.
    ttls: BTreeMap<[u8; 32], u32>,
}

/// In-memory ledger-entry view maintained by ingestion from the entry
/// changes in transaction metas. Reads clone an `Arc` of the current
/// snapshot, so a read transaction is isolated from later ingestion.
#[derive(Default)]
pub struct MemoryEntryStore {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a closed ledger's entry changes and advance the latest
    /// sequence. Readers see the previous snapshot until this returns.
    #[tracing::instrument(skip_all, fields(ledger = ledger.head.sequence))]
    pub fn apply(&self, ledger: &ClosedLedger) -> Result<(), Error> {
        let mut next = Snapshot::clone(&self.snapshot.read().expect("entry store lock poisoned"));
        next.latest_ledger = ledger.head.sequence;

        for tx in &ledger.transactions {
            for change in meta_entry_changes(&tx.meta) {
                match change {
                    LedgerEntryChange::Created(entry) | LedgerEntryChange::Updated(entry) => {
                        upsert(&mut next, entry)?;
                    }
                    LedgerEntryChange::Removed(key) => {
                        remove(&mut next, key)?;
                    }
                    _ => {}
                }
            }
        }

        *self.snapshot.write().expect("entry store lock poisoned") = Arc::new(next);
        Ok(())
    }

    /// Install entries directly, outside of ledger ingestion. Used to
    /// prime the view from a snapshot.
    pub fn seed(&self, latest_ledger: u32, entries: &[LedgerEntry]) -> Result<(), Error> {
        let mut next = Snapshot::clone(&self.snapshot.read().expect("entry store lock poisoned"));
        next.latest_ledger = next.latest_ledger.max(latest_ledger);
        for entry in entries {
            upsert(&mut next, entry)?;
        }
        *self.snapshot.write().expect("entry store lock poisoned") = Arc::new(next);
        Ok(())
    }
}

fn upsert(snapshot: &mut Snapshot, entry: &LedgerEntry) -> Result<(), Error> {
    if let LedgerEntryData::Ttl(ttl) = &entry.data {
        snapshot.ttls.insert(ttl.key_hash.0, ttl.live_until_ledger_seq);
        return Ok(());
    }
    let Some(key) = entry_key(entry) else {
        return Ok(());
    };
    snapshot
        .entries
        .insert(key.to_xdr(Limits::none())?, entry.clone());
    Ok(())
}

fn remove(snapshot: &mut Snapshot, key: &LedgerKey) -> Result<(), Error> {
    if let LedgerKey::Ttl(ttl) = key {
        snapshot.ttls.remove(&ttl.key_hash.0);
        return Ok(());
    }
    let encoded = key.to_xdr(Limits::none())?;
    snapshot.entries.remove(&encoded);
    Ok(())
}

/// Key under which an entry is stored. Entry kinds this view does not
/// serve map to `None` and are skipped.
fn entry_key(entry: &LedgerEntry) -> Option<LedgerKey> {
    match &entry.data {
        LedgerEntryData::Account(a) => Some(LedgerKey::Account(LedgerKeyAccount {
            account_id: a.account_id.clone(),
        })),
        LedgerEntryData::Trustline(t) => Some(LedgerKey::Trustline(LedgerKeyTrustLine {
            account_id: t.account_id.clone(),
            asset: t.asset.clone(),
        })),
        LedgerEntryData::ContractData(d) => Some(LedgerKey::ContractData(LedgerKeyContractData {
            contract: d.contract.clone(),
            key: d.key.clone(),
            durability: d.durability,
        })),
        LedgerEntryData::ContractCode(c) => Some(LedgerKey::ContractCode(LedgerKeyContractCode {
            hash: c.hash.clone(),
        })),
        LedgerEntryData::Ttl(t) => Some(LedgerKey::Ttl(LedgerKeyTtl {
            key_hash: t.key_hash.clone(),
        })),
        _ => None,
    }
}

/// All entry changes of a transaction meta, in application order.
fn meta_entry_changes(meta: &TransactionMeta) -> Vec<&LedgerEntryChange> {
    let mut changes = Vec::new();
    match meta {
        TransactionMeta::V3(v3) => {
            changes.extend(v3.tx_changes_before.0.iter());
            for op in v3.operations.iter() {
                changes.extend(op.changes.0.iter());
            }
            changes.extend(v3.tx_changes_after.0.iter());
        }
        TransactionMeta::V4(v4) => {
            changes.extend(v4.tx_changes_before.0.iter());
            for op in v4.operations.iter() {
                changes.extend(op.changes.0.iter());
            }
            changes.extend(v4.tx_changes_after.0.iter());
        }
        _ => {}
    }
    changes
}

struct MemoryReadTx {
    snapshot: Arc<Snapshot>,
}

impl ReadTx for MemoryReadTx {
    fn latest_ledger_sequence(&self) -> u32 {
        self.snapshot.latest_ledger
    }

    fn ledger_entries(&self, keys: &[LedgerKey]) -> Result<Vec<Option<EntryResult>>, Error> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let encoded = key.to_xdr(Limits::none())?;
            let found = self.snapshot.entries.get(&encoded).map(|entry| {
                let live_until = match key {
                    LedgerKey::ContractData(_) | LedgerKey::ContractCode(_) => {
                        let key_hash: [u8; 32] = Sha256::digest(&encoded).into();
                        self.snapshot.ttls.get(&key_hash).copied()
                    }
                    _ => None,
                };
                EntryResult {
                    entry: entry.clone(),
                    live_until_ledger_seq: live_until,
                }
            });
            results.push(found);
        }
        Ok(results)
    }
}

#[async_trait]
impl ReadTxFactory for MemoryEntryStore {
    async fn read_tx(&self) -> Result<Box<dyn ReadTx>, Error> {
        let snapshot = Arc::clone(&self.snapshot.read().expect("entry store lock poisoned"));
        Ok(Box::new(MemoryReadTx { snapshot }))
    }
}
