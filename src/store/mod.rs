pub mod events;
pub mod transactions;

use crate::ledger::close::LedgerInfo;

/// The span of ledgers a store currently retains, reported alongside
/// every read so callers can tell a miss from an eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreRange {
    pub first: LedgerInfo,
    pub last: LedgerInfo,
}
