use std::fmt;
use std::str::FromStr;

use crate::Error;

// SEP-35 total order ID packing: 32 bits of ledger sequence, 20 bits of
// transaction application order, 12 bits of operation index.
const TOID_LEDGER_SHIFT: u64 = 32;
const TOID_TX_SHIFT: u64 = 12;
const TOID_TX_MASK: u64 = (1 << 20) - 1;
const TOID_OP_MASK: u64 = (1 << 12) - 1;

/// Totally ordered position of a contract event in the ledger stream.
///
/// Ordering is lexicographic over `(ledger, tx, op, event)`, matching
/// the deterministic order in which events are produced. `tx` is the
/// 1-based application order of the transaction within its ledger.
///
/// The textual form doubles as the public event id and paging token:
/// a 19-digit SEP-35 TOID followed by a 10-digit, 1-based event index,
/// so byte-lexicographic comparison of ids agrees with cursor order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    pub ledger: u32,
    pub tx: u32,
    pub op: u32,
    pub event: u32,
}

impl Cursor {
    /// Sentinel ordering after every real cursor.
    pub const MAX: Cursor = Cursor {
        ledger: u32::MAX,
        tx: u32::MAX,
        op: u32::MAX,
        event: u32::MAX,
    };

    /// Cursor of the first possible event in `ledger`.
    pub fn ledger_start(ledger: u32) -> Cursor {
        Cursor {
            ledger,
            tx: 0,
            op: 0,
            event: 0,
        }
    }

    /// The smallest cursor strictly greater than `self`. Pagination
    /// resumes scanning here so the event named by a paging token is
    /// not returned again.
    pub fn successor(&self) -> Cursor {
        Cursor {
            event: self.event.saturating_add(1),
            ..*self
        }
    }

    fn toid(&self) -> u64 {
        (u64::from(self.ledger) << TOID_LEDGER_SHIFT)
            | ((u64::from(self.tx) & TOID_TX_MASK) << TOID_TX_SHIFT)
            | (u64::from(self.op) & TOID_OP_MASK)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:019}-{:010}", self.toid(), u64::from(self.event) + 1)
    }
}

impl FromStr for Cursor {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (toid_part, event_part) = input
            .split_once('-')
            .ok_or_else(|| Error::BadCursor(input.to_string()))?;

        let toid: u64 = toid_part
            .parse()
            .map_err(|_| Error::BadCursor(input.to_string()))?;
        let event_order: u64 = event_part
            .parse()
            .map_err(|_| Error::BadCursor(input.to_string()))?;

        // The event component is stored 1-based; decrement back.
        let event: u32 = event_order
            .saturating_sub(1)
            .try_into()
            .map_err(|_| Error::BadCursor(input.to_string()))?;

        Ok(Cursor {
            ledger: (toid >> TOID_LEDGER_SHIFT) as u32,
            tx: ((toid >> TOID_TX_SHIFT) & TOID_TX_MASK) as u32,
            op: (toid & TOID_OP_MASK) as u32,
            event,
        })
    }
}
