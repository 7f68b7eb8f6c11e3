use crate::Error;

/// A single ledger's worth of content held by a [`LedgerBucketWindow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerBucket<T> {
    pub ledger_seq: u32,
    /// Ledger close time, unix seconds.
    pub close_timestamp: i64,
    pub content: T,
}

/// Fixed-capacity ring buffer of per-ledger buckets with strictly
/// contiguous sequence numbers.
///
/// All slots are allocated up front; appending past capacity overwrites
/// (and returns) the oldest bucket. Both the transactions and events
/// stores are built on this single primitive.
pub struct LedgerBucketWindow<T> {
    buckets: Vec<Option<LedgerBucket<T>>>,
    start: usize,
    len: u32,
    capacity: u32,
}

impl<T> LedgerBucketWindow<T> {
    /// Create a window holding up to `capacity` buckets. A capacity of
    /// zero is clamped to one: the retention window must always hold at
    /// least the latest ledger.
    pub fn new(capacity: u32) -> Self {
        let capacity = capacity.max(1);
        let mut buckets = Vec::with_capacity(capacity as usize);
        buckets.resize_with(capacity as usize, || None);
        Self {
            buckets,
            start: 0,
            len: 0,
            capacity,
        }
    }

    /// Append the next bucket, returning the evicted bucket if the
    /// window was full.
    ///
    /// The bucket's sequence must be exactly one past the newest bucket
    /// already held; otherwise the append fails with
    /// [`Error::NotContiguous`] and the window is left untouched. The
    /// first append accepts any sequence.
    pub fn append(&mut self, bucket: LedgerBucket<T>) -> Result<Option<LedgerBucket<T>>, Error> {
        if self.len > 0 {
            let expected = self.last_ledger_seq().unwrap_or(0) + 1;
            if bucket.ledger_seq != expected {
                return Err(Error::NotContiguous {
                    expected,
                    received: bucket.ledger_seq,
                });
            }
        }

        if self.len == self.capacity {
            let evicted = self.buckets[self.start].replace(bucket);
            self.start = (self.start + 1) % self.capacity as usize;
            Ok(evicted)
        } else {
            let slot = (self.start + self.len as usize) % self.capacity as usize;
            self.buckets[slot] = Some(bucket);
            self.len += 1;
            Ok(None)
        }
    }

    /// Fetch the bucket at logical index `i`, where index 0 is the
    /// oldest bucket held.
    pub fn get(&self, i: u32) -> Result<&LedgerBucket<T>, Error> {
        if i >= self.len {
            return Err(Error::OutOfRange {
                index: i,
                len: self.len,
            });
        }
        let slot = (self.start + i as usize) % self.capacity as usize;
        Ok(self.buckets[slot]
            .as_ref()
            .expect("populated window slot"))
    }

    /// Number of buckets currently held.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Option<&LedgerBucket<T>> {
        self.get(0).ok()
    }

    pub fn last(&self) -> Option<&LedgerBucket<T>> {
        if self.len == 0 {
            None
        } else {
            self.get(self.len - 1).ok()
        }
    }

    pub fn first_ledger_seq(&self) -> Option<u32> {
        self.first().map(|b| b.ledger_seq)
    }

    pub fn last_ledger_seq(&self) -> Option<u32> {
        self.last().map(|b| b.ledger_seq)
    }

    /// Iterate buckets oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &LedgerBucket<T>> {
        (0..self.len).map(move |i| {
            let slot = (self.start + i as usize) % self.capacity as usize;
            self.buckets[slot].as_ref().expect("populated window slot")
        })
    }
}
