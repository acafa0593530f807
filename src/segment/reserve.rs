//! Offset reservation and commit publication.
//!
//! [`OffsetAllocator`] is the single mandatory synchronization point of the
//! insert and delete paths: one atomic counter handing out contiguous,
//! non-overlapping slot ranges. [`CommitWatermark`] turns per-range commit
//! completions, which may land out of order, into a single monotonically
//! increasing committed count that readers can trust.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{Result, XystonError};

/// Serialized reservation of contiguous slot ranges.
pub(crate) struct OffsetAllocator {
    next: AtomicU64,
    limit: u64,
}

impl OffsetAllocator {
    /// Create an allocator that hands out offsets in `[0, limit)`.
    pub fn new(limit: u64) -> Self {
        OffsetAllocator {
            next: AtomicU64::new(0),
            limit,
        }
    }

    /// Reserve `count` slots and return the start offset of the range.
    ///
    /// A failed reservation leaves the counter exactly where it was.
    pub fn reserve(&self, count: u64) -> Result<u64> {
        let limit = self.limit;
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current
                    .checked_add(count)
                    .filter(|end| *end <= limit)
            })
            .map_err(|current| {
                XystonError::resource_exhausted(format!(
                    "cannot reserve {count} slots at offset {current}, limit is {limit}"
                ))
            })
    }

    /// Total slots reserved so far.
    pub fn reserved(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// Publishes the largest contiguously committed prefix of a log.
///
/// Writers register their finished range after copying data; ranges that
/// complete ahead of an earlier, still-open reservation park in `pending`
/// until the gap closes. Readers observe the watermark with acquire ordering,
/// which makes every write behind it visible.
pub(crate) struct CommitWatermark {
    committed: AtomicU64,
    pending: Mutex<BTreeMap<u64, u64>>,
}

impl CommitWatermark {
    /// Create a watermark at zero.
    pub fn new() -> Self {
        CommitWatermark {
            committed: AtomicU64::new(0),
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register the completed range `[start, end)` and advance the watermark
    /// across every contiguously committed range.
    pub fn publish(&self, start: u64, end: u64) {
        debug_assert!(start < end);
        let mut pending = self.pending.lock();
        pending.insert(start, end);

        let mut committed = self.committed.load(Ordering::Relaxed);
        while let Some((&first_start, &first_end)) = pending.first_key_value() {
            if first_start != committed {
                break;
            }
            pending.remove(&first_start);
            committed = first_end;
        }
        self.committed.store(committed, Ordering::Release);
    }

    /// The committed count: every slot below it holds fully written data.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_reserve_is_monotonic() {
        let allocator = OffsetAllocator::new(100);
        assert_eq!(allocator.reserve(3).unwrap(), 0);
        assert_eq!(allocator.reserve(5).unwrap(), 3);
        assert_eq!(allocator.reserve(1).unwrap(), 8);
        assert_eq!(allocator.reserved(), 9);
    }

    #[test]
    fn test_reserve_exhaustion_leaves_counter_untouched() {
        let allocator = OffsetAllocator::new(10);
        assert_eq!(allocator.reserve(8).unwrap(), 0);
        assert!(allocator.reserve(3).is_err());
        assert_eq!(allocator.reserved(), 8);
        assert_eq!(allocator.reserve(2).unwrap(), 8);
    }

    #[test]
    fn test_concurrent_reservations_are_disjoint() {
        let allocator = Arc::new(OffsetAllocator::new(u64::MAX));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let allocator = Arc::clone(&allocator);
            handles.push(thread::spawn(move || {
                let mut ranges = Vec::new();
                for i in 0..100u64 {
                    let count = 1 + (i % 7);
                    let start = allocator.reserve(count).unwrap();
                    ranges.push((start, start + count));
                }
                ranges
            }));
        }

        let mut all: Vec<(u64, u64)> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();

        // Pairwise disjoint and jointly gapless.
        let mut expected_start = 0;
        for (start, end) in all {
            assert_eq!(start, expected_start);
            expected_start = end;
        }
        assert_eq!(expected_start, allocator.reserved());
    }

    #[test]
    fn test_watermark_in_order() {
        let watermark = CommitWatermark::new();
        watermark.publish(0, 3);
        assert_eq!(watermark.committed(), 3);
        watermark.publish(3, 7);
        assert_eq!(watermark.committed(), 7);
    }

    #[test]
    fn test_watermark_out_of_order() {
        let watermark = CommitWatermark::new();
        watermark.publish(3, 7);
        assert_eq!(watermark.committed(), 0);
        watermark.publish(7, 8);
        assert_eq!(watermark.committed(), 0);
        watermark.publish(0, 3);
        assert_eq!(watermark.committed(), 8);
    }
}
