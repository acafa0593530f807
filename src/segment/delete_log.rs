//! The deletion log: append-only (row id, timestamp) tombstones.
//!
//! Deletion is logical. Markers follow the same two-phase reserve/commit
//! protocol as inserts and are consulted by search as a visibility filter:
//! a marker `(id, t_d)` hides rows of that id inserted at or before `t_d`
//! from every snapshot at or after `t_d`.

use ahash::AHashMap;

use crate::error::{Result, XystonError};
use crate::segment::chunked::ChunkedColumn;
use crate::segment::reserve::{CommitWatermark, OffsetAllocator};

/// Append-only tombstone log with two-phase reserve/commit writes.
pub(crate) struct DeleteLog {
    row_ids: ChunkedColumn<i64>,
    timestamps: ChunkedColumn<u64>,
    allocator: OffsetAllocator,
    watermark: CommitWatermark,
}

impl DeleteLog {
    /// Create an empty tombstone log.
    pub fn new(rows_per_chunk: usize, max_deletes: u64) -> Self {
        DeleteLog {
            row_ids: ChunkedColumn::new(1, rows_per_chunk),
            timestamps: ChunkedColumn::new(1, rows_per_chunk),
            allocator: OffsetAllocator::new(max_deletes),
            watermark: CommitWatermark::new(),
        }
    }

    /// Reserve `count` tombstone slots.
    pub fn reserve(&self, count: u64) -> Result<u64> {
        if count == 0 {
            return Err(XystonError::invalid_argument(
                "cannot reserve zero tombstone slots",
            ));
        }
        let offset = self.allocator.reserve(count)?;
        let reserved = self.allocator.reserved() as usize;
        self.row_ids.ensure_capacity(reserved);
        self.timestamps.ensure_capacity(reserved);
        Ok(offset)
    }

    /// Commit tombstones into a previously reserved range.
    pub fn commit(&self, offset: u64, row_ids: &[i64], timestamps: &[u64]) -> Result<()> {
        let count = row_ids.len();
        if count == 0 {
            return Err(XystonError::invalid_argument(
                "cannot commit zero tombstones",
            ));
        }
        if timestamps.len() != count {
            return Err(XystonError::invalid_argument(format!(
                "row id count {count} does not match timestamp count {}",
                timestamps.len()
            )));
        }
        let end = offset
            .checked_add(count as u64)
            .ok_or_else(|| XystonError::invalid_argument("tombstone range overflows"))?;
        if end > self.allocator.reserved() {
            return Err(XystonError::invalid_argument(format!(
                "tombstone range [{offset}, {end}) exceeds reserved count {}",
                self.allocator.reserved()
            )));
        }

        self.row_ids.write_rows(offset as usize, row_ids);
        self.timestamps.write_rows(offset as usize, timestamps);
        self.watermark.publish(offset, end);
        Ok(())
    }

    /// Tombstones committed and visible to readers.
    pub fn committed_count(&self) -> u64 {
        self.watermark.committed()
    }

    /// Build the filter for one snapshot timestamp: row id to the newest
    /// marker timestamp at or below the snapshot.
    pub fn tombstones_at(&self, snapshot: u64) -> AHashMap<i64, u64> {
        let committed = self.watermark.committed() as usize;
        let ids = self.row_ids.reader();
        let timestamps = self.timestamps.reader();

        let mut map = AHashMap::new();
        for i in 0..committed {
            let ts = timestamps.value(i);
            if ts <= snapshot {
                let entry = map.entry(ids.value(i)).or_insert(ts);
                if *entry < ts {
                    *entry = ts;
                }
            }
        }
        map
    }

    /// Bytes held by both columns. O(1).
    pub fn memory_usage_in_bytes(&self) -> usize {
        self.row_ids.memory_usage_in_bytes() + self.timestamps.memory_usage_in_bytes()
    }
}
