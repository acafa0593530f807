//! The insert log: row ids, timestamps, and raw row bytes.
//!
//! Storage is row-major: each committed row occupies one fixed stride of
//! bytes holding every field of the schema, with the id and timestamp kept in
//! parallel columns. All three columns share one allocator and one watermark,
//! so a row becomes visible atomically across them.

use crate::error::{Result, XystonError};
use crate::segment::chunked::{ChunkedColumn, ColumnReader};
use crate::segment::reserve::{CommitWatermark, OffsetAllocator};

/// Append-only row storage with two-phase reserve/commit writes.
pub(crate) struct InsertLog {
    stride: usize,
    row_ids: ChunkedColumn<i64>,
    timestamps: ChunkedColumn<u64>,
    rows: ChunkedColumn<u8>,
    allocator: OffsetAllocator,
    watermark: CommitWatermark,
}

impl InsertLog {
    /// Create a log for rows of `stride` bytes.
    pub fn new(stride: usize, rows_per_chunk: usize, max_rows: u64) -> Self {
        InsertLog {
            stride,
            row_ids: ChunkedColumn::new(1, rows_per_chunk),
            timestamps: ChunkedColumn::new(1, rows_per_chunk),
            rows: ChunkedColumn::new(stride, rows_per_chunk),
            allocator: OffsetAllocator::new(max_rows),
            watermark: CommitWatermark::new(),
        }
    }

    /// Reserve `count` row slots and pre-grow storage to cover them.
    pub fn reserve(&self, count: u64) -> Result<u64> {
        if count == 0 {
            return Err(XystonError::invalid_argument(
                "cannot reserve zero row slots",
            ));
        }
        let offset = self.allocator.reserve(count)?;
        let reserved = self.allocator.reserved() as usize;
        self.row_ids.ensure_capacity(reserved);
        self.timestamps.ensure_capacity(reserved);
        self.rows.ensure_capacity(reserved);
        Ok(offset)
    }

    /// Commit rows into a previously reserved range starting at `offset`.
    pub fn commit(
        &self,
        offset: u64,
        row_ids: &[i64],
        timestamps: &[u64],
        raw_rows: &[u8],
    ) -> Result<()> {
        let count = row_ids.len();
        if count == 0 {
            return Err(XystonError::invalid_argument("cannot commit zero rows"));
        }
        if timestamps.len() != count {
            return Err(XystonError::invalid_argument(format!(
                "row id count {count} does not match timestamp count {}",
                timestamps.len()
            )));
        }
        if raw_rows.len() != count * self.stride {
            return Err(XystonError::invalid_argument(format!(
                "raw data holds {} bytes, expected {} rows of stride {}",
                raw_rows.len(),
                count,
                self.stride
            )));
        }
        let end = offset
            .checked_add(count as u64)
            .ok_or_else(|| XystonError::invalid_argument("row range overflows"))?;
        if end > self.allocator.reserved() {
            return Err(XystonError::invalid_argument(format!(
                "row range [{offset}, {end}) exceeds reserved count {}",
                self.allocator.reserved()
            )));
        }

        self.row_ids.write_rows(offset as usize, row_ids);
        self.timestamps.write_rows(offset as usize, timestamps);
        self.rows.write_rows(offset as usize, raw_rows);
        self.watermark.publish(offset, end);
        Ok(())
    }

    /// Rows committed and visible to readers.
    pub fn committed_rows(&self) -> u64 {
        self.watermark.committed()
    }

    /// Snapshot the columns for reading.
    pub fn reader(&self) -> InsertReader {
        InsertReader {
            row_ids: self.row_ids.reader(),
            timestamps: self.timestamps.reader(),
            rows: self.rows.reader(),
        }
    }

    /// Bytes held by all three columns. O(1).
    pub fn memory_usage_in_bytes(&self) -> usize {
        self.row_ids.memory_usage_in_bytes()
            + self.timestamps.memory_usage_in_bytes()
            + self.rows.memory_usage_in_bytes()
    }
}

/// Read-side snapshot over the insert log's columns.
#[derive(Clone)]
pub(crate) struct InsertReader {
    row_ids: ColumnReader<i64>,
    timestamps: ColumnReader<u64>,
    rows: ColumnReader<u8>,
}

impl InsertReader {
    /// Row id at `offset`.
    pub fn row_id(&self, offset: usize) -> i64 {
        self.row_ids.value(offset)
    }

    /// Insert timestamp at `offset`.
    pub fn timestamp(&self, offset: usize) -> u64 {
        self.timestamps.value(offset)
    }

    /// Raw bytes of the row at `offset`.
    pub fn raw_row(&self, offset: usize) -> &[u8] {
        self.rows.row(offset)
    }

    /// Decode the vector field at `byte_offset` within the row into `out`.
    pub fn read_vector(&self, offset: usize, byte_offset: usize, out: &mut [f32]) {
        let bytes = &self.raw_row(offset)[byte_offset..byte_offset + out.len() * 4];
        for (dst, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
            *dst = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_rows(vectors: &[[f32; 2]]) -> Vec<u8> {
        let mut raw = Vec::new();
        for v in vectors {
            for x in v {
                raw.extend_from_slice(&x.to_le_bytes());
            }
        }
        raw
    }

    #[test]
    fn test_reserve_commit_read_back() {
        let log = InsertLog::new(8, 4, 1024);
        let offset = log.reserve(2).unwrap();
        assert_eq!(offset, 0);

        let raw = encode_rows(&[[1.0, 2.0], [3.0, 4.0]]);
        log.commit(offset, &[10, 11], &[100, 101], &raw).unwrap();
        assert_eq!(log.committed_rows(), 2);

        let reader = log.reader();
        assert_eq!(reader.row_id(1), 11);
        assert_eq!(reader.timestamp(0), 100);

        let mut v = [0f32; 2];
        reader.read_vector(1, 0, &mut v);
        assert_eq!(v, [3.0, 4.0]);
    }

    #[test]
    fn test_commit_validates_shape() {
        let log = InsertLog::new(8, 4, 1024);
        let offset = log.reserve(2).unwrap();

        // Mismatched timestamp count.
        assert!(log.commit(offset, &[1, 2], &[5], &[0u8; 16]).is_err());
        // Wrong raw length for the stride.
        assert!(log.commit(offset, &[1, 2], &[5, 6], &[0u8; 15]).is_err());
        // Range beyond what was reserved.
        assert!(log.commit(1, &[1, 2], &[5, 6], &[0u8; 16]).is_err());
        // Nothing was committed by the failed calls.
        assert_eq!(log.committed_rows(), 0);
    }

    #[test]
    fn test_out_of_order_commit_gates_watermark() {
        let log = InsertLog::new(4, 4, 1024);
        let first = log.reserve(1).unwrap();
        let second = log.reserve(1).unwrap();

        log.commit(second, &[2], &[20], &[0u8; 4]).unwrap();
        assert_eq!(log.committed_rows(), 0);

        log.commit(first, &[1], &[10], &[0u8; 4]).unwrap();
        assert_eq!(log.committed_rows(), 2);
    }

    #[test]
    fn test_zero_reserve_rejected() {
        let log = InsertLog::new(4, 4, 1024);
        assert!(log.reserve(0).is_err());
    }
}
