//! Block-structured column storage with reserve/commit write discipline.
//!
//! A [`ChunkedColumn`] grows by appending fixed-size chunks and never moves
//! data that has already been written, so concurrent readers keep working
//! while the column grows. Writers copy into ranges they reserved through the
//! segment's offset allocator; the ranges are disjoint by construction, which
//! is what makes the lock-free writes sound.

use std::cell::UnsafeCell;
use std::sync::Arc;

use parking_lot::RwLock;

/// One fixed-size chunk of `rows_per_chunk * elems_per_row` elements.
///
/// Cells are zero-initialized so that a read of a not-yet-committed slot
/// yields defined garbage, never undefined behavior. Readers must still gate
/// on the commit watermark before trusting any row.
struct Chunk<T> {
    cells: Box<[UnsafeCell<T>]>,
}

// SAFETY: writers touch pairwise-disjoint reserved ranges and readers only
// dereference rows below the commit watermark, whose publication synchronizes
// with the writes (release/acquire on the watermark counter).
unsafe impl<T: Send> Send for Chunk<T> {}
unsafe impl<T: Send + Sync> Sync for Chunk<T> {}

impl<T: Copy + Default> Chunk<T> {
    fn zeroed(len: usize) -> Self {
        let cells: Box<[UnsafeCell<T>]> =
            (0..len).map(|_| UnsafeCell::new(T::default())).collect();
        Chunk { cells }
    }

    fn base_ptr(&self) -> *mut T {
        // UnsafeCell<T> is repr(transparent), so the cell array is one
        // contiguous run of T.
        self.cells.as_ptr() as *mut T
    }
}

/// Append-only column of fixed-width rows, stored in fixed-size chunks.
pub(crate) struct ChunkedColumn<T> {
    elems_per_row: usize,
    rows_per_chunk: usize,
    chunks: RwLock<Vec<Arc<Chunk<T>>>>,
}

impl<T: Copy + Default + Send + Sync> ChunkedColumn<T> {
    /// Create an empty column holding `elems_per_row` elements per row.
    pub fn new(elems_per_row: usize, rows_per_chunk: usize) -> Self {
        debug_assert!(elems_per_row > 0);
        debug_assert!(rows_per_chunk > 0);
        ChunkedColumn {
            elems_per_row,
            rows_per_chunk,
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Rows the current chunk list can hold.
    pub fn capacity_rows(&self) -> usize {
        self.chunks.read().len() * self.rows_per_chunk
    }

    /// Grow until at least `rows` rows fit. Existing chunks never move.
    pub fn ensure_capacity(&self, rows: usize) {
        if self.capacity_rows() >= rows {
            return;
        }
        let mut chunks = self.chunks.write();
        while chunks.len() * self.rows_per_chunk < rows {
            chunks.push(Arc::new(Chunk::zeroed(
                self.rows_per_chunk * self.elems_per_row,
            )));
        }
    }

    /// Copy `data` into the rows starting at `row_offset`.
    ///
    /// `data` must hold a whole number of rows, and the destination range must
    /// lie within already-allocated capacity (guaranteed by the reservation
    /// that handed out the range). Distinct callers write distinct ranges, so
    /// no two writes alias.
    pub fn write_rows(&self, row_offset: usize, data: &[T]) {
        debug_assert_eq!(data.len() % self.elems_per_row, 0);
        let total_rows = data.len() / self.elems_per_row;
        debug_assert!(row_offset + total_rows <= self.capacity_rows());

        let chunks = self.chunks.read().clone();
        let mut remaining = data;
        let mut row = row_offset;
        while !remaining.is_empty() {
            let chunk = &chunks[row / self.rows_per_chunk];
            let row_in_chunk = row % self.rows_per_chunk;
            let rows_here = (self.rows_per_chunk - row_in_chunk)
                .min(remaining.len() / self.elems_per_row);
            let elems = rows_here * self.elems_per_row;

            // SAFETY: the range is inside one zero-initialized chunk, owned
            // exclusively by this caller via its reservation.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    remaining.as_ptr(),
                    chunk.base_ptr().add(row_in_chunk * self.elems_per_row),
                    elems,
                );
            }

            remaining = &remaining[elems..];
            row += rows_here;
        }
    }

    /// Snapshot the chunk list for reading.
    pub fn reader(&self) -> ColumnReader<T> {
        ColumnReader {
            chunks: self.chunks.read().clone(),
            elems_per_row: self.elems_per_row,
            rows_per_chunk: self.rows_per_chunk,
        }
    }

    /// Bytes held by the chunk list. O(1).
    pub fn memory_usage_in_bytes(&self) -> usize {
        self.chunks.read().len()
            * self.rows_per_chunk
            * self.elems_per_row
            * std::mem::size_of::<T>()
    }
}

/// A read-side snapshot of a column's chunk list.
///
/// The snapshot stays valid while the column grows; rows at or beyond the
/// commit watermark observed by the caller must not be interpreted as data.
#[derive(Clone)]
pub(crate) struct ColumnReader<T> {
    chunks: Vec<Arc<Chunk<T>>>,
    elems_per_row: usize,
    rows_per_chunk: usize,
}

impl<T: Copy + Default + Send + Sync> ColumnReader<T> {
    /// The elements of one row.
    pub fn row(&self, row: usize) -> &[T] {
        let chunk = &self.chunks[row / self.rows_per_chunk];
        let start = (row % self.rows_per_chunk) * self.elems_per_row;
        // SAFETY: rows never straddle chunks and the caller only reads rows
        // below the watermark it observed, which happens-after their commit.
        unsafe {
            std::slice::from_raw_parts(
                (chunk.base_ptr() as *const T).add(start),
                self.elems_per_row,
            )
        }
    }

    /// First element of one row; convenient for single-element columns.
    pub fn value(&self, row: usize) -> T {
        self.row(row)[0]
    }
}
