//! The growing segment: concurrent row accumulation, tombstones, search,
//! and sealing into an index.
//!
//! A segment accepts many concurrent producers through a two-phase protocol:
//! `pre_insert`/`pre_delete` reserve a contiguous slot range through one
//! atomic counter, then `insert`/`delete` copy data into the reserved range
//! with no further synchronization. Readers search a committed-prefix
//! snapshot and never observe partially written rows.
//!
//! # Module Structure
//!
//! - `chunked`: block-structured column storage
//! - `reserve`: offset allocator and commit watermark
//! - `insert_log` / `delete_log`: the two append-only logs
//! - `search`: query execution over a snapshot

mod chunked;
mod delete_log;
mod insert_log;
mod reserve;
mod search;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::error::{Result, XystonError};
use crate::query::{PlaceholderGroup, QueryResult, SearchPlan};
use crate::schema::FieldEntry;
use crate::segment::delete_log::DeleteLog;
use crate::segment::insert_log::{InsertLog, InsertReader};
use crate::vector_index::{VectorIndex, VectorSource, create_index_builder};

/// Lifecycle state of a segment. Transitions are one-directional:
/// `Open -> Closed -> Indexed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SegmentState {
    /// Accepting reservations and commits; searchable by brute force.
    Open = 0,
    /// No new reservations; still searchable by brute force.
    Closed = 1,
    /// An index has been built over the committed rows.
    Indexed = 2,
}

impl SegmentState {
    fn from_u8(value: u8) -> SegmentState {
        match value {
            0 => SegmentState::Open,
            1 => SegmentState::Closed,
            _ => SegmentState::Indexed,
        }
    }
}

/// Sizing knobs for one segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Rows per storage chunk.
    #[serde(default = "default_rows_per_chunk")]
    pub rows_per_chunk: usize,
    /// Hard cap on reservable row slots.
    #[serde(default = "default_max_rows")]
    pub max_rows: u64,
    /// Hard cap on reservable tombstone slots.
    #[serde(default = "default_max_rows")]
    pub max_deletes: u64,
}

fn default_rows_per_chunk() -> usize {
    32 * 1024
}

fn default_max_rows() -> u64 {
    4 * 1024 * 1024
}

impl Default for SegmentConfig {
    fn default() -> Self {
        SegmentConfig {
            rows_per_chunk: default_rows_per_chunk(),
            max_rows: default_max_rows(),
            max_deletes: default_max_rows(),
        }
    }
}

struct BuiltIndex {
    field: String,
    index: Box<dyn VectorIndex>,
}

/// One mutable, growable container of rows answering similarity queries.
pub struct GrowingSegment {
    id: u64,
    collection: Arc<Collection>,
    insert_log: InsertLog,
    delete_log: DeleteLog,
    state: AtomicU8,
    index: RwLock<Option<BuiltIndex>>,
}

impl GrowingSegment {
    /// Create an empty, open segment with default sizing.
    pub fn new(collection: Arc<Collection>, id: u64) -> Self {
        Self::with_config(collection, id, SegmentConfig::default())
    }

    /// Create an empty, open segment with explicit sizing.
    pub fn with_config(collection: Arc<Collection>, id: u64, config: SegmentConfig) -> Self {
        debug!(
            "creating growing segment {id} for collection '{}'",
            collection.name()
        );
        let stride = collection.schema().row_stride();
        GrowingSegment {
            id,
            insert_log: InsertLog::new(stride, config.rows_per_chunk, config.max_rows),
            delete_log: DeleteLog::new(config.rows_per_chunk, config.max_deletes),
            state: AtomicU8::new(SegmentState::Open as u8),
            index: RwLock::new(None),
            collection,
        }
    }

    /// Segment id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The collection this segment belongs to.
    pub fn collection(&self) -> &Arc<Collection> {
        &self.collection
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SegmentState {
        SegmentState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Check whether the segment still accepts reservations.
    pub fn is_opened(&self) -> bool {
        self.state() == SegmentState::Open
    }

    fn check_open(&self, operation: &str) -> Result<()> {
        if self.is_opened() {
            Ok(())
        } else {
            Err(XystonError::state(format!(
                "{operation} requires an open segment, segment {} is {:?}",
                self.id,
                self.state()
            )))
        }
    }

    /// Reserve `count` row slots. Returns the start offset of the range; the
    /// caller owns writing exactly that range.
    pub fn pre_insert(&self, count: u64) -> Result<u64> {
        self.check_open("pre_insert")?;
        self.insert_log.reserve(count).inspect_err(|e| {
            if matches!(e, XystonError::ResourceExhausted(_)) {
                warn!("segment {}: insert reservation failed: {e}", self.id);
            }
        })
    }

    /// Write `row_ids.len()` rows into a previously reserved range.
    ///
    /// `raw_rows` is row-major with the schema's byte stride. Rows become
    /// visible to search once every earlier reservation has also committed.
    pub fn insert(
        &self,
        offset: u64,
        row_ids: &[i64],
        timestamps: &[u64],
        raw_rows: &[u8],
    ) -> Result<()> {
        self.check_open("insert")?;
        self.insert_log.commit(offset, row_ids, timestamps, raw_rows)
    }

    /// Reserve `count` tombstone slots.
    pub fn pre_delete(&self, count: u64) -> Result<u64> {
        self.check_open("pre_delete")?;
        self.delete_log.reserve(count).inspect_err(|e| {
            if matches!(e, XystonError::ResourceExhausted(_)) {
                warn!("segment {}: delete reservation failed: {e}", self.id);
            }
        })
    }

    /// Write tombstones into a previously reserved range.
    ///
    /// A row id absent from storage still gets its marker recorded; the
    /// marker simply never matches.
    pub fn delete(&self, offset: u64, row_ids: &[i64], timestamps: &[u64]) -> Result<()> {
        self.check_open("delete")?;
        self.delete_log.commit(offset, row_ids, timestamps)
    }

    /// Stop accepting reservations. Idempotent: closing a segment that is
    /// already `Closed` or `Indexed` is a no-op success.
    pub fn close(&self) -> Result<()> {
        let was_open = self
            .state
            .compare_exchange(
                SegmentState::Open as u8,
                SegmentState::Closed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if was_open {
            debug!(
                "segment {} closed with {} rows, {} tombstones",
                self.id,
                self.row_count(),
                self.deleted_count()
            );
        }
        Ok(())
    }

    /// Build the collection-configured index over all committed rows.
    ///
    /// Requires a `Closed` segment; on failure the segment stays `Closed` and
    /// brute-force searchable. The index configuration comes from `collection`
    /// (the boundary passes it explicitly).
    pub fn build_index(&self, collection: &Collection) -> Result<()> {
        if self.is_opened() {
            return Err(XystonError::state(format!(
                "segment {} must be closed before building an index",
                self.id
            )));
        }

        let mut slot = self.index.write();
        if self.state() == SegmentState::Indexed {
            return Err(XystonError::state(format!(
                "segment {} already has an index",
                self.id
            )));
        }

        let config = collection.index_config();
        let field = match &config.field {
            Some(name) => name.clone(),
            None => self.single_vector_field()?.name.clone(),
        };
        let (byte_offset, dim) = self.collection.schema().vector_field(&field)?;

        let source = CommittedVectors {
            reader: self.insert_log.reader(),
            len: self.insert_log.committed_rows() as usize,
            byte_offset,
            dim,
        };

        let builder = create_index_builder(config);
        match builder.build(&source) {
            Ok(index) => {
                debug!(
                    "segment {}: built {:?} index over {} rows",
                    self.id,
                    config.kind,
                    source.len
                );
                *slot = Some(BuiltIndex { field, index });
                self.state
                    .store(SegmentState::Indexed as u8, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                warn!("segment {}: index build failed: {e}", self.id);
                Err(e)
            }
        }
    }

    fn single_vector_field(&self) -> Result<&FieldEntry> {
        let mut vector_fields = self
            .collection
            .schema()
            .fields()
            .iter()
            .filter(|f| f.field_type.is_vector());
        match (vector_fields.next(), vector_fields.next()) {
            (Some(field), None) => Ok(field),
            (None, _) => Err(XystonError::not_found(
                "schema declares no vector field to index",
            )),
            (Some(_), Some(_)) => Err(XystonError::invalid_argument(
                "schema declares several vector fields, the index config must name one",
            )),
        }
    }

    /// Evaluate `plan` for every placeholder group at its snapshot timestamp.
    ///
    /// The committed row count is read once at call start; concurrent commits
    /// landing afterwards are not observed. Never mutates segment state.
    pub fn search(
        &self,
        plan: &SearchPlan,
        groups: &[&PlaceholderGroup],
        timestamps: &[u64],
    ) -> Result<QueryResult> {
        if groups.is_empty() {
            return Err(XystonError::invalid_argument(
                "search requires at least one placeholder group",
            ));
        }
        if groups.len() != timestamps.len() {
            return Err(XystonError::invalid_argument(format!(
                "group count {} does not match timestamp count {}",
                groups.len(),
                timestamps.len()
            )));
        }
        let schema = self.collection.schema();
        plan.validate(schema)?;
        let (vec_offset, dim) = schema.vector_field(&plan.field)?;
        for group in groups {
            if group.dimension() != dim {
                return Err(XystonError::invalid_argument(format!(
                    "placeholder group dimension {} does not match field '{}' dimension {dim}",
                    group.dimension(),
                    plan.field
                )));
            }
        }

        let committed = self.insert_log.committed_rows() as usize;
        // The slot lock is only taken once the state says an index exists, so
        // searches never queue behind an in-progress build.
        let guard = if self.state() == SegmentState::Indexed {
            Some(self.index.read())
        } else {
            None
        };
        let index = guard
            .as_deref()
            .and_then(|slot| slot.as_ref())
            .filter(|built| built.field == plan.field)
            .map(|built| built.index.as_ref());

        search::execute(search::SearchArgs {
            reader: self.insert_log.reader(),
            committed,
            vec_offset,
            dim,
            index,
            plan,
            groups,
            timestamps,
            delete_log: &self.delete_log,
        })
    }

    /// Committed (not reserved) row count. Non-decreasing.
    pub fn row_count(&self) -> u64 {
        self.insert_log.committed_rows()
    }

    /// Committed tombstone count. Non-decreasing.
    pub fn deleted_count(&self) -> u64 {
        self.delete_log.committed_count()
    }

    /// Bytes held by row storage, the deletion log, and the index. O(chunks).
    ///
    /// An index still being built is not yet accounted for.
    pub fn memory_usage_in_bytes(&self) -> usize {
        let index_bytes = self
            .index
            .try_read()
            .and_then(|slot| {
                slot.as_ref()
                    .map(|built| built.index.memory_usage_in_bytes())
            })
            .unwrap_or(0);
        self.insert_log.memory_usage_in_bytes()
            + self.delete_log.memory_usage_in_bytes()
            + index_bytes
    }
}

/// Committed rows exposed to an index builder.
struct CommittedVectors {
    reader: InsertReader,
    len: usize,
    byte_offset: usize,
    dim: usize,
}

impl VectorSource for CommittedVectors {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.len
    }

    fn copy_vector(&self, idx: usize, out: &mut [f32]) {
        self.reader.read_vector(idx, self.byte_offset, out);
    }
}
