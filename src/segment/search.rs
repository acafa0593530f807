//! Search execution over one segment.
//!
//! A search runs against a snapshot taken at call start: the committed row
//! count is read once, and every group gets a tombstone filter for its own
//! snapshot timestamp. Scoring goes through the built index when one covers
//! the plan's field, and falls back to a brute-force scan of raw committed
//! rows otherwise.

use ahash::AHashMap;
use rayon::prelude::*;

use crate::distance::DistanceMetric;
use crate::error::Result;
use crate::query::{INVALID_DISTANCE, INVALID_ROW_ID, PlaceholderGroup, QueryResult, SearchPlan};
use crate::segment::delete_log::DeleteLog;
use crate::segment::insert_log::InsertReader;
use crate::util::topk::{Candidate, TopKCollector};
use crate::vector_index::VectorIndex;

/// Row count below which one query scans serially.
const PARALLEL_THRESHOLD: usize = 2048;

/// Everything one search call needs, snapshotted by the segment.
pub(crate) struct SearchArgs<'a> {
    pub reader: InsertReader,
    pub committed: usize,
    pub vec_offset: usize,
    pub dim: usize,
    pub index: Option<&'a dyn VectorIndex>,
    pub plan: &'a SearchPlan,
    pub groups: &'a [&'a PlaceholderGroup],
    pub timestamps: &'a [u64],
    pub delete_log: &'a DeleteLog,
}

/// Visibility of rows at one snapshot timestamp.
struct Visibility {
    snapshot: u64,
    tombstones: AHashMap<i64, u64>,
}

impl Visibility {
    /// A row is visible when it was inserted at or before the snapshot and no
    /// tombstone at or after its insertion covers it.
    fn is_visible(&self, row_id: i64, insert_ts: u64) -> bool {
        insert_ts <= self.snapshot
            && self
                .tombstones
                .get(&row_id)
                .is_none_or(|&delete_ts| delete_ts < insert_ts)
    }
}

/// Run the plan for every group and produce a rectangular, padded result.
pub(crate) fn execute(args: SearchArgs<'_>) -> Result<QueryResult> {
    let total_queries: usize = args.groups.iter().map(|g| g.num_queries()).sum();
    let mut result = QueryResult::with_shape(args.plan.top_k, total_queries);

    for (group, &snapshot) in args.groups.iter().zip(args.timestamps.iter()) {
        let visibility = Visibility {
            snapshot,
            tombstones: args.delete_log.tombstones_at(snapshot),
        };

        for query_idx in 0..group.num_queries() {
            let query = group.query(query_idx);
            let candidates = match args.index {
                Some(index) => indexed_scan(&args, index, &visibility, query)?,
                None => brute_force_scan(&args, &visibility, query),
            };
            append_padded(&mut result, &candidates, args.plan.top_k);
        }
    }

    Ok(result)
}

/// Exhaustive scan of raw committed rows.
fn brute_force_scan(args: &SearchArgs<'_>, visibility: &Visibility, query: &[f32]) -> Vec<Candidate> {
    let metric = args.plan.metric;
    let k = args.plan.top_k;

    let collector = if args.committed < PARALLEL_THRESHOLD {
        let mut topk = TopKCollector::new(k);
        let mut scratch = vec![0f32; args.dim];
        for offset in 0..args.committed {
            score_row(args, visibility, metric, query, offset, &mut scratch, &mut topk);
        }
        topk
    } else {
        (0..args.committed)
            .into_par_iter()
            .fold(
                || (TopKCollector::new(k), vec![0f32; args.dim]),
                |(mut topk, mut scratch), offset| {
                    score_row(args, visibility, metric, query, offset, &mut scratch, &mut topk);
                    (topk, scratch)
                },
            )
            .map(|(topk, _)| topk)
            .reduce(|| TopKCollector::new(k), TopKCollector::merge)
    };

    collector.into_sorted()
}

fn score_row(
    args: &SearchArgs<'_>,
    visibility: &Visibility,
    metric: DistanceMetric,
    query: &[f32],
    offset: usize,
    scratch: &mut [f32],
    topk: &mut TopKCollector,
) {
    let row_id = args.reader.row_id(offset);
    let insert_ts = args.reader.timestamp(offset);
    if !visibility.is_visible(row_id, insert_ts) {
        return;
    }
    args.reader.read_vector(offset, args.vec_offset, scratch);
    topk.push(Candidate {
        distance: metric.kernel(query, scratch),
        row_id,
    });
}

/// Index-backed scan. Over-fetches by the tombstone count so that filtered
/// hits can still fill the top-k, then re-sorts by (distance, row id) for a
/// deterministic order.
fn indexed_scan(
    args: &SearchArgs<'_>,
    index: &dyn VectorIndex,
    visibility: &Visibility,
    query: &[f32],
) -> Result<Vec<Candidate>> {
    let fetch = (args.plan.top_k + visibility.tombstones.len()).min(index.num_vectors());
    if fetch == 0 {
        return Ok(Vec::new());
    }

    let hits = index.search(query, fetch)?;
    let mut candidates: Vec<Candidate> = hits
        .into_iter()
        .filter_map(|hit| {
            let offset = hit.offset as usize;
            let row_id = args.reader.row_id(offset);
            let insert_ts = args.reader.timestamp(offset);
            visibility.is_visible(row_id, insert_ts).then_some(Candidate {
                distance: hit.distance,
                row_id,
            })
        })
        .collect();

    candidates.sort();
    candidates.truncate(args.plan.top_k);
    Ok(candidates)
}

/// Append one query's candidates, padding the tail of its top-k slots.
fn append_padded(result: &mut QueryResult, candidates: &[Candidate], top_k: usize) {
    for candidate in candidates.iter().take(top_k) {
        result.result_ids.push(candidate.row_id);
        result.result_distances.push(candidate.distance);
    }
    for _ in candidates.len()..top_k {
        result.result_ids.push(INVALID_ROW_ID);
        result.result_distances.push(INVALID_DISTANCE);
    }
}
