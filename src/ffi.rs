//! Foreign-call boundary for hosts driving the segment from another runtime.
//!
//! Every handle is an opaque pointer owned by the host: collections are
//! shared (reference-counted), segments, plans, and placeholder groups are
//! exclusive. Mutating and searching calls return a small integer status
//! code; `0` means success. Output buffers are allocated and owned by the
//! caller, and no documented error path writes into them.

use std::ffi::{CStr, c_char};
use std::sync::Arc;

use log::{debug, warn};

use crate::collection::Collection;
use crate::error::XystonError;
use crate::query::{PlaceholderGroup, SearchPlan};
use crate::segment::GrowingSegment;

/// Operation completed.
pub const STATUS_SUCCESS: i32 = 0;
/// Failure outside the documented taxonomy.
pub const STATUS_UNEXPECTED_ERROR: i32 = 1;
/// Malformed range, shape, or request.
pub const STATUS_INVALID_ARGUMENT: i32 = 2;
/// Operation forbidden in the segment's current state.
pub const STATUS_STATE_ERROR: i32 = 3;
/// Allocator or storage cannot grow further.
pub const STATUS_RESOURCE_EXHAUSTED: i32 = 4;
/// The index rejected the data or configuration.
pub const STATUS_INDEX_BUILD_ERROR: i32 = 5;
/// A named entity does not exist.
pub const STATUS_NOT_FOUND: i32 = 6;

/// Shared handle to a [`Collection`].
pub type CollectionHandle = *const Collection;
/// Exclusive handle to a [`GrowingSegment`].
pub type SegmentHandle = *mut GrowingSegment;
/// Exclusive handle to a [`SearchPlan`].
pub type PlanHandle = *mut SearchPlan;
/// Exclusive handle to a [`PlaceholderGroup`].
pub type PlaceholderGroupHandle = *mut PlaceholderGroup;

fn status_code(error: &XystonError) -> i32 {
    match error {
        XystonError::InvalidArgument(_) | XystonError::Schema(_) | XystonError::Json(_) => {
            STATUS_INVALID_ARGUMENT
        }
        XystonError::State(_) => STATUS_STATE_ERROR,
        XystonError::ResourceExhausted(_) => STATUS_RESOURCE_EXHAUSTED,
        XystonError::IndexBuild(_) => STATUS_INDEX_BUILD_ERROR,
        XystonError::NotFound(_) => STATUS_NOT_FOUND,
        XystonError::Anyhow(_) => STATUS_UNEXPECTED_ERROR,
    }
}

unsafe fn parse_c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Create a collection from its JSON description. Returns null when the
/// description cannot be parsed or validated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_new_collection(config_json: *const c_char) -> CollectionHandle {
    let Some(json) = (unsafe { parse_c_str(config_json) }) else {
        return std::ptr::null();
    };
    match Collection::from_json(json) {
        Ok(collection) => Arc::into_raw(collection),
        Err(e) => {
            warn!("collection creation failed: {e}");
            std::ptr::null()
        }
    }
}

/// Release one reference to a collection.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_delete_collection(collection: CollectionHandle) {
    if !collection.is_null() {
        drop(unsafe { Arc::from_raw(collection) });
    }
}

/// Create an empty, open segment for a collection.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_new_segment(
    collection: CollectionHandle,
    segment_id: u64,
) -> SegmentHandle {
    if collection.is_null() {
        return std::ptr::null_mut();
    }
    let collection = unsafe {
        Arc::increment_strong_count(collection);
        Arc::from_raw(collection)
    };
    Box::into_raw(Box::new(GrowingSegment::new(collection, segment_id)))
}

/// Destroy a segment and release all memory it owns.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_delete_segment(segment: SegmentHandle) {
    if !segment.is_null() {
        let segment = unsafe { Box::from_raw(segment) };
        debug!("deleting segment {}", segment.id());
    }
}

/// Compile a search plan from JSON, validated against the collection schema.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_new_search_plan(
    collection: CollectionHandle,
    plan_json: *const c_char,
    plan_out: *mut PlanHandle,
) -> i32 {
    if collection.is_null() || plan_out.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let Some(json) = (unsafe { parse_c_str(plan_json) }) else {
        return STATUS_INVALID_ARGUMENT;
    };
    let collection = unsafe { &*collection };
    match SearchPlan::from_json(collection.schema(), json) {
        Ok(plan) => {
            unsafe { *plan_out = Box::into_raw(Box::new(plan)) };
            STATUS_SUCCESS
        }
        Err(e) => status_code(&e),
    }
}

/// Destroy a search plan.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_delete_search_plan(plan: PlanHandle) {
    if !plan.is_null() {
        drop(unsafe { Box::from_raw(plan) });
    }
}

/// Create a placeholder group from `num_queries` query vectors of `dim`
/// floats, laid out contiguously in `data`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_new_placeholder_group(
    dim: i64,
    num_queries: i64,
    data: *const f32,
    group_out: *mut PlaceholderGroupHandle,
) -> i32 {
    if data.is_null() || group_out.is_null() || dim <= 0 || num_queries <= 0 {
        return STATUS_INVALID_ARGUMENT;
    }
    let len = (dim as usize) * (num_queries as usize);
    let queries = unsafe { std::slice::from_raw_parts(data, len) }.to_vec();
    match PlaceholderGroup::new(dim as usize, queries) {
        Ok(group) => {
            unsafe { *group_out = Box::into_raw(Box::new(group)) };
            STATUS_SUCCESS
        }
        Err(e) => status_code(&e),
    }
}

/// Destroy a placeholder group.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_delete_placeholder_group(group: PlaceholderGroupHandle) {
    if !group.is_null() {
        drop(unsafe { Box::from_raw(group) });
    }
}

/// Reserve `count` row slots; writes the range start through `offset_out`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_pre_insert(
    segment: SegmentHandle,
    count: i64,
    offset_out: *mut i64,
) -> i32 {
    if segment.is_null() || offset_out.is_null() || count <= 0 {
        return STATUS_INVALID_ARGUMENT;
    }
    let segment = unsafe { &*segment };
    match segment.pre_insert(count as u64) {
        Ok(offset) => {
            unsafe { *offset_out = offset as i64 };
            STATUS_SUCCESS
        }
        Err(e) => status_code(&e),
    }
}

/// Write `count` rows of `sizeof_per_row` bytes into a reserved range.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_insert(
    segment: SegmentHandle,
    reserved_offset: i64,
    count: i64,
    row_ids: *const i64,
    timestamps: *const u64,
    raw_data: *const u8,
    sizeof_per_row: i64,
) -> i32 {
    if segment.is_null()
        || row_ids.is_null()
        || timestamps.is_null()
        || raw_data.is_null()
        || reserved_offset < 0
        || count <= 0
        || sizeof_per_row <= 0
    {
        return STATUS_INVALID_ARGUMENT;
    }
    let segment = unsafe { &*segment };
    if sizeof_per_row as usize != segment.collection().schema().row_stride() {
        return STATUS_INVALID_ARGUMENT;
    }
    let count = count as usize;
    let row_ids = unsafe { std::slice::from_raw_parts(row_ids, count) };
    let timestamps = unsafe { std::slice::from_raw_parts(timestamps, count) };
    let raw_rows =
        unsafe { std::slice::from_raw_parts(raw_data, count * sizeof_per_row as usize) };
    match segment.insert(reserved_offset as u64, row_ids, timestamps, raw_rows) {
        Ok(()) => STATUS_SUCCESS,
        Err(e) => status_code(&e),
    }
}

/// Reserve `count` tombstone slots; writes the range start through
/// `offset_out`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_pre_delete(
    segment: SegmentHandle,
    count: i64,
    offset_out: *mut i64,
) -> i32 {
    if segment.is_null() || offset_out.is_null() || count <= 0 {
        return STATUS_INVALID_ARGUMENT;
    }
    let segment = unsafe { &*segment };
    match segment.pre_delete(count as u64) {
        Ok(offset) => {
            unsafe { *offset_out = offset as i64 };
            STATUS_SUCCESS
        }
        Err(e) => status_code(&e),
    }
}

/// Write `count` tombstones into a reserved range.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_delete(
    segment: SegmentHandle,
    reserved_offset: i64,
    count: i64,
    row_ids: *const i64,
    timestamps: *const u64,
) -> i32 {
    if segment.is_null()
        || row_ids.is_null()
        || timestamps.is_null()
        || reserved_offset < 0
        || count <= 0
    {
        return STATUS_INVALID_ARGUMENT;
    }
    let segment = unsafe { &*segment };
    let count = count as usize;
    let row_ids = unsafe { std::slice::from_raw_parts(row_ids, count) };
    let timestamps = unsafe { std::slice::from_raw_parts(timestamps, count) };
    match segment.delete(reserved_offset as u64, row_ids, timestamps) {
        Ok(()) => STATUS_SUCCESS,
        Err(e) => status_code(&e),
    }
}

/// Evaluate a plan for `num_groups` placeholder groups, one snapshot
/// timestamp per group.
///
/// `result_ids` and `result_distances` must hold `result_capacity` entries,
/// with `result_capacity >= total queries * top_k`. They are written only on
/// success.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_search(
    segment: SegmentHandle,
    plan: PlanHandle,
    placeholder_groups: *const PlaceholderGroupHandle,
    timestamps: *const u64,
    num_groups: i32,
    result_ids: *mut i64,
    result_distances: *mut f32,
    result_capacity: i64,
) -> i32 {
    if segment.is_null()
        || plan.is_null()
        || placeholder_groups.is_null()
        || timestamps.is_null()
        || result_ids.is_null()
        || result_distances.is_null()
        || num_groups <= 0
        || result_capacity < 0
    {
        return STATUS_INVALID_ARGUMENT;
    }
    let segment = unsafe { &*segment };
    let plan = unsafe { &*plan };
    let num_groups = num_groups as usize;

    let group_ptrs = unsafe { std::slice::from_raw_parts(placeholder_groups, num_groups) };
    let mut groups = Vec::with_capacity(num_groups);
    for &ptr in group_ptrs {
        if ptr.is_null() {
            return STATUS_INVALID_ARGUMENT;
        }
        groups.push(unsafe { &*ptr });
    }
    let timestamps = unsafe { std::slice::from_raw_parts(timestamps, num_groups) };

    match segment.search(plan, &groups, timestamps) {
        Ok(result) => {
            if (result_capacity as usize) < result.len() {
                return STATUS_INVALID_ARGUMENT;
            }
            unsafe {
                std::ptr::copy_nonoverlapping(
                    result.result_ids.as_ptr(),
                    result_ids,
                    result.len(),
                );
                std::ptr::copy_nonoverlapping(
                    result.result_distances.as_ptr(),
                    result_distances,
                    result.len(),
                );
            }
            STATUS_SUCCESS
        }
        Err(e) => status_code(&e),
    }
}

/// Transition the segment out of `Open`. Idempotent.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_close(segment: SegmentHandle) -> i32 {
    if segment.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let segment = unsafe { &*segment };
    match segment.close() {
        Ok(()) => STATUS_SUCCESS,
        Err(e) => status_code(&e),
    }
}

/// Build the collection-configured index over a closed segment.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_build_index(
    collection: CollectionHandle,
    segment: SegmentHandle,
) -> i32 {
    if collection.is_null() || segment.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let collection = unsafe { &*collection };
    let segment = unsafe { &*segment };
    match segment.build_index(collection) {
        Ok(()) => STATUS_SUCCESS,
        Err(e) => status_code(&e),
    }
}

/// Check whether the segment still accepts reservations.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_is_opened(segment: SegmentHandle) -> bool {
    !segment.is_null() && unsafe { &*segment }.is_opened()
}

/// Bytes held by row storage, the deletion log, and the index.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_get_memory_usage_in_bytes(segment: SegmentHandle) -> u64 {
    if segment.is_null() {
        return 0;
    }
    unsafe { &*segment }.memory_usage_in_bytes() as u64
}

/// Committed row count.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_get_row_count(segment: SegmentHandle) -> i64 {
    if segment.is_null() {
        return -1;
    }
    unsafe { &*segment }.row_count() as i64
}

/// Committed tombstone count.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xyston_get_deleted_count(segment: SegmentHandle) -> i64 {
    if segment.is_null() {
        return -1;
    }
    unsafe { &*segment }.deleted_count() as i64
}
