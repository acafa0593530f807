//! # Xyston
//!
//! An in-memory growing segment engine for vector similarity search.
//!
//! ## Features
//!
//! - Two-phase reserve/commit ingestion: one atomic counter per log, then
//!   lock-free writes into disjoint reserved ranges
//! - Concurrent search over a committed-prefix snapshot, never observing
//!   partially written rows
//! - Logical deletion with snapshot-timestamp visibility
//! - Sealing into a flat or IVF-flat vector index
//! - A C-compatible foreign-call boundary with status codes

pub mod collection;
pub mod distance;
pub mod error;
pub mod ffi;
pub mod query;
pub mod schema;
pub mod segment;
pub mod util;
pub mod vector_index;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
