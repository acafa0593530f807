//! The vector index capability consumed by sealed segments.
//!
//! A segment never implements nearest-neighbor structures itself: it feeds
//! committed vectors through [`VectorSource`] into a [`VectorIndexBuilder`]
//! chosen by the collection's [`IndexConfig`], and afterwards queries the
//! resulting [`VectorIndex`]. Hits come back as segment offsets; the segment
//! resolves them to row ids and applies visibility filtering.

pub mod flat;
pub mod ivf;

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::Result;

/// Random access to the committed vectors an index is built from.
pub trait VectorSource: Sync {
    /// Vector dimension.
    fn dimension(&self) -> usize;

    /// Number of vectors.
    fn len(&self) -> usize;

    /// Check whether the source holds no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the vector at `idx` into `out` (length `dimension()`).
    fn copy_vector(&self, idx: usize, out: &mut [f32]);
}

/// One scored hit from an index: a segment offset and its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    /// Offset of the row within the segment.
    pub offset: u64,
    /// Distance to the query (lower is better).
    pub distance: f32,
}

/// A built, immutable nearest-neighbor structure.
pub trait VectorIndex: Send + Sync {
    /// The `top_k` nearest offsets for `query`, ascending by distance.
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<IndexHit>>;

    /// Number of indexed vectors.
    fn num_vectors(&self) -> usize;

    /// Vector dimension.
    fn dimension(&self) -> usize;

    /// Bytes held by the index.
    fn memory_usage_in_bytes(&self) -> usize;
}

/// Builds a [`VectorIndex`] from committed segment data.
pub trait VectorIndexBuilder: Send + Sync {
    /// Consume the source and produce an index over all of it.
    fn build(&self, source: &dyn VectorSource) -> Result<Box<dyn VectorIndex>>;
}

/// Supported index structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Exact search over a contiguous vector copy.
    #[default]
    Flat,
    /// Inverted-file index with flat residual lists.
    IvfFlat,
}

/// Index configuration, carried by the collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Target vector field; defaults to the schema's only vector field.
    #[serde(default)]
    pub field: Option<String>,
    /// Index structure to build.
    #[serde(default)]
    pub kind: IndexKind,
    /// Metric the index scores with.
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Number of coarse clusters (IVF only).
    #[serde(default = "default_nlist")]
    pub nlist: usize,
    /// Clusters probed per query (IVF only).
    #[serde(default = "default_nprobe")]
    pub nprobe: usize,
    /// Worker threads used during the build.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

fn default_nlist() -> usize {
    64
}

fn default_nprobe() -> usize {
    8
}

fn default_num_threads() -> usize {
    num_cpus::get()
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            field: None,
            kind: IndexKind::default(),
            metric: DistanceMetric::default(),
            nlist: default_nlist(),
            nprobe: default_nprobe(),
            num_threads: default_num_threads(),
        }
    }
}

/// Create the builder for a configuration.
pub fn create_index_builder(config: &IndexConfig) -> Box<dyn VectorIndexBuilder> {
    match config.kind {
        IndexKind::Flat => Box::new(flat::FlatIndexBuilder::new(config.clone())),
        IndexKind::IvfFlat => Box::new(ivf::IvfFlatIndexBuilder::new(config.clone())),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::VectorSource;

    /// A `VectorSource` over an owned flat buffer, for index tests.
    pub struct SliceSource {
        pub dim: usize,
        pub data: Vec<f32>,
    }

    impl VectorSource for SliceSource {
        fn dimension(&self) -> usize {
            self.dim
        }

        fn len(&self) -> usize {
            self.data.len() / self.dim
        }

        fn copy_vector(&self, idx: usize, out: &mut [f32]) {
            out.copy_from_slice(&self.data[idx * self.dim..(idx + 1) * self.dim]);
        }
    }
}
