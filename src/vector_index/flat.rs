//! Flat (exact) vector index: a contiguous copy of every committed vector.

use rayon::prelude::*;

use crate::distance::DistanceMetric;
use crate::error::{Result, XystonError};
use crate::util::topk::{Candidate, TopKCollector};
use crate::vector_index::{IndexConfig, IndexHit, VectorIndex, VectorIndexBuilder, VectorSource};

/// Row count below which a query is scanned serially.
const PARALLEL_THRESHOLD: usize = 1024;

/// Rows scored per parallel work item.
const SCAN_BATCH_ROWS: usize = 256;

/// Exact index over a contiguous, decode-free vector buffer.
pub struct FlatIndex {
    dim: usize,
    metric: DistanceMetric,
    vectors: Vec<f32>,
}

impl FlatIndex {
    fn vector(&self, idx: usize) -> &[f32] {
        &self.vectors[idx * self.dim..(idx + 1) * self.dim]
    }
}

impl VectorIndex for FlatIndex {
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<IndexHit>> {
        if query.len() != self.dim {
            return Err(XystonError::invalid_argument(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dim
            )));
        }

        let n = self.num_vectors();
        let collector = if n < PARALLEL_THRESHOLD {
            let mut topk = TopKCollector::new(top_k);
            for idx in 0..n {
                topk.push(Candidate {
                    distance: self.metric.kernel(query, self.vector(idx)),
                    row_id: idx as i64,
                });
            }
            topk
        } else {
            self.vectors
                .par_chunks(self.dim * SCAN_BATCH_ROWS)
                .enumerate()
                .fold(
                    || TopKCollector::new(top_k),
                    |mut topk, (batch, chunk)| {
                        let base = batch * SCAN_BATCH_ROWS;
                        for (i, vector) in chunk.chunks_exact(self.dim).enumerate() {
                            topk.push(Candidate {
                                distance: self.metric.kernel(query, vector),
                                row_id: (base + i) as i64,
                            });
                        }
                        topk
                    },
                )
                .reduce(|| TopKCollector::new(top_k), TopKCollector::merge)
        };

        Ok(collector
            .into_sorted()
            .into_iter()
            .map(|c| IndexHit {
                offset: c.row_id as u64,
                distance: c.distance,
            })
            .collect())
    }

    fn num_vectors(&self) -> usize {
        self.vectors.len() / self.dim
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn memory_usage_in_bytes(&self) -> usize {
        self.vectors.capacity() * std::mem::size_of::<f32>()
    }
}

/// Builder for [`FlatIndex`].
pub struct FlatIndexBuilder {
    config: IndexConfig,
}

impl FlatIndexBuilder {
    /// Create a builder with the given configuration.
    pub fn new(config: IndexConfig) -> Self {
        FlatIndexBuilder { config }
    }
}

impl VectorIndexBuilder for FlatIndexBuilder {
    fn build(&self, source: &dyn VectorSource) -> Result<Box<dyn VectorIndex>> {
        if source.is_empty() {
            return Err(XystonError::index_build(
                "cannot build a flat index over zero vectors",
            ));
        }

        let dim = source.dimension();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .map_err(|e| XystonError::index_build(format!("build pool failed: {e}")))?;

        let mut vectors = vec![0f32; source.len() * dim];
        pool.install(|| {
            vectors
                .par_chunks_mut(dim)
                .enumerate()
                .for_each(|(idx, out)| source.copy_vector(idx, out));
        });

        Ok(Box::new(FlatIndex {
            dim,
            metric: self.config.metric,
            vectors,
        }))
    }
}
