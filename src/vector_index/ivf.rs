//! IVF-flat vector index: coarse k-means clusters over flat inverted lists.
//!
//! Build partitions the vectors into `nlist` clusters; search scores the
//! query against every centroid, then scans only the `nprobe` closest lists.

use rayon::prelude::*;

use crate::distance::DistanceMetric;
use crate::error::{Result, XystonError};
use crate::util::topk::{Candidate, TopKCollector};
use crate::vector_index::{IndexConfig, IndexHit, VectorIndex, VectorIndexBuilder, VectorSource};

/// Lloyd iterations run during the coarse training pass.
const KMEANS_ITERATIONS: usize = 8;

/// Inverted-file index with exact scoring inside each probed list.
pub struct IvfFlatIndex {
    dim: usize,
    metric: DistanceMetric,
    nprobe: usize,
    centroids: Vec<f32>,
    list_offsets: Vec<Vec<u64>>,
    list_vectors: Vec<Vec<f32>>,
    num_vectors: usize,
}

impl IvfFlatIndex {
    fn nlist(&self) -> usize {
        self.centroids.len() / self.dim
    }

    fn centroid(&self, idx: usize) -> &[f32] {
        &self.centroids[idx * self.dim..(idx + 1) * self.dim]
    }
}

impl VectorIndex for IvfFlatIndex {
    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<IndexHit>> {
        if query.len() != self.dim {
            return Err(XystonError::invalid_argument(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dim
            )));
        }

        // Rank coarse clusters, then scan the closest nprobe lists.
        let mut coarse = TopKCollector::new(self.nprobe.max(1));
        for list in 0..self.nlist() {
            coarse.push(Candidate {
                distance: self.metric.kernel(query, self.centroid(list)),
                row_id: list as i64,
            });
        }

        let mut topk = TopKCollector::new(top_k);
        for probe in coarse.into_sorted() {
            let list = probe.row_id as usize;
            let offsets = &self.list_offsets[list];
            let vectors = &self.list_vectors[list];
            for (i, vector) in vectors.chunks_exact(self.dim).enumerate() {
                topk.push(Candidate {
                    distance: self.metric.kernel(query, vector),
                    row_id: offsets[i] as i64,
                });
            }
        }

        Ok(topk
            .into_sorted()
            .into_iter()
            .map(|c| IndexHit {
                offset: c.row_id as u64,
                distance: c.distance,
            })
            .collect())
    }

    fn num_vectors(&self) -> usize {
        self.num_vectors
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn memory_usage_in_bytes(&self) -> usize {
        let f32_size = std::mem::size_of::<f32>();
        self.centroids.capacity() * f32_size
            + self
                .list_vectors
                .iter()
                .map(|l| l.capacity() * f32_size)
                .sum::<usize>()
            + self
                .list_offsets
                .iter()
                .map(|l| l.capacity() * std::mem::size_of::<u64>())
                .sum::<usize>()
    }
}

/// Builder for [`IvfFlatIndex`].
pub struct IvfFlatIndexBuilder {
    config: IndexConfig,
}

impl IvfFlatIndexBuilder {
    /// Create a builder with the given configuration.
    pub fn new(config: IndexConfig) -> Self {
        IvfFlatIndexBuilder { config }
    }

    fn nearest_centroid(
        metric: DistanceMetric,
        centroids: &[f32],
        dim: usize,
        vector: &[f32],
    ) -> usize {
        let mut best = 0usize;
        let mut best_distance = f32::MAX;
        for (list, centroid) in centroids.chunks_exact(dim).enumerate() {
            let d = metric.kernel(vector, centroid);
            if d < best_distance {
                best_distance = d;
                best = list;
            }
        }
        best
    }

    /// Coarse k-means: deterministic stride-sampled seeds, a bounded number
    /// of Lloyd rounds, empty clusters keep their previous centroid.
    fn train_centroids(&self, vectors: &[f32], dim: usize, nlist: usize) -> Vec<f32> {
        let n = vectors.len() / dim;
        let metric = self.config.metric;

        let mut centroids = vec![0f32; nlist * dim];
        for list in 0..nlist {
            let sample = (list * n) / nlist;
            centroids[list * dim..(list + 1) * dim]
                .copy_from_slice(&vectors[sample * dim..(sample + 1) * dim]);
        }

        for _ in 0..KMEANS_ITERATIONS {
            let assignments: Vec<usize> = vectors
                .par_chunks(dim)
                .map(|v| Self::nearest_centroid(metric, &centroids, dim, v))
                .collect();

            let mut sums = vec![0f64; nlist * dim];
            let mut counts = vec![0u64; nlist];
            for (idx, &list) in assignments.iter().enumerate() {
                counts[list] += 1;
                let vector = &vectors[idx * dim..(idx + 1) * dim];
                for (d, x) in vector.iter().enumerate() {
                    sums[list * dim + d] += *x as f64;
                }
            }

            for list in 0..nlist {
                if counts[list] == 0 {
                    continue;
                }
                for d in 0..dim {
                    centroids[list * dim + d] =
                        (sums[list * dim + d] / counts[list] as f64) as f32;
                }
            }
        }

        centroids
    }
}

impl VectorIndexBuilder for IvfFlatIndexBuilder {
    fn build(&self, source: &dyn VectorSource) -> Result<Box<dyn VectorIndex>> {
        if source.is_empty() {
            return Err(XystonError::index_build(
                "cannot build an ivf_flat index over zero vectors",
            ));
        }
        if self.config.nlist == 0 {
            return Err(XystonError::index_build("nlist must be nonzero"));
        }

        let dim = source.dimension();
        let n = source.len();
        let nlist = self.config.nlist.min(n);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .map_err(|e| XystonError::index_build(format!("build pool failed: {e}")))?;

        pool.install(|| {
            let mut vectors = vec![0f32; n * dim];
            vectors
                .par_chunks_mut(dim)
                .enumerate()
                .for_each(|(idx, out)| source.copy_vector(idx, out));

            let centroids = self.train_centroids(&vectors, dim, nlist);

            let assignments: Vec<usize> = vectors
                .par_chunks(dim)
                .map(|v| Self::nearest_centroid(self.config.metric, &centroids, dim, v))
                .collect();

            let mut list_offsets = vec![Vec::new(); nlist];
            let mut list_vectors = vec![Vec::new(); nlist];
            for (idx, &list) in assignments.iter().enumerate() {
                list_offsets[list].push(idx as u64);
                list_vectors[list].extend_from_slice(&vectors[idx * dim..(idx + 1) * dim]);
            }

            Ok(Box::new(IvfFlatIndex {
                dim,
                metric: self.config.metric,
                nprobe: self.config.nprobe.max(1).min(nlist),
                centroids,
                list_offsets,
                list_vectors,
                num_vectors: n,
            }) as Box<dyn VectorIndex>)
        })
    }
}
