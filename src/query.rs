//! Query-side types: compiled search plans, placeholder groups, and results.
//!
//! A [`SearchPlan`] is the compiled form of one query shape (target field,
//! metric, top-k). A [`PlaceholderGroup`] carries the concrete query vectors
//! for one batch. Both are opaque handles at the foreign-call boundary; plan
//! parsing itself happens in the layer above this crate and arrives here as
//! JSON.

use serde::{Deserialize, Serialize};

use crate::distance::DistanceMetric;
use crate::error::{Result, XystonError};
use crate::schema::Schema;

/// Row id used to pad result slots that hold no hit.
pub const INVALID_ROW_ID: i64 = -1;

/// Distance used to pad result slots that hold no hit.
pub const INVALID_DISTANCE: f32 = f32::MAX;

/// Compiled query plan: which vector field to search, how to score it, and
/// how many results to keep per query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPlan {
    /// Target vector field name.
    pub field: String,
    /// Similarity metric.
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Results kept per query.
    pub top_k: usize,
}

impl SearchPlan {
    /// Parse a plan from JSON and validate it against a schema.
    pub fn from_json(schema: &Schema, json: &str) -> Result<Self> {
        let plan: SearchPlan = serde_json::from_str(json)?;
        plan.validate(schema)?;
        Ok(plan)
    }

    /// Validate the plan against a schema.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        if self.top_k == 0 {
            return Err(XystonError::invalid_argument("top_k must be nonzero"));
        }
        // Surfaces NotFound for a missing or non-vector field.
        schema.vector_field(&self.field)?;
        Ok(())
    }
}

/// The query vectors for one batch, stored as one flat buffer.
#[derive(Debug, Clone)]
pub struct PlaceholderGroup {
    dim: usize,
    queries: Vec<f32>,
}

impl PlaceholderGroup {
    /// Create a group from a flat buffer holding `queries.len() / dim`
    /// query vectors.
    pub fn new(dim: usize, queries: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            return Err(XystonError::invalid_argument(
                "placeholder group dimension must be nonzero",
            ));
        }
        if queries.is_empty() {
            return Err(XystonError::invalid_argument(
                "placeholder group must hold at least one query",
            ));
        }
        if queries.len() % dim != 0 {
            return Err(XystonError::invalid_argument(format!(
                "query buffer length {} is not a multiple of dimension {dim}",
                queries.len()
            )));
        }
        Ok(PlaceholderGroup { dim, queries })
    }

    /// Query vector dimension.
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Number of query vectors in this group.
    pub fn num_queries(&self) -> usize {
        self.queries.len() / self.dim
    }

    /// One query vector.
    pub fn query(&self, idx: usize) -> &[f32] {
        &self.queries[idx * self.dim..(idx + 1) * self.dim]
    }
}

/// Search results for all groups of one call.
///
/// Layout is rectangular: for each group, `num_queries * top_k` slots in query
/// order, groups concatenated in call order. Slots with no hit are padded with
/// [`INVALID_ROW_ID`] / [`INVALID_DISTANCE`].
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Results kept per query.
    pub top_k: usize,
    /// Total query count across all groups.
    pub num_queries: usize,
    /// Row ids, `num_queries * top_k` entries.
    pub result_ids: Vec<i64>,
    /// Distances, `num_queries * top_k` entries.
    pub result_distances: Vec<f32>,
}

impl QueryResult {
    /// Create an empty result sized for the given shape.
    pub fn with_shape(top_k: usize, num_queries: usize) -> Self {
        QueryResult {
            top_k,
            num_queries,
            result_ids: Vec::with_capacity(top_k * num_queries),
            result_distances: Vec::with_capacity(top_k * num_queries),
        }
    }

    /// Total number of result slots.
    pub fn len(&self) -> usize {
        self.result_ids.len()
    }

    /// Check whether the result holds no slots.
    pub fn is_empty(&self) -> bool {
        self.result_ids.is_empty()
    }

    /// Slots of one query, as parallel (ids, distances) slices.
    pub fn query_slot(&self, query_idx: usize) -> (&[i64], &[f32]) {
        let start = query_idx * self.top_k;
        let end = start + self.top_k;
        (&self.result_ids[start..end], &self.result_distances[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldEntry, FieldType};

    fn sample_schema() -> Schema {
        Schema::new(vec![
            FieldEntry::new("id", FieldType::Int64),
            FieldEntry::new("embedding", FieldType::FloatVector { dim: 4 }),
        ])
        .unwrap()
    }

    #[test]
    fn test_plan_from_json() {
        let schema = sample_schema();
        let plan = SearchPlan::from_json(
            &schema,
            r#"{"field": "embedding", "metric": "cosine", "top_k": 5}"#,
        )
        .unwrap();
        assert_eq!(plan.metric, DistanceMetric::Cosine);
        assert_eq!(plan.top_k, 5);
    }

    #[test]
    fn test_plan_defaults_metric() {
        let schema = sample_schema();
        let plan =
            SearchPlan::from_json(&schema, r#"{"field": "embedding", "top_k": 3}"#).unwrap();
        assert_eq!(plan.metric, DistanceMetric::Euclidean);
    }

    #[test]
    fn test_plan_unknown_field() {
        let schema = sample_schema();
        let err =
            SearchPlan::from_json(&schema, r#"{"field": "missing", "top_k": 3}"#).unwrap_err();
        assert!(matches!(err, XystonError::NotFound(_)));
    }

    #[test]
    fn test_plan_non_vector_field() {
        let schema = sample_schema();
        let err = SearchPlan::from_json(&schema, r#"{"field": "id", "top_k": 3}"#).unwrap_err();
        assert!(matches!(err, XystonError::NotFound(_)));
    }

    #[test]
    fn test_plan_zero_top_k() {
        let schema = sample_schema();
        let err =
            SearchPlan::from_json(&schema, r#"{"field": "embedding", "top_k": 0}"#).unwrap_err();
        assert!(matches!(err, XystonError::InvalidArgument(_)));
    }

    #[test]
    fn test_placeholder_group_shape() {
        let group = PlaceholderGroup::new(2, vec![1.0, 0.0, 0.0, 1.0, 0.5, 0.5]).unwrap();
        assert_eq!(group.num_queries(), 3);
        assert_eq!(group.query(1), &[0.0, 1.0]);
    }

    #[test]
    fn test_placeholder_group_bad_shape() {
        assert!(PlaceholderGroup::new(0, vec![1.0]).is_err());
        assert!(PlaceholderGroup::new(2, vec![]).is_err());
        assert!(PlaceholderGroup::new(2, vec![1.0, 2.0, 3.0]).is_err());
    }
}
