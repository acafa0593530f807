//! Collection descriptors shared by every segment of one collection.
//!
//! A [`Collection`] bundles the schema (row layout) with the index
//! configuration. Segments never own either: the catalog layer above this
//! crate creates one collection object and hands it to each segment.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::{FieldEntry, Schema};
use crate::vector_index::IndexConfig;

/// Serializable description of a collection, consumed at the foreign-call
/// boundary as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Collection name.
    pub name: String,
    /// Ordered field catalog.
    pub fields: Vec<FieldEntry>,
    /// Index configuration applied when a segment is sealed.
    #[serde(default)]
    pub index: IndexConfig,
}

/// A collection: schema plus index configuration.
#[derive(Debug)]
pub struct Collection {
    name: String,
    schema: Schema,
    index_config: IndexConfig,
}

impl Collection {
    /// Create a collection from its config.
    pub fn new(config: CollectionConfig) -> Result<Self> {
        let schema = Schema::new(config.fields)?;
        Ok(Collection {
            name: config.name,
            schema,
            index_config: config.index,
        })
    }

    /// Parse a collection from its JSON description.
    pub fn from_json(json: &str) -> Result<Arc<Self>> {
        let config: CollectionConfig = serde_json::from_str(json)?;
        Ok(Arc::new(Collection::new(config)?))
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The row schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The index configuration.
    pub fn index_config(&self) -> &IndexConfig {
        &self.index_config
    }
}
