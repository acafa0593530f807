//! Schema management for row structure definition.
//!
//! A [`Schema`] describes the fields of one row: a fixed catalog of scalar
//! fields plus dense vector fields. Rows are stored row-major, so the schema
//! also fixes the per-row byte stride and the byte offset of every field
//! within a row.

use serde::{Deserialize, Serialize};

use crate::error::{Result, XystonError};

/// The type of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    /// Boolean scalar, one byte.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Dense float vector with a fixed dimension.
    FloatVector {
        /// Number of components.
        dim: usize,
    },
}

impl FieldType {
    /// Byte width of one value of this type within a row.
    pub fn byte_width(&self) -> usize {
        match self {
            FieldType::Bool | FieldType::Int8 => 1,
            FieldType::Int16 => 2,
            FieldType::Int32 | FieldType::Float => 4,
            FieldType::Int64 | FieldType::Double => 8,
            FieldType::FloatVector { dim } => dim * std::mem::size_of::<f32>(),
        }
    }

    /// Check whether this is a vector type.
    pub fn is_vector(&self) -> bool {
        matches!(self, FieldType::FloatVector { .. })
    }
}

/// One named field of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    /// Field name, unique within the schema.
    pub name: String,
    /// Field type.
    #[serde(flatten)]
    pub field_type: FieldType,
}

impl FieldEntry {
    /// Create a new field entry.
    pub fn new<S: Into<String>>(name: S, field_type: FieldType) -> Self {
        FieldEntry {
            name: name.into(),
            field_type,
        }
    }
}

/// A schema defines the row layout of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldEntry>,
    offsets: Vec<usize>,
    row_stride: usize,
}

impl Schema {
    /// Build a schema from an ordered field list.
    ///
    /// Field byte offsets follow declaration order with no padding, matching
    /// the row-major buffers callers hand to insert.
    pub fn new(fields: Vec<FieldEntry>) -> Result<Self> {
        if fields.is_empty() {
            return Err(XystonError::schema("schema must declare at least one field"));
        }

        let mut offsets = Vec::with_capacity(fields.len());
        let mut row_stride = 0usize;
        for field in &fields {
            if field.name.is_empty() {
                return Err(XystonError::schema("field name cannot be empty"));
            }
            if fields.iter().filter(|f| f.name == field.name).count() > 1 {
                return Err(XystonError::schema(format!(
                    "field '{}' declared more than once",
                    field.name
                )));
            }
            if let FieldType::FloatVector { dim } = field.field_type
                && dim == 0
            {
                return Err(XystonError::schema(format!(
                    "vector field '{}' must have a nonzero dimension",
                    field.name
                )));
            }
            offsets.push(row_stride);
            row_stride += field.field_type.byte_width();
        }

        Ok(Schema {
            fields,
            offsets,
            row_stride,
        })
    }

    /// Bytes occupied by one row.
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[FieldEntry] {
        &self.fields
    }

    /// Look up a field and its byte offset within a row.
    pub fn field(&self, name: &str) -> Option<(usize, &FieldEntry)> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| (self.offsets[i], &self.fields[i]))
    }

    /// Check if a field exists.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Look up a vector field: its byte offset and dimension.
    pub fn vector_field(&self, name: &str) -> Result<(usize, usize)> {
        let (offset, entry) = self.field(name).ok_or_else(|| {
            XystonError::not_found(format!("field '{name}' does not exist"))
        })?;
        match entry.field_type {
            FieldType::FloatVector { dim } => Ok((offset, dim)),
            _ => Err(XystonError::not_found(format!(
                "field '{name}' is not a vector field"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> Vec<FieldEntry> {
        vec![
            FieldEntry::new("age", FieldType::Int32),
            FieldEntry::new("embedding", FieldType::FloatVector { dim: 16 }),
            FieldEntry::new("weight", FieldType::Double),
        ]
    }

    #[test]
    fn test_row_stride_and_offsets() {
        let schema = Schema::new(sample_fields()).unwrap();
        assert_eq!(schema.row_stride(), 4 + 64 + 8);

        let (offset, entry) = schema.field("embedding").unwrap();
        assert_eq!(offset, 4);
        assert_eq!(entry.field_type, FieldType::FloatVector { dim: 16 });

        let (offset, _) = schema.field("weight").unwrap();
        assert_eq!(offset, 68);
    }

    #[test]
    fn test_vector_field_lookup() {
        let schema = Schema::new(sample_fields()).unwrap();
        let (offset, dim) = schema.vector_field("embedding").unwrap();
        assert_eq!(offset, 4);
        assert_eq!(dim, 16);

        assert!(schema.vector_field("age").is_err());
        assert!(schema.vector_field("missing").is_err());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let fields = vec![
            FieldEntry::new("a", FieldType::Int64),
            FieldEntry::new("a", FieldType::Float),
        ];
        assert!(Schema::new(fields).is_err());
    }

    #[test]
    fn test_empty_schema_rejected() {
        assert!(Schema::new(Vec::new()).is_err());
    }

    #[test]
    fn test_zero_dim_vector_rejected() {
        let fields = vec![FieldEntry::new("v", FieldType::FloatVector { dim: 0 })];
        assert!(Schema::new(fields).is_err());
    }

    #[test]
    fn test_field_entry_json_round_trip() {
        let entry = FieldEntry::new("embedding", FieldType::FloatVector { dim: 8 });
        let json = serde_json::to_string(&entry).unwrap();
        let back: FieldEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
    }
}
