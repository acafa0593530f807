//! Error types for the Xyston library.
//!
//! All failures are represented by the [`XystonError`] enum. Every operation
//! that can fail returns [`Result`], and the foreign-call boundary in
//! [`crate::ffi`] maps each variant onto a small integer status code.

use anyhow;
use thiserror::Error;

/// The main error type for Xyston operations.
#[derive(Error, Debug)]
pub enum XystonError {
    /// Malformed argument: inconsistent range, bad stride, zero-size request.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted in a segment state that forbids it.
    #[error("State error: {0}")]
    State(String),

    /// The allocator or storage cannot grow further. Fatal for the segment.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The index implementation rejected the data or configuration.
    #[error("Index build error: {0}")]
    IndexBuild(String),

    /// A named entity (field, handle) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Schema-related errors
    #[error("Schema error: {0}")]
    Schema(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with XystonError.
pub type Result<T> = std::result::Result<T, XystonError>;

impl XystonError {
    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        XystonError::InvalidArgument(msg.into())
    }

    /// Create a new state error.
    pub fn state<S: Into<String>>(msg: S) -> Self {
        XystonError::State(msg.into())
    }

    /// Create a new resource exhausted error.
    pub fn resource_exhausted<S: Into<String>>(msg: S) -> Self {
        XystonError::ResourceExhausted(msg.into())
    }

    /// Create a new index build error.
    pub fn index_build<S: Into<String>>(msg: S) -> Self {
        XystonError::IndexBuild(msg.into())
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        XystonError::NotFound(msg.into())
    }

    /// Create a new schema error.
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        XystonError::Schema(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = XystonError::invalid_argument("bad stride");
        assert_eq!(error.to_string(), "Invalid argument: bad stride");

        let error = XystonError::state("segment is closed");
        assert_eq!(error.to_string(), "State error: segment is closed");

        let error = XystonError::resource_exhausted("row capacity reached");
        assert_eq!(
            error.to_string(),
            "Resource exhausted: row capacity reached"
        );
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = XystonError::from(json_error);

        match error {
            XystonError::Json(_) => {}
            _ => panic!("Expected JSON error variant"),
        }
    }
}
