//! Error types for clustering operations.

use thiserror::Error;

/// Errors raised by the density clusterer.
///
/// Degenerate *data* (tiny batches, all-noise partitions) is never an
/// error; only invalid parameters and malformed inputs are.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A clustering parameter failed validation.
    #[error("Invalid clustering parameter: {0}")]
    InvalidParameter(String),

    /// Embedding rows do not share one dimensionality.
    #[error("Dimension mismatch in embedding: expected {expected}, row {row} has {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        row: usize,
    },
}

impl ClusterError {
    /// Convenience constructor used by parameter validation.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        ClusterError::InvalidParameter(message.into())
    }
}
