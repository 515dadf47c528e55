//! Error types for scam-profiler-core.
//!
//! This module defines the central error type [`CoreError`] used throughout
//! the crate, along with the [`CoreResult<T>`] type alias. Stage-local error
//! types (e.g. [`crate::cluster::ClusterError`]) convert into `CoreError`
//! via `#[from]`.
//!
//! Every error maps to a machine-checkable category via
//! [`CoreError::category`], so a wrapping service can surface a structured
//! `{message, category}` payload without exposing internal stack traces.

use thiserror::Error;

use crate::cluster::ClusterError;

/// Top-level error type for pipeline operations.
///
/// # Examples
///
/// ```
/// use scam_profiler_core::error::CoreError;
///
/// let err = CoreError::MissingColumns {
///     missing: vec!["body".into(), "text".into()],
///     got: vec!["subject".into()],
/// };
/// assert_eq!(err.category(), "input");
/// assert!(err.to_string().contains("body"));
/// ```
#[derive(Debug, Error)]
pub enum CoreError {
    /// The input batch lacks required fields.
    ///
    /// Raised at the ingestion boundary before any stage runs. Never
    /// proceed silently with absent data.
    #[error("Missing required columns: {missing:?}. Got: {got:?}")]
    MissingColumns {
        /// Field names that were required but absent.
        missing: Vec<String>,
        /// Field names actually present in the batch.
        got: Vec<String>,
    },

    /// The batch is empty after ingestion or filtering.
    #[error("Empty batch: {context}")]
    EmptyBatch {
        /// Which stage observed the empty batch.
        context: String,
    },

    /// The input file format is not one the reader understands.
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    /// A configuration value failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An invalid parameter was supplied to a pipeline stage.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The external classification service failed.
    ///
    /// Fatal for the run by default: downstream consensus requires
    /// complete external coverage to be meaningful.
    #[error("External classifier error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    ExternalService {
        /// HTTP status code, when the failure was an HTTP-level one.
        status: Option<u16>,
        /// Human-readable failure context.
        message: String,
    },

    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Clustering failed.
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure while exporting artifacts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Machine-checkable error category for structured error payloads.
    pub fn category(&self) -> &'static str {
        match self {
            CoreError::MissingColumns { .. }
            | CoreError::EmptyBatch { .. }
            | CoreError::UnsupportedFormat(_) => "input",
            CoreError::Config(_) | CoreError::InvalidParameter(_) => "config",
            CoreError::ExternalService { .. } | CoreError::Http(_) => "external_service",
            CoreError::Cluster(_) => "clustering",
            CoreError::Serialization(_) => "serialization",
            CoreError::Io(_) => "io",
        }
    }
}

/// Convenience result alias used across the crate.
pub type CoreResult<T> = Result<T, CoreError>;
