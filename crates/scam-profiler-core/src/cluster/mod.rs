//! Density-based cluster discovery.
//!
//! # Key Types
//!
//! - [`HdbscanParams`]: validated clustering parameters
//! - [`HdbscanClusterer`]: the fitted-per-run clusterer
//! - [`ClusterResult`]: labels plus summary counts
//! - [`ClusterError`]: parameter/input failures (degenerate data is not one)

pub mod error;
pub mod hdbscan;

pub use error::ClusterError;
pub use hdbscan::{
    ClusterResult, ClusterSelectionMethod, HdbscanClusterer, HdbscanParams, NOISE,
};
