//! scam-profiler-core
//!
//! Unsupervised persona clustering and cross-source consensus for fraud
//! message corpora. Clusters unstructured messages into behavioral
//! personas, aligns the discovered partition with an independently
//! computed archetype labeling, and synthesizes analyst-facing summaries
//! plus an entity co-occurrence graph.
//!
//! # Pipeline
//!
//! ```text
//! raw records -> normalize/redact -> TF-IDF + flags -> manifold embedding
//!     -> density clusters -> external labels (by id) -> consensus
//!     -> personas + entity graph
//! ```
//!
//! Every stage is a pure transformation over an immutable batch; fitted
//! state never survives a run. See [`pipeline::Pipeline`] for the
//! orchestrated entry point, or use the stage modules directly.

pub mod cluster;
pub mod config;
pub mod consensus;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod external;
pub mod features;
pub mod graph;
pub mod persona;
pub mod pipeline;
pub mod text;
pub mod types;

pub use cluster::{ClusterResult, HdbscanClusterer, HdbscanParams, NOISE};
pub use config::Config;
pub use consensus::{reconcile, ConsensusResult, ConsensusRow};
pub use error::{CoreError, CoreResult};
pub use external::{ArchetypeClassifier, ExternalAnnotation, HttpClassifier};
pub use persona::Persona;
pub use pipeline::{MergedRecord, Pipeline, PipelineOutput, RunMeta};
pub use types::{RawRecord, Record};
