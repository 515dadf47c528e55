//! Sub-configuration structures for the profiling pipeline.
//!
//! Each stage of the pipeline receives its own config struct; the main
//! [`super::Config`] aggregates them. Defaults mirror a production
//! corpus-scale deployment; tests override the caps for small batches.

use serde::{Deserialize, Serialize};

/// Preprocessing configuration: language filter, PII masking, length floor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreprocessingConfig {
    /// Drop records whose detected language differs from `target_lang`.
    #[serde(default = "default_true")]
    pub lang_filter: bool,

    /// ISO-639-3 code of the target language (whatlang code, e.g. "eng").
    #[serde(default = "default_target_lang")]
    pub target_lang: String,

    /// Replace PII surfaces (emails/phones/wallets) with pseudonymous tokens.
    #[serde(default = "default_true")]
    pub pii_mask: bool,

    /// Records with cleaned text at or below this length are discarded.
    #[serde(default = "default_min_text_len")]
    pub min_text_len: usize,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            lang_filter: true,
            target_lang: default_target_lang(),
            pii_mask: true,
            min_text_len: default_min_text_len(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_target_lang() -> String {
    "eng".to_string()
}

fn default_min_text_len() -> usize {
    5
}

/// Parameters for one TF-IDF vectorizer (char- or word-level).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TfidfConfig {
    /// Inclusive n-gram range, e.g. (3, 5) for char trigrams..5-grams.
    pub ngram_range: (usize, usize),

    /// Minimum number of documents a term must occur in.
    #[serde(default = "default_min_df")]
    pub min_df: usize,

    /// Vocabulary cap; most frequent terms win, ties lexicographic.
    #[serde(default = "default_max_features")]
    pub max_features: usize,
}

fn default_min_df() -> usize {
    5
}

fn default_max_features() -> usize {
    60_000
}

/// Feature-builder configuration: two lexical matrices + signal flags.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureConfig {
    /// Character-level vectorizer (n-grams 3-5).
    #[serde(default = "default_tfidf_char")]
    pub tfidf_char: TfidfConfig,

    /// Word-level vectorizer (n-grams 1-2, English stop-words removed).
    #[serde(default = "default_tfidf_word")]
    pub tfidf_word: TfidfConfig,

    /// Remove English stop-words in the word vectorizer.
    #[serde(default = "default_true")]
    pub stop_words: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            tfidf_char: default_tfidf_char(),
            tfidf_word: default_tfidf_word(),
            stop_words: true,
        }
    }
}

fn default_tfidf_char() -> TfidfConfig {
    TfidfConfig {
        ngram_range: (3, 5),
        min_df: 5,
        max_features: 60_000,
    }
}

fn default_tfidf_word() -> TfidfConfig {
    TfidfConfig {
        ngram_range: (1, 2),
        min_df: 5,
        max_features: 60_000,
    }
}

/// Manifold embedding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UmapConfig {
    /// Neighborhood size for the k-NN graph. Clamped to n-1 for tiny batches.
    #[serde(default = "default_n_neighbors")]
    pub n_neighbors: usize,

    /// Minimum spacing between embedded points.
    #[serde(default = "default_min_dist")]
    pub min_dist: f32,

    /// Output dimensionality for clustering.
    #[serde(default = "default_n_components")]
    pub n_components: usize,

    /// RNG seed; identical seed + batch gives identical embeddings.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Also fit a 2-D projection for visualization exports.
    #[serde(default)]
    pub viz: bool,

    /// Dimensionality of the visualization projection.
    #[serde(default = "default_viz_components")]
    pub viz_components: usize,
}

impl Default for UmapConfig {
    fn default() -> Self {
        Self {
            n_neighbors: default_n_neighbors(),
            min_dist: default_min_dist(),
            n_components: default_n_components(),
            seed: default_seed(),
            viz: false,
            viz_components: default_viz_components(),
        }
    }
}

fn default_n_neighbors() -> usize {
    30
}

fn default_min_dist() -> f32 {
    0.1
}

fn default_n_components() -> usize {
    10
}

fn default_seed() -> u64 {
    42
}

fn default_viz_components() -> usize {
    2
}

/// Density clustering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HdbscanConfig {
    /// Minimum number of points to form a cluster.
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Core-point threshold. `None` falls back to `min_cluster_size`.
    #[serde(default)]
    pub min_samples: Option<usize>,

    /// Distance threshold below which adjacent clusters are merged.
    #[serde(default)]
    pub cluster_selection_epsilon: f32,
}

impl Default for HdbscanConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: default_min_cluster_size(),
            min_samples: None,
            cluster_selection_epsilon: 0.0,
        }
    }
}

fn default_min_cluster_size() -> usize {
    30
}

/// External classification service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    /// Service endpoint (POST, JSON).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Items per request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Confidence/alignment threshold forwarded to the service.
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            batch_size: default_batch_size(),
            cluster_threshold: default_cluster_threshold(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    std::env::var("SCAM_PROFILER_CLASSIFIER_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:8787/analyze".to_string())
}

fn default_batch_size() -> usize {
    100
}

fn default_cluster_threshold() -> f64 {
    0.80
}

fn default_timeout_secs() -> u64 {
    120
}

/// Entity-graph configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Minimum number of records an entity must appear in to enter the graph.
    #[serde(default = "default_cooccurrence_min")]
    pub cooccurrence_min: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cooccurrence_min: default_cooccurrence_min(),
        }
    }
}

fn default_cooccurrence_min() -> usize {
    1
}

/// Persona synthesis configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersonaConfig {
    /// Number of representative keywords per persona.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Sample text is truncated to this many characters.
    #[serde(default = "default_max_sample_len")]
    pub max_sample_len: usize,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_sample_len: default_max_sample_len(),
        }
    }
}

fn default_top_k() -> usize {
    12
}

fn default_max_sample_len() -> usize {
    500
}

/// Artifact export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Directory artifacts are written under; created if absent.
    #[serde(default = "default_export_dir")]
    pub dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
        }
    }
}

fn default_export_dir() -> String {
    "exports".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
