//! Configuration management for the profiling pipeline.
//!
//! A single [`Config`] is constructed explicitly and passed into each
//! pipeline stage; there are no process-wide singletons. Loading follows
//! the layered pattern: `config/default.toml`, then
//! `config/{SCAM_PROFILER_ENV}.toml`, then `SCAM_PROFILER_`-prefixed
//! environment variables.

mod sub_configs;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub use sub_configs::{
    ClassifierConfig, ExportConfig, FeatureConfig, HdbscanConfig, LoggingConfig, NetworkConfig,
    PersonaConfig, PreprocessingConfig, TfidfConfig, UmapConfig,
};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub umap: UmapConfig,
    #[serde(default)]
    pub hdbscan: HdbscanConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Sources, later ones winning:
    /// 1. `config/default.toml` (base settings, optional)
    /// 2. `config/{SCAM_PROFILER_ENV}.toml` (environment-specific, optional)
    /// 3. Environment variables with `SCAM_PROFILER_` prefix
    pub fn load() -> CoreResult<Self> {
        let env = std::env::var("SCAM_PROFILER_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("SCAM_PROFILER").separator("__"));

        let config: Config = builder
            .build()
            .map_err(|e| CoreError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a single TOML file.
    pub fn from_file(path: &std::path::Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values. Fails fast with descriptive messages.
    pub fn validate(&self) -> CoreResult<()> {
        for (name, tfidf) in [
            ("features.tfidf_char", &self.features.tfidf_char),
            ("features.tfidf_word", &self.features.tfidf_word),
        ] {
            if tfidf.ngram_range.0 == 0 || tfidf.ngram_range.0 > tfidf.ngram_range.1 {
                return Err(CoreError::Config(format!(
                    "{}.ngram_range must satisfy 1 <= low <= high, got ({}, {})",
                    name, tfidf.ngram_range.0, tfidf.ngram_range.1
                )));
            }
            if tfidf.max_features == 0 {
                return Err(CoreError::Config(format!(
                    "{}.max_features must be greater than 0",
                    name
                )));
            }
        }

        if self.umap.n_neighbors < 2 {
            return Err(CoreError::Config(format!(
                "umap.n_neighbors must be >= 2, got {}",
                self.umap.n_neighbors
            )));
        }
        if self.umap.n_components == 0 {
            return Err(CoreError::Config("umap.n_components must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.umap.min_dist) {
            return Err(CoreError::Config(format!(
                "umap.min_dist must be in [0.0, 1.0], got {}",
                self.umap.min_dist
            )));
        }

        if self.hdbscan.min_cluster_size < 2 {
            return Err(CoreError::Config(format!(
                "hdbscan.min_cluster_size must be >= 2, got {}",
                self.hdbscan.min_cluster_size
            )));
        }
        if let Some(min_samples) = self.hdbscan.min_samples {
            if min_samples == 0 {
                return Err(CoreError::Config("hdbscan.min_samples must be >= 1".into()));
            }
        }
        if self.hdbscan.cluster_selection_epsilon < 0.0 {
            return Err(CoreError::Config(
                "hdbscan.cluster_selection_epsilon must be >= 0.0".into(),
            ));
        }

        if self.classifier.batch_size == 0 {
            return Err(CoreError::Config("classifier.batch_size must be > 0".into()));
        }
        if self.classifier.endpoint.is_empty() {
            return Err(CoreError::Config("classifier.endpoint cannot be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.classifier.cluster_threshold) {
            return Err(CoreError::Config(format!(
                "classifier.cluster_threshold must be in [0.0, 1.0], got {}",
                self.classifier.cluster_threshold
            )));
        }

        if self.persona.top_k == 0 {
            return Err(CoreError::Config("persona.top_k must be > 0".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok(), "default config must validate");

        assert_eq!(config.features.tfidf_char.ngram_range, (3, 5));
        assert_eq!(config.features.tfidf_word.ngram_range, (1, 2));
        assert_eq!(config.features.tfidf_char.max_features, 60_000);
        assert_eq!(config.umap.n_neighbors, 30);
        assert_eq!(config.umap.n_components, 10);
        assert_eq!(config.hdbscan.min_cluster_size, 30);
        assert_eq!(config.hdbscan.min_samples, None);
        assert_eq!(config.classifier.batch_size, 100);
        assert!((config.classifier.cluster_threshold - 0.80).abs() < f64::EPSILON);
        assert_eq!(config.persona.top_k, 12);
    }

    #[test]
    fn test_rejects_bad_ngram_range() {
        let mut config = Config::default();
        config.features.tfidf_char.ngram_range = (5, 3);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ngram_range"));
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_rejects_min_cluster_size_below_2() {
        let mut config = Config::default();
        config.hdbscan.min_cluster_size = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_endpoint() {
        let mut config = Config::default();
        config.classifier.endpoint = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_partial_file_fills_defaults() {
        let toml_src = r#"
            [preprocessing]
            target_lang = "spa"

            [hdbscan]
            min_cluster_size = 10
        "#;
        let config: Config = toml::from_str(toml_src).expect("partial TOML must parse");
        assert_eq!(config.preprocessing.target_lang, "spa");
        assert_eq!(config.hdbscan.min_cluster_size, 10);
        // Untouched sections keep their defaults.
        assert_eq!(config.umap.n_neighbors, 30);
        assert_eq!(config.classifier.batch_size, 100);
    }
}
