//! Pipeline configuration.
//!
//! Configuration is an explicit value handed to the engines at construction;
//! nothing in the core reads process state. It is read from an optional YAML
//! file where every key may be omitted:
//!
//! ```yaml
//! inference:
//!   enabled: true
//!   max_prompt_bytes: 12000
//!   timeout_ms: 30000
//!   template: selector_inference
//!   retries: 0
//! enrichment:
//!   ner_backend: lexicon
//! selector_cache: ./selector_cache.json
//! max_articles: 50
//! ```

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub inference: InferenceConfig,
    pub enrichment: EnrichmentConfig,
    /// JSON file persisting inferred selector sets between runs.
    pub selector_cache: Option<PathBuf>,
    /// Keep at most this many records per page.
    pub max_articles: Option<usize>,
}

/// Settings for the AI selector inference step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Allow the TRYING_AI transition. A missing backend disables it regardless.
    pub enabled: bool,
    /// Upper bound on the prompt size sent to the backend.
    pub max_prompt_bytes: usize,
    /// Deadline for one inference call, retries included.
    pub timeout_ms: u64,
    /// `awful_aj` chat template used for the request.
    pub template: String,
    /// Caller-level retries around the backend call.
    pub retries: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_prompt_bytes: 12_000,
            timeout_ms: 30_000,
            template: "selector_inference".to_string(),
            retries: 0,
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Which named-entity recognizer the enricher uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NerBackend {
    /// The built-in gazetteer and cue-word tagger, [`LEXICON_MODEL_ID`](crate::enrich::ner::LEXICON_MODEL_ID).
    #[default]
    Lexicon,
    /// No recognizer; entity sets are always empty.
    Disabled,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub ner_backend: NerBackend,
}

impl PipelineConfig {
    /// Parse a YAML document.
    pub fn from_yaml(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(raw).map_err(|source| ConfigError::Yaml {
            path: origin.to_string(),
            source,
        })
    }

    /// Load from `path`, or return the defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let origin = path.display().to_string();
        let raw = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: origin.clone(),
            source,
        })?;
        let config = Self::from_yaml(&raw, &origin)?;
        info!(path = %origin, ?config, "Loaded pipeline configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.inference.enabled);
        assert_eq!(config.inference.max_prompt_bytes, 12_000);
        assert_eq!(config.inference.timeout(), Duration::from_secs(30));
        assert_eq!(config.enrichment.ner_backend, NerBackend::Lexicon);
        assert_eq!(config.selector_cache, None);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "inference:\n  timeout_ms: 1500\nenrichment:\n  ner_backend: disabled\nmax_articles: 10\n";
        let config = PipelineConfig::from_yaml(yaml, "inline").unwrap();
        assert_eq!(config.inference.timeout(), Duration::from_millis(1500));
        assert_eq!(config.inference.max_prompt_bytes, 12_000);
        assert!(config.inference.enabled);
        assert_eq!(config.enrichment.ner_backend, NerBackend::Disabled);
        assert_eq!(config.max_articles, Some(10));
    }

    #[test]
    fn test_invalid_yaml_names_origin() {
        let err = PipelineConfig::from_yaml("inference: [1, 2", "pipeline.yaml").unwrap_err();
        assert!(err.to_string().contains("pipeline.yaml"));
    }

    #[tokio::test]
    async fn test_load_without_path_uses_defaults() {
        let config = PipelineConfig::load(None).await.unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let err = PipelineConfig::load(Some(Path::new("/nonexistent/adaptive_news.yaml")))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
