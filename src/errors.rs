//! Error types for every stage of the extraction pipeline.
//!
//! Only [`SelectorResolutionError`] is terminal for a snapshot. Inference
//! errors are recorded as failed attempts, extraction problems on a single
//! container are [`ExtractionWarning`]s, and enrichment errors degrade to empty
//! entity sets inside the enricher.

use crate::models::{Field, Provenance};
use crate::selectors::validator::ValidationResult;
use std::fmt;
use thiserror::Error;

/// Failure of the AI selector inference backend or of its reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    /// The model answered, but not with a usable selector mapping.
    #[error("malformed inference response: {0}")]
    MalformedResponse(String),
    /// The backend could not be reached, errored, or timed out.
    #[error("inference backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// What went wrong in one attempted provenance.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// The candidate set did not validate its required fields.
    ValidationFailed(ValidationResult),
    /// The inference engine produced no candidate set.
    Inference(InferenceError),
}

/// One provenance tried during resolution and why it was rejected.
#[derive(Debug, Clone)]
pub struct ResolutionAttempt {
    pub provenance: Provenance,
    pub outcome: AttemptOutcome,
}

impl fmt::Display for ResolutionAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            AttemptOutcome::ValidationFailed(result) => {
                let failed = result
                    .failures()
                    .map(|(field, status)| format!("{field}: {status}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{} selectors failed validation ({failed})", self.provenance)
            }
            AttemptOutcome::Inference(e) => write!(f, "{} selectors unavailable ({e})", self.provenance),
        }
    }
}

/// No selector set could be resolved for a snapshot.
#[derive(Debug, Clone, Error)]
#[error("selector resolution failed after {} attempt(s): {}", .attempts.len(), summarize(.attempts))]
pub struct SelectorResolutionError {
    /// Every provenance that was tried, in order.
    pub attempts: Vec<ResolutionAttempt>,
    /// Set when the default catalog failed and no inference backend was configured.
    pub inference_disabled: bool,
}

impl SelectorResolutionError {
    /// The inference error recorded for the AI attempt, if one was made.
    pub fn inference_error(&self) -> Option<&InferenceError> {
        self.attempts.iter().find_map(|a| match &a.outcome {
            AttemptOutcome::Inference(e) => Some(e),
            AttemptOutcome::ValidationFailed(_) => None,
        })
    }

    pub fn attempted(&self) -> Vec<Provenance> {
        self.attempts.iter().map(|a| a.provenance).collect()
    }
}

fn summarize(attempts: &[ResolutionAttempt]) -> String {
    attempts.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Why a single listing container produced no article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningReason {
    /// A required field selector matched nothing in the container.
    MissingField(Field),
    /// A required field matched but yielded no text or attribute.
    EmptyField(Field),
    /// The link could not be turned into an absolute http(s) URL.
    InvalidLink(String),
}

/// A non-fatal, per-container extraction problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionWarning {
    /// Position of the container in document order.
    pub container_index: usize,
    pub reason: WarningReason,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            WarningReason::MissingField(field) => {
                write!(f, "container #{}: no {field} element", self.container_index)
            }
            WarningReason::EmptyField(field) => {
                write!(f, "container #{}: empty {field}", self.container_index)
            }
            WarningReason::InvalidLink(href) => {
                write!(f, "container #{}: invalid link {href:?}", self.container_index)
            }
        }
    }
}

/// The extractor refused a selector set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("selector set has not been validated against this snapshot")]
    Unvalidated,
    #[error("invalid {field} selector {selector:?}: {reason}")]
    InvalidSelector {
        field: Field,
        selector: String,
        reason: String,
    },
}

/// Failure of a named-entity recognition backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentError {
    #[error("entity recognizer unavailable: {0}")]
    BackendUnavailable(String),
}

/// A pipeline run that produced nothing for the sink.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Resolution(#[from] SelectorResolutionError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("run cancelled before records were emitted")]
    Cancelled,
    #[error("sink rejected the batch: {0}")]
    Sink(String),
}

/// The pipeline configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_error_display() {
        let e = InferenceError::BackendUnavailable("timed out after 2s".to_string());
        assert_eq!(e.to_string(), "inference backend unavailable: timed out after 2s");
    }

    #[test]
    fn test_resolution_error_reports_inference_error() {
        let err = SelectorResolutionError {
            attempts: vec![ResolutionAttempt {
                provenance: Provenance::Ai,
                outcome: AttemptOutcome::Inference(InferenceError::MalformedResponse(
                    "missing selector for `link`".to_string(),
                )),
            }],
            inference_disabled: false,
        };
        assert_eq!(err.attempted(), vec![Provenance::Ai]);
        assert!(matches!(
            err.inference_error(),
            Some(InferenceError::MalformedResponse(_))
        ));
        assert!(err.to_string().contains("1 attempt(s)"));
        assert!(err.to_string().contains("missing selector"));
    }

    #[test]
    fn test_warning_display() {
        let w = ExtractionWarning {
            container_index: 2,
            reason: WarningReason::EmptyField(Field::Title),
        };
        assert_eq!(w.to_string(), "container #2: empty title");
    }
}
