//! Linguistic enrichment of article titles.
//!
//! [`Enricher::enrich`] computes, for one title:
//!
//! | Feature | Rule |
//! |---------|------|
//! | `word_count` | whitespace-delimited tokens |
//! | `char_count` | characters (not bytes) of the trimmed title |
//! | `capitalized_words` | tokens after the first whose first letter is uppercase |
//! | `persons`, `organizations`, `locations` | entity spans from the configured [`ner`] backend |
//!
//! Tokens have surrounding punctuation stripped before the capitalization
//! check, so `"Deal:"` counts as `Deal` and a lone `—` is ignored.
//!
//! If the recognizer is unavailable the entity lists are left empty and the
//! record is still produced; [`Enrichment::entities_degraded`] reports it.

pub mod ner;

use crate::config::{EnrichmentConfig, NerBackend};
use crate::models::EnrichedFeatures;
use itertools::Itertools;
use ner::{DisabledRecognizer, EntityKind, EntityRecognizer, LexiconRecognizer};
use tracing::warn;

/// Features for one title plus whether entity recognition degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub features: EnrichedFeatures,
    pub entities_degraded: bool,
}

/// Deterministic title enricher over a pluggable entity recognizer.
pub struct Enricher {
    recognizer: Box<dyn EntityRecognizer + Send + Sync>,
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("ner_model", &self.recognizer.model_id())
            .finish()
    }
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(LexiconRecognizer::new())
    }
}

impl Enricher {
    pub fn new(recognizer: impl EntityRecognizer + Send + Sync + 'static) -> Self {
        Self {
            recognizer: Box::new(recognizer),
        }
    }

    pub fn from_config(config: &EnrichmentConfig) -> Self {
        match config.ner_backend {
            NerBackend::Lexicon => Self::new(LexiconRecognizer::new()),
            NerBackend::Disabled => Self::new(DisabledRecognizer),
        }
    }

    /// Identity of the entity model in use.
    pub fn ner_model(&self) -> &str {
        self.recognizer.model_id()
    }

    /// Compute the features of `title`.
    pub fn enrich(&self, title: &str) -> EnrichedFeatures {
        self.enrich_with_status(title).features
    }

    /// Compute the features of `title`, reporting degraded entity recognition.
    pub fn enrich_with_status(&self, title: &str) -> Enrichment {
        let title = title.trim();
        if title.is_empty() {
            return Enrichment {
                features: EnrichedFeatures::default(),
                entities_degraded: false,
            };
        }

        let mut features = EnrichedFeatures {
            word_count: title.split_whitespace().count(),
            char_count: title.chars().count(),
            capitalized_words: capitalized_words(title),
            ..EnrichedFeatures::default()
        };

        let entities_degraded = match self.recognizer.recognize(title) {
            Ok(spans) => {
                let of_kind = |kind: EntityKind| {
                    spans
                        .iter()
                        .filter(|s| s.kind == kind)
                        .map(|s| s.text.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .unique()
                        .collect::<Vec<_>>()
                };
                features.persons = of_kind(EntityKind::Person);
                features.organizations = of_kind(EntityKind::Organization);
                features.locations = of_kind(EntityKind::Location);
                false
            }
            Err(e) => {
                warn!(error = %e, ner_model = self.recognizer.model_id(), "Entity recognition unavailable; leaving entity sets empty");
                true
            }
        };

        Enrichment {
            features,
            entities_degraded,
        }
    }
}

/// Capitalized tokens of `title`, excluding the sentence-initial one.
pub fn capitalized_words(title: &str) -> Vec<String> {
    title
        .split_whitespace()
        .skip(1)
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| token.chars().next().is_some_and(char::is_uppercase))
        .map(str::to_string)
        .collect()
}
