//! The selector resolution state machine.
//!
//! [`SelectorResolver::resolve`] walks the states in
//! [`ResolutionState`] for one snapshot and returns either a validated
//! [`SelectorSet`] or a [`SelectorResolutionError`] listing every provenance
//! that was tried.
//!
//! When the model is consulted it is asked for every field. The candidate is
//! then merged with the catalog entry: a field the catalog already validated
//! keeps the catalog selector, and the model only fills the rest. The merged
//! set is validated as a whole and tagged [`Provenance::Ai`].

use crate::api::AskAsync;
use crate::errors::{AttemptOutcome, ResolutionAttempt, SelectorResolutionError};
use crate::inference::SelectorInference;
use crate::models::{Field, Provenance, SelectorSet};
use crate::selectors::cache::SelectorCache;
use crate::selectors::catalog;
use crate::selectors::validator::{ValidationResult, mark_validated, validate};
use crate::snapshot::DomSnapshot;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// States of one resolution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    TryingDefault,
    TryingCached,
    TryingAi,
    Resolved(Provenance),
    Failed,
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved => f.write_str("UNRESOLVED"),
            Self::TryingDefault => f.write_str("TRYING_DEFAULT"),
            Self::TryingCached => f.write_str("TRYING_CACHED"),
            Self::TryingAi => f.write_str("TRYING_AI"),
            Self::Resolved(p) => write!(f, "RESOLVED({p})"),
            Self::Failed => f.write_str("FAILED"),
        }
    }
}

/// A selector set ready for the extractor, with the validation that passed it.
#[derive(Debug, Clone)]
pub struct ResolvedSelectors {
    pub selectors: SelectorSet,
    pub validation: ValidationResult,
}

impl ResolvedSelectors {
    pub fn provenance(&self) -> Provenance {
        self.selectors.provenance
    }
}

/// Resolves a selector set per snapshot: catalog, then cache, then model.
#[derive(Debug)]
pub struct SelectorResolver<A> {
    inference: Option<SelectorInference<A>>,
    cache: Option<Arc<SelectorCache>>,
}

impl<A> SelectorResolver<A>
where
    A: AskAsync<Response = String>,
{
    /// Build a resolver. An inference engine whose config is disabled is
    /// treated as no backend at all.
    pub fn new(inference: Option<SelectorInference<A>>) -> Self {
        let inference = inference.filter(|engine| {
            let enabled = engine.config().enabled;
            if !enabled {
                info!("Selector inference disabled by configuration");
            }
            enabled
        });
        Self {
            inference,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<SelectorCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn inference_enabled(&self) -> bool {
        self.inference.is_some()
    }

    /// Resolve a validated selector set for `snapshot`.
    ///
    /// Tries the catalog entry, then a cached set for the page fingerprint,
    /// then the inference engine, stopping at the first set whose required
    /// fields validate. A cached set that no longer validates is evicted. A
    /// set produced by inference is cached before it is returned.
    ///
    /// # Arguments
    ///
    /// * `snapshot` - The captured page to resolve selectors against
    ///
    /// # Returns
    ///
    /// The validated set, tagged with the provenance that produced it, and
    /// its per-field validation result.
    ///
    /// # Errors
    ///
    /// [`SelectorResolutionError`] listing every rejected attempt in order
    /// when no provenance yields a usable set. `inference_disabled` is set
    /// when the resolver holds no inference engine.
    #[instrument(level = "info", skip_all)]
    pub async fn resolve(
        &self,
        snapshot: &DomSnapshot,
    ) -> Result<ResolvedSelectors, SelectorResolutionError> {
        let mut state = ResolutionState::Unresolved;
        let mut attempts = Vec::new();

        advance(&mut state, ResolutionState::TryingDefault);
        let default = catalog::lookup();
        let default_result = validate(snapshot, &default);
        if let Some(selectors) = mark_validated(default.clone(), &default_result) {
            return Ok(resolved(&mut state, selectors, default_result));
        }
        attempts.push(ResolutionAttempt {
            provenance: Provenance::Default,
            outcome: AttemptOutcome::ValidationFailed(default_result.clone()),
        });

        let fingerprint = self.cache.as_ref().map(|_| snapshot.fingerprint());
        if let (Some(cache), Some(fp)) = (&self.cache, &fingerprint) {
            if let Some(mut cached) = cache.get(fp) {
                advance(&mut state, ResolutionState::TryingCached);
                cached.provenance = Provenance::Cached;
                let result = validate(snapshot, &cached);
                if let Some(selectors) = mark_validated(cached, &result) {
                    return Ok(resolved(&mut state, selectors, result));
                }
                cache.invalidate(fp);
                attempts.push(ResolutionAttempt {
                    provenance: Provenance::Cached,
                    outcome: AttemptOutcome::ValidationFailed(result),
                });
            }
        }

        let Some(inference) = &self.inference else {
            return Err(failed(&mut state, attempts, true));
        };

        advance(&mut state, ResolutionState::TryingAi);
        let candidate = match inference.infer(snapshot, &Field::ALL).await {
            Ok(candidate) => candidate,
            Err(e) => {
                attempts.push(ResolutionAttempt {
                    provenance: Provenance::Ai,
                    outcome: AttemptOutcome::Inference(e),
                });
                return Err(failed(&mut state, attempts, false));
            }
        };

        let merged = merge(&default, &default_result, candidate);
        let result = validate(snapshot, &merged);
        match mark_validated(merged, &result) {
            Some(selectors) => {
                if let (Some(cache), Some(fp)) = (&self.cache, fingerprint) {
                    cache.insert(fp, selectors.clone());
                }
                Ok(resolved(&mut state, selectors, result))
            }
            None => {
                attempts.push(ResolutionAttempt {
                    provenance: Provenance::Ai,
                    outcome: AttemptOutcome::ValidationFailed(result),
                });
                Err(failed(&mut state, attempts, false))
            }
        }
    }
}

/// Overlay `candidate` on the catalog entry, keeping catalog selectors that validated.
pub fn merge(default: &SelectorSet, default_result: &ValidationResult, candidate: SelectorSet) -> SelectorSet {
    let mut merged = candidate;
    for field in Field::ALL {
        if default_result.is_valid(field) {
            merged.set(field, default.get(field).map(str::to_string));
        }
    }
    merged.provenance = Provenance::Ai;
    merged
}

fn advance(state: &mut ResolutionState, next: ResolutionState) {
    debug!(from = %state, to = %next, "Selector resolution transition");
    *state = next;
}

fn resolved(state: &mut ResolutionState, selectors: SelectorSet, validation: ValidationResult) -> ResolvedSelectors {
    advance(state, ResolutionState::Resolved(selectors.provenance));
    info!(
        provenance = %selectors.provenance,
        container = %selectors.container,
        title = %selectors.title,
        link = %selectors.link,
        "Selectors resolved"
    );
    ResolvedSelectors {
        selectors,
        validation,
    }
}

fn failed(
    state: &mut ResolutionState,
    attempts: Vec<ResolutionAttempt>,
    inference_disabled: bool,
) -> SelectorResolutionError {
    advance(state, ResolutionState::Failed);
    let err = SelectorResolutionError {
        attempts,
        inference_disabled,
    };
    warn!(error = %err, inference_disabled, "Selector resolution failed");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NoBackend;
    use crate::config::InferenceConfig;
    use crate::errors::InferenceError;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const CATALOG_PAGE: &str = r#"<html><body>
        <div class="slot noticia">
          <div class="volanta">Regulation</div>
          <div class="titulo"><a href="/news/1">Macau Revenue Climbs</a></div>
        </div>
        <div class="slot noticia">
          <div class="titulo"><a href="/news/2">Brazil Opens Betting Market</a></div>
        </div>
    </body></html>"#;

    // Containers still match the catalog, headlines moved to h3.headline.
    const TITLE_DRIFT_PAGE: &str = r#"<html><body>
        <div class="slot noticia"><h3 class="headline"><a href="/news/1">Macau Revenue Climbs</a></h3></div>
        <div class="slot noticia"><h3 class="headline"><a href="/news/2">Brazil Opens Betting Market</a></h3></div>
    </body></html>"#;

    const REDESIGN_PAGE: &str = r#"<html><body><section class="feed">
        <article class="story"><h2 class="headline"><a href="/news/1">Macau Revenue Climbs</a></h2></article>
        <article class="story"><h2 class="headline"><a href="/news/2">Brazil Opens Betting Market</a></h2></article>
    </section></body></html>"#;

    const REDESIGN_REPLY: &str = r#"{"container": "article.story", "title": "h2.headline",
        "kicker": null, "link": "h2.headline a", "image": null, "date": null}"#;

    enum Reply {
        Json(&'static str),
        Hang,
    }

    struct Stub {
        reply: Reply,
        calls: Arc<AtomicUsize>,
    }

    impl AskAsync for Stub {
        type Response = String;

        async fn ask(&self, _text: &str) -> Result<String, Box<dyn Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Json(json) => Ok(json.to_string()),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(String::new())
                }
            }
        }
    }

    fn snapshot(markup: &str) -> DomSnapshot {
        DomSnapshot::parse(markup, url::Url::parse("https://news.example/").ok())
    }

    fn resolver(reply: Reply) -> (SelectorResolver<Stub>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let stub = Stub {
            reply,
            calls: Arc::clone(&calls),
        };
        let config = InferenceConfig {
            timeout_ms: 50,
            ..InferenceConfig::default()
        };
        (SelectorResolver::new(Some(SelectorInference::new(stub, config))), calls)
    }

    #[tokio::test]
    async fn test_valid_catalog_never_calls_backend() {
        let (resolver, calls) = resolver(Reply::Json(REDESIGN_REPLY));
        let resolved = resolver.resolve(&snapshot(CATALOG_PAGE)).await.unwrap();
        assert_eq!(resolved.provenance(), Provenance::Default);
        assert!(resolved.selectors.is_validated());
        // the fixture has no image or date, so those optionals are dropped
        assert_eq!(resolved.selectors.image, None);
        assert_eq!(resolved.selectors.kicker.as_deref(), Some(".volanta"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_backend_fails_without_trying_ai() {
        let resolver = SelectorResolver::<NoBackend>::new(None);
        let err = resolver.resolve(&snapshot(REDESIGN_PAGE)).await.unwrap_err();
        assert!(err.inference_disabled);
        assert_eq!(err.attempted(), vec![Provenance::Default]);
        assert!(err.inference_error().is_none());
    }

    #[tokio::test]
    async fn test_disabled_config_counts_as_no_backend() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stub = Stub {
            reply: Reply::Json(REDESIGN_REPLY),
            calls: Arc::clone(&calls),
        };
        let config = InferenceConfig {
            enabled: false,
            ..InferenceConfig::default()
        };
        let resolver = SelectorResolver::new(Some(SelectorInference::new(stub, config)));
        assert!(!resolver.inference_enabled());
        let err = resolver.resolve(&snapshot(REDESIGN_PAGE)).await.unwrap_err();
        assert!(err.inference_disabled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ai_fills_failed_fields_and_keeps_catalog_container() {
        let reply = r#"{"container": "div.slot", "title": "h3.headline a", "kicker": null,
                        "link": "h3.headline a", "image": null, "date": null}"#;
        let (resolver, calls) = resolver(Reply::Json(reply));
        let resolved = resolver.resolve(&snapshot(TITLE_DRIFT_PAGE)).await.unwrap();
        assert_eq!(resolved.provenance(), Provenance::Ai);
        assert_eq!(resolved.selectors.container, ".slot.noticia");
        assert_eq!(resolved.selectors.title, "h3.headline a");
        assert_eq!(resolved.selectors.link, "h3.headline a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ai_timeout_fails_with_backend_unavailable() {
        let (resolver, calls) = resolver(Reply::Hang);
        let err = resolver.resolve(&snapshot(REDESIGN_PAGE)).await.unwrap_err();
        assert!(!err.inference_disabled);
        assert_eq!(err.attempted(), vec![Provenance::Default, Provenance::Ai]);
        assert!(matches!(err.inference_error(), Some(InferenceError::BackendUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ai_candidate_that_fails_validation_is_failed() {
        let reply = r#"{"container": "article.story", "title": "h4.nope", "kicker": null,
                        "link": "h2.headline a", "image": null, "date": null}"#;
        let (resolver, _) = resolver(Reply::Json(reply));
        let err = resolver.resolve(&snapshot(REDESIGN_PAGE)).await.unwrap_err();
        let last = err.attempts.last().unwrap();
        assert_eq!(last.provenance, Provenance::Ai);
        match &last.outcome {
            AttemptOutcome::ValidationFailed(result) => assert!(!result.is_valid(Field::Title)),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ai_result_is_cached_and_reused() {
        let cache = Arc::new(SelectorCache::new());
        let snap = snapshot(REDESIGN_PAGE);

        let (first, first_calls) = resolver(Reply::Json(REDESIGN_REPLY));
        let first = first.with_cache(Arc::clone(&cache));
        assert_eq!(first.resolve(&snap).await.unwrap().provenance(), Provenance::Ai);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);

        let (second, second_calls) = resolver(Reply::Hang);
        let second = second.with_cache(Arc::clone(&cache));
        let resolved = second.resolve(&snap).await.unwrap();
        assert_eq!(resolved.provenance(), Provenance::Cached);
        assert_eq!(resolved.selectors.container, "article.story");
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_cache_entry_is_invalidated() {
        let cache = Arc::new(SelectorCache::new());
        let snap = snapshot(REDESIGN_PAGE);
        cache.insert(
            snap.fingerprint(),
            SelectorSet::new(".gone", ".gone", ".gone", Provenance::Ai),
        );

        let resolver = SelectorResolver::<NoBackend>::new(None).with_cache(Arc::clone(&cache));
        let err = resolver.resolve(&snap).await.unwrap_err();
        assert_eq!(err.attempted(), vec![Provenance::Default, Provenance::Cached]);
        assert!(cache.get(&snap.fingerprint()).is_none());
    }

    #[test]
    fn test_merge_prefers_validated_catalog_fields() {
        let snap = snapshot(TITLE_DRIFT_PAGE);
        let default = catalog::lookup();
        let result = validate(&snap, &default);
        let candidate = SelectorSet::new("div.slot", "h3 a", "h3 a", Provenance::Ai).with(Field::Date, "time");
        let merged = merge(&default, &result, candidate);
        assert_eq!(merged.container, ".slot.noticia");
        assert_eq!(merged.title, "h3 a");
        assert_eq!(merged.date.as_deref(), Some("time"));
        assert_eq!(merged.provenance, Provenance::Ai);
        assert!(!merged.is_validated());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ResolutionState::Resolved(Provenance::Ai).to_string(), "RESOLVED(ai)");
        assert_eq!(ResolutionState::TryingDefault.to_string(), "TRYING_DEFAULT");
    }
}
