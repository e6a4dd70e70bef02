//! One end-to-end run over a single snapshot.
//!
//! ```text
//! snapshot -> resolve selectors -> extract -> enrich + assemble -> sink
//! ```
//!
//! A run either hands its complete record batch to the sink or hands it
//! nothing: resolution failures, extractor refusals and cancellation all
//! return before the sink is called.

use crate::api::AskAsync;
use crate::assemble::RecordAssembler;
use crate::config::PipelineConfig;
use crate::enrich::Enricher;
use crate::errors::{ExtractionWarning, PipelineError};
use crate::extract::extract;
use crate::inference::SelectorInference;
use crate::models::{ArticleRecord, ArticleRow, SelectorSet};
use crate::outputs::{ArticleSink, Batch};
use crate::selectors::cache::SelectorCache;
use crate::selectors::resolver::SelectorResolver;
use crate::snapshot::DomSnapshot;
use crate::summary::RunSummary;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub records: Vec<ArticleRecord>,
    /// The validated selector set that was applied, with its provenance.
    pub selectors: SelectorSet,
    pub warnings: Vec<ExtractionWarning>,
    pub summary: RunSummary,
    pub run_timestamp: DateTime<Utc>,
}

/// Resolver, extractor and assembler wired together.
#[derive(Debug)]
pub struct Pipeline<A> {
    resolver: SelectorResolver<A>,
    assembler: RecordAssembler,
    max_articles: Option<usize>,
}

impl<A> Pipeline<A>
where
    A: AskAsync<Response = String>,
{
    pub fn new(resolver: SelectorResolver<A>, assembler: RecordAssembler) -> Self {
        Self {
            resolver,
            assembler,
            max_articles: None,
        }
    }

    /// Build a pipeline from configuration. `backend` is `None` when no
    /// inference backend is configured.
    pub fn from_config(
        config: &PipelineConfig,
        backend: Option<A>,
        cache: Option<Arc<SelectorCache>>,
    ) -> Self {
        let inference = backend.map(|b| SelectorInference::new(b, config.inference.clone()));
        let mut resolver = SelectorResolver::new(inference);
        if let Some(cache) = cache {
            resolver = resolver.with_cache(cache);
        }
        let assembler = RecordAssembler::new(Enricher::from_config(&config.enrichment));
        info!(
            inference = resolver.inference_enabled(),
            ner_model = assembler.enricher().ner_model(),
            max_articles = ?config.max_articles,
            "Pipeline ready"
        );
        Self::new(resolver, assembler).with_max_articles(config.max_articles)
    }

    pub fn with_max_articles(mut self, limit: Option<usize>) -> Self {
        self.max_articles = limit;
        self
    }

    /// Resolve, extract and assemble the records of `snapshot`.
    #[instrument(level = "info", skip_all)]
    pub async fn run(
        &self,
        snapshot: &DomSnapshot,
        run_timestamp: DateTime<Utc>,
    ) -> Result<RunOutput, PipelineError> {
        debug!(
            bytes = snapshot.source_bytes(),
            captured_at = %snapshot.captured_at(),
            base_url = ?snapshot.base_url().map(|u| u.as_str()),
            "Starting run"
        );
        let resolved = self.resolver.resolve(snapshot).await?;
        let extraction = extract(snapshot, &resolved.selectors)?;
        let extracted = extraction.articles.len();

        let mut assembly = self.assembler.assemble(extraction.articles, run_timestamp);
        if let Some(limit) = self.max_articles {
            if assembly.records.len() > limit {
                info!(limit, dropped = assembly.records.len() - limit, "Applying record limit");
                assembly.records.truncate(limit);
            }
        }

        let summary = RunSummary {
            duplicates_dropped: assembly.duplicates_dropped,
            extraction_warnings: extraction.warnings.len(),
            degraded_enrichments: assembly.degraded_enrichments,
            ..RunSummary::from_records(&assembly.records)
        };
        info!(
            provenance = %resolved.selectors.provenance,
            extracted,
            records = assembly.records.len(),
            "Run finished"
        );

        Ok(RunOutput {
            records: assembly.records,
            selectors: resolved.selectors,
            warnings: extraction.warnings,
            summary,
            run_timestamp,
        })
    }

    /// [`run`](Self::run), abandoned as soon as `token` is cancelled.
    pub async fn run_until_cancelled(
        &self,
        snapshot: &DomSnapshot,
        run_timestamp: DateTime<Utc>,
        token: &CancellationToken,
    ) -> Result<RunOutput, PipelineError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                warn!("Run cancelled; discarding partial results");
                Err(PipelineError::Cancelled)
            }
            out = self.run(snapshot, run_timestamp) => out,
        }
    }

    /// Run over `snapshot` and hand the finished batch to `sink`.
    ///
    /// The run timestamp is taken once, here, and shared by every record. The
    /// summary is logged after the sink accepted the batch.
    ///
    /// # Arguments
    ///
    /// * `snapshot` - The captured page
    /// * `source` - Where the snapshot came from, passed on to the sink
    /// * `token` - Cancels the run; a cancelled run writes nothing
    /// * `sink` - Receives all rows of the run in a single batch
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Resolution`] or [`PipelineError::Extraction`] when
    ///   no records can be produced
    /// * [`PipelineError::Cancelled`] when `token` fired before the hand-off
    /// * [`PipelineError::Sink`] when the sink rejected the batch
    #[instrument(level = "info", skip(self, snapshot, token, sink))]
    pub async fn run_into_sink<S: ArticleSink>(
        &self,
        snapshot: &DomSnapshot,
        source: &str,
        token: &CancellationToken,
        sink: &S,
    ) -> Result<RunOutput, PipelineError> {
        let run_timestamp = Utc::now();
        let output = self.run_until_cancelled(snapshot, run_timestamp, token).await?;
        if token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let rows: Vec<ArticleRow> = output.records.iter().map(ArticleRow::from).collect();
        sink.write_batch(Batch {
            source,
            run_timestamp,
            rows: &rows,
        })
        .await
        .map_err(|e| PipelineError::Sink(e.to_string()))?;

        output.summary.log(source);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NoBackend;
    use crate::config::InferenceConfig;
    use crate::models::Provenance;
    use std::cell::RefCell;
    use std::error::Error;
    use std::time::Duration;

    const PAGE: &str = r#"<html><body>
        <div class="slot noticia">
          <div class="volanta">Operators</div>
          <div class="titulo"><a href="/news/entain">Entain Reports Growth in Macau</a></div>
          <div class="fecha_actual">May 6, 2025</div>
        </div>
        <div class="slot noticia">
          <div class="titulo"><a href="/news/vegas">MGM Resorts Expands in Las Vegas</a></div>
        </div>
        <div class="slot noticia">
          <div class="titulo"><a href="/news/entain">Entain Reports Growth in Macau</a></div>
        </div>
        <div class="slot noticia">
          <div class="titulo"><a href="/news/brazil">Brazil Opens Betting Market</a></div>
        </div>
    </body></html>"#;

    const REDESIGN_PAGE: &str = r#"<html><body>
        <article class="story"><h2><a href="/news/1">Macau Revenue Climbs</a></h2></article>
    </body></html>"#;

    #[derive(Default)]
    struct MemorySink {
        batches: RefCell<Vec<Vec<ArticleRow>>>,
        fail: bool,
    }

    impl ArticleSink for MemorySink {
        async fn write_batch(&self, batch: Batch<'_>) -> Result<(), Box<dyn Error>> {
            if self.fail {
                return Err("warehouse offline".into());
            }
            self.batches.borrow_mut().push(batch.rows.to_vec());
            Ok(())
        }
    }

    struct Hang;

    impl AskAsync for Hang {
        type Response = String;

        async fn ask(&self, _text: &str) -> Result<String, Box<dyn Error>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(String::new())
        }
    }

    fn snapshot(markup: &str) -> DomSnapshot {
        DomSnapshot::parse(markup, url::Url::parse("https://www.yogonet.com/international/").ok())
    }

    fn pipeline() -> Pipeline<NoBackend> {
        Pipeline::from_config(&PipelineConfig::default(), None, None)
    }

    #[tokio::test]
    async fn test_run_into_sink_writes_one_batch() {
        let sink = MemorySink::default();
        let token = CancellationToken::new();
        let out = pipeline()
            .run_into_sink(&snapshot(PAGE), "https://www.yogonet.com/international/", &token, &sink)
            .await
            .unwrap();

        assert_eq!(out.selectors.provenance, Provenance::Default);
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.summary.duplicates_dropped, 1);
        assert!(out.records.iter().all(|r| r.scrape_timestamp == out.run_timestamp));

        let batches = sink.batches.borrow();
        assert_eq!(batches.len(), 1);
        let first = &batches[0][0];
        assert_eq!(first.link, "https://www.yogonet.com/news/entain");
        assert_eq!(first.kicker.as_deref(), Some("Operators"));
        assert_eq!(first.organizations, "Entain");
        assert_eq!(first.locations, "Macau");
        assert_eq!(batches[0][1].organizations, "MGM Resorts");
    }

    #[tokio::test]
    async fn test_max_articles_caps_records() {
        let out = pipeline()
            .with_max_articles(Some(2))
            .run(&snapshot(PAGE), Utc::now())
            .await
            .unwrap();
        let titles: Vec<_> = out.records.iter().map(|r| r.article.title.as_str()).collect();
        assert_eq!(titles, vec!["Entain Reports Growth in Macau", "MGM Resorts Expands in Las Vegas"]);
    }

    #[tokio::test]
    async fn test_resolution_failure_never_reaches_sink() {
        let sink = MemorySink::default();
        let err = pipeline()
            .run_into_sink(&snapshot(REDESIGN_PAGE), "redesign", &CancellationToken::new(), &sink)
            .await
            .unwrap_err();
        match err {
            PipelineError::Resolution(e) => assert!(e.inference_disabled),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(sink.batches.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let sink = MemorySink::default();
        let token = CancellationToken::new();
        token.cancel();
        let err = pipeline()
            .run_into_sink(&snapshot(PAGE), "page", &token, &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert!(sink.batches.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_inference_emits_nothing() {
        let config = PipelineConfig {
            inference: InferenceConfig {
                timeout_ms: 20_000,
                ..InferenceConfig::default()
            },
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::from_config(&config, Some(Hang), None);
        let sink = MemorySink::default();
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = pipeline
            .run_into_sink(&snapshot(REDESIGN_PAGE), "redesign", &token, &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert!(sink.batches.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_sink_error_is_reported() {
        let sink = MemorySink {
            fail: true,
            ..MemorySink::default()
        };
        let err = pipeline()
            .run_into_sink(&snapshot(PAGE), "page", &CancellationToken::new(), &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Sink(msg) if msg == "warehouse offline"));
    }
}
