//! Record assembly: enrichment, run timestamp and link de-duplication.

use crate::enrich::Enricher;
use crate::models::{ArticleRecord, RawArticle};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Records for one run plus the diagnostics counted while building them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    pub records: Vec<ArticleRecord>,
    /// Raw articles dropped because an earlier one had the same link.
    pub duplicates_dropped: usize,
    /// Records whose entity sets are empty because the recognizer was unavailable.
    pub degraded_enrichments: usize,
}

#[derive(Debug, Default)]
pub struct RecordAssembler {
    enricher: Enricher,
}

impl RecordAssembler {
    pub fn new(enricher: Enricher) -> Self {
        Self { enricher }
    }

    pub fn enricher(&self) -> &Enricher {
        &self.enricher
    }

    /// Turn `raw` into records stamped with `run_timestamp`.
    ///
    /// Order is preserved. The first article with a given link wins and later
    /// ones are dropped before enrichment.
    #[instrument(level = "info", skip_all, fields(raw = raw.len()))]
    pub fn assemble(&self, raw: Vec<RawArticle>, run_timestamp: DateTime<Utc>) -> Assembly {
        let mut seen = HashSet::with_capacity(raw.len());
        let mut out = Assembly::default();

        for article in raw {
            if !seen.insert(article.link.clone()) {
                debug!(link = %article.link, "Dropping duplicate link");
                out.duplicates_dropped += 1;
                continue;
            }
            let enrichment = self.enricher.enrich_with_status(&article.title);
            if enrichment.entities_degraded {
                out.degraded_enrichments += 1;
            }
            out.records.push(ArticleRecord {
                article,
                features: enrichment.features,
                scrape_timestamp: run_timestamp,
            });
        }

        debug!(
            records = out.records.len(),
            duplicates = out.duplicates_dropped,
            degraded = out.degraded_enrichments,
            "Assembled records"
        );
        out
    }
}
