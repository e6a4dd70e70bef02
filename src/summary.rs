//! Per-run statistics over assembled records.
//!
//! Title complexity is `0.5 * words + 1.5 * capitalized + 2 * special`,
//! rounded to two decimals. `capitalized` counts every whole word of the form
//! `[A-Z][a-z]*`, the first word included, so it differs from the
//! `capitalized_words` feature. A special character is anything that is
//! neither alphanumeric, `_`, nor whitespace.

use crate::models::ArticleRecord;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::info;

const TOP_CAPITALIZED: usize = 10;
const TOP_ENTITIES: usize = 5;

static CAPITALIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z][a-z]*\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComplexityStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Totals, averages and most frequent terms of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_records: usize,
    pub duplicates_dropped: usize,
    pub extraction_warnings: usize,
    pub degraded_enrichments: usize,
    pub avg_title_word_count: f64,
    pub avg_title_char_count: f64,
    pub top_capitalized_words: Vec<(String, usize)>,
    pub top_persons: Vec<(String, usize)>,
    pub top_organizations: Vec<(String, usize)>,
    pub top_locations: Vec<(String, usize)>,
    /// `None` for a run without records.
    pub title_complexity: Option<ComplexityStats>,
}

impl RunSummary {
    pub fn from_records(records: &[ArticleRecord]) -> Self {
        let n = records.len();
        let avg = |total: usize| if n == 0 { 0.0 } else { total as f64 / n as f64 };

        let scores: Vec<f64> = records.iter().map(complexity_score).collect();
        let title_complexity = (!scores.is_empty()).then(|| ComplexityStats {
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            avg: round2(scores.iter().sum::<f64>() / n as f64),
        });

        Self {
            total_records: n,
            avg_title_word_count: avg(records.iter().map(|r| r.features.word_count).sum()),
            avg_title_char_count: avg(records.iter().map(|r| r.features.char_count).sum()),
            top_capitalized_words: top(
                records.iter().flat_map(|r| &r.features.capitalized_words),
                TOP_CAPITALIZED,
            ),
            top_persons: top(records.iter().flat_map(|r| &r.features.persons), TOP_ENTITIES),
            top_organizations: top(records.iter().flat_map(|r| &r.features.organizations), TOP_ENTITIES),
            top_locations: top(records.iter().flat_map(|r| &r.features.locations), TOP_ENTITIES),
            title_complexity,
            ..Self::default()
        }
    }

    pub fn log(&self, source: &str) {
        info!(
            source,
            total = self.total_records,
            duplicates = self.duplicates_dropped,
            warnings = self.extraction_warnings,
            degraded = self.degraded_enrichments,
            avg_words = self.avg_title_word_count,
            avg_chars = self.avg_title_char_count,
            complexity = ?self.title_complexity,
            "Run summary"
        );
        info!(
            source,
            capitalized = ?self.top_capitalized_words,
            persons = ?self.top_persons,
            organizations = ?self.top_organizations,
            locations = ?self.top_locations,
            "Most frequent terms"
        );
    }
}

/// Complexity score of one record's title.
pub fn complexity_score(record: &ArticleRecord) -> f64 {
    let title = &record.article.title;
    let capitalized = CAPITALIZED.find_iter(title).count();
    let special = title
        .chars()
        .filter(|c| !c.is_alphanumeric() && *c != '_' && !c.is_whitespace())
        .count();
    round2(
        0.5 * record.features.word_count as f64
            + 1.5 * capitalized as f64
            + 2.0 * special as f64,
    )
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Most frequent items, ties broken alphabetically.
fn top<'a>(items: impl Iterator<Item = &'a String>, limit: usize) -> Vec<(String, usize)> {
    items
        .counts()
        .into_iter()
        .sorted_by(|(a, ca), (b, cb)| cb.cmp(ca).then_with(|| a.cmp(b)))
        .take(limit)
        .map(|(s, c)| (s.clone(), c))
        .collect()
}
