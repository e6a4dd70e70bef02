//! Data models for selector sets, extracted articles, and their enriched records.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`Field`]: the logical article fields a selector set addresses
//! - [`SelectorSet`]: one CSS query per field, tagged with its [`Provenance`]
//! - [`RawArticle`]: one tuple pulled out of a listing container
//! - [`EnrichedFeatures`]: derived linguistic features of a title
//! - [`ArticleRecord`]: the final, immutable record handed to a sink
//! - [`ArticleRow`]: the flat warehouse row shape of a record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A logical article field addressed by a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    /// The element wrapping a single article card in the listing.
    Container,
    Title,
    Kicker,
    Link,
    Image,
    Date,
}

impl Field {
    /// Every field, in the order selectors are reported and prompted for.
    pub const ALL: [Field; 6] = [
        Field::Container,
        Field::Title,
        Field::Kicker,
        Field::Link,
        Field::Image,
        Field::Date,
    ];

    /// The fields a selector set cannot be used without.
    pub const REQUIRED: [Field; 3] = [Field::Container, Field::Title, Field::Link];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Container => "container",
            Field::Title => "title",
            Field::Kicker => "kicker",
            Field::Link => "link",
            Field::Image => "image",
            Field::Date => "date",
        }
    }

    /// Whether a failure of this field is load-bearing for resolution.
    pub fn is_required(&self) -> bool {
        matches!(self, Field::Container | Field::Title | Field::Link)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a selector set (or a single selector in it) came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// The compiled-in default catalog.
    Default,
    /// Inferred by the language model for this snapshot.
    Ai,
    /// Re-used from the fingerprint-keyed selector cache.
    Cached,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provenance::Default => "default",
            Provenance::Ai => "ai",
            Provenance::Cached => "cached",
        })
    }
}

/// A CSS query per logical field.
///
/// `container` is evaluated against the whole document; every other selector
/// is evaluated relative to a single container element. Optional fields may be
/// absent.
///
/// A set only becomes usable by the extractor once the validator has marked it
/// validated; the flag is never persisted, so a set read back from the cache
/// has to pass validation again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    pub container: String,
    pub title: String,
    pub link: String,
    pub kicker: Option<String>,
    pub image: Option<String>,
    pub date: Option<String>,
    pub provenance: Provenance,
    #[serde(skip)]
    pub(crate) validated: bool,
}

impl SelectorSet {
    /// Build an unvalidated set from its three required selectors.
    pub fn new(
        container: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        provenance: Provenance,
    ) -> Self {
        Self {
            container: container.into(),
            title: title.into(),
            link: link.into(),
            kicker: None,
            image: None,
            date: None,
            provenance,
            validated: false,
        }
    }

    pub fn with(mut self, field: Field, selector: impl Into<String>) -> Self {
        self.set(field, Some(selector.into()));
        self
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// The selector for `field`, if one is set.
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Container => Some(self.container.as_str()),
            Field::Title => Some(self.title.as_str()),
            Field::Link => Some(self.link.as_str()),
            Field::Kicker => self.kicker.as_deref(),
            Field::Image => self.image.as_deref(),
            Field::Date => self.date.as_deref(),
        }
    }

    /// Replace the selector for `field`.
    ///
    /// Required fields ignore `None`; they always carry a selector. Any change
    /// clears the validated flag.
    pub fn set(&mut self, field: Field, selector: Option<String>) {
        match (field, selector) {
            (Field::Container, Some(s)) => self.container = s,
            (Field::Title, Some(s)) => self.title = s,
            (Field::Link, Some(s)) => self.link = s,
            (Field::Container | Field::Title | Field::Link, None) => return,
            (Field::Kicker, s) => self.kicker = s,
            (Field::Image, s) => self.image = s,
            (Field::Date, s) => self.date = s,
        }
        self.validated = false;
    }
}

/// One article tuple as pulled out of a listing container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArticle {
    /// Trimmed, non-empty headline text.
    pub title: String,
    pub kicker: Option<String>,
    /// Absolute `http`/`https` URL of the article.
    pub link: String,
    /// Absolute image URL, when one resolved.
    pub image: Option<String>,
    /// Date text exactly as printed on the page.
    pub date: Option<String>,
}

/// Derived linguistic features of a headline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedFeatures {
    pub word_count: usize,
    pub char_count: usize,
    /// Capitalized tokens after the first, in title order.
    pub capitalized_words: Vec<String>,
    pub persons: Vec<String>,
    pub organizations: Vec<String>,
    pub locations: Vec<String>,
}

/// A finished article record: raw fields, enrichment and run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(flatten)]
    pub article: RawArticle,
    #[serde(flatten)]
    pub features: EnrichedFeatures,
    pub scrape_timestamp: DateTime<Utc>,
}

/// The warehouse row shape of an [`ArticleRecord`].
///
/// List columns are comma-joined strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRow {
    pub title: String,
    pub kicker: Option<String>,
    pub link: String,
    pub image: Option<String>,
    pub date: Option<String>,
    pub scrape_timestamp: DateTime<Utc>,
    pub title_word_count: i64,
    pub title_char_count: i64,
    pub capitalized_words: String,
    pub persons: String,
    pub organizations: String,
    pub locations: String,
}

impl From<&ArticleRecord> for ArticleRow {
    fn from(record: &ArticleRecord) -> Self {
        let article = &record.article;
        let features = &record.features;
        Self {
            title: article.title.clone(),
            kicker: article.kicker.clone(),
            link: article.link.clone(),
            image: article.image.clone(),
            date: article.date.clone(),
            scrape_timestamp: record.scrape_timestamp,
            title_word_count: features.word_count as i64,
            title_char_count: features.char_count as i64,
            capitalized_words: features.capitalized_words.join(","),
            persons: features.persons.join(","),
            organizations: features.organizations.join(","),
            locations: features.locations.join(","),
        }
    }
}
