//! Article extraction from a validated selector set.
//!
//! Every node matched by `container` yields at most one [`RawArticle`]; field
//! selectors are evaluated relative to that node and the first match wins. A
//! container whose title or link cannot be read is dropped with an
//! [`ExtractionWarning`] and extraction carries on with the next one.

use crate::errors::{ExtractionError, ExtractionWarning, WarningReason};
use crate::models::{Field, RawArticle, SelectorSet};
use crate::snapshot::{DomSnapshot, element_href, element_image_src, element_text};
use scraper::{ElementRef, Selector};
use tracing::{debug, instrument, warn};

/// Articles in document order plus the containers that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub articles: Vec<RawArticle>,
    pub warnings: Vec<ExtractionWarning>,
}

struct Compiled {
    container: Selector,
    title: Selector,
    link: Selector,
    kicker: Option<Selector>,
    image: Option<Selector>,
    date: Option<Selector>,
}

fn compile(set: &SelectorSet, field: Field) -> Result<Option<Selector>, ExtractionError> {
    set.get(field)
        .map(|raw| {
            Selector::parse(raw).map_err(|e| ExtractionError::InvalidSelector {
                field,
                selector: raw.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn required(set: &SelectorSet, field: Field) -> Result<Selector, ExtractionError> {
    compile(set, field)?.ok_or_else(|| ExtractionError::InvalidSelector {
        field,
        selector: String::new(),
        reason: "required selector missing".to_string(),
    })
}

impl Compiled {
    fn new(set: &SelectorSet) -> Result<Self, ExtractionError> {
        Ok(Self {
            container: required(set, Field::Container)?,
            title: required(set, Field::Title)?,
            link: required(set, Field::Link)?,
            kicker: compile(set, Field::Kicker)?,
            image: compile(set, Field::Image)?,
            date: compile(set, Field::Date)?,
        })
    }
}

/// Apply `set` to `snapshot`.
///
/// Pure and idempotent: the same snapshot and set always give the same result.
///
/// # Arguments
///
/// * `snapshot` - The page to read articles from
/// * `set` - A selector set the validator has marked usable
///
/// # Returns
///
/// One [`RawArticle`] per container, in document order, with links and images
/// resolved against the snapshot's base URL. Containers with a missing or
/// empty title or link are skipped and reported as [`ExtractionWarning`]s.
///
/// # Errors
///
/// * [`ExtractionError::Unvalidated`] if `set` has not been validated
/// * [`ExtractionError::InvalidSelector`] if a selector fails to parse
#[instrument(level = "info", skip_all, fields(provenance = %set.provenance))]
pub fn extract(snapshot: &DomSnapshot, set: &SelectorSet) -> Result<Extraction, ExtractionError> {
    if !set.is_validated() {
        return Err(ExtractionError::Unvalidated);
    }
    let compiled = Compiled::new(set)?;

    let mut out = Extraction::default();
    for (index, container) in snapshot.document().select(&compiled.container).enumerate() {
        match extract_one(snapshot, &compiled, &container) {
            Ok(article) => out.articles.push(article),
            Err(reason) => {
                let warning = ExtractionWarning {
                    container_index: index,
                    reason,
                };
                warn!(%warning, "Skipping listing container");
                out.warnings.push(warning);
            }
        }
    }

    debug!(
        articles = out.articles.len(),
        warnings = out.warnings.len(),
        "Extraction finished"
    );
    Ok(out)
}

fn extract_one(
    snapshot: &DomSnapshot,
    selectors: &Compiled,
    container: &ElementRef<'_>,
) -> Result<RawArticle, WarningReason> {
    let title_el = container
        .select(&selectors.title)
        .next()
        .ok_or(WarningReason::MissingField(Field::Title))?;
    let title = element_text(&title_el);
    if title.is_empty() {
        return Err(WarningReason::EmptyField(Field::Title));
    }

    let link_el = container
        .select(&selectors.link)
        .next()
        .ok_or(WarningReason::MissingField(Field::Link))?;
    let href = element_href(&link_el)
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(WarningReason::EmptyField(Field::Link))?;
    let link = snapshot
        .resolve_url(href)
        .ok_or_else(|| WarningReason::InvalidLink(href.to_string()))?;

    let text_of = |sel: &Option<Selector>| {
        sel.as_ref()
            .and_then(|s| container.select(s).next())
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
    };

    let image = selectors
        .image
        .as_ref()
        .and_then(|s| container.select(s).next())
        .and_then(|el| element_image_src(&el))
        .and_then(|src| snapshot.resolve_url(src))
        .map(String::from);

    Ok(RawArticle {
        title,
        kicker: text_of(&selectors.kicker),
        link: link.into(),
        image,
        date: text_of(&selectors.date),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;
    use crate::selectors::validator::{mark_validated, validate};

    const PAGE: &str = r#"
        <html><body>
          <article class="card">
            <span class="kicker"> Regulation </span>
            <h2 class="hl"><a href="/news/macau-revenue">Macau Revenue Climbs</a></h2>
            <img class="thumb" data-src="/img/macau.jpg">
            <time>May 6, 2025</time>
          </article>
          <article class="card">
            <h2 class="hl"><a href="/news/empty"> </a></h2>
          </article>
          <article class="card">
            <h2 class="hl"><a href="https://other.example/brazil">Brazil Opens Betting Market</a></h2>
          </article>
          <article class="card">
            <h2 class="hl"><a href="mailto:desk@news.example">Contact The Desk</a></h2>
          </article>
          <article class="card"><p>sponsored</p></article>
        </body></html>"#;

    fn snapshot(markup: &str) -> DomSnapshot {
        DomSnapshot::parse(markup, url::Url::parse("https://news.example/international/").ok())
    }

    fn selectors() -> SelectorSet {
        SelectorSet::new("article.card", "h2.hl", "h2.hl a", Provenance::Ai)
            .with(Field::Kicker, ".kicker")
            .with(Field::Image, "img.thumb")
            .with(Field::Date, "time")
    }

    fn validated(snap: &DomSnapshot, set: SelectorSet) -> SelectorSet {
        let result = validate(snap, &set);
        mark_validated(set, &result).unwrap()
    }

    #[test]
    fn test_unvalidated_set_is_refused() {
        let snap = snapshot(PAGE);
        assert_eq!(extract(&snap, &selectors()), Err(ExtractionError::Unvalidated));
    }

    #[test]
    fn test_extracts_in_document_order_with_warnings() {
        let snap = snapshot(PAGE);
        let set = validated(&snap, selectors());
        let out = extract(&snap, &set).unwrap();

        assert_eq!(out.articles.len(), 2);
        let first = &out.articles[0];
        assert_eq!(first.title, "Macau Revenue Climbs");
        assert_eq!(first.kicker.as_deref(), Some("Regulation"));
        assert_eq!(first.link, "https://news.example/news/macau-revenue");
        assert_eq!(first.image.as_deref(), Some("https://news.example/img/macau.jpg"));
        assert_eq!(first.date.as_deref(), Some("May 6, 2025"));

        let second = &out.articles[1];
        assert_eq!(second.link, "https://other.example/brazil");
        assert_eq!(second.kicker, None);
        assert_eq!(second.image, None);

        assert_eq!(
            out.warnings,
            vec![
                ExtractionWarning {
                    container_index: 1,
                    reason: WarningReason::EmptyField(Field::Title),
                },
                ExtractionWarning {
                    container_index: 3,
                    reason: WarningReason::InvalidLink("mailto:desk@news.example".to_string()),
                },
                ExtractionWarning {
                    container_index: 4,
                    reason: WarningReason::MissingField(Field::Title),
                },
            ]
        );
    }

    #[test]
    fn test_three_containers_one_empty_title() {
        let page = r#"<html><body><ul>
            <li class="item"><a class="t" href="/a">First Story</a></li>
            <li class="item"><a class="t" href="/b"></a></li>
            <li class="item"><a class="t" href="/c">Third Story</a></li>
        </ul></body></html>"#;
        let snap = snapshot(page);
        let set = validated(&snap, SelectorSet::new("li.item", "a.t", "a.t", Provenance::Default));
        let out = extract(&snap, &set).unwrap();
        let titles: Vec<_> = out.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["First Story", "Third Story"]);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_inline_markup_does_not_split_title_words() {
        let page = r#"<html><body>
            <article class="card"><h2 class="hl"><a href="/x">Mac<b>au</b> Revenue <em>Climbs</em>: Report</a></h2></article>
        </body></html>"#;
        let snap = snapshot(page);
        let set = validated(&snap, SelectorSet::new("article.card", "h2.hl", "h2.hl a", Provenance::Default));
        let out = extract(&snap, &set).unwrap();

        assert_eq!(out.articles.len(), 1);
        assert_eq!(out.articles[0].title, "Macau Revenue Climbs: Report");
        let features = crate::enrich::Enricher::default().enrich(&out.articles[0].title);
        assert_eq!(features.word_count, 4);
        assert_eq!(features.capitalized_words, vec!["Revenue", "Climbs", "Report"]);
        assert_eq!(features.locations, vec!["Macau"]);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let snap = snapshot(PAGE);
        let set = validated(&snap, selectors());
        assert_eq!(extract(&snap, &set), extract(&snap, &set));
    }

    #[test]
    fn test_no_containers_is_empty_not_error() {
        let snap = snapshot(PAGE);
        let set = validated(&snap, selectors());
        let other = snapshot("<html><body><p>maintenance</p></body></html>");
        let out = extract(&other, &set).unwrap();
        assert!(out.articles.is_empty());
        assert!(out.warnings.is_empty());
    }
}
