//! Immutable DOM snapshots and the helpers that read content out of them.
//!
//! A [`DomSnapshot`] wraps a parsed document together with the URL it was
//! captured from. The core only ever borrows it. Besides the document itself
//! it offers two derived views:
//!
//! - a bounded, deterministic **outline** (tag, id, classes, a short text
//!   preview) used as the structural prompt for selector inference
//! - a text-free **fingerprint** (MD5 of the tag/class skeleton) used as the
//!   selector cache key
//!
//! Runs of similar siblings are collapsed in both views, so a listing with 20
//! or 40 identical cards produces the same structure.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use scraper::{ElementRef, Html};
use std::error::Error;
use std::fmt::Write;
use std::path::Path;
use tracing::{info, instrument};
use url::Url;

/// Elements that never carry listing structure.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "svg", "template", "iframe", "link", "meta", "head",
];

/// Identical consecutive siblings kept before the rest are collapsed.
const MAX_SIMILAR_SIBLINGS: usize = 3;

/// Nesting depth past which the outline stops descending.
const MAX_OUTLINE_DEPTH: usize = 32;

const TEXT_PREVIEW_CHARS: usize = 48;

/// An immutable capture of a rendered page.
#[derive(Debug)]
pub struct DomSnapshot {
    document: Html,
    base_url: Option<Url>,
    captured_at: DateTime<Utc>,
    source_bytes: usize,
}

impl DomSnapshot {
    /// Parse captured markup. `base_url` is used to absolutize links and images.
    pub fn parse(markup: &str, base_url: Option<Url>) -> Self {
        Self {
            document: Html::parse_document(markup),
            base_url,
            captured_at: Utc::now(),
            source_bytes: markup.len(),
        }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Size of the markup the snapshot was parsed from.
    pub fn source_bytes(&self) -> usize {
        self.source_bytes
    }

    /// Resolve `raw` to an absolute `http`/`https` URL.
    ///
    /// Absolute URLs are taken as-is; relative ones are joined onto the base
    /// URL. Other schemes (`javascript:`, `mailto:`) are rejected.
    pub fn resolve_url(&self, raw: &str) -> Option<Url> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => self.base_url.as_ref()?.join(raw).ok()?,
            Err(_) => return None,
        };
        matches!(url.scheme(), "http" | "https").then_some(url)
    }

    /// A bounded structural outline of the page body.
    ///
    /// The output never exceeds `max_bytes`; when the page is larger the
    /// outline is cut on a line boundary and a truncation marker appended.
    pub fn outline(&self, max_bytes: usize) -> String {
        const MARKER: &str = "[outline truncated]\n";
        if max_bytes < MARKER.len() {
            return String::new();
        }
        let mut lines = Vec::new();
        walk(self.start_element(), 0, true, &mut lines);

        let budget = max_bytes.saturating_sub(MARKER.len());
        let mut out = String::new();
        for line in &lines {
            if out.len() + line.len() + 1 > budget {
                out.push_str(MARKER);
                return out;
            }
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// MD5 of the text-free tag/class skeleton, as lowercase hex.
    pub fn fingerprint(&self) -> String {
        let mut lines = Vec::new();
        walk(self.start_element(), 0, false, &mut lines);
        format!("{:x}", md5::compute(lines.join("\n")))
    }

    fn start_element(&self) -> ElementRef<'_> {
        let body = scraper::Selector::parse("body").ok();
        body.and_then(|sel| self.document.select(&sel).next())
            .unwrap_or_else(|| self.document.root_element())
    }
}

/// Fetch a page over HTTP and capture it as a snapshot.
#[instrument(level = "info")]
pub async fn fetch_snapshot(url: &str) -> Result<DomSnapshot, Box<dyn Error>> {
    let base = Url::parse(url)?;
    let html = reqwest::get(url).await?.error_for_status()?.text().await?;
    info!(bytes = html.len(), "Fetched page");
    Ok(DomSnapshot::parse(&html, Some(base)))
}

/// Read a saved page from disk. `base_url` resolves its relative links.
#[instrument(level = "info", skip(base_url))]
pub async fn read_snapshot(path: &Path, base_url: Option<Url>) -> Result<DomSnapshot, Box<dyn Error>> {
    let html = tokio::fs::read_to_string(path).await?;
    info!(bytes = html.len(), "Read page from disk");
    Ok(DomSnapshot::parse(&html, base_url))
}

fn signature(element: &ElementRef<'_>) -> String {
    let value = element.value();
    let mut sig = value.name().to_string();
    if let Some(id) = value.id() {
        let _ = write!(sig, "#{id}");
    }
    for class in value.classes() {
        let _ = write!(sig, ".{class}");
    }
    sig
}

fn walk(element: ElementRef<'_>, depth: usize, with_text: bool, lines: &mut Vec<String>) {
    if depth > MAX_OUTLINE_DEPTH || SKIPPED_TAGS.contains(&element.value().name()) {
        return;
    }

    let mut line = format!("{}{}", "  ".repeat(depth), signature(&element));
    if with_text {
        let value = element.value();
        if value.attr("href").is_some() {
            line.push_str(" [href]");
        }
        if value.attr("src").is_some() || value.attr("data-src").is_some() {
            line.push_str(" [src]");
        }
        let own_text = element
            .children()
            .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
            .join(" ");
        let own_text = collapse_whitespace(&own_text);
        if !own_text.is_empty() {
            let preview: String = own_text.chars().take(TEXT_PREVIEW_CHARS).collect();
            let ellipsis = if own_text.chars().count() > TEXT_PREVIEW_CHARS { "…" } else { "" };
            let _ = write!(line, " \"{preview}{ellipsis}\"");
        }
    }
    lines.push(line);

    let mut previous: Option<String> = None;
    let mut run = 0usize;
    let mut collapsed = 0usize;
    for child in element.children().filter_map(ElementRef::wrap) {
        let sig = signature(&child);
        if previous.as_deref() == Some(sig.as_str()) {
            run += 1;
        } else {
            flush_collapsed(depth + 1, with_text, &mut collapsed, lines);
            previous = Some(sig);
            run = 1;
        }
        if run > MAX_SIMILAR_SIBLINGS {
            collapsed += 1;
            continue;
        }
        walk(child, depth + 1, with_text, lines);
    }
    flush_collapsed(depth + 1, with_text, &mut collapsed, lines);
}

// The skeleton omits the count so listing length does not change the fingerprint.
fn flush_collapsed(depth: usize, with_count: bool, collapsed: &mut usize, lines: &mut Vec<String>) {
    if *collapsed > 0 {
        let indent = "  ".repeat(depth);
        if with_count {
            lines.push(format!("{indent}… (+{collapsed} similar)"));
        } else {
            lines.push(format!("{indent}…"));
        }
        *collapsed = 0;
    }
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// All text under an element, whitespace-collapsed.
///
/// Text nodes are concatenated as the browser renders them, so inline markup
/// inside a word (`Mac<b>au</b>`) does not split it.
pub fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// The `href` of an element, or of its first descendant anchor.
pub fn element_href<'a>(element: &ElementRef<'a>) -> Option<&'a str> {
    if let Some(href) = element.value().attr("href") {
        return Some(href);
    }
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .find_map(|el| el.value().attr("href"))
}

/// The image source of an element, honouring lazy-loading attributes.
pub fn element_image_src<'a>(element: &ElementRef<'a>) -> Option<&'a str> {
    let value = element.value();
    ["src", "data-src", "data-lazy-src"]
        .into_iter()
        .filter_map(|attr| value.attr(attr))
        .map(str::trim)
        .find(|src| !src.is_empty() && !src.starts_with("data:"))
}
