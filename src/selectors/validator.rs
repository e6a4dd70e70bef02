//! Selector validation against a snapshot.
//!
//! `container` is matched against the whole document. Every other selector is
//! matched inside each container node; a field counts as matched when at least
//! one container has a match. Required fields must additionally yield content
//! in at least one container: text for `title`, an `href` for `link`.

use crate::models::{Field, SelectorSet};
use crate::snapshot::{DomSnapshot, element_href, element_text};
use scraper::{ElementRef, Selector};
use std::collections::BTreeMap;
use std::fmt;

/// Validation verdict for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldStatus {
    /// Matched `matches` nodes (or containers, for inner fields) with usable content.
    Valid { matches: usize },
    /// No selector set for an optional field.
    Absent,
    /// The selector does not parse.
    InvalidSyntax(String),
    /// Parsed, but matched nothing.
    NoMatch,
    /// Matched, but no match yielded text or the expected attribute.
    EmptyContent,
    /// Not evaluated because the container selector did not validate.
    Skipped,
}

impl FieldStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, FieldStatus::Valid { .. })
    }
}

impl fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldStatus::Valid { matches } => write!(f, "valid ({matches} matches)"),
            FieldStatus::Absent => f.write_str("absent"),
            FieldStatus::InvalidSyntax(e) => write!(f, "invalid syntax ({e})"),
            FieldStatus::NoMatch => f.write_str("no match"),
            FieldStatus::EmptyContent => f.write_str("empty content"),
            FieldStatus::Skipped => f.write_str("skipped"),
        }
    }
}

/// Per-field validation verdicts for one selector set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    fields: BTreeMap<Field, FieldStatus>,
}

impl ValidationResult {
    pub fn status(&self, field: Field) -> &FieldStatus {
        self.fields.get(&field).unwrap_or(&FieldStatus::Skipped)
    }

    pub fn is_valid(&self, field: Field) -> bool {
        self.status(field).is_valid()
    }

    /// Whether `container`, `title` and `link` all validated.
    pub fn required_ok(&self) -> bool {
        Field::REQUIRED.iter().all(|f| self.is_valid(*f))
    }

    /// Fields that did not validate, excluding optional fields left absent.
    pub fn failures(&self) -> impl Iterator<Item = (Field, &FieldStatus)> {
        self.fields
            .iter()
            .filter(|(_, status)| !status.is_valid() && **status != FieldStatus::Absent)
            .map(|(field, status)| (*field, status))
    }
}

/// Validate every selector in `set` against `snapshot`.
///
/// Pure: no side effects, no network access. The set itself is not touched;
/// use [`mark_validated`] to gate it for extraction.
pub fn validate(snapshot: &DomSnapshot, set: &SelectorSet) -> ValidationResult {
    let mut fields = BTreeMap::new();

    let containers: Option<Vec<ElementRef<'_>>> = match Selector::parse(&set.container) {
        Err(e) => {
            fields.insert(Field::Container, FieldStatus::InvalidSyntax(e.to_string()));
            None
        }
        Ok(sel) => {
            let nodes: Vec<_> = snapshot.document().select(&sel).collect();
            if nodes.is_empty() {
                fields.insert(Field::Container, FieldStatus::NoMatch);
                None
            } else {
                fields.insert(Field::Container, FieldStatus::Valid { matches: nodes.len() });
                Some(nodes)
            }
        }
    };

    for field in Field::ALL.into_iter().filter(|f| *f != Field::Container) {
        let status = match (set.get(field), containers.as_deref()) {
            (None, _) => FieldStatus::Absent,
            (Some(_), None) => FieldStatus::Skipped,
            (Some(selector), Some(nodes)) => validate_inner(field, selector, nodes),
        };
        fields.insert(field, status);
    }

    ValidationResult { fields }
}

fn validate_inner(field: Field, selector: &str, containers: &[ElementRef<'_>]) -> FieldStatus {
    let sel = match Selector::parse(selector) {
        Ok(sel) => sel,
        Err(e) => return FieldStatus::InvalidSyntax(e.to_string()),
    };

    let firsts: Vec<ElementRef<'_>> = containers
        .iter()
        .filter_map(|container| container.select(&sel).next())
        .collect();
    if firsts.is_empty() {
        return FieldStatus::NoMatch;
    }
    if !field.is_required() {
        return FieldStatus::Valid { matches: firsts.len() };
    }

    let with_content = firsts.iter().filter(|el| has_content(field, el)).count();
    if with_content == 0 {
        FieldStatus::EmptyContent
    } else {
        FieldStatus::Valid { matches: with_content }
    }
}

fn has_content(field: Field, element: &ElementRef<'_>) -> bool {
    match field {
        Field::Link => element_href(element).is_some_and(|href| !href.trim().is_empty()),
        _ => !element_text(element).is_empty(),
    }
}

/// Drop optional selectors that failed `result` and mark the set usable.
///
/// Returns `None` when a required field did not validate; such a set must
/// never reach the extractor.
pub fn mark_validated(mut set: SelectorSet, result: &ValidationResult) -> Option<SelectorSet> {
    if !result.required_ok() {
        return None;
    }
    for field in [Field::Kicker, Field::Image, Field::Date] {
        if !result.is_valid(field) {
            set.set(field, None);
        }
    }
    set.validated = true;
    Some(set)
}
