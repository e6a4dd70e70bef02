//! AI selector inference.
//!
//! [`SelectorInference::infer`] turns a snapshot and a list of fields into a
//! candidate [`SelectorSet`] by asking an [`AskAsync`] backend. The prompt
//! carries a bounded structural outline of the page rather than raw markup,
//! so request size stays stable however large the page is.
//!
//! The reply must contain a JSON object with one key per requested field.
//! Optional fields may be `null`; a missing key, a `null` required field or
//! an unparseable reply is [`InferenceError::MalformedResponse`]. Backend
//! errors and timeouts are [`InferenceError::BackendUnavailable`]. Nothing is
//! retried here.

use crate::api::AskAsync;
use crate::config::InferenceConfig;
use crate::errors::InferenceError;
use crate::models::{Field, Provenance, SelectorSet};
use crate::snapshot::DomSnapshot;
use crate::utils::{looks_truncated, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt::Write;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Model-assisted selector inference over an [`AskAsync`] backend.
#[derive(Debug)]
pub struct SelectorInference<A> {
    backend: A,
    config: InferenceConfig,
}

impl<A> SelectorInference<A>
where
    A: AskAsync<Response = String>,
{
    pub fn new(backend: A, config: InferenceConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Ask the backend for selectors for `fields` on this snapshot.
    ///
    /// The prompt is bounded by `max_prompt_bytes` and the whole backend call,
    /// including any retries the backend performs, by the configured timeout.
    /// The engine itself sends exactly one request.
    ///
    /// # Arguments
    ///
    /// * `snapshot` - The page whose outline is sent to the model
    /// * `fields` - The fields the model must return selectors for
    ///
    /// # Returns
    ///
    /// An unvalidated [`SelectorSet`] with [`Provenance::Ai`](crate::models::Provenance::Ai).
    ///
    /// # Errors
    ///
    /// * [`InferenceError::BackendUnavailable`] if the backend fails or the
    ///   timeout expires
    /// * [`InferenceError::MalformedResponse`] if the reply is not a JSON
    ///   object holding a selector for every required field
    #[instrument(level = "info", skip_all, fields(fields = fields.len()))]
    pub async fn infer(
        &self,
        snapshot: &DomSnapshot,
        fields: &[Field],
    ) -> Result<SelectorSet, InferenceError> {
        let prompt = build_prompt(snapshot, fields, self.config.max_prompt_bytes);
        let timeout = self.config.timeout();
        debug!(prompt_bytes = prompt.len(), ?timeout, "Sending selector inference request");

        let t0 = Instant::now();
        let reply = match tokio::time::timeout(timeout, self.backend.ask(&prompt)).await {
            Err(_) => {
                warn!(?timeout, "Selector inference timed out");
                return Err(InferenceError::BackendUnavailable(format!(
                    "timed out after {timeout:?}"
                )));
            }
            Ok(Err(e)) => return Err(InferenceError::BackendUnavailable(e.to_string())),
            Ok(Ok(reply)) => reply,
        };
        info!(elapsed_ms = t0.elapsed().as_millis() as u64, "Selector inference answered");

        parse_response(&reply, fields).inspect_err(|e| {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&reply, 300),
                "Model returned unusable selectors"
            );
        })
    }
}

/// Build the user prompt for `fields`, never exceeding `max_bytes`.
pub fn build_prompt(snapshot: &DomSnapshot, fields: &[Field], max_bytes: usize) -> String {
    let keys = fields.iter().map(Field::as_str).collect::<Vec<_>>().join(", ");
    let mut header = String::new();
    let _ = writeln!(header, "Identify CSS selectors for the news article listing on this page.");
    if let Some(url) = snapshot.base_url() {
        let _ = writeln!(header, "Page: {url}");
    }
    let _ = writeln!(header, "Reply with only a JSON object with exactly these keys: {keys}.");
    for field in fields {
        let _ = writeln!(header, "- {}: {}", field.as_str(), describe(*field));
    }
    let _ = writeln!(
        header,
        "Every key except container is relative to one container element. \
         Use null for an optional key (kicker, image, date) the page does not have. \
         Prefer short class-based selectors that match every article."
    );
    let _ = writeln!(header, "Page outline (tag#id.class, [href]/[src] attributes, text preview):");

    let outline_budget = max_bytes.saturating_sub(header.len());
    if outline_budget == 0 {
        return truncate_on_char_boundary(&header, max_bytes).to_string();
    }
    header.push_str(&snapshot.outline(outline_budget));
    header
}

fn describe(field: Field) -> &'static str {
    match field {
        Field::Container => "element wrapping a single article card (matches every card)",
        Field::Title => "element whose text is the headline",
        Field::Kicker => "short label or overline shown above the headline (optional)",
        Field::Link => "anchor whose href points to the full article",
        Field::Image => "img element of the article thumbnail (optional)",
        Field::Date => "element whose text is the publication date (optional)",
    }
}

fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Parse a model reply into an unvalidated [`Provenance::Ai`] selector set.
///
/// The first `{...}` block of the reply is used, so code fences and chatter
/// around the object are tolerated. `article_container` is accepted for
/// `container`.
pub fn parse_response(reply: &str, fields: &[Field]) -> Result<SelectorSet, InferenceError> {
    let object = JSON_OBJECT
        .find(reply)
        .ok_or_else(|| InferenceError::MalformedResponse("no JSON object in reply".to_string()))?;

    let mut map: Map<String, Value> = serde_json::from_str(object.as_str()).map_err(|e| {
        let hint = if looks_truncated(&e) { " (reply looks truncated)" } else { "" };
        InferenceError::MalformedResponse(format!("{e}{hint}"))
    })?;
    if !map.contains_key("container") {
        if let Some(v) = map.remove("article_container") {
            map.insert("container".to_string(), v);
        }
    }

    let mut selectors: Vec<(Field, Option<String>)> = Vec::with_capacity(Field::ALL.len());
    for field in Field::ALL {
        let requested = fields.contains(&field);
        let value = match map.get(field.as_str()) {
            None if requested || field.is_required() => {
                return Err(InferenceError::MalformedResponse(format!(
                    "missing selector for `{field}`"
                )));
            }
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(other) => {
                return Err(InferenceError::MalformedResponse(format!(
                    "selector for `{field}` is not a string: {other}"
                )));
            }
        };
        if value.is_none() && field.is_required() {
            return Err(InferenceError::MalformedResponse(format!(
                "empty selector for required field `{field}`"
            )));
        }
        selectors.push((field, value));
    }

    let mut set = SelectorSet::new("", "", "", Provenance::Ai);
    for (field, value) in selectors {
        set.set(field, value);
    }
    Ok(set)
}
