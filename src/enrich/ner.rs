//! Named-entity recognition backends.
//!
//! The enricher depends only on [`EntityRecognizer`]: text in, typed spans
//! out.
//!
//! [`LexiconRecognizer`] is the built-in backend. It is deterministic and
//! versioned as [`LEXICON_MODEL_ID`]:
//!
//! 1. the title is split into word tokens and grouped into runs of
//!    capitalized tokens (connectors such as `of` and `de` may join a run)
//! 2. each run is matched greedily, longest first, against the gazetteers
//! 3. leftover sub-runs are tagged only when a cue word marks them: a
//!    corporate suffix (`Inc`, `Resorts`) for organizations, an honorific or
//!    role (`Mr`, `President`) for persons, a locative preposition (`in`,
//!    `at`) for locations
//!
//! Untagged capitalized words (headline case) are left alone.

use crate::errors::EnrichmentError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Identity of the built-in lexicon tagger. Bump when a gazetteer or rule changes.
pub const LEXICON_MODEL_ID: &str = "lexicon-ner/1";

/// Longest gazetteer entry, in tokens.
const MAX_ENTRY_TOKENS: usize = 4;

/// Entity categories kept by the enricher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Person,
    Organization,
    Location,
}

/// A typed entity span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpan {
    pub text: String,
    pub kind: EntityKind,
}

/// Contract of a named-entity recognition backend.
pub trait EntityRecognizer {
    /// Model or ruleset identity, recorded with every run.
    fn model_id(&self) -> &str;

    /// Tag entities in `text`, in order of appearance.
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, EnrichmentError>;
}

/// A recognizer that is never available; entity sets degrade to empty.
#[derive(Debug, Default)]
pub struct DisabledRecognizer;

impl EntityRecognizer for DisabledRecognizer {
    fn model_id(&self) -> &str {
        "disabled"
    }

    fn recognize(&self, _text: &str) -> Result<Vec<EntitySpan>, EnrichmentError> {
        Err(EnrichmentError::BackendUnavailable(
            "named-entity recognition is disabled".to_string(),
        ))
    }
}

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'’&.\-]*").unwrap());

static ORGANIZATIONS: &[&str] = &[
    // technology
    "Apple", "Google", "Alphabet", "Microsoft", "Amazon", "Meta", "Facebook", "OpenAI", "Nvidia",
    "Tesla", "SpaceX", "Netflix", "Samsung", "IBM", "Intel",
    // gaming operators and suppliers
    "MGM Resorts", "MGM", "Caesars Entertainment", "Caesars", "Las Vegas Sands", "Sands China",
    "Wynn Resorts", "Wynn", "Galaxy Entertainment", "Melco", "Penn Entertainment", "DraftKings",
    "FanDuel", "Flutter", "Flutter Entertainment", "Entain", "BetMGM", "bet365", "Betsson",
    "Kindred", "Evolution", "Playtech", "IGT", "Aristocrat", "Light & Wonder", "Novomatic",
    "Konami", "Sportradar", "Genius Sports", "Codere", "Everi", "Inspired Entertainment",
    // regulators and public bodies
    "UK Gambling Commission", "Gambling Commission", "Nevada Gaming Control Board",
    "American Gaming Association", "European Union", "EU", "United Nations", "UN", "NATO",
    "FIFA", "UEFA", "NFL", "NBA", "MLB", "NHL",
];

static LOCATIONS: &[&str] = &[
    "United States", "US", "USA", "United Kingdom", "UK", "Great Britain", "Europe", "Asia",
    "Africa", "Latin America", "South America", "North America", "Macau", "Macao", "Hong Kong",
    "Singapore", "Japan", "China", "India", "Philippines", "Cambodia", "Vietnam", "Australia",
    "New Zealand", "Canada", "Ontario", "Quebec", "Mexico", "Brazil", "Argentina", "Chile", "Peru",
    "Colombia", "Uruguay", "Paraguay", "Spain", "Portugal", "France", "Germany", "Italy",
    "Netherlands", "Sweden", "Denmark", "Finland", "Norway", "Malta", "Gibraltar", "Ireland",
    "Greece", "Cyprus", "Las Vegas", "Atlantic City", "Nevada", "New Jersey", "New York",
    "Pennsylvania", "Michigan", "Illinois", "Ohio", "Massachusetts", "California", "Florida",
    "Texas", "Louisiana", "Mississippi", "San Francisco", "London", "Madrid", "Buenos Aires",
    "Sao Paulo", "São Paulo", "Rio de Janeiro", "Lima", "Bogota", "Bogotá", "Mexico City",
    "Manila", "Tokyo", "Osaka", "Sydney", "Melbourne", "Toronto", "Mars",
];

static PERSONS: &[&str] = &[
    "Elon Musk", "Tim Cook", "Sundar Pichai", "Satya Nadella", "Jeff Bezos", "Mark Zuckerberg",
    "Sam Altman", "Donald Trump", "Joe Biden", "Kamala Harris", "Lula da Silva", "Javier Milei",
];

/// Trailing words that turn a capitalized run into an organization.
static ORG_SUFFIXES: &[&str] = &[
    "Inc", "Inc.", "Corp", "Corp.", "Corporation", "Ltd", "Ltd.", "LLC", "PLC", "plc", "SA",
    "S.A.", "AG", "GmbH", "Group", "Holdings", "Entertainment", "Resorts", "Resort", "Casino",
    "Casinos", "Gaming", "Games", "Bank", "Association", "Commission", "Authority", "Council",
    "Ministry", "Department", "University", "Foundation", "Institute", "Partners", "Technologies",
    "Labs", "Studios",
];

/// Words preceding a capitalized run that mark it as a person.
static PERSON_CUES: &[&str] = &[
    "Mr", "Mr.", "Mrs", "Mrs.", "Ms", "Ms.", "Dr", "Dr.", "Sir", "President", "CEO", "Chairman",
    "Chairwoman", "Minister", "Senator", "Governor", "Mayor", "Commissioner", "Judge",
];

/// Lowercase words preceding a capitalized run that mark it as a location.
static LOCATION_CUES: &[&str] = &["in", "at", "from", "across", "near", "throughout"];

/// Lowercase words allowed inside a capitalized run.
static CONNECTORS: &[&str] = &["of", "de", "da", "do", "del", "la", "and"];

/// Strip a possessive and trailing punctuation: `Brazil's` -> `Brazil`, `Inc.` -> `Inc`.
fn trim_token(raw: &str) -> &str {
    let word = raw
        .strip_suffix("'s")
        .or_else(|| raw.strip_suffix("’s"))
        .unwrap_or(raw);
    word.trim_end_matches(['.', '\'', '’', '-'])
}

#[derive(Debug, Clone)]
struct Token<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

impl Token<'_> {
    fn is_capitalized(&self) -> bool {
        self.text.chars().next().is_some_and(char::is_uppercase)
    }
}

/// The built-in gazetteer and cue-word tagger.
#[derive(Debug)]
pub struct LexiconRecognizer {
    gazetteer: HashMap<String, EntityKind>,
}

impl Default for LexiconRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconRecognizer {
    pub fn new() -> Self {
        let mut gazetteer = HashMap::new();
        for (entries, kind) in [
            (ORGANIZATIONS, EntityKind::Organization),
            (LOCATIONS, EntityKind::Location),
            (PERSONS, EntityKind::Person),
        ] {
            for entry in entries {
                gazetteer.insert(entry.to_string(), kind);
            }
        }
        Self { gazetteer }
    }

    fn lookup(&self, text: &str, tokens: &[Token<'_>]) -> Option<(usize, EntityKind)> {
        let longest = tokens.len().min(MAX_ENTRY_TOKENS);
        (1..=longest).rev().find_map(|n| {
            let span = &text[tokens[0].start..tokens[n - 1].end];
            self.gazetteer.get(span).map(|kind| (n, *kind))
        })
    }

    /// Tag the leftover run `run` using the cue words around it.
    fn tag_by_cue(&self, text: &str, run: &[Token<'_>], before: Option<&Token<'_>>) -> Option<EntitySpan> {
        let first = run.first()?;
        let last = run.last()?;
        let span = |from: &Token<'_>, to: &Token<'_>| text[from.start..to.end].to_string();

        if run.len() > 1 && ORG_SUFFIXES.contains(&last.text) {
            return Some(EntitySpan {
                text: span(first, last),
                kind: EntityKind::Organization,
            });
        }
        if PERSON_CUES.contains(&first.text) && run.len() > 1 {
            return Some(EntitySpan {
                text: span(&run[1], last),
                kind: EntityKind::Person,
            });
        }
        if before.is_some_and(|t| PERSON_CUES.contains(&t.text)) {
            return Some(EntitySpan {
                text: span(first, last),
                kind: EntityKind::Person,
            });
        }
        if before.is_some_and(|t| LOCATION_CUES.contains(&t.text)) {
            return Some(EntitySpan {
                text: span(first, last),
                kind: EntityKind::Location,
            });
        }
        None
    }
}

impl EntityRecognizer for LexiconRecognizer {
    fn model_id(&self) -> &str {
        LEXICON_MODEL_ID
    }

    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, EnrichmentError> {
        let tokens: Vec<Token<'_>> = WORD
            .find_iter(text)
            .map(|m| {
                let word = trim_token(m.as_str());
                Token {
                    text: word,
                    start: m.start(),
                    end: m.start() + word.len(),
                }
            })
            .filter(|t| !t.text.is_empty())
            .collect();

        let mut spans = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            if !tokens[i].is_capitalized() {
                i += 1;
                continue;
            }
            // extend the run across connectors that are followed by another capital
            let mut end = i + 1;
            while end < tokens.len() {
                if tokens[end].is_capitalized() {
                    end += 1;
                } else if CONNECTORS.contains(&tokens[end].text)
                    && tokens.get(end + 1).is_some_and(Token::is_capitalized)
                {
                    end += 2;
                } else {
                    break;
                }
            }
            self.tag_run(text, &tokens, i, end, &mut spans);
            i = end;
        }
        Ok(spans)
    }
}

impl LexiconRecognizer {
    fn tag_run(&self, text: &str, tokens: &[Token<'_>], start: usize, end: usize, spans: &mut Vec<EntitySpan>) {
        let mut pos = start;
        let mut leftover_from: Option<usize> = None;
        while pos < end {
            match self.lookup(text, &tokens[pos..end]) {
                Some((len, kind)) => {
                    if let Some(from) = leftover_from.take() {
                        self.push_cued(text, tokens, from, pos, spans);
                    }
                    spans.push(EntitySpan {
                        text: text[tokens[pos].start..tokens[pos + len - 1].end].to_string(),
                        kind,
                    });
                    pos += len;
                }
                None => {
                    leftover_from.get_or_insert(pos);
                    pos += 1;
                }
            }
        }
        if let Some(from) = leftover_from {
            self.push_cued(text, tokens, from, end, spans);
        }
    }

    fn push_cued(&self, text: &str, tokens: &[Token<'_>], from: usize, to: usize, spans: &mut Vec<EntitySpan>) {
        // a leftover run must not start or end on a connector
        let mut run = &tokens[from..to];
        while run.first().is_some_and(|t| !t.is_capitalized()) {
            run = &run[1..];
        }
        while run.last().is_some_and(|t| !t.is_capitalized()) {
            run = &run[..run.len() - 1];
        }
        if run.is_empty() {
            return;
        }
        let before = from.checked_sub(1).map(|i| &tokens[i]);
        if let Some(span) = self.tag_by_cue(text, run, before) {
            spans.push(span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(text: &str) -> Vec<(String, EntityKind)> {
        LexiconRecognizer::new()
            .recognize(text)
            .unwrap()
            .into_iter()
            .map(|s| (s.text, s.kind))
            .collect()
    }

    #[test]
    fn test_gazetteer_organizations() {
        assert_eq!(
            tags("Apple and Google Announce Deal"),
            vec![
                ("Apple".to_string(), EntityKind::Organization),
                ("Google".to_string(), EntityKind::Organization),
            ]
        );
    }

    #[test]
    fn test_longest_match_wins() {
        assert_eq!(
            tags("MGM Resorts Expands in Las Vegas"),
            vec![
                ("MGM Resorts".to_string(), EntityKind::Organization),
                ("Las Vegas".to_string(), EntityKind::Location),
            ]
        );
    }

    #[test]
    fn test_person_and_org_from_gazetteer() {
        assert_eq!(
            tags("Elon Musk Launches New SpaceX Mission to Mars"),
            vec![
                ("Elon Musk".to_string(), EntityKind::Person),
                ("SpaceX".to_string(), EntityKind::Organization),
                ("Mars".to_string(), EntityKind::Location),
            ]
        );
    }

    #[test]
    fn test_cue_rules() {
        assert_eq!(
            tags("Acme Gaming Group signs deal in Tarragona"),
            vec![
                ("Acme Gaming Group".to_string(), EntityKind::Organization),
                ("Tarragona".to_string(), EntityKind::Location),
            ]
        );
        assert_eq!(
            tags("Interview with Commissioner Jane Roe"),
            vec![("Jane Roe".to_string(), EntityKind::Person)]
        );
    }

    #[test]
    fn test_uncued_headline_case_is_ignored() {
        assert!(tags("Announce Deal Today").is_empty());
    }

    #[test]
    fn test_possessive_and_trailing_punctuation_are_trimmed() {
        assert_eq!(
            tags("Brazil's regulator meets Entain."),
            vec![
                ("Brazil".to_string(), EntityKind::Location),
                ("Entain".to_string(), EntityKind::Organization),
            ]
        );
        assert_eq!(
            tags("Deal struck by Northwind Inc."),
            vec![("Northwind Inc".to_string(), EntityKind::Organization)]
        );
    }

    #[test]
    fn test_disabled_recognizer_is_unavailable() {
        assert!(DisabledRecognizer.recognize("Apple").is_err());
        assert_eq!(DisabledRecognizer.model_id(), "disabled");
    }
}
