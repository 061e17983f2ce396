//! Boundary between an external annotator and the span locator.
//!
//! Annotators hand back loosely structured replies (usually a JSON array
//! produced by a language model). Everything here is forgiving: a reply
//! that cannot be read becomes zero queries, and individual malformed
//! entries are dropped and counted instead of failing the whole batch.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification attached to a flagged phrase.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd,
)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    Robotic,
    Repetition,
    OverFormal,
    AiRhythm,
    Cohesion,
    Natural,
    #[default]
    Flagged,
}

impl Kind {
    /// Lenient parse used at the payload boundary; unknown labels fall back
    /// to [`Kind::Flagged`].
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().replace('_', "-").as_str() {
            "robotic" => Kind::Robotic,
            "repetition" => Kind::Repetition,
            "over-formal" | "overformal" => Kind::OverFormal,
            "ai-rhythm" => Kind::AiRhythm,
            "cohesion" => Kind::Cohesion,
            "natural" => Kind::Natural,
            _ => Kind::Flagged,
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Kind::Robotic => "robotic",
            Kind::Repetition => "repetition",
            Kind::OverFormal => "over-formal",
            Kind::AiRhythm => "ai-rhythm",
            Kind::Cohesion => "cohesion",
            Kind::Natural => "natural",
            Kind::Flagged => "flagged",
        };
        f.write_str(name)
    }
}

/// One flagged item from an annotator. `text` is an approximate quote of
/// the base text, not necessarily a byte-exact substring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Query {
    pub text: String,
    pub kind: Kind,
    pub rationale: String,
    pub proposed_rewrite: String,
    pub translation: Option<String>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_rewrite(mut self, rewrite: impl Into<String>) -> Self {
        self.proposed_rewrite = rewrite.into();
        self
    }
}

/// Source of flagged phrases for a text.
///
/// The locator makes no assumption about how queries were produced; a rule
/// list, a local model or a remote completion endpoint all fit here.
pub trait Annotator {
    fn annotate(&self, text: &str) -> anyhow::Result<Vec<Query>>;
}

/// Outcome of reading an annotator reply.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedPayload {
    pub queries: Vec<Query>,
    /// Entries that were present but malformed (non-object, missing or
    /// blank `text`).
    pub discarded: usize,
}

/// Annotator backed by a reply that was already fetched elsewhere.
pub struct PayloadAnnotator {
    payload: String,
}

impl PayloadAnnotator {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

impl Annotator for PayloadAnnotator {
    fn annotate(&self, _text: &str) -> anyhow::Result<Vec<Query>> {
        Ok(parse_payload(&self.payload).queries)
    }
}

static FENCE_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^```(?:json)?\s*").expect("static regex"));
static FENCE_CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```$").expect("static regex"));
static OBJECT_ARRAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[\s*\{.*\}\s*\]").expect("static regex"));

/// Pull a JSON array out of a raw model reply.
///
/// Tries the span between the first `[` and the last `]`, then the reply
/// with Markdown fences stripped, then a dotall search for an array of
/// objects. Returns `None` when nothing parses to an array.
pub fn extract_json_array(raw: &str) -> Option<Vec<Value>> {
    let trimmed = raw.trim();
    let candidate = match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if end > start => trimmed[start..=end].to_string(),
        _ => {
            let without_open = FENCE_OPEN_RE.replace(trimmed, "");
            FENCE_CLOSE_RE.replace(&without_open, "").trim().to_string()
        }
    };

    match serde_json::from_str::<Value>(&candidate) {
        Ok(Value::Array(items)) => return Some(items),
        Ok(_) => {
            tracing::warn!("annotation payload is not a JSON array");
            return None;
        }
        Err(err) => tracing::debug!(%err, "annotation payload did not parse, retrying"),
    }

    let found = OBJECT_ARRAY_RE.find(raw)?;
    match serde_json::from_str::<Value>(found.as_str()) {
        Ok(Value::Array(items)) => Some(items),
        _ => {
            tracing::warn!("failed to parse annotation payload");
            None
        }
    }
}

/// Read an annotator reply into queries, dropping malformed entries.
pub fn parse_payload(raw: &str) -> ParsedPayload {
    let Some(items) = extract_json_array(raw) else {
        return ParsedPayload::default();
    };
    let mut parsed = ParsedPayload::default();
    for item in items {
        match query_from_value(&item) {
            Some(query) => parsed.queries.push(query),
            None => parsed.discarded += 1,
        }
    }
    if parsed.discarded > 0 {
        tracing::warn!(
            discarded = parsed.discarded,
            "dropped malformed annotation entries"
        );
    }
    parsed
}

fn query_from_value(value: &Value) -> Option<Query> {
    let object = value.as_object()?;
    let text = object.get("text")?.as_str()?;
    if text.trim().is_empty() {
        return None;
    }
    let field = |name: &str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let translation = object
        .get("translation")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string);
    Some(Query {
        text: text.to_string(),
        kind: object
            .get("type")
            .and_then(Value::as_str)
            .map(Kind::parse)
            .unwrap_or_default(),
        rationale: field("reason"),
        proposed_rewrite: field("suggestion"),
        translation,
    })
}

/// Read a reply that should be a JSON array of strings. Non-string and
/// empty entries are skipped, duplicates keep their first position.
pub fn parse_string_list(raw: &str) -> Vec<String> {
    let Some(items) = extract_json_array(raw) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(Value::as_str)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}
