//! Deslop core engine.
//! Places approximate quotes from an external annotator back onto exact
//! offsets in the source text, and computes word-level diffs between an
//! original and a revised text.

use serde::{Deserialize, Serialize};

pub mod annotations;
pub mod citations;
pub mod diff;
pub mod locate;
pub mod phrases;
pub mod review;
pub mod segments;

pub use annotations::{parse_payload, Annotator, Kind, ParsedPayload, PayloadAnnotator, Query};
pub use citations::{protect, restore, CitationError, CitationMap, Protected};
pub use diff::{diff, DiffConfig, DiffEngine, DiffKind, DiffOp, WordDiff};
pub use locate::{locate, LocatorConfig, SpanLocator, SpanMatch, Strategy};
pub use phrases::{PhraseAnnotator, PhraseConfig, PhraseRule};
pub use review::{Action, Review, ReviewError};
pub use segments::{resolve, LocatedSpan, Resolution, Segment};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub locator: LocatorConfig,
    pub diff: DiffConfig,
    pub phrases: PhraseConfig,
}

impl Config {
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| anyhow::anyhow!("invalid config: {e}"))
    }
}

/// Locator, diff engine and built-in annotator compiled from one config.
pub struct Engine {
    locator: SpanLocator,
    differ: DiffEngine,
    phrases: PhraseAnnotator,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            phrases: PhraseAnnotator::new(&config.phrases),
            locator: SpanLocator::new(config.locator),
            differ: DiffEngine::new(config.diff),
        }
    }

    pub fn locator(&self) -> &SpanLocator {
        &self.locator
    }

    pub fn phrase_annotator(&self) -> &PhraseAnnotator {
        &self.phrases
    }

    /// Ask `annotator` for queries over `text` and place them.
    pub fn annotate(&self, text: &str, annotator: &dyn Annotator) -> anyhow::Result<Resolution> {
        let queries = annotator.annotate(text)?;
        Ok(self.locator.resolve(text, queries))
    }

    pub fn resolve(&self, text: &str, queries: Vec<Query>) -> Resolution {
        self.locator.resolve(text, queries)
    }

    pub fn diff(&self, original: &str, revised: &str) -> WordDiff {
        self.differ.diff(original, revised)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let cfg = Config::from_yaml_str("diff:\n  max_token_pairs: 10\n").unwrap();
        assert_eq!(cfg.diff.max_token_pairs, 10);
        assert_eq!(cfg.locator.anchor_padding, 10);
        assert!(cfg.locator.retry_from_start);
        assert!(!cfg.phrases.rules.is_empty());
    }

    #[test]
    fn empty_yaml_is_default() {
        let cfg = Config::from_yaml_str("  \n").unwrap();
        assert_eq!(cfg.diff.max_token_pairs, diff::DEFAULT_MAX_TOKEN_PAIRS);
    }

    #[test]
    fn rejects_malformed_yaml() {
        assert!(Config::from_yaml_str("locator: [1, 2").is_err());
    }

    #[test]
    fn phrase_rules_load_from_yaml() {
        let yaml = r#"
phrases:
  rules:
    - phrase: "synergy"
      kind: over-formal
      rewrite: "teamwork"
"#;
        let engine = Engine::new(Config::from_yaml_str(yaml).unwrap());
        let text = "Real synergy here.";
        let resolution = engine
            .annotate(text, engine.phrase_annotator())
            .unwrap();
        let spans: Vec<&LocatedSpan> = resolution.flagged().collect();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].offset, 5);
        assert_eq!(spans[0].query.kind, Kind::OverFormal);
        assert_eq!(spans[0].query.proposed_rewrite, "teamwork");
        assert_eq!(spans[0].strategy, Strategy::Exact);
    }
}
