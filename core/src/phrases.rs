//! Rule-based annotator driven by a configurable phrase list.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::{Deserialize, Serialize};

use crate::annotations::{Annotator, Kind, Query};

/// A phrase to flag, with the note and rewrite attached to each hit.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PhraseRule {
    pub phrase: String,
    pub kind: Kind,
    pub rationale: String,
    pub rewrite: String,
}

impl PhraseRule {
    fn new(phrase: &str, kind: Kind, rationale: &str, rewrite: &str) -> Self {
        Self {
            phrase: phrase.into(),
            kind,
            rationale: rationale.into(),
            rewrite: rewrite.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseConfig {
    pub rules: Vec<PhraseRule>,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        let buzz = "Buzzword; say it plainly.";
        let hedge = "Verbose hedging adds nothing.";
        let opener = "Sycophantic opener.";
        let filler = "Transitional filler.";
        Self {
            rules: vec![
                PhraseRule::new("certainly!", Kind::Robotic, opener, ""),
                PhraseRule::new("great question!", Kind::Robotic, opener, ""),
                PhraseRule::new("it's worth noting that", Kind::OverFormal, hedge, ""),
                PhraseRule::new("it is worth noting that", Kind::OverFormal, hedge, ""),
                PhraseRule::new("it is important to note that", Kind::OverFormal, hedge, ""),
                PhraseRule::new("it should be noted that", Kind::OverFormal, hedge, ""),
                PhraseRule::new("please note that", Kind::OverFormal, hedge, ""),
                PhraseRule::new("needless to say", Kind::AiRhythm, filler, ""),
                PhraseRule::new("in today's fast-paced world", Kind::AiRhythm, filler, "today"),
                PhraseRule::new("furthermore", Kind::AiRhythm, filler, "also"),
                PhraseRule::new("moreover", Kind::AiRhythm, filler, "also"),
                PhraseRule::new("in essence", Kind::AiRhythm, filler, ""),
                PhraseRule::new("delve into", Kind::Robotic, buzz, "look at"),
                PhraseRule::new("delve", Kind::Robotic, buzz, "look at"),
                PhraseRule::new("deep dive", Kind::Robotic, buzz, "close look"),
                PhraseRule::new("leverage", Kind::Robotic, buzz, "use"),
                PhraseRule::new("utilize", Kind::Robotic, buzz, "use"),
                PhraseRule::new("utilise", Kind::Robotic, buzz, "use"),
                PhraseRule::new("facilitate", Kind::Robotic, buzz, "help"),
                PhraseRule::new("embark on a journey", Kind::Robotic, buzz, "start"),
                PhraseRule::new("underscore", Kind::Robotic, buzz, "highlight"),
                PhraseRule::new("pivotal", Kind::Robotic, buzz, "important"),
                PhraseRule::new("realm", Kind::Robotic, buzz, "field"),
                PhraseRule::new("tapestry", Kind::Robotic, buzz, "mix"),
                PhraseRule::new("seamless", Kind::Robotic, buzz, "smooth"),
                PhraseRule::new("seamlessly", Kind::Robotic, buzz, "smoothly"),
                PhraseRule::new("robust", Kind::Robotic, buzz, "solid"),
                PhraseRule::new("plethora", Kind::Robotic, buzz, "many"),
                PhraseRule::new("empower", Kind::Robotic, buzz, "help"),
                PhraseRule::new("unprecedented", Kind::Robotic, buzz, "new"),
                PhraseRule::new("stands as a testament", Kind::OverFormal, "Puffery.", "shows"),
                PhraseRule::new("plays a pivotal role in", Kind::OverFormal, "Puffery.", "matters for"),
            ],
        }
    }
}

/// Flags configured phrases by exact, ASCII-case-insensitive match on
/// word boundaries. Quotes are copied verbatim from the text, so the
/// locator places them with the exact strategy.
pub struct PhraseAnnotator {
    rules: Vec<PhraseRule>,
    matcher: Option<AhoCorasick>,
}

impl PhraseAnnotator {
    pub fn new(config: &PhraseConfig) -> Self {
        let rules: Vec<PhraseRule> = config
            .rules
            .iter()
            .filter(|rule| !rule.phrase.trim().is_empty())
            .cloned()
            .collect();
        let matcher = if rules.is_empty() {
            None
        } else {
            Some(
                AhoCorasickBuilder::new()
                    .ascii_case_insensitive(true)
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(rules.iter().map(|rule| rule.phrase.as_str())),
            )
        };
        Self { rules, matcher }
    }

    /// Hits in text order.
    pub fn find(&self, text: &str) -> Vec<Query> {
        let Some(matcher) = &self.matcher else {
            return Vec::new();
        };
        let mut queries = Vec::new();
        for mat in matcher.find_iter(text) {
            if !on_word_boundary(text, mat.start(), mat.end()) {
                continue;
            }
            let rule = &self.rules[mat.pattern()];
            queries.push(Query {
                text: text[mat.start()..mat.end()].to_string(),
                kind: rule.kind,
                rationale: rule.rationale.clone(),
                proposed_rewrite: rule.rewrite.clone(),
                translation: None,
            });
        }
        queries
    }
}

impl Annotator for PhraseAnnotator {
    fn annotate(&self, text: &str) -> anyhow::Result<Vec<Query>> {
        Ok(self.find(text))
    }
}

fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotator() -> PhraseAnnotator {
        PhraseAnnotator::new(&PhraseConfig::default())
    }

    #[test]
    fn flags_buzzwords_with_rewrites() {
        let hits = annotator().find("We will Delve into the details.");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Delve into");
        assert_eq!(hits[0].proposed_rewrite, "look at");
        assert_eq!(hits[0].kind, Kind::Robotic);
    }

    #[test]
    fn ignores_phrases_inside_words() {
        assert!(annotator().find("The realms were robustness tests.").is_empty());
    }

    #[test]
    fn reports_hits_in_text_order() {
        let hits = annotator().find("Furthermore, we leverage a robust plan.");
        let texts: Vec<&str> = hits.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["Furthermore", "leverage", "robust"]);
    }

    #[test]
    fn empty_rule_list_flags_nothing() {
        let annotator = PhraseAnnotator::new(&PhraseConfig { rules: Vec::new() });
        assert!(annotator.annotate("delve into it").unwrap().is_empty());
    }
}
