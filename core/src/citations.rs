//! Reversible masking of citations before text is handed to a rewriter.
//!
//! Each distinct citation is swapped for a token such as `⟦CIT:001⟧` so a
//! paraphrasing pass cannot alter it, then swapped back afterwards.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TOKEN_OPEN: char = '\u{27E6}';
pub const TOKEN_CLOSE: char = '\u{27E7}';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CitationError {
    #[error("text already contains the citation token delimiter `{0}`")]
    DelimiterInText(char),
}

/// Token to citation pairs, in token order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CitationMap {
    pub entries: Vec<CitationEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CitationEntry {
    pub token: String,
    pub citation: String,
}

impl CitationMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Protected {
    pub text: String,
    pub map: CitationMap,
}

fn token_for(index: usize) -> String {
    format!("{TOKEN_OPEN}CIT:{index:03}{TOKEN_CLOSE}")
}

/// Replace every occurrence of each citation with its token.
///
/// Empty and duplicate citations are ignored, as are citations that do not
/// occur in `text`. Where two citations overlap (`[1]` inside `[10]`) the
/// longer one wins.
pub fn protect(text: &str, citations: &[String]) -> Result<Protected, CitationError> {
    for delimiter in [TOKEN_OPEN, TOKEN_CLOSE] {
        if text.contains(delimiter) {
            return Err(CitationError::DelimiterInText(delimiter));
        }
    }

    let mut unique: Vec<&str> = Vec::new();
    for citation in citations {
        let citation = citation.as_str();
        if citation.is_empty() || unique.contains(&citation) || !text.contains(citation) {
            continue;
        }
        unique.push(citation);
    }
    unique.sort_by(|a, b| b.len().cmp(&a.len()));

    if unique.is_empty() {
        return Ok(Protected {
            text: text.to_string(),
            map: CitationMap::default(),
        });
    }

    let entries: Vec<CitationEntry> = unique
        .iter()
        .enumerate()
        .map(|(idx, citation)| CitationEntry {
            token: token_for(idx + 1),
            citation: citation.to_string(),
        })
        .collect();

    let matcher = leftmost_longest(unique.iter().copied());
    let tokens: Vec<&str> = entries.iter().map(|e| e.token.as_str()).collect();
    let protected = matcher.replace_all(text, &tokens);

    Ok(Protected {
        text: protected,
        map: CitationMap { entries },
    })
}

/// Swap tokens back for their citations. Unknown tokens are left alone.
pub fn restore(text: &str, map: &CitationMap) -> String {
    if map.is_empty() {
        return text.to_string();
    }
    let matcher = leftmost_longest(map.entries.iter().map(|e| e.token.as_str()));
    let citations: Vec<&str> = map.entries.iter().map(|e| e.citation.as_str()).collect();
    matcher.replace_all(text, &citations)
}

fn leftmost_longest<'a>(patterns: impl IntoIterator<Item = &'a str>) -> AhoCorasick {
    AhoCorasickBuilder::new()
        .match_kind(MatchKind::LeftmostLongest)
        .build(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cites(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn protects_and_restores_every_occurrence() {
        let text = "Prior work (Smith, 2021) disagrees. See (Smith, 2021) and [1].";
        let protected = protect(text, &cites(&["(Smith, 2021)", "[1]"])).unwrap();
        assert_eq!(protected.map.len(), 2);
        assert!(!protected.text.contains("Smith"));
        assert_eq!(protected.text.matches("CIT:001").count(), 2);
        assert_eq!(restore(&protected.text, &protected.map), text);
    }

    #[test]
    fn longer_citation_wins_over_prefix() {
        let text = "Results [10] extend [1].";
        let protected = protect(text, &cites(&["[1]", "[10]"])).unwrap();
        assert_eq!(
            protected.text,
            format!("Results {} extend {}.", token_for(1), token_for(2))
        );
        assert_eq!(protected.map.entries[0].citation, "[10]");
        assert_eq!(restore(&protected.text, &protected.map), text);
    }

    #[test]
    fn skips_empty_duplicate_and_absent_citations() {
        let text = "Only [2] here.";
        let protected = protect(text, &cites(&["", "[2]", "[2]", "[9]"])).unwrap();
        assert_eq!(protected.map.len(), 1);
        assert_eq!(protected.map.entries[0].token, "\u{27E6}CIT:001\u{27E7}");
    }

    #[test]
    fn refuses_text_with_delimiters() {
        let err = protect("odd \u{27E6} text", &cites(&["odd"])).unwrap_err();
        assert_eq!(err, CitationError::DelimiterInText(TOKEN_OPEN));
    }

    #[test]
    fn restore_survives_rewritten_context() {
        let protected = protect("As shown (Lee, 2019), it works.", &cites(&["(Lee, 2019)"])).unwrap();
        let rewritten = protected.text.replace("As shown", "Evidence").replace("it works", "works");
        assert_eq!(restore(&rewritten, &protected.map), "Evidence (Lee, 2019), works.");
    }
}
