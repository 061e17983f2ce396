//! Fuzzy placement of approximate quotes inside a base text.
//!
//! A quote returned by an annotator may differ from the source by quote
//! style, whitespace, punctuation or a few hallucinated characters. The
//! locator tries an ordered chain of matchers, each more permissive than
//! the one before, and reports the first hit together with the strategy
//! that produced it.
//!
//! Offsets are UTF-8 byte offsets into the base text and always fall on
//! char boundaries.

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Tuning knobs for the matcher chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Stripped (alphanumeric-only) queries must be longer than this for
    /// the punctuation-window and anchor strategies.
    pub min_stripped_len: usize,
    pub window_factor: f32,
    pub window_padding: usize,
    /// Extra grapheme clusters captured past the query length by the
    /// anchor fallback.
    pub anchor_padding: usize,
    pub retry_from_start: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            min_stripped_len: 3,
            window_factor: 1.5,
            window_padding: 20,
            anchor_padding: 10,
            retry_from_start: true,
        }
    }
}

/// Matcher that placed a quote, in priority order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Exact,
    Normalized,
    PunctuationWindow,
    AlphanumericAnchor,
}

impl Strategy {
    /// Only the anchor fallback guesses its length.
    pub fn is_approximate(self) -> bool {
        matches!(self, Strategy::AlphanumericAnchor)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Exact => "exact",
            Strategy::Normalized => "normalized",
            Strategy::PunctuationWindow => "punctuation-window",
            Strategy::AlphanumericAnchor => "alphanumeric-anchor",
        };
        f.write_str(name)
    }
}

/// A placed quote. `text == base[offset..offset + len]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpanMatch {
    pub offset: usize,
    pub len: usize,
    pub text: String,
    pub strategy: Strategy,
}

impl SpanMatch {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

type Matcher = fn(&str, &str, usize, &LocatorConfig) -> Option<(usize, usize)>;

static STRATEGIES: [(Strategy, Matcher); 4] = [
    (Strategy::Exact, exact),
    (Strategy::Normalized, normalized),
    (Strategy::PunctuationWindow, punctuation_window),
    (Strategy::AlphanumericAnchor, alphanumeric_anchor),
];

/// Locate `query` in `text` starting at byte `search_from` with default
/// tuning.
pub fn locate(text: &str, query: &str, search_from: usize) -> Option<SpanMatch> {
    SpanLocator::default().locate(text, query, search_from)
}

/// Stateless matcher chain bound to a configuration.
#[derive(Debug, Clone, Default)]
pub struct SpanLocator {
    config: LocatorConfig,
}

impl SpanLocator {
    pub fn new(config: LocatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Run the matcher chain and return the first hit.
    ///
    /// An empty (or whitespace-only) query never matches. The exact
    /// strategy searches for the trimmed query, so a padded query such as
    /// `" beta "` is placed on `beta` alone rather than at the position of
    /// the padded string. A hit from
    /// [`Strategy::AlphanumericAnchor`] is best effort: its start is
    /// anchored on the first alphanumeric character of the match, but its
    /// length is a guess of the query length plus
    /// [`LocatorConfig::anchor_padding`] and may over- or under-capture.
    pub fn locate(&self, text: &str, query: &str, search_from: usize) -> Option<SpanMatch> {
        if query.trim().is_empty() || text.is_empty() {
            return None;
        }
        let from = snap_to_boundary(text, search_from);
        for &(strategy, matcher) in STRATEGIES.iter() {
            let Some((start, end)) = matcher(text, query, from, &self.config) else {
                continue;
            };
            if end <= start {
                continue;
            }
            tracing::debug!(%strategy, offset = start, len = end - start, "located quote");
            return Some(SpanMatch {
                offset: start,
                len: end - start,
                text: text[start..end].to_string(),
                strategy,
            });
        }
        None
    }

    /// Run a single strategy, bypassing the chain. Useful for checking which
    /// matchers accept a given quote.
    pub fn locate_with(
        &self,
        strategy: Strategy,
        text: &str,
        query: &str,
        search_from: usize,
    ) -> Option<SpanMatch> {
        if query.trim().is_empty() || text.is_empty() {
            return None;
        }
        let from = snap_to_boundary(text, search_from);
        let (_, matcher) = STRATEGIES.iter().find(|(s, _)| *s == strategy)?;
        let (start, end) = matcher(text, query, from, &self.config)?;
        (end > start).then(|| SpanMatch {
            offset: start,
            len: end - start,
            text: text[start..end].to_string(),
            strategy,
        })
    }
}

fn exact(
    text: &str,
    query: &str,
    from: usize,
    _config: &LocatorConfig,
) -> Option<(usize, usize)> {
    let needle = query.trim();
    text[from..]
        .find(needle)
        .map(|pos| (from + pos, from + pos + needle.len()))
}

fn normalized(
    text: &str,
    query: &str,
    from: usize,
    _config: &LocatorConfig,
) -> Option<(usize, usize)> {
    let pattern = normalized_pattern(query);
    find_pattern(&pattern, text, from)
}

fn punctuation_window(
    text: &str,
    query: &str,
    from: usize,
    config: &LocatorConfig,
) -> Option<(usize, usize)> {
    let stripped_query = strip_to_alphanumeric(query);
    if stripped_query.chars().count() <= config.min_stripped_len {
        return None;
    }
    let query_len = query.graphemes(true).count();
    let window_len = (query_len as f32 * config.window_factor) as usize + config.window_padding;
    let window = take_graphemes(&text[from..], window_len);
    if !strip_to_alphanumeric(window).contains(&stripped_query) {
        return None;
    }
    find_pattern(&loose_pattern(query), text, from)
}

fn alphanumeric_anchor(
    text: &str,
    query: &str,
    from: usize,
    config: &LocatorConfig,
) -> Option<(usize, usize)> {
    let stripped_query = strip_to_alphanumeric(query);
    if stripped_query.chars().count() <= config.min_stripped_len {
        return None;
    }

    // origins[i] is the byte offset in `text` of the char that produced the
    // i-th char of `stripped`.
    let mut stripped = String::new();
    let mut origins = Vec::new();
    for (idx, ch) in text[from..].char_indices() {
        if !ch.is_alphanumeric() {
            continue;
        }
        for lower in ch.to_lowercase() {
            stripped.push(lower);
            origins.push(from + idx);
        }
    }

    let hit = stripped.find(&stripped_query)?;
    let start = *origins.get(stripped[..hit].chars().count())?;
    let capture_len = query.trim().graphemes(true).count() + config.anchor_padding;
    let end = start + take_graphemes(&text[start..], capture_len).len();
    Some((start, end))
}

fn find_pattern(pattern: &str, text: &str, from: usize) -> Option<(usize, usize)> {
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => {
            tracing::debug!(%err, "fuzzy pattern failed to compile");
            return None;
        }
    };
    regex.find_at(text, from).map(|m| (m.start(), m.end()))
}

fn is_double_quote(ch: char) -> bool {
    matches!(ch, '"' | '\u{201C}' | '\u{201D}')
}

fn is_single_quote(ch: char) -> bool {
    matches!(ch, '\'' | '\u{2018}' | '\u{2019}')
}

fn is_dash(ch: char) -> bool {
    matches!(ch, '-' | '\u{2013}' | '\u{2014}')
}

/// Case-insensitive pattern with flexible whitespace, quote and dash
/// styles. Everything else is matched literally.
fn normalized_pattern(query: &str) -> String {
    let mut pattern = String::from("(?i)");
    let mut chars = query.trim().chars().peekable();
    let mut buf = [0u8; 4];
    while let Some(ch) = chars.next() {
        if ch.is_whitespace() {
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
            pattern.push_str(r"\s+");
        } else if is_double_quote(ch) {
            pattern.push_str("[\"\u{201C}\u{201D}]");
        } else if is_single_quote(ch) {
            pattern.push_str("['\u{2018}\u{2019}]");
        } else if is_dash(ch) {
            pattern.push_str("[-\u{2013}\u{2014}]");
        } else {
            pattern.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
        }
    }
    pattern
}

/// Case-insensitive pattern over the query's alphanumeric runs, allowing
/// any run of whitespace and punctuation between them.
fn loose_pattern(query: &str) -> String {
    let words: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    format!("(?i){}", words.join(r"[^\p{Alphabetic}\p{N}]*"))
}

fn strip_to_alphanumeric(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Prefix of `text` holding at most `count` grapheme clusters.
fn take_graphemes(text: &str, count: usize) -> &str {
    match text.grapheme_indices(true).nth(count) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn snap_to_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset += 1;
    }
    offset
}
