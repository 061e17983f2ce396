//! Word-level diff between an original and a revised text.
//!
//! Both texts are split into alternating word and whitespace tokens, an LCS
//! is computed over whole tokens, and the two token streams are walked
//! against it to emit equal / insert / delete operations.
//!
//! The LCS table is O(m·n). When the token-pair count exceeds
//! [`DiffConfig::max_token_pairs`] the table is skipped and the result is
//! an approximation: every revised token is emitted as equal (when it
//! lines up with the next unconsumed original token) or insert, and no
//! deletes are emitted at all. Such a diff still reproduces the revised
//! text but not the original; [`WordDiff::degraded`] is set so renderers
//! can say so.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default LCS ceiling, in token pairs.
pub const DEFAULT_MAX_TOKEN_PAIRS: usize = 200_000;

static WHITESPACE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub max_token_pairs: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            max_token_pairs: DEFAULT_MAX_TOKEN_PAIRS,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DiffKind {
    Equal,
    Insert,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffOp {
    pub kind: DiffKind,
    pub token: String,
}

impl DiffOp {
    fn new(kind: DiffKind, token: &str) -> Self {
        Self {
            kind,
            token: token.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WordDiff {
    pub ops: Vec<DiffOp>,
    /// Set when the LCS ceiling was hit and the ops are approximate.
    pub degraded: bool,
}

impl WordDiff {
    /// Equal and delete tokens in order. Matches the original text unless
    /// the diff is degraded: degraded ops carry no deletes, so text removed
    /// by the revision is missing here.
    pub fn original(&self) -> String {
        self.collect(DiffKind::Delete)
    }

    /// Equal and insert tokens in order. Always matches the revised text.
    pub fn revised(&self) -> String {
        self.collect(DiffKind::Insert)
    }

    /// True only for an exact diff with no edits. A degraded diff cannot
    /// see removed text, so it never reports the texts as unchanged.
    pub fn is_unchanged(&self) -> bool {
        !self.degraded && self.ops.iter().all(|op| op.kind == DiffKind::Equal)
    }

    /// Inserted tokens that are not pure whitespace.
    pub fn inserted_words(&self) -> usize {
        self.count_words(DiffKind::Insert)
    }

    /// Deleted tokens that are not pure whitespace.
    pub fn deleted_words(&self) -> usize {
        self.count_words(DiffKind::Delete)
    }

    fn collect(&self, side: DiffKind) -> String {
        self.ops
            .iter()
            .filter(|op| op.kind == DiffKind::Equal || op.kind == side)
            .map(|op| op.token.as_str())
            .collect()
    }

    fn count_words(&self, kind: DiffKind) -> usize {
        self.ops
            .iter()
            .filter(|op| op.kind == kind && !op.token.trim().is_empty())
            .count()
    }
}

/// Split `text` into alternating word and whitespace-run tokens.
/// Concatenating the tokens gives back `text`; no token is empty.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for mat in WHITESPACE_RUN_RE.find_iter(text) {
        if mat.start() > last {
            tokens.push(&text[last..mat.start()]);
        }
        tokens.push(mat.as_str());
        last = mat.end();
    }
    if last < text.len() {
        tokens.push(&text[last..]);
    }
    tokens
}

/// Diff with the default LCS ceiling.
pub fn diff(original: &str, revised: &str) -> WordDiff {
    DiffEngine::default().diff(original, revised)
}

#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    config: DiffConfig,
}

impl DiffEngine {
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    pub fn diff(&self, original: &str, revised: &str) -> WordDiff {
        let old = tokenize(original);
        if original == revised {
            return WordDiff {
                ops: old
                    .into_iter()
                    .map(|token| DiffOp::new(DiffKind::Equal, token))
                    .collect(),
                degraded: false,
            };
        }
        let new = tokenize(revised);

        let pairs = old.len().checked_mul(new.len());
        if pairs.map_or(true, |p| p > self.config.max_token_pairs) {
            tracing::warn!(
                original_tokens = old.len(),
                revised_tokens = new.len(),
                limit = self.config.max_token_pairs,
                "token pair count exceeds diff ceiling; emitting approximate diff"
            );
            return WordDiff {
                ops: degraded_ops(&old, &new),
                degraded: true,
            };
        }

        let common = lcs(&old, &new);
        WordDiff {
            ops: walk(&old, &new, &common),
            degraded: false,
        }
    }
}

/// Longest common subsequence of two token slices.
///
/// Backtracking prefers stepping along the revised side on ties, which
/// keeps the earliest matching revised token in the subsequence.
fn lcs<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<&'a str> {
    let m = a.len();
    let n = b.len();
    let width = n + 1;
    let mut table = vec![0u32; (m + 1) * width];
    for i in 1..=m {
        for j in 1..=n {
            table[i * width + j] = if a[i - 1] == b[j - 1] {
                table[(i - 1) * width + j - 1] + 1
            } else {
                table[(i - 1) * width + j].max(table[i * width + j - 1])
            };
        }
    }

    let mut common = Vec::with_capacity(table[m * width + n] as usize);
    let (mut i, mut j) = (m, n);
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            common.push(a[i - 1]);
            i -= 1;
            j -= 1;
        } else if table[(i - 1) * width + j] > table[i * width + j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    common.reverse();
    common
}

/// Walk both token streams against their LCS.
///
/// At a divergence an insert is emitted before any delete; deletes are
/// only emitted once the revised token lines up with the LCS again or the
/// revised side is exhausted.
fn walk(old: &[&str], new: &[&str], common: &[&str]) -> Vec<DiffOp> {
    let mut ops = Vec::with_capacity(old.len().max(new.len()));
    let (mut oi, mut ni, mut li) = (0, 0, 0);
    loop {
        let anchor = common.get(li).copied();
        match (old.get(oi).copied(), new.get(ni).copied()) {
            (Some(o), Some(n)) if anchor == Some(o) && anchor == Some(n) => {
                ops.push(DiffOp::new(DiffKind::Equal, o));
                oi += 1;
                ni += 1;
                li += 1;
            }
            (_, Some(n)) if anchor != Some(n) => {
                ops.push(DiffOp::new(DiffKind::Insert, n));
                ni += 1;
            }
            (Some(o), _) => {
                ops.push(DiffOp::new(DiffKind::Delete, o));
                oi += 1;
            }
            (None, Some(n)) => {
                ops.push(DiffOp::new(DiffKind::Insert, n));
                ni += 1;
            }
            (None, None) => break,
        }
    }
    ops
}

/// Ceiling fallback: the revised sequence stands in for the LCS and the
/// original side is never deleted from.
fn degraded_ops(old: &[&str], new: &[&str]) -> Vec<DiffOp> {
    let mut ops = Vec::with_capacity(new.len());
    let mut oi = 0;
    for &token in new {
        if old.get(oi) == Some(&token) {
            ops.push(DiffOp::new(DiffKind::Equal, token));
            oi += 1;
        } else {
            ops.push(DiffOp::new(DiffKind::Insert, token));
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(diff: &WordDiff) -> Vec<(DiffKind, &str)> {
        diff.ops.iter().map(|op| (op.kind, op.token.as_str())).collect()
    }

    #[test]
    fn tokenize_keeps_whitespace_runs() {
        assert_eq!(tokenize("a  b\n c"), vec!["a", "  ", "b", "\n ", "c"]);
        assert_eq!(tokenize("  lead"), vec!["  ", "lead"]);
        assert_eq!(tokenize("trail "), vec!["trail", " "]);
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn replaced_word_inserts_before_deleting() {
        let d = diff("fast brown fox", "fast red fox");
        assert_eq!(
            ops(&d),
            vec![
                (DiffKind::Equal, "fast"),
                (DiffKind::Equal, " "),
                (DiffKind::Insert, "red"),
                (DiffKind::Delete, "brown"),
                (DiffKind::Equal, " "),
                (DiffKind::Equal, "fox"),
            ]
        );
        assert!(!d.degraded);
    }

    #[test]
    fn identical_texts_are_all_equal() {
        let text = "Same text,\n\nsame  spacing.";
        let d = diff(text, text);
        assert!(d.is_unchanged());
        assert_eq!(d.original(), text);
    }

    #[test]
    fn round_trips_both_sides() {
        let cases = [
            ("", ""),
            ("", "new words"),
            ("old words", ""),
            ("It is worth noting that we ship.", "We ship."),
            ("a b c d", "d c b a"),
            ("  spaced   out ", "spaced out"),
            ("line one\nline two", "line one\n\nline two\n"),
        ];
        for (original, revised) in cases {
            let d = diff(original, revised);
            assert_eq!(d.original(), original, "original side of {original:?}");
            assert_eq!(d.revised(), revised, "revised side of {revised:?}");
        }
    }

    #[test]
    fn trailing_removal_is_deleted() {
        let d = diff("keep this extra", "keep this");
        assert_eq!(d.deleted_words(), 1);
        assert_eq!(d.inserted_words(), 0);
        assert_eq!(d.ops.last().map(|op| op.kind), Some(DiffKind::Delete));
    }

    #[test]
    fn oversized_input_degrades_without_deletes() {
        let engine = DiffEngine::new(DiffConfig { max_token_pairs: 1 });
        let d = engine.diff("a b c", "a x c");
        assert!(d.degraded);
        assert_eq!(
            ops(&d),
            vec![
                (DiffKind::Equal, "a"),
                (DiffKind::Equal, " "),
                (DiffKind::Insert, "x"),
                (DiffKind::Insert, " "),
                (DiffKind::Insert, "c"),
            ]
        );
        assert!(d.ops.iter().all(|op| op.kind != DiffKind::Delete));
        assert_eq!(d.revised(), "a x c");
    }

    #[test]
    fn degraded_removal_is_not_reported_unchanged() {
        let engine = DiffEngine::new(DiffConfig { max_token_pairs: 1 });
        let d = engine.diff("a b c", "a b");
        assert!(d.degraded);
        assert!(d.ops.iter().all(|op| op.kind == DiffKind::Equal));
        assert!(!d.is_unchanged());
        assert_eq!(d.revised(), "a b");
    }

    #[test]
    fn identical_texts_skip_the_ceiling() {
        let engine = DiffEngine::new(DiffConfig { max_token_pairs: 1 });
        let d = engine.diff("a b c", "a b c");
        assert!(!d.degraded);
        assert!(d.is_unchanged());
        assert_eq!(d.original(), "a b c");
    }

    #[test]
    fn default_ceiling_is_enforced() {
        let original = "w ".repeat(250);
        let revised = "v ".repeat(250);
        // 500 tokens a side is 250,000 pairs, over the default ceiling.
        let d = diff(&original, &revised);
        assert!(d.degraded);
        assert_eq!(d.revised(), revised);
        assert_eq!(d.deleted_words(), 0);
    }
}
