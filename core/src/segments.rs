//! Resolve a batch of queries into a left-to-right segment stream.

use serde::{Deserialize, Serialize};

use crate::annotations::Query;
use crate::locate::{SpanLocator, SpanMatch, Strategy};

/// A query that was placed in the base text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocatedSpan {
    pub offset: usize,
    pub length: usize,
    pub matched_text: String,
    pub strategy: Strategy,
    pub query: Query,
}

impl LocatedSpan {
    fn new(found: SpanMatch, query: Query) -> Self {
        Self {
            offset: found.offset,
            length: found.len,
            matched_text: found.text,
            strategy: found.strategy,
            query,
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// One piece of the partition of the base text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Segment {
    Text { offset: usize, text: String },
    Flagged(LocatedSpan),
}

impl Segment {
    pub fn offset(&self) -> usize {
        match self {
            Segment::Text { offset, .. } => *offset,
            Segment::Flagged(span) => span.offset,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Segment::Text { text, .. } => text,
            Segment::Flagged(span) => &span.matched_text,
        }
    }
}

/// Result of resolving every query against one base text.
///
/// `segments` covers the base text exactly once, in order. Queries that no
/// strategy could place end up in `unlocated`; located spans that started
/// inside an earlier span end up in `overlapping`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resolution {
    pub segments: Vec<Segment>,
    pub unlocated: Vec<Query>,
    pub overlapping: Vec<LocatedSpan>,
    pub total: usize,
}

impl Resolution {
    /// Queries that some strategy placed, including ones later dropped
    /// for overlapping.
    pub fn located_count(&self) -> usize {
        self.total - self.unlocated.len()
    }

    pub fn flagged(&self) -> impl Iterator<Item = &LocatedSpan> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Flagged(span) => Some(span),
            Segment::Text { .. } => None,
        })
    }

    /// Concatenation of every segment; equals the base text.
    pub fn text(&self) -> String {
        self.segments.iter().map(Segment::text).collect()
    }
}

impl SpanLocator {
    /// Place every query and partition `text` around the hits.
    ///
    /// Queries are searched in order with the search start advancing past
    /// the previous sequential hit, so repeated quotes land on successive
    /// occurrences. A query that misses is retried once from the start of
    /// the text (for out-of-order annotator output). Hits are then sorted
    /// by offset and the first span claiming a region wins.
    pub fn resolve(&self, text: &str, queries: Vec<Query>) -> Resolution {
        let total = queries.len();
        let mut located = Vec::new();
        let mut unlocated = Vec::new();
        let mut cursor = 0usize;

        for query in queries {
            if let Some(found) = self.locate(text, &query.text, cursor) {
                cursor = found.end();
                located.push(LocatedSpan::new(found, query));
                continue;
            }
            let retry = if self.config().retry_from_start && cursor > 0 {
                self.locate(text, &query.text, 0)
            } else {
                None
            };
            match retry {
                Some(found) => located.push(LocatedSpan::new(found, query)),
                None => {
                    tracing::warn!(quote = %query.text, "could not locate annotation in source text");
                    unlocated.push(query);
                }
            }
        }

        located.sort_by_key(|span| span.offset);

        let mut segments = Vec::new();
        let mut overlapping = Vec::new();
        let mut fill = 0usize;
        for span in located {
            if span.offset < fill {
                overlapping.push(span);
                continue;
            }
            if span.offset > fill {
                segments.push(Segment::Text {
                    offset: fill,
                    text: text[fill..span.offset].to_string(),
                });
            }
            fill = span.end();
            segments.push(Segment::Flagged(span));
        }
        if fill < text.len() {
            segments.push(Segment::Text {
                offset: fill,
                text: text[fill..].to_string(),
            });
        }

        Resolution {
            segments,
            unlocated,
            overlapping,
            total,
        }
    }
}

/// Resolve `queries` against `text` with default tuning.
pub fn resolve(text: &str, queries: Vec<Query>) -> Resolution {
    SpanLocator::default().resolve(text, queries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries(texts: &[&str]) -> Vec<Query> {
        texts.iter().map(|t| Query::new(*t)).collect()
    }

    fn assert_partition(text: &str, resolution: &Resolution) {
        assert_eq!(resolution.text(), text);
        let mut expected = 0;
        for segment in &resolution.segments {
            assert_eq!(segment.offset(), expected);
            assert!(!segment.text().is_empty());
            expected += segment.text().len();
        }
        assert_eq!(expected, text.len());
    }

    #[test]
    fn repeated_quotes_land_on_successive_occurrences() {
        let text = "The cat sat. The cat sat.";
        let resolution = resolve(text, queries(&["The cat sat.", "The cat sat."]));
        let offsets: Vec<usize> = resolution.flagged().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 13]);
        assert_eq!(resolution.located_count(), 2);
        assert_partition(text, &resolution);
    }

    #[test]
    fn out_of_order_quotes_retry_from_start() {
        let text = "First point here. Second point there.";
        let resolution = resolve(text, queries(&["Second point", "First point"]));
        let offsets: Vec<usize> = resolution.flagged().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 18]);
        assert!(resolution.unlocated.is_empty());
        assert_partition(text, &resolution);
    }

    #[test]
    fn overlapping_span_is_dropped_first_wins() {
        let text = "We will delve into the details today.";
        let resolution = resolve(text, queries(&["delve into the", "into the details"]));
        assert_eq!(resolution.located_count(), 2);
        assert_eq!(resolution.flagged().count(), 1);
        assert_eq!(resolution.overlapping.len(), 1);
        assert_eq!(resolution.overlapping[0].matched_text, "into the details");
        assert_partition(text, &resolution);
    }

    #[test]
    fn unlocated_queries_are_reported() {
        let text = "Plain words only.";
        let resolution = resolve(text, queries(&["words", "quantum flux capacitor"]));
        assert_eq!(resolution.total, 2);
        assert_eq!(resolution.located_count(), 1);
        assert_eq!(resolution.unlocated[0].text, "quantum flux capacitor");
        assert_partition(text, &resolution);
    }

    #[test]
    fn no_queries_yields_single_text_segment() {
        let text = "Nothing flagged.";
        let resolution = resolve(text, Vec::new());
        assert_eq!(resolution.segments.len(), 1);
        assert_partition(text, &resolution);
        assert!(resolve("", Vec::new()).segments.is_empty());
    }
}
