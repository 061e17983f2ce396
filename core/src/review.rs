//! Accept, edit or dismiss flagged spans to produce a revised text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotations::Kind;
use crate::segments::{LocatedSpan, Resolution, Segment};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("segment {0} does not exist")]
    OutOfRange(usize),
    #[error("segment {0} is not a pending flag")]
    NotPending(usize),
}

/// What to do with one flagged span.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", content = "text", rename_all = "kebab-case")]
pub enum Action {
    /// Use the proposed rewrite. Spans marked `natural`, or with no
    /// rewrite, keep their text.
    Accept,
    Edit(String),
    Dismiss,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ReviewSegment {
    Plain { text: String },
    Pending(LocatedSpan),
}

impl ReviewSegment {
    fn text(&self) -> &str {
        match self {
            ReviewSegment::Plain { text } => text,
            ReviewSegment::Pending(span) => &span.matched_text,
        }
    }
}

/// Editable view over a segment stream. Indexes stay stable as spans are
/// resolved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Review {
    segments: Vec<ReviewSegment>,
}

impl From<Resolution> for Review {
    fn from(resolution: Resolution) -> Self {
        let segments = resolution
            .segments
            .into_iter()
            .map(|segment| match segment {
                Segment::Text { text, .. } => ReviewSegment::Plain { text },
                Segment::Flagged(span) => ReviewSegment::Pending(span),
            })
            .collect();
        Self { segments }
    }
}

impl Review {
    pub fn segments(&self) -> &[ReviewSegment] {
        &self.segments
    }

    /// Pending spans with their segment index.
    pub fn pending(&self) -> impl Iterator<Item = (usize, &LocatedSpan)> {
        self.segments
            .iter()
            .enumerate()
            .filter_map(|(idx, segment)| match segment {
                ReviewSegment::Pending(span) => Some((idx, span)),
                ReviewSegment::Plain { .. } => None,
            })
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn is_complete(&self) -> bool {
        self.pending_count() == 0
    }

    pub fn resolve(&mut self, index: usize, action: Action) -> Result<(), ReviewError> {
        let segment = self
            .segments
            .get_mut(index)
            .ok_or(ReviewError::OutOfRange(index))?;
        let ReviewSegment::Pending(span) = &*segment else {
            return Err(ReviewError::NotPending(index));
        };
        *segment = ReviewSegment::Plain {
            text: apply(span, action),
        };
        Ok(())
    }

    /// Apply `action` to every pending span.
    pub fn resolve_all(&mut self, action: &Action) {
        for segment in &mut self.segments {
            if let ReviewSegment::Pending(span) = &*segment {
                *segment = ReviewSegment::Plain {
                    text: apply(span, action.clone()),
                };
            }
        }
    }

    /// Current text: resolved segments plus the original text of spans
    /// still pending.
    pub fn text(&self) -> String {
        self.segments.iter().map(ReviewSegment::text).collect()
    }
}

fn apply(span: &LocatedSpan, action: Action) -> String {
    match action {
        Action::Accept => {
            let rewrite = span.query.proposed_rewrite.trim();
            if span.query.kind == Kind::Natural || rewrite.is_empty() {
                span.matched_text.clone()
            } else {
                span.query.proposed_rewrite.clone()
            }
        }
        Action::Edit(text) => text,
        Action::Dismiss => span.matched_text.clone(),
        Action::Delete => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::Query;
    use crate::segments::resolve;

    fn review(text: &str, queries: Vec<Query>) -> Review {
        Review::from(resolve(text, queries))
    }

    #[test]
    fn untouched_review_reproduces_base_text() {
        let text = "We leverage tools. We ship.";
        let r = review(text, vec![Query::new("leverage").with_rewrite("use")]);
        assert_eq!(r.pending_count(), 1);
        assert_eq!(r.text(), text);
    }

    #[test]
    fn accept_edit_dismiss_delete() {
        let text = "Certainly! We leverage a robust plan furthermore.";
        let mut r = review(
            text,
            vec![
                Query::new("Certainly!"),
                Query::new("leverage").with_rewrite("use"),
                Query::new("robust").with_rewrite("solid"),
                Query::new("furthermore"),
            ],
        );
        let pending: Vec<usize> = r.pending().map(|(idx, _)| idx).collect();
        assert_eq!(pending.len(), 4);
        r.resolve(pending[0], Action::Delete).unwrap();
        r.resolve(pending[1], Action::Accept).unwrap();
        r.resolve(pending[2], Action::Edit("sound".into())).unwrap();
        r.resolve(pending[3], Action::Dismiss).unwrap();
        assert!(r.is_complete());
        assert_eq!(r.text(), " We use a sound plan furthermore.");
    }

    #[test]
    fn accept_keeps_text_for_natural_or_missing_rewrite() {
        let text = "Short and clear. Also fine.";
        let mut r = review(
            text,
            vec![
                Query::new("Short and clear.")
                    .with_kind(Kind::Natural)
                    .with_rewrite("ignored"),
                Query::new("Also fine."),
            ],
        );
        r.resolve_all(&Action::Accept);
        assert_eq!(r.text(), text);
    }

    #[test]
    fn resolve_all_only_touches_pending_spans() {
        let text = "We leverage tools and leverage people.";
        let mut r = review(
            text,
            vec![
                Query::new("leverage").with_rewrite("use"),
                Query::new("leverage").with_rewrite("use"),
            ],
        );
        let first = r.pending().map(|(idx, _)| idx).next().unwrap();
        r.resolve(first, Action::Dismiss).unwrap();
        r.resolve_all(&Action::Accept);
        assert!(r.is_complete());
        assert_eq!(r.text(), "We leverage tools and use people.");
    }

    #[test]
    fn resolving_plain_or_missing_segment_fails() {
        let mut r = review("a plain text", vec![Query::new("plain")]);
        assert_eq!(r.resolve(0, Action::Dismiss), Err(ReviewError::NotPending(0)));
        assert_eq!(r.resolve(9, Action::Dismiss), Err(ReviewError::OutOfRange(9)));
        assert_eq!(r.resolve(1, Action::Delete), Ok(()));
        assert_eq!(r.text(), "a  text");
    }
}
