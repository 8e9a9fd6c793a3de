use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Document identifier within one segment
pub type DocId = u32;

/// Returned by doc-level cursor methods once the cursor is exhausted
pub const NO_MORE_DOCS: DocId = tantivy::TERMINATED;

/// Reported by a cursor that has never been advanced
pub const NOT_STARTED_DOC: DocId = u32::MAX;

/// Returned by position-level cursor methods once the document's hits are exhausted
pub const NO_MORE_POSITIONS: i32 = i32::MAX;

/// Start/end value of a cursor that is not yet positioned in its document
pub const NOT_POSITIONED: i32 = -1;

/// Represents a span of tokens with start (inclusive) and end (exclusive) positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: i32,
    pub end: i32,
}

impl Span {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> i32 {
        self.end - self.start
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A match inside one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hit {
    pub doc: DocId,
    pub start: i32,
    pub end: i32,
}

impl Hit {
    pub fn new(doc: DocId, start: i32, end: i32) -> Self {
        Self { doc, start, end }
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

impl PartialOrd for Hit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.doc
            .cmp(&other.doc)
            .then(self.start.cmp(&other.start))
            .then(self.end.cmp(&other.end))
    }
}

/// Order in which a bucket of hits is replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortBy {
    /// By start, ties by end
    Start,
    /// By end, ties by start
    End,
}

impl SortBy {
    pub fn compare(&self, a: &Span, b: &Span) -> Ordering {
        match self {
            SortBy::Start => a.start.cmp(&b.start).then(a.end.cmp(&b.end)),
            SortBy::End => a.end.cmp(&b.end).then(a.start.cmp(&b.start)),
        }
    }
}

/// Represents a named capture in a pattern match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCapture {
    pub name: String,
    pub span: Span,
}

impl NamedCapture {
    pub fn new(name: String, span: Span) -> Self {
        Self { name, span }
    }
}

/// A span with associated named captures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanWithCaptures {
    pub span: Span,
    pub captures: Vec<NamedCapture>,
}

impl SpanWithCaptures {
    pub fn new(span: Span) -> Self {
        Self {
            span,
            captures: Vec::new(),
        }
    }

    pub fn with_captures(span: Span, captures: Vec<NamedCapture>) -> Self {
        Self { span, captures }
    }

    pub fn add_capture(&mut self, name: String, span: Span) {
        self.captures.push(NamedCapture::new(name, span));
    }

    pub fn capture(&self, name: &str) -> Option<&Span> {
        self.captures.iter().find(|c| c.name == name).map(|c| &c.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ordering() {
        let mut hits = vec![Hit::new(1, 0, 2), Hit::new(0, 3, 4), Hit::new(0, 1, 3), Hit::new(0, 1, 2)];
        hits.sort();
        assert_eq!(
            hits,
            vec![Hit::new(0, 1, 2), Hit::new(0, 1, 3), Hit::new(0, 3, 4), Hit::new(1, 0, 2)]
        );
    }

    #[test]
    fn test_sort_by_end() {
        let mut spans = vec![Span::new(0, 4), Span::new(2, 3), Span::new(1, 3)];
        spans.sort_by(|a, b| SortBy::End.compare(a, b));
        assert_eq!(spans, vec![Span::new(1, 3), Span::new(2, 3), Span::new(0, 4)]);
    }

    #[test]
    fn test_span_relations() {
        let outer = Span::new(1, 5);
        assert!(outer.contains(&Span::new(2, 3)));
        assert!(!outer.contains(&Span::new(0, 3)));
        assert!(outer.overlaps(&Span::new(4, 6)));
        assert!(!outer.overlaps(&Span::new(5, 6)));
    }
}
