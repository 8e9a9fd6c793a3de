//! Lazy positional cursors ("spans") and their combinators.
//!
//! Every leaf matcher and combinator implements [`Spans`]: a single-pass
//! cursor over the hits of one segment, ordered by document and, within a
//! document, in whatever order the producing node advertises through its
//! shape properties.
//!
//! # Protocol
//!
//! - `next_doc`/`advance` move to a document with at least one hit and reset
//!   the position state; both always move forward.
//! - `next_start_position` must be called once per document before
//!   `start_position`/`end_position` are meaningful.
//! - `advance_start_position` always consumes at least one hit.
//! - After exhaustion every method keeps returning the "no more" sentinel.

pub mod and;
pub mod any_token;
pub mod bucket;
pub mod capture;
pub mod constrained;
pub mod context;
pub mod edge;
pub mod expansion;
pub mod fi_match;
pub mod not;
pub mod or;
pub mod position_filter;
pub mod repetition;
pub mod sequence;
pub mod sorted;
pub mod tags;
pub mod term;


use crate::error::Result;
use crate::types::{DocId, Span, NOT_POSITIONED, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

pub use and::AndSpans;
pub use any_token::AnyTokenSpans;
pub use bucket::HitBucket;
pub use capture::CaptureGroupSpans;
pub use constrained::{ConstrainedSpans, ResolvedConstraint};
pub use context::HitQueryContext;
pub use edge::EdgeSpans;
pub use expansion::{Direction, ExpansionSpans};
pub use fi_match::ForwardIndexMatchSpans;
pub use not::NotSpans;
pub use or::OrSpans;
pub use position_filter::{FilterOperation, PositionFilterSpans};
pub use repetition::RepetitionSpans;
pub use sequence::{RawSequenceSpans, SimpleSequenceSpans};
pub use sorted::{SortedSpans, UniqueSpans};
pub use tags::TagSpans;
pub use term::TermSpans;

/// Cursor over the hits of one segment
pub trait Spans: Send {
    /// Current document, `NOT_STARTED_DOC` before the first move, `NO_MORE_DOCS` when exhausted
    fn doc_id(&self) -> DocId;

    /// Move to the next document containing at least one hit
    fn next_doc(&mut self) -> Result<DocId>;

    /// Move to the first document >= target containing a hit; never stays on the current document
    fn advance(&mut self, target: DocId) -> Result<DocId>;

    /// Move to the next hit in the current document, or `NO_MORE_POSITIONS`
    fn next_start_position(&mut self) -> Result<i32>;

    /// Move to the first hit starting at or after `target`, consuming at least one hit
    fn advance_start_position(&mut self, target: i32) -> Result<i32> {
        let mut start = self.next_start_position()?;
        while start < target {
            start = self.next_start_position()?;
        }
        Ok(start)
    }

    fn start_position(&self) -> i32;

    fn end_position(&self) -> i32;

    /// Register capture groups with the shared context (called once, top-down)
    fn set_context(&mut self, context: &mut HitQueryContext);

    /// Fill the group slots this subtree is responsible for
    fn get_captured_groups(&self, groups: &mut [Option<Span>]);

    /// Estimated number of documents this cursor visits
    fn cost(&self) -> u64;
}

impl Spans for Box<dyn Spans> {
    fn doc_id(&self) -> DocId {
        (**self).doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        (**self).next_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        (**self).advance(target)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        (**self).next_start_position()
    }

    fn advance_start_position(&mut self, target: i32) -> Result<i32> {
        (**self).advance_start_position(target)
    }

    fn start_position(&self) -> i32 {
        (**self).start_position()
    }

    fn end_position(&self) -> i32 {
        (**self).end_position()
    }

    fn set_context(&mut self, context: &mut HitQueryContext) {
        (**self).set_context(context)
    }

    fn get_captured_groups(&self, groups: &mut [Option<Span>]) {
        (**self).get_captured_groups(groups)
    }

    fn cost(&self) -> u64 {
        (**self).cost()
    }
}

/// Position state of a cursor inside its current document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitState {
    /// `next_start_position` not yet called in this document
    NotStarted,
    /// Doc-level matching already located the first hit; the next call returns it
    AtFirstMatchPending(Span),
    Positioned(Span),
    Exhausted,
}

impl HitState {
    pub fn start(&self) -> i32 {
        match self {
            HitState::NotStarted | HitState::AtFirstMatchPending(_) => NOT_POSITIONED,
            HitState::Positioned(span) => span.start,
            HitState::Exhausted => NO_MORE_POSITIONS,
        }
    }

    pub fn end(&self) -> i32 {
        match self {
            HitState::NotStarted | HitState::AtFirstMatchPending(_) => NOT_POSITIONED,
            HitState::Positioned(span) => span.end,
            HitState::Exhausted => NO_MORE_POSITIONS,
        }
    }

    /// Consume a pending first match, if any
    pub fn take_pending(&mut self) -> Option<i32> {
        if let HitState::AtFirstMatchPending(span) = *self {
            *self = HitState::Positioned(span);
            Some(span.start)
        } else {
            None
        }
    }

    /// Record the outcome of a search for the next hit
    pub fn settle(&mut self, hit: Option<Span>) -> i32 {
        match hit {
            Some(span) => {
                *self = HitState::Positioned(span);
                span.start
            }
            None => {
                *self = HitState::Exhausted;
                NO_MORE_POSITIONS
            }
        }
    }
}

/// Document `advance(target)` must reach so that it never stays on `current`
pub(crate) fn forward_target(current: DocId, target: DocId) -> DocId {
    if current == NOT_STARTED_DOC || current == NO_MORE_DOCS || current < target {
        target
    } else {
        current.saturating_add(1)
    }
}

/// Advance two started cursors until they sit on the same document
pub(crate) fn align_docs(a: &mut dyn Spans, b: &mut dyn Spans) -> Result<DocId> {
    let mut doc_a = a.doc_id();
    let mut doc_b = b.doc_id();
    loop {
        if doc_a == NO_MORE_DOCS || doc_b == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if doc_a < doc_b {
            doc_a = a.advance(doc_b)?;
        } else if doc_b < doc_a {
            doc_b = b.advance(doc_a)?;
        } else {
            return Ok(doc_a);
        }
    }
}

/// Current hit of a cursor
pub(crate) fn current_span(spans: &dyn Spans) -> Span {
    Span::new(spans.start_position(), spans.end_position())
}
