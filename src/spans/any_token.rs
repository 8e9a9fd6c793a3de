use std::sync::Arc;

use super::{forward_target, HitQueryContext, HitState, Spans};
use crate::error::Result;
use crate::index::SegmentIndex;
use crate::types::{DocId, Span, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Every n-gram of length `min..=max` in every live, non-empty document.
///
/// Hits come out sorted by start, then by length.
pub struct AnyTokenSpans {
    index: Arc<dyn SegmentIndex>,
    min: u32,
    max: Option<u32>,
    doc: DocId,
    length: u32,
    state: HitState,
}

impl AnyTokenSpans {
    pub fn new(index: Arc<dyn SegmentIndex>, min: u32, max: Option<u32>) -> Self {
        Self {
            index,
            min,
            max,
            doc: NOT_STARTED_DOC,
            length: 0,
            state: HitState::NotStarted,
        }
    }

    fn settle_doc(&mut self, mut doc: DocId) -> Result<DocId> {
        let max_doc = self.index.max_doc();
        while doc < max_doc {
            if self.index.is_live(doc) {
                let length = self.index.field_length(doc)?;
                if length > 0 && length >= self.min {
                    self.doc = doc;
                    self.length = length;
                    self.state = HitState::NotStarted;
                    return Ok(doc);
                }
            }
            doc += 1;
        }
        self.doc = NO_MORE_DOCS;
        self.state = HitState::Exhausted;
        Ok(NO_MORE_DOCS)
    }

    fn fits(&self, start: i32, len: u32) -> bool {
        let end = start as i64 + len as i64;
        (start as i64) < self.length as i64
            && end <= self.length as i64
            && self.max.map_or(true, |max| len <= max)
    }
}

impl Spans for AnyTokenSpans {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        let next = if self.doc == NOT_STARTED_DOC { 0 } else { self.doc.saturating_add(1) };
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.settle_doc(next)
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let target = forward_target(self.doc, target);
        self.settle_doc(target)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        let (mut start, mut len) = match self.state {
            HitState::Exhausted => return Ok(NO_MORE_POSITIONS),
            HitState::NotStarted | HitState::AtFirstMatchPending(_) => (0, self.min),
            HitState::Positioned(span) => (span.start, span.length() as u32 + 1),
        };
        loop {
            if start as i64 >= self.length as i64 {
                return Ok(self.state.settle(None));
            }
            if self.fits(start, len) {
                return Ok(self.state.settle(Some(Span::new(start, start + len as i32))));
            }
            start += 1;
            len = self.min;
        }
    }

    fn start_position(&self) -> i32 {
        self.state.start()
    }

    fn end_position(&self) -> i32 {
        self.state.end()
    }

    fn set_context(&mut self, _context: &mut HitQueryContext) {}

    fn get_captured_groups(&self, _groups: &mut [Option<Span>]) {}

    fn cost(&self) -> u64 {
        self.index.max_doc() as u64
    }
}
