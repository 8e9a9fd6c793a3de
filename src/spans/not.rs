use std::sync::Arc;

use super::{forward_target, HitQueryContext, HitState, Spans};
use crate::error::Result;
use crate::index::SegmentIndex;
use crate::types::{DocId, Span, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Single tokens not covered by any hit of the clause.
///
/// Without a clause every token of every live document matches. The clause
/// must be start-sorted.
pub struct NotSpans {
    index: Arc<dyn SegmentIndex>,
    clause: Option<Box<dyn Spans>>,
    doc: DocId,
    length: i32,
    /// Clause hit not yet merged into `covered_until`
    clause_hit: Span,
    covered_until: i32,
    state: HitState,
}

impl NotSpans {
    pub fn new(index: Arc<dyn SegmentIndex>, clause: Option<Box<dyn Spans>>) -> Self {
        Self {
            index,
            clause,
            doc: NOT_STARTED_DOC,
            length: 0,
            clause_hit: Span::new(NO_MORE_POSITIONS, NO_MORE_POSITIONS),
            covered_until: 0,
            state: HitState::NotStarted,
        }
    }

    fn reset_positions(&mut self) -> Result<()> {
        self.covered_until = 0;
        self.clause_hit = Span::new(NO_MORE_POSITIONS, NO_MORE_POSITIONS);
        if let Some(clause) = self.clause.as_mut() {
            let mut clause_doc = clause.doc_id();
            if clause_doc == NOT_STARTED_DOC || clause_doc < self.doc {
                clause_doc = clause.advance(self.doc)?;
            }
            if clause_doc == self.doc {
                let start = clause.next_start_position()?;
                self.clause_hit = Span::new(start, clause.end_position());
            }
        }
        Ok(())
    }

    /// First uncovered position at or after `position`
    fn find_from(&mut self, mut position: i32) -> Result<Option<Span>> {
        loop {
            if position >= self.length {
                return Ok(None);
            }
            while self.clause_hit.start <= position {
                self.covered_until = self.covered_until.max(self.clause_hit.end);
                if let Some(clause) = self.clause.as_mut() {
                    let start = clause.next_start_position()?;
                    self.clause_hit = Span::new(start, clause.end_position());
                }
            }
            if position < self.covered_until {
                position = self.covered_until;
                continue;
            }
            return Ok(Some(Span::new(position, position + 1)));
        }
    }

    fn settle(&mut self, mut doc: DocId) -> Result<DocId> {
        let max_doc = self.index.max_doc();
        while doc < max_doc {
            if self.index.is_live(doc) {
                let length = self.index.field_length(doc)? as i32;
                if length > 0 {
                    self.doc = doc;
                    self.length = length;
                    self.reset_positions()?;
                    if let Some(span) = self.find_from(0)? {
                        self.state = HitState::AtFirstMatchPending(span);
                        return Ok(doc);
                    }
                }
            }
            doc += 1;
        }
        self.doc = NO_MORE_DOCS;
        self.state = HitState::Exhausted;
        Ok(NO_MORE_DOCS)
    }
}

impl Spans for NotSpans {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        match self.doc {
            NO_MORE_DOCS => Ok(NO_MORE_DOCS),
            NOT_STARTED_DOC => self.settle(0),
            doc => self.settle(doc + 1),
        }
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let target = forward_target(self.doc, target);
        self.settle(target)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if let Some(start) = self.state.take_pending() {
            return Ok(start);
        }
        let hit = match self.state {
            HitState::Exhausted => return Ok(NO_MORE_POSITIONS),
            HitState::Positioned(span) => self.find_from(span.start + 1)?,
            _ => self.find_from(0)?,
        };
        Ok(self.state.settle(hit))
    }

    fn start_position(&self) -> i32 {
        self.state.start()
    }

    fn end_position(&self) -> i32 {
        self.state.end()
    }

    // Hits of a negated clause never surface, so its groups are not exposed
    fn set_context(&mut self, _context: &mut HitQueryContext) {}

    fn get_captured_groups(&self, _groups: &mut [Option<Span>]) {}

    fn cost(&self) -> u64 {
        self.index.max_doc() as u64
    }
}
