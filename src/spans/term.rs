use super::{forward_target, HitQueryContext, HitState, Spans};
use crate::error::Result;
use crate::index::PostingsIterator;
use crate::types::{DocId, Span, NO_MORE_POSITIONS};

/// Single-token hits of one term, read straight from its postings
pub struct TermSpans {
    postings: Box<dyn PostingsIterator>,
    state: HitState,
}

impl TermSpans {
    pub fn new(postings: Box<dyn PostingsIterator>) -> Self {
        Self {
            postings,
            state: HitState::NotStarted,
        }
    }
}

impl Spans for TermSpans {
    fn doc_id(&self) -> DocId {
        self.postings.doc()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.state = HitState::NotStarted;
        self.postings.next_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.state = HitState::NotStarted;
        let target = forward_target(self.postings.doc(), target);
        self.postings.advance(target)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if self.state == HitState::Exhausted {
            return Ok(NO_MORE_POSITIONS);
        }
        let position = self.postings.next_position()?;
        let hit = (position != NO_MORE_POSITIONS).then(|| Span::new(position, position + 1));
        Ok(self.state.settle(hit))
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
        self.postings.cost()
    }
}
