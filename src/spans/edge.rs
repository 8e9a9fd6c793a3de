use super::{HitQueryContext, HitState, Spans};
use crate::error::Result;
use crate::types::{DocId, Span, NO_MORE_POSITIONS};

/// Zero-length hit at the leading or trailing edge of each clause hit.
///
/// Leading edges keep the clause's order; trailing edges of a start-sorted
/// clause are only sorted when the clause hits all have the same length.
pub struct EdgeSpans {
    clause: Box<dyn Spans>,
    trailing: bool,
    state: HitState,
}

impl EdgeSpans {
    pub fn new(clause: Box<dyn Spans>, trailing: bool) -> Self {
        Self {
            clause,
            trailing,
            state: HitState::NotStarted,
        }
    }
}

impl Spans for EdgeSpans {
    fn doc_id(&self) -> DocId {
        self.clause.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.state = HitState::NotStarted;
        self.clause.next_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.state = HitState::NotStarted;
        self.clause.advance(target)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if self.state == HitState::Exhausted {
            return Ok(NO_MORE_POSITIONS);
        }
        let start = self.clause.next_start_position()?;
        let hit = (start != NO_MORE_POSITIONS).then(|| {
            let edge = if self.trailing { self.clause.end_position() } else { start };
            Span::new(edge, edge)
        });
        Ok(self.state.settle(hit))
    }

    fn start_position(&self) -> i32 {
        self.state.start()
    }

    fn end_position(&self) -> i32 {
        self.state.end()
    }

    fn set_context(&mut self, context: &mut HitQueryContext) {
        self.clause.set_context(context);
    }

    fn get_captured_groups(&self, groups: &mut [Option<Span>]) {
        self.clause.get_captured_groups(groups);
    }

    fn cost(&self) -> u64 {
        self.clause.cost()
    }
}
