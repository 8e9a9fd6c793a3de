use super::{HitQueryContext, Spans};
use crate::error::Result;
use crate::types::{DocId, Span};

/// Records the clause hit under a capture group name
pub struct CaptureGroupSpans {
    clause: Box<dyn Spans>,
    name: String,
    slot: Option<usize>,
}

impl CaptureGroupSpans {
    pub fn new(clause: Box<dyn Spans>, name: impl Into<String>) -> Self {
        Self {
            clause,
            name: name.into(),
            slot: None,
        }
    }
}

impl Spans for CaptureGroupSpans {
    fn doc_id(&self) -> DocId {
        self.clause.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.clause.next_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.clause.advance(target)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        self.clause.next_start_position()
    }

    fn advance_start_position(&mut self, target: i32) -> Result<i32> {
        self.clause.advance_start_position(target)
    }

    fn start_position(&self) -> i32 {
        self.clause.start_position()
    }

    fn end_position(&self) -> i32 {
        self.clause.end_position()
    }

    fn set_context(&mut self, context: &mut HitQueryContext) {
        self.slot = Some(context.register(&self.name));
        self.clause.set_context(context);
    }

    fn get_captured_groups(&self, groups: &mut [Option<Span>]) {
        self.clause.get_captured_groups(groups);
        if let Some(group) = self.slot.and_then(|slot| groups.get_mut(slot)) {
            *group = Some(Span::new(self.clause.start_position(), self.clause.end_position()));
        }
    }

    fn cost(&self) -> u64 {
        self.clause.cost()
    }
}
