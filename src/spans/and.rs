use std::cmp::Ordering;

use super::{align_docs, current_span, forward_target, HitQueryContext, HitState, Spans};
use crate::error::Result;
use crate::types::{DocId, Span, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Hits present in both clauses with identical (start, end).
///
/// Both clauses must be start-sorted. Duplicate hits are paired off, so the
/// output is unique whenever either clause is.
pub struct AndSpans {
    left: Box<dyn Spans>,
    right: Box<dyn Spans>,
    state: HitState,
    doc: DocId,
    captures: bool,
}

impl AndSpans {
    pub fn new(left: Box<dyn Spans>, right: Box<dyn Spans>) -> Self {
        Self {
            left,
            right,
            state: HitState::NotStarted,
            doc: NOT_STARTED_DOC,
            captures: false,
        }
    }

    /// Combine several clauses pairwise
    pub fn from_clauses(clauses: Vec<Box<dyn Spans>>) -> Option<Box<dyn Spans>> {
        clauses
            .into_iter()
            .reduce(|left, right| Box::new(AndSpans::new(left, right)) as Box<dyn Spans>)
    }

    /// Move both clauses forward until their current hits coincide
    fn synchronize(&mut self) -> Result<Option<Span>> {
        loop {
            let l = current_span(self.left.as_ref());
            let r = current_span(self.right.as_ref());
            if l.start == NO_MORE_POSITIONS || r.start == NO_MORE_POSITIONS {
                return Ok(None);
            }
            match (l.start, l.end).cmp(&(r.start, r.end)) {
                Ordering::Equal => return Ok(Some(l)),
                Ordering::Less => {
                    if l.start < r.start {
                        self.left.advance_start_position(r.start)?;
                    } else {
                        self.left.next_start_position()?;
                    }
                }
                Ordering::Greater => {
                    if r.start < l.start {
                        self.right.advance_start_position(l.start)?;
                    } else {
                        self.right.next_start_position()?;
                    }
                }
            }
        }
    }

    /// Find a doc, from the clauses' current docs on, in which a common hit exists
    fn find_doc(&mut self) -> Result<DocId> {
        loop {
            let doc = align_docs(self.left.as_mut(), self.right.as_mut())?;
            if doc == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                self.state = HitState::Exhausted;
                return Ok(NO_MORE_DOCS);
            }
            self.left.next_start_position()?;
            self.right.next_start_position()?;
            if let Some(span) = self.synchronize()? {
                self.doc = doc;
                self.state = HitState::AtFirstMatchPending(span);
                return Ok(doc);
            }
            self.left.next_doc()?;
        }
    }
}

impl Spans for AndSpans {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        match self.doc {
            NO_MORE_DOCS => return Ok(NO_MORE_DOCS),
            NOT_STARTED_DOC => {
                self.left.next_doc()?;
                self.right.next_doc()?;
            }
            _ => {
                self.left.next_doc()?;
            }
        }
        self.find_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let target = forward_target(self.doc, target);
        self.left.advance(target)?;
        if self.right.doc_id() == NOT_STARTED_DOC || self.right.doc_id() < target {
            self.right.advance(target)?;
        }
        self.find_doc()
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if let Some(start) = self.state.take_pending() {
            return Ok(start);
        }
        let hit = match self.state {
            HitState::Exhausted => return Ok(NO_MORE_POSITIONS),
            _ => {
                self.left.next_start_position()?;
                self.right.next_start_position()?;
                self.synchronize()?
            }
        };
        Ok(self.state.settle(hit))
    }

    fn start_position(&self) -> i32 {
        self.state.start()
    }

    fn end_position(&self) -> i32 {
        self.state.end()
    }

    fn set_context(&mut self, context: &mut HitQueryContext) {
        let before = context.registrations();
        self.left.set_context(context);
        self.right.set_context(context);
        self.captures = context.registrations() > before;
    }

    fn get_captured_groups(&self, groups: &mut [Option<Span>]) {
        if self.captures {
            self.left.get_captured_groups(groups);
            self.right.get_captured_groups(groups);
        }
    }

    fn cost(&self) -> u64 {
        self.left.cost().min(self.right.cost())
    }
}
