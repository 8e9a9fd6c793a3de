use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::{forward_target, HitQueryContext, HitState, Spans};
use crate::error::Result;
use crate::types::{DocId, Span, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Union of clause hits, merged by (start, end).
///
/// Clauses must produce start-sorted hits. Hits found by several clauses are
/// reported once per clause.
pub struct OrSpans {
    clauses: Vec<Box<dyn Spans>>,
    queue: BinaryHeap<Reverse<(i32, i32, usize)>>,
    current: Option<usize>,
    state: HitState,
    doc: DocId,
    captures: bool,
}

impl OrSpans {
    pub fn new(clauses: Vec<Box<dyn Spans>>) -> Self {
        Self {
            clauses,
            queue: BinaryHeap::new(),
            current: None,
            state: HitState::NotStarted,
            doc: NOT_STARTED_DOC,
            captures: false,
        }
    }

    fn settle_doc(&mut self) -> DocId {
        self.queue.clear();
        self.current = None;
        self.doc = self
            .clauses
            .iter()
            .map(|c| c.doc_id())
            .filter(|&d| d != NOT_STARTED_DOC)
            .min()
            .unwrap_or(NO_MORE_DOCS);
        self.state = if self.doc == NO_MORE_DOCS {
            HitState::Exhausted
        } else {
            HitState::NotStarted
        };
        self.doc
    }

    fn enqueue(&mut self, idx: usize, start: i32) {
        if start != NO_MORE_POSITIONS {
            let end = self.clauses[idx].end_position();
            self.queue.push(Reverse((start, end, idx)));
        }
    }
}

impl Spans for OrSpans {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let doc = self.doc;
        for clause in self.clauses.iter_mut() {
            if doc == NOT_STARTED_DOC || clause.doc_id() == doc {
                clause.next_doc()?;
            }
        }
        Ok(self.settle_doc())
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let target = forward_target(self.doc, target);
        for clause in self.clauses.iter_mut() {
            let d = clause.doc_id();
            if d == NOT_STARTED_DOC || d < target {
                clause.advance(target)?;
            }
        }
        Ok(self.settle_doc())
    }

    fn next_start_position(&mut self) -> Result<i32> {
        match self.state {
            HitState::Exhausted => return Ok(NO_MORE_POSITIONS),
            HitState::NotStarted | HitState::AtFirstMatchPending(_) => {
                for idx in 0..self.clauses.len() {
                    if self.clauses[idx].doc_id() == self.doc {
                        let start = self.clauses[idx].next_start_position()?;
                        self.enqueue(idx, start);
                    }
                }
            }
            HitState::Positioned(_) => {
                if let Some(idx) = self.current {
                    let start = self.clauses[idx].next_start_position()?;
                    self.enqueue(idx, start);
                }
            }
        }
        let hit = self.queue.pop().map(|Reverse((start, end, idx))| {
            self.current = Some(idx);
            Span::new(start, end)
        });
        if hit.is_none() {
            self.current = None;
        }
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
        for clause in self.clauses.iter_mut() {
            clause.set_context(context);
        }
        self.captures = context.registrations() > before;
    }

    fn get_captured_groups(&self, groups: &mut [Option<Span>]) {
        if !self.captures {
            return;
        }
        if let Some(idx) = self.current {
            self.clauses[idx].get_captured_groups(groups);
        }
    }

    fn cost(&self) -> u64 {
        self.clauses.iter().map(|c| c.cost()).sum()
    }
}
