use super::{current_span, forward_target, HitBucket, HitQueryContext, HitState, Spans};
use crate::error::Result;
use crate::types::{DocId, SortBy, Span, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Replays each document's clause hits in sorted order, optionally without duplicates
pub struct SortedSpans {
    clause: Box<dyn Spans>,
    by: SortBy,
    unique: bool,
    bucket: HitBucket,
    index: usize,
    state: HitState,
    doc: DocId,
    captures: bool,
}

impl SortedSpans {
    pub fn new(clause: Box<dyn Spans>, by: SortBy, unique: bool, reuse_threshold: usize) -> Self {
        Self {
            clause,
            by,
            unique,
            bucket: HitBucket::new(reuse_threshold),
            index: 0,
            state: HitState::NotStarted,
            doc: NOT_STARTED_DOC,
            captures: false,
        }
    }

    fn settle(&mut self) -> Result<DocId> {
        loop {
            let doc = self.clause.doc_id();
            if doc == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                self.state = HitState::Exhausted;
                return Ok(NO_MORE_DOCS);
            }
            self.bucket.clear();
            self.bucket.fill(self.clause.as_mut(), self.captures)?;
            if !self.bucket.is_empty() {
                self.bucket.sort(self.by, self.unique);
                self.doc = doc;
                self.index = 0;
                self.state = HitState::NotStarted;
                return Ok(doc);
            }
            self.clause.next_doc()?;
        }
    }
}

impl Spans for SortedSpans {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.clause.next_doc()?;
        self.settle()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let target = forward_target(self.doc, target);
        let current = self.clause.doc_id();
        if current == NOT_STARTED_DOC || current < target {
            self.clause.advance(target)?;
        }
        self.settle()
    }

    fn next_start_position(&mut self) -> Result<i32> {
        let hit = match self.state {
            HitState::Exhausted => return Ok(NO_MORE_POSITIONS),
            HitState::Positioned(_) => {
                self.index += 1;
                (self.index < self.bucket.len()).then(|| self.bucket.span(self.index))
            }
            _ => {
                self.index = 0;
                (!self.bucket.is_empty()).then(|| self.bucket.span(0))
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
        self.clause.set_context(context);
        self.captures = context.registrations() > before;
        self.bucket
            .set_num_groups(if self.captures { context.num_groups() } else { 0 });
    }

    fn get_captured_groups(&self, groups: &mut [Option<Span>]) {
        if self.captures && self.index < self.bucket.len() {
            self.bucket.copy_groups(self.index, groups);
        }
    }

    fn cost(&self) -> u64 {
        self.clause.cost()
    }
}

/// Drops hits identical to the one before; the clause must already be sorted
pub struct UniqueSpans {
    clause: Box<dyn Spans>,
    previous: Option<Span>,
}

impl UniqueSpans {
    pub fn new(clause: Box<dyn Spans>) -> Self {
        Self {
            clause,
            previous: None,
        }
    }
}

impl Spans for UniqueSpans {
    fn doc_id(&self) -> DocId {
        self.clause.doc_id()
    }

    fn next_doc(&mut self) -> Result<DocId> {
        self.previous = None;
        self.clause.next_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        self.previous = None;
        self.clause.advance(target)
    }

    fn next_start_position(&mut self) -> Result<i32> {
        loop {
            let start = self.clause.next_start_position()?;
            let span = current_span(self.clause.as_ref());
            if start == NO_MORE_POSITIONS || self.previous != Some(span) {
                self.previous = Some(span);
                return Ok(start);
            }
        }
    }

    fn start_position(&self) -> i32 {
        self.clause.start_position()
    }

    fn end_position(&self) -> i32 {
        self.clause.end_position()
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
