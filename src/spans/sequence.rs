//! Binary sequence (concatenation) of two clauses.
//!
//! Two strategies:
//! - [`SimpleSequenceSpans`] when the left side is end-sorted with unique ends
//!   and the right side start-sorted with unique starts; a two-pointer walk.
//! - [`RawSequenceSpans`] for everything else; right hits are bucketed per
//!   start position and paired with every left hit ending there.
//!
//! Callers wrap the result in a start-sorted cursor when needed: both produce
//! hits in the order of the left side's ends.

use super::{align_docs, current_span, forward_target, HitBucket, HitQueryContext, HitState, Spans};
use crate::error::Result;
use crate::types::{DocId, Span, NOT_POSITIONED, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Sequence for clauses with unique ends (left) and unique starts (right)
pub struct SimpleSequenceSpans {
    left: Box<dyn Spans>,
    right: Box<dyn Spans>,
    state: HitState,
    doc: DocId,
    captures: bool,
}

impl SimpleSequenceSpans {
    pub fn new(left: Box<dyn Spans>, right: Box<dyn Spans>) -> Self {
        Self {
            left,
            right,
            state: HitState::NotStarted,
            doc: NOT_STARTED_DOC,
            captures: false,
        }
    }

    /// From the current left hit on, find a left hit followed by a right hit
    fn find_match(&mut self) -> Result<Option<Span>> {
        loop {
            let left = current_span(self.left.as_ref());
            if left.start == NO_MORE_POSITIONS {
                return Ok(None);
            }
            let mut right_start = self.right.start_position();
            if right_start < left.end {
                right_start = self.right.advance_start_position(left.end)?;
            }
            if right_start == NO_MORE_POSITIONS {
                return Ok(None);
            }
            if right_start == left.end {
                return Ok(Some(Span::new(left.start, self.right.end_position())));
            }
            self.left.next_start_position()?;
        }
    }

    fn find_doc(&mut self) -> Result<DocId> {
        loop {
            let doc = align_docs(self.left.as_mut(), self.right.as_mut())?;
            if doc == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                self.state = HitState::Exhausted;
                return Ok(NO_MORE_DOCS);
            }
            self.left.next_start_position()?;
            if let Some(span) = self.find_match()? {
                self.doc = doc;
                self.state = HitState::AtFirstMatchPending(span);
                return Ok(doc);
            }
            self.left.next_doc()?;
        }
    }
}

impl Spans for SimpleSequenceSpans {
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
        if self.state == HitState::Exhausted {
            return Ok(NO_MORE_POSITIONS);
        }
        self.left.next_start_position()?;
        let hit = self.find_match()?;
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

/// Sequence for arbitrary clauses: left end-sorted, right start-sorted
pub struct RawSequenceSpans {
    left: Box<dyn Spans>,
    right: Box<dyn Spans>,
    /// Right hits starting at `bucket_start`
    bucket: HitBucket,
    bucket_start: i32,
    bucket_index: usize,
    /// Start of the right cursor's current hit, `NOT_POSITIONED` at doc start
    right_start: i32,
    state: HitState,
    doc: DocId,
    captures: bool,
    right_captures: bool,
}

impl RawSequenceSpans {
    pub fn new(left: Box<dyn Spans>, right: Box<dyn Spans>, reuse_threshold: usize) -> Self {
        Self {
            left,
            right,
            bucket: HitBucket::new(reuse_threshold),
            bucket_start: NOT_POSITIONED,
            bucket_index: 0,
            right_start: NOT_POSITIONED,
            state: HitState::NotStarted,
            doc: NOT_STARTED_DOC,
            captures: false,
            right_captures: false,
        }
    }

    /// Collect the right hits starting at `start`; starts must be requested in non-decreasing order
    fn gather(&mut self, start: i32) -> Result<()> {
        self.bucket.clear();
        self.bucket_start = start;
        if self.right_start < start {
            self.right_start = self.right.advance_start_position(start)?;
        }
        while self.right_start == start {
            self.bucket.push_current(self.right.as_ref(), self.right_captures);
            self.right_start = self.right.next_start_position()?;
        }
        Ok(())
    }

    fn find_match(&mut self) -> Result<Option<Span>> {
        loop {
            let left = current_span(self.left.as_ref());
            if left.start == NO_MORE_POSITIONS {
                return Ok(None);
            }
            if self.bucket_start != left.end {
                self.gather(left.end)?;
            }
            if !self.bucket.is_empty() {
                self.bucket_index = 0;
                return Ok(Some(Span::new(left.start, self.bucket.span(0).end)));
            }
            self.left.next_start_position()?;
        }
    }

    fn reset_positions(&mut self) {
        self.bucket.clear();
        self.bucket_start = NOT_POSITIONED;
        self.bucket_index = 0;
        self.right_start = NOT_POSITIONED;
    }

    fn find_doc(&mut self) -> Result<DocId> {
        loop {
            let doc = align_docs(self.left.as_mut(), self.right.as_mut())?;
            if doc == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                self.state = HitState::Exhausted;
                return Ok(NO_MORE_DOCS);
            }
            self.reset_positions();
            self.left.next_start_position()?;
            if let Some(span) = self.find_match()? {
                self.doc = doc;
                self.state = HitState::AtFirstMatchPending(span);
                return Ok(doc);
            }
            self.left.next_doc()?;
        }
    }
}

impl Spans for RawSequenceSpans {
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
        if self.state == HitState::Exhausted {
            return Ok(NO_MORE_POSITIONS);
        }
        let hit = if self.bucket_index + 1 < self.bucket.len() {
            self.bucket_index += 1;
            Some(Span::new(
                self.left.start_position(),
                self.bucket.span(self.bucket_index).end,
            ))
        } else {
            self.left.next_start_position()?;
            self.find_match()?
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
        let middle = context.registrations();
        self.right.set_context(context);
        self.right_captures = context.registrations() > middle;
        self.captures = context.registrations() > before;
        self.bucket.set_num_groups(if self.right_captures { context.num_groups() } else { 0 });
    }

    fn get_captured_groups(&self, groups: &mut [Option<Span>]) {
        if !self.captures {
            return;
        }
        self.left.get_captured_groups(groups);
        if self.right_captures && self.bucket_index < self.bucket.len() {
            self.bucket.copy_groups(self.bucket_index, groups);
        }
    }

    fn cost(&self) -> u64 {
        self.left.cost().min(self.right.cost())
    }
}
