//! Element (tag) hits.
//!
//! Two postings layouts are supported. In the payload layout each start tag
//! position carries the element end. In the legacy layout start and end tags
//! are separate terms and are paired per document with a stack; at equal
//! positions ends are processed before starts. Empty elements cannot be
//! paired this way and are left out of the legacy layout when indexing.

use super::{forward_target, HitBucket, HitQueryContext, HitState, Spans};
use crate::error::{Result, SpanError};
use crate::index::{decode_tag_payload, PostingsIterator};
use crate::types::{DocId, SortBy, Span, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

pub struct TagSpans {
    starts: Box<dyn PostingsIterator>,
    ends: Option<Box<dyn PostingsIterator>>,
    bucket: HitBucket,
    index: usize,
    state: HitState,
    doc: DocId,
}

impl TagSpans {
    /// Tags whose start postings carry the end position as payload
    pub fn with_payloads(starts: Box<dyn PostingsIterator>, reuse_threshold: usize) -> Self {
        Self::build(starts, None, reuse_threshold)
    }

    /// Tags stored as separate start and end postings
    pub fn legacy(
        starts: Box<dyn PostingsIterator>,
        ends: Box<dyn PostingsIterator>,
        reuse_threshold: usize,
    ) -> Self {
        Self::build(starts, Some(ends), reuse_threshold)
    }

    fn build(
        starts: Box<dyn PostingsIterator>,
        ends: Option<Box<dyn PostingsIterator>>,
        reuse_threshold: usize,
    ) -> Self {
        Self {
            starts,
            ends,
            bucket: HitBucket::new(reuse_threshold),
            index: 0,
            state: HitState::NotStarted,
            doc: NOT_STARTED_DOC,
        }
    }

    /// Starting from the start postings' current doc, find a doc producing elements
    fn settle(&mut self) -> Result<DocId> {
        loop {
            let doc = self.starts.doc();
            if doc == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                self.state = HitState::Exhausted;
                return Ok(NO_MORE_DOCS);
            }
            self.load_doc(doc)?;
            if !self.bucket.is_empty() {
                self.doc = doc;
                self.index = 0;
                self.state = HitState::NotStarted;
                return Ok(doc);
            }
            self.starts.next_doc()?;
        }
    }

    fn load_doc(&mut self, doc: DocId) -> Result<()> {
        self.bucket.clear();
        match self.ends.as_mut() {
            None => {
                loop {
                    let start = self.starts.next_position()?;
                    if start == NO_MORE_POSITIONS {
                        break;
                    }
                    let end = self
                        .starts
                        .payload()
                        .and_then(decode_tag_payload)
                        .ok_or_else(|| {
                            SpanError::internal(format!(
                                "start tag at doc {} position {} has no end payload",
                                doc, start
                            ))
                        })?;
                    self.bucket.push_span(Span::new(start, end));
                }
            }
            Some(ends) => {
                let mut end_doc = ends.doc();
                if end_doc == NOT_STARTED_DOC || end_doc < doc {
                    end_doc = ends.advance(doc)?;
                }
                if end_doc != doc {
                    return Ok(());
                }
                let starts = collect_positions(&mut *self.starts)?;
                let ends = collect_positions(&mut **ends)?;
                let mut stack = Vec::new();
                let mut si = 0;
                for end in ends {
                    while si < starts.len() && starts[si] < end {
                        stack.push(starts[si]);
                        si += 1;
                    }
                    if let Some(start) = stack.pop() {
                        self.bucket.push_span(Span::new(start, end));
                    }
                }
            }
        }
        self.bucket.sort(SortBy::Start, false);
        Ok(())
    }
}

fn collect_positions(postings: &mut dyn PostingsIterator) -> Result<Vec<i32>> {
    let mut positions = Vec::with_capacity(postings.freq() as usize);
    loop {
        let position = postings.next_position()?;
        if position == NO_MORE_POSITIONS {
            return Ok(positions);
        }
        positions.push(position);
    }
}

impl Spans for TagSpans {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.starts.next_doc()?;
        self.settle()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let target = forward_target(self.doc, target);
        if self.starts.doc() == NOT_STARTED_DOC || self.starts.doc() < target {
            self.starts.advance(target)?;
        }
        self.settle()
    }

    fn next_start_position(&mut self) -> Result<i32> {
        let hit = match self.state {
            HitState::Exhausted => return Ok(NO_MORE_POSITIONS),
            HitState::NotStarted | HitState::AtFirstMatchPending(_) => {
                (!self.bucket.is_empty()).then(|| self.bucket.span(0))
            }
            HitState::Positioned(_) => {
                self.index += 1;
                (self.index < self.bucket.len()).then(|| self.bucket.span(self.index))
            }
        };
        if hit.is_none() {
            self.index = self.bucket.len();
        }
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
        self.starts.cost()
    }
}
