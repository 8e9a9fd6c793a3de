use std::collections::HashSet;

use super::{forward_target, HitBucket, HitQueryContext, HitState, Spans};
use crate::error::{Result, SpanError};
use crate::types::{DocId, SortBy, Span, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Chains of `min..=max` adjacent clause hits.
///
/// Works per document: all clause hits are gathered, then every chain is
/// enumerated from every start hit. Output is start-sorted and unique. Empty
/// clause hits never extend a chain.
pub struct RepetitionSpans {
    clause: Box<dyn Spans>,
    min: u32,
    max: Option<u32>,
    hits: HitBucket,
    output: HitBucket,
    index: usize,
    state: HitState,
    doc: DocId,
    captures: bool,
}

impl RepetitionSpans {
    pub fn new(
        clause: Box<dyn Spans>,
        min: u32,
        max: Option<u32>,
        reuse_threshold: usize,
    ) -> Result<Self> {
        if min < 1 || max.map_or(false, |max| max < min) {
            return Err(SpanError::InvalidRepetition { min, max });
        }
        Ok(Self {
            clause,
            min,
            max,
            hits: HitBucket::new(reuse_threshold),
            output: HitBucket::new(reuse_threshold),
            index: 0,
            state: HitState::NotStarted,
            doc: NOT_STARTED_DOC,
            captures: false,
        })
    }

    fn settle(&mut self) -> Result<DocId> {
        // with min > 1 a clause document may produce no chain at all
        loop {
            let doc = self.clause.doc_id();
            if doc == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                self.state = HitState::Exhausted;
                return Ok(NO_MORE_DOCS);
            }
            self.collect()?;
            if !self.output.is_empty() {
                self.doc = doc;
                self.index = 0;
                self.state = HitState::NotStarted;
                return Ok(doc);
            }
            self.clause.next_doc()?;
        }
    }

    fn collect(&mut self) -> Result<()> {
        self.hits.clear();
        self.output.clear();
        self.hits.fill(self.clause.as_mut(), self.captures)?;
        self.hits.sort(SortBy::Start, false);

        let mut groups = vec![None; self.hits.num_groups()];
        for first in 0..self.hits.len() {
            let mut seen = HashSet::new();
            groups.iter_mut().for_each(|g| *g = None);
            self.hits.copy_groups(first, &mut groups);
            let span = self.hits.span(first);
            self.extend(span.start, first, 1, &mut groups, &mut seen);
        }
        self.output.sort(SortBy::Start, true);
        Ok(())
    }

    /// Record the chain ending with hit `last` and try to extend it
    fn extend(
        &mut self,
        start: i32,
        last: usize,
        count: u32,
        groups: &mut Vec<Option<Span>>,
        seen: &mut HashSet<(i32, u32)>,
    ) {
        let end = self.hits.span(last).end;
        if !seen.insert((end, count)) {
            return;
        }
        if count >= self.min {
            self.output.push(Span::new(start, end), groups);
        }
        if self.max.map_or(false, |max| count >= max) {
            return;
        }
        let spans = self.hits.spans();
        let from = spans.partition_point(|s| s.start < end);
        let to = spans.partition_point(|s| s.start <= end);
        for next in from..to {
            if self.hits.span(next).length() == 0 {
                continue;
            }
            let saved = groups.clone();
            self.hits.copy_groups(next, groups);
            self.extend(start, next, count + 1, groups, seen);
            *groups = saved;
        }
    }
}

impl Spans for RepetitionSpans {
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
            HitState::NotStarted | HitState::AtFirstMatchPending(_) => {
                self.index = 0;
                (!self.output.is_empty()).then(|| self.output.span(0))
            }
            HitState::Positioned(_) => {
                self.index += 1;
                (self.index < self.output.len()).then(|| self.output.span(self.index))
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
        let width = if self.captures { context.num_groups() } else { 0 };
        self.hits.set_num_groups(width);
        self.output.set_num_groups(width);
    }

    fn get_captured_groups(&self, groups: &mut [Option<Span>]) {
        if self.captures && self.index < self.output.len() {
            self.output.copy_groups(self.index, groups);
        }
    }

    fn cost(&self) -> u64 {
        self.clause.cost()
    }
}
