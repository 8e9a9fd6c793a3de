use serde::{Deserialize, Serialize};

use super::{align_docs, current_span, forward_target, HitBucket, HitQueryContext, HitState, Spans};
use crate::error::Result;
use crate::types::{DocId, SortBy, Span, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Positional relation a producer hit must have with some filter hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperation {
    /// Producer hit lies inside a filter hit
    Within,
    /// Producer hit contains a filter hit
    Containing,
    /// Producer hit starts where a filter hit starts
    StartsAt,
    /// Producer hit ends where a filter hit ends
    EndsAt,
    /// Producer hit equals a filter hit
    Matches,
}

impl FilterOperation {
    /// Index of a filter hit (start-sorted) satisfying the relation with `span`
    fn find(&self, span: Span, filter: &[Span]) -> Option<usize> {
        let from_start = |start: i32| filter.partition_point(|f| f.start < start);
        match self {
            FilterOperation::Containing => (from_start(span.start)..filter.len())
                .take_while(|&i| filter[i].start <= span.end)
                .find(|&i| filter[i].end <= span.end),
            FilterOperation::Within => (0..filter.len())
                .take_while(|&i| filter[i].start <= span.start)
                .find(|&i| filter[i].end >= span.end),
            FilterOperation::StartsAt => {
                let i = from_start(span.start);
                (i < filter.len() && filter[i].start == span.start).then_some(i)
            }
            FilterOperation::EndsAt => filter.iter().position(|f| f.end == span.end),
            FilterOperation::Matches => (from_start(span.start)..filter.len())
                .take_while(|&i| filter[i].start == span.start)
                .find(|&i| filter[i].end == span.end),
        }
    }
}

/// Producer hits that do (or, inverted, do not) stand in a relation to filter hits.
///
/// Filter hits of each document are buffered; the producer is streamed, so the
/// output keeps the producer's order. The adjustments shift the producer hit
/// before testing it.
pub struct PositionFilterSpans {
    producer: Box<dyn Spans>,
    filter: Box<dyn Spans>,
    operation: FilterOperation,
    invert: bool,
    left_adjust: i32,
    right_adjust: i32,
    bucket: HitBucket,
    matched: Option<usize>,
    state: HitState,
    doc: DocId,
    producer_captures: bool,
    filter_captures: bool,
}

impl PositionFilterSpans {
    pub fn new(
        producer: Box<dyn Spans>,
        filter: Box<dyn Spans>,
        operation: FilterOperation,
        invert: bool,
        reuse_threshold: usize,
    ) -> Self {
        Self {
            producer,
            filter,
            operation,
            invert,
            left_adjust: 0,
            right_adjust: 0,
            bucket: HitBucket::new(reuse_threshold),
            matched: None,
            state: HitState::NotStarted,
            doc: NOT_STARTED_DOC,
            producer_captures: false,
            filter_captures: false,
        }
    }

    pub fn with_adjustments(mut self, left_adjust: i32, right_adjust: i32) -> Self {
        self.left_adjust = left_adjust;
        self.right_adjust = right_adjust;
        self
    }

    fn load_filter(&mut self, doc: DocId) -> Result<()> {
        self.bucket.clear();
        let mut filter_doc = self.filter.doc_id();
        if filter_doc == NOT_STARTED_DOC || filter_doc < doc {
            filter_doc = self.filter.advance(doc)?;
        }
        if filter_doc == doc {
            self.bucket.fill(self.filter.as_mut(), self.filter_captures)?;
            self.bucket.sort(SortBy::Start, false);
        }
        Ok(())
    }

    fn find_match(&mut self) -> Result<Option<Span>> {
        loop {
            let span = current_span(self.producer.as_ref());
            if span.start == NO_MORE_POSITIONS {
                return Ok(None);
            }
            let adjusted = Span::new(span.start + self.left_adjust, span.end + self.right_adjust);
            let found = self.operation.find(adjusted, self.bucket.spans());
            if found.is_some() != self.invert {
                self.matched = found;
                return Ok(Some(span));
            }
            self.producer.next_start_position()?;
        }
    }

    fn find_doc(&mut self) -> Result<DocId> {
        loop {
            let doc = if self.invert {
                self.producer.doc_id()
            } else {
                align_docs(self.producer.as_mut(), self.filter.as_mut())?
            };
            if doc == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                self.state = HitState::Exhausted;
                return Ok(NO_MORE_DOCS);
            }
            self.load_filter(doc)?;
            self.producer.next_start_position()?;
            if let Some(span) = self.find_match()? {
                self.doc = doc;
                self.state = HitState::AtFirstMatchPending(span);
                return Ok(doc);
            }
            self.producer.next_doc()?;
        }
    }
}

impl Spans for PositionFilterSpans {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        match self.doc {
            NO_MORE_DOCS => return Ok(NO_MORE_DOCS),
            NOT_STARTED_DOC => {
                self.producer.next_doc()?;
                if !self.invert {
                    self.filter.next_doc()?;
                }
            }
            _ => {
                self.producer.next_doc()?;
            }
        }
        self.find_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let target = forward_target(self.doc, target);
        self.producer.advance(target)?;
        let filter_doc = self.filter.doc_id();
        if !self.invert && (filter_doc == NOT_STARTED_DOC || filter_doc < target) {
            self.filter.advance(target)?;
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
        self.producer.next_start_position()?;
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
        self.producer.set_context(context);
        let middle = context.registrations();
        self.producer_captures = middle > before;
        if !self.invert {
            self.filter.set_context(context);
            self.filter_captures = context.registrations() > middle;
        }
        self.bucket
            .set_num_groups(if self.filter_captures { context.num_groups() } else { 0 });
    }

    fn get_captured_groups(&self, groups: &mut [Option<Span>]) {
        if self.producer_captures {
            self.producer.get_captured_groups(groups);
        }
        if self.filter_captures {
            if let Some(idx) = self.matched {
                self.bucket.copy_groups(idx, groups);
            }
        }
    }

    fn cost(&self) -> u64 {
        if self.invert {
            self.producer.cost()
        } else {
            self.producer.cost().min(self.filter.cost())
        }
    }
}
