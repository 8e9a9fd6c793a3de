use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{current_span, forward_target, HitQueryContext, HitState, Spans};
use crate::error::Result;
use crate::index::SegmentIndex;
use crate::types::{DocId, Span, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
}

/// Clause hits widened by `min..=max` arbitrary tokens on one side.
///
/// Expansion never crosses the document start or end. For each clause hit,
/// right expansions are produced shortest first and left expansions longest
/// first, so a start-sorted clause of fixed length stays start-sorted.
pub struct ExpansionSpans {
    clause: Box<dyn Spans>,
    index: Arc<dyn SegmentIndex>,
    direction: Direction,
    min: u32,
    max: Option<u32>,
    length: i32,
    /// Current clause hit and expansion amount
    clause_hit: Span,
    amount: i64,
    state: HitState,
    doc: DocId,
}

impl ExpansionSpans {
    pub fn new(
        clause: Box<dyn Spans>,
        index: Arc<dyn SegmentIndex>,
        direction: Direction,
        min: u32,
        max: Option<u32>,
    ) -> Self {
        Self {
            clause,
            index,
            direction,
            min,
            max,
            length: 0,
            clause_hit: Span::new(NO_MORE_POSITIONS, NO_MORE_POSITIONS),
            amount: 0,
            state: HitState::NotStarted,
            doc: NOT_STARTED_DOC,
        }
    }

    /// Largest expansion the current clause hit allows
    fn max_amount(&self) -> i64 {
        let room = match self.direction {
            Direction::Right => self.length as i64 - self.clause_hit.end as i64,
            Direction::Left => self.clause_hit.start as i64,
        };
        self.max.map_or(room, |max| room.min(max as i64))
    }

    fn expanded(&self) -> Span {
        let amount = self.amount as i32;
        match self.direction {
            Direction::Right => Span::new(self.clause_hit.start, self.clause_hit.end + amount),
            Direction::Left => Span::new(self.clause_hit.start - amount, self.clause_hit.end),
        }
    }

    /// Position on the first expansion of the current or a later clause hit
    fn first_expansion(&mut self) -> Result<Option<Span>> {
        loop {
            self.clause_hit = current_span(self.clause.as_ref());
            if self.clause_hit.start == NO_MORE_POSITIONS {
                return Ok(None);
            }
            let max = self.max_amount();
            if max >= self.min as i64 {
                self.amount = match self.direction {
                    Direction::Right => self.min as i64,
                    Direction::Left => max,
                };
                return Ok(Some(self.expanded()));
            }
            self.clause.next_start_position()?;
        }
    }

    fn find_doc(&mut self) -> Result<DocId> {
        loop {
            let doc = self.clause.doc_id();
            if doc == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                self.state = HitState::Exhausted;
                return Ok(NO_MORE_DOCS);
            }
            self.length = self.index.field_length(doc)? as i32;
            self.clause.next_start_position()?;
            if let Some(span) = self.first_expansion()? {
                self.doc = doc;
                self.state = HitState::AtFirstMatchPending(span);
                return Ok(doc);
            }
            self.clause.next_doc()?;
        }
    }
}

impl Spans for ExpansionSpans {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.clause.next_doc()?;
        self.find_doc()
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
        self.find_doc()
    }

    fn next_start_position(&mut self) -> Result<i32> {
        if let Some(start) = self.state.take_pending() {
            return Ok(start);
        }
        if self.state == HitState::Exhausted {
            return Ok(NO_MORE_POSITIONS);
        }
        let more = match self.direction {
            Direction::Right => self.amount < self.max_amount(),
            Direction::Left => self.amount > self.min as i64,
        };
        let hit = if more {
            self.amount += match self.direction {
                Direction::Right => 1,
                Direction::Left => -1,
            };
            Some(self.expanded())
        } else {
            self.clause.next_start_position()?;
            self.first_expansion()?
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
        self.clause.set_context(context);
    }

    fn get_captured_groups(&self, groups: &mut [Option<Span>]) {
        self.clause.get_captured_groups(groups);
    }

    fn cost(&self) -> u64 {
        self.clause.cost()
    }
}
