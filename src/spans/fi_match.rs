use std::sync::Arc;

use super::{current_span, forward_target, HitQueryContext, HitState, Spans};
use crate::error::Result;
use crate::index::ForwardIndex;
use crate::nfa::{DocumentTokens, MatchDirection, ResolvedNfa};
use crate::types::{DocId, Span, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Anchor hits extended by an automaton walked over the forward index.
///
/// Forward automata start at the anchor end and move the hit end; backward
/// automata start at the anchor start and move the hit start. Hits follow
/// the anchor order, and within one anchor hit the automaton results in
/// ascending order.
pub struct ForwardIndexMatchSpans {
    anchor: Box<dyn Spans>,
    nfa: ResolvedNfa,
    forward_index: Arc<dyn ForwardIndex>,
    tokens: DocumentTokens,
    /// Automaton results for the current anchor hit
    matches: Vec<i32>,
    match_index: usize,
    anchor_hit: Span,
    state: HitState,
    doc: DocId,
}

impl ForwardIndexMatchSpans {
    pub fn new(anchor: Box<dyn Spans>, nfa: ResolvedNfa, forward_index: Arc<dyn ForwardIndex>) -> Self {
        Self {
            anchor,
            nfa,
            forward_index,
            tokens: DocumentTokens::new(),
            matches: Vec::new(),
            match_index: 0,
            anchor_hit: Span::new(NO_MORE_POSITIONS, NO_MORE_POSITIONS),
            state: HitState::NotStarted,
            doc: NOT_STARTED_DOC,
        }
    }

    fn hit(&self) -> Span {
        let found = self.matches[self.match_index];
        match self.nfa.direction() {
            MatchDirection::Forward => Span::new(self.anchor_hit.start, found),
            MatchDirection::Backward => Span::new(found, self.anchor_hit.end),
        }
    }

    /// From the anchor's current hit on, find one the automaton extends
    fn find_match(&mut self) -> Result<Option<Span>> {
        loop {
            self.anchor_hit = current_span(self.anchor.as_ref());
            if self.anchor_hit.start == NO_MORE_POSITIONS {
                return Ok(None);
            }
            let from = match self.nfa.direction() {
                MatchDirection::Forward => self.anchor_hit.end,
                MatchDirection::Backward => self.anchor_hit.start,
            };
            self.nfa.find_matches(&self.tokens, from, &mut self.matches);
            if !self.matches.is_empty() {
                self.match_index = 0;
                return Ok(Some(self.hit()));
            }
            self.anchor.next_start_position()?;
        }
    }

    fn find_doc(&mut self) -> Result<DocId> {
        loop {
            let doc = self.anchor.doc_id();
            if doc == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                self.state = HitState::Exhausted;
                return Ok(NO_MORE_DOCS);
            }
            self.tokens
                .load(self.forward_index.as_ref(), doc, self.nfa.annotations())?;
            self.anchor.next_start_position()?;
            if let Some(span) = self.find_match()? {
                self.doc = doc;
                self.state = HitState::AtFirstMatchPending(span);
                return Ok(doc);
            }
            self.anchor.next_doc()?;
        }
    }
}

impl Spans for ForwardIndexMatchSpans {
    fn doc_id(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.anchor.next_doc()?;
        self.find_doc()
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let target = forward_target(self.doc, target);
        let current = self.anchor.doc_id();
        if current == NOT_STARTED_DOC || current < target {
            self.anchor.advance(target)?;
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
        let hit = if self.match_index + 1 < self.matches.len() {
            self.match_index += 1;
            Some(self.hit())
        } else {
            self.anchor.next_start_position()?;
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
        self.anchor.set_context(context);
    }

    fn get_captured_groups(&self, groups: &mut [Option<Span>]) {
        self.anchor.get_captured_groups(groups);
    }

    fn cost(&self) -> u64 {
        self.anchor.cost()
    }
}
