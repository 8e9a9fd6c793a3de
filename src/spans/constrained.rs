use std::sync::Arc;

use super::{forward_target, HitQueryContext, HitState, Spans};
use crate::error::Result;
use crate::index::ForwardIndex;
use crate::nfa::DocumentTokens;
use crate::query::GroupConstraint;
use crate::types::{DocId, Span, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Group constraint with names replaced by capture slots and annotation indexes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedConstraint {
    SameTokens {
        left: Option<usize>,
        right: Option<usize>,
        annotation: usize,
    },
    And(Vec<ResolvedConstraint>),
    Or(Vec<ResolvedConstraint>),
    Not(Box<ResolvedConstraint>),
}

impl ResolvedConstraint {
    pub fn resolve(constraint: &GroupConstraint, context: &HitQueryContext, annotations: &[String]) -> Self {
        let resolve_all = |cs: &[GroupConstraint]| {
            cs.iter()
                .map(|c| Self::resolve(c, context, annotations))
                .collect()
        };
        match constraint {
            GroupConstraint::SameTokens {
                left,
                right,
                annotation,
            } => ResolvedConstraint::SameTokens {
                left: context.slot(left),
                right: context.slot(right),
                annotation: annotations
                    .iter()
                    .position(|a| a == annotation)
                    .unwrap_or_default(),
            },
            GroupConstraint::And(cs) => ResolvedConstraint::And(resolve_all(cs)),
            GroupConstraint::Or(cs) => ResolvedConstraint::Or(resolve_all(cs)),
            GroupConstraint::Not(c) => {
                ResolvedConstraint::Not(Box::new(Self::resolve(c, context, annotations)))
            }
        }
    }

    /// A group that did not participate in the hit never satisfies a comparison
    pub fn evaluate(&self, groups: &[Option<Span>], tokens: &DocumentTokens) -> bool {
        match self {
            ResolvedConstraint::SameTokens {
                left,
                right,
                annotation,
            } => {
                let group = |slot: &Option<usize>| slot.and_then(|s| groups.get(s).copied().flatten());
                match (group(left), group(right)) {
                    (Some(a), Some(b)) => {
                        let ids = tokens.annotation(*annotation);
                        a.length() == b.length() && slice(ids, a).is_some() && slice(ids, a) == slice(ids, b)
                    }
                    _ => false,
                }
            }
            ResolvedConstraint::And(cs) => cs.iter().all(|c| c.evaluate(groups, tokens)),
            ResolvedConstraint::Or(cs) => cs.iter().any(|c| c.evaluate(groups, tokens)),
            ResolvedConstraint::Not(c) => !c.evaluate(groups, tokens),
        }
    }
}

fn slice<T>(ids: &[T], span: Span) -> Option<&[T]> {
    if span.start < 0 || span.end < span.start {
        return None;
    }
    ids.get(span.start as usize..span.end as usize)
}

/// Clause hits whose captured groups satisfy a constraint over forward index tokens
pub struct ConstrainedSpans {
    clause: Box<dyn Spans>,
    constraint: GroupConstraint,
    resolved: Option<ResolvedConstraint>,
    annotations: Vec<String>,
    forward_index: Arc<dyn ForwardIndex>,
    tokens: DocumentTokens,
    groups: Vec<Option<Span>>,
    state: HitState,
    doc: DocId,
}

impl ConstrainedSpans {
    pub fn new(clause: Box<dyn Spans>, constraint: GroupConstraint, forward_index: Arc<dyn ForwardIndex>) -> Self {
        let annotations = constraint.annotations().into_iter().map(str::to_string).collect();
        Self {
            clause,
            constraint,
            resolved: None,
            annotations,
            forward_index,
            tokens: DocumentTokens::new(),
            groups: Vec::new(),
            state: HitState::NotStarted,
            doc: NOT_STARTED_DOC,
        }
    }

    fn accepts_current(&mut self) -> bool {
        let Some(resolved) = self.resolved.as_ref() else {
            return false;
        };
        self.groups.iter_mut().for_each(|g| *g = None);
        self.clause.get_captured_groups(&mut self.groups);
        resolved.evaluate(&self.groups, &self.tokens)
    }

    /// From the clause's next hit on, the first accepted one
    fn find_match(&mut self) -> Result<Option<Span>> {
        loop {
            let start = self.clause.next_start_position()?;
            if start == NO_MORE_POSITIONS {
                return Ok(None);
            }
            if self.accepts_current() {
                return Ok(Some(Span::new(start, self.clause.end_position())));
            }
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
            self.tokens
                .load(self.forward_index.as_ref(), doc, &self.annotations)?;
            if let Some(span) = self.find_match()? {
                self.doc = doc;
                self.state = HitState::AtFirstMatchPending(span);
                return Ok(doc);
            }
            self.clause.next_doc()?;
        }
    }
}

impl Spans for ConstrainedSpans {
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
        self.clause.set_context(context);
        self.resolved = Some(ResolvedConstraint::resolve(
            &self.constraint,
            context,
            &self.annotations,
        ));
        self.groups = vec![None; context.num_groups()];
    }

    fn get_captured_groups(&self, groups: &mut [Option<Span>]) {
        self.clause.get_captured_groups(groups);
    }

    fn cost(&self) -> u64 {
        self.clause.cost()
    }
}
