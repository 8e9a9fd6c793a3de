use std::collections::{BTreeSet, HashSet};

use super::{MatchDirection, Nfa, NfaState, StateId};
use crate::error::Result;
use crate::index::{ForwardIndex, TermId};
use crate::types::DocId;

#[derive(Debug, Clone)]
enum ResolvedState {
    Token {
        annotation: usize,
        /// Sorted term ids; terms absent from the segment are dropped
        terms: Vec<TermId>,
        negate: bool,
        next: StateId,
    },
    Any {
        next: StateId,
    },
    Or {
        branches: Vec<StateId>,
    },
    And {
        branches: Vec<StateId>,
        next: StateId,
    },
    Match,
}

/// Automaton with term tests resolved to the term ids of one segment
#[derive(Debug, Clone)]
pub struct ResolvedNfa {
    states: Vec<ResolvedState>,
    start: StateId,
    direction: MatchDirection,
    annotations: Vec<String>,
}

/// Token ids of one document for the annotations an automaton reads
#[derive(Debug, Default)]
pub struct DocumentTokens {
    doc: Option<DocId>,
    length: i32,
    tokens: Vec<Vec<TermId>>,
}

impl DocumentTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the document unless it is already loaded
    pub fn load(&mut self, forward_index: &dyn ForwardIndex, doc: DocId, annotations: &[String]) -> Result<()> {
        if self.doc == Some(doc) {
            return Ok(());
        }
        self.tokens.resize_with(annotations.len(), Vec::new);
        for (slot, annotation) in annotations.iter().enumerate() {
            forward_index.document_tokens(doc, annotation, &mut self.tokens[slot])?;
        }
        self.length = forward_index.doc_length(doc)? as i32;
        self.doc = Some(doc);
        Ok(())
    }

    pub fn length(&self) -> i32 {
        self.length
    }

    /// Token ids of the `slot`-th annotation
    pub fn annotation(&self, slot: usize) -> &[TermId] {
        self.tokens.get(slot).map(|t| t.as_slice()).unwrap_or(&[])
    }

    fn token(&self, slot: usize, position: i32) -> Option<TermId> {
        if position < 0 {
            return None;
        }
        self.tokens.get(slot)?.get(position as usize).copied()
    }
}

impl Nfa {
    /// Resolve term strings against the forward index of a segment
    pub fn resolve(&self, forward_index: &dyn ForwardIndex) -> Result<ResolvedNfa> {
        let annotations = self.annotations();
        let mut states = Vec::with_capacity(self.states().len());
        for state in self.states() {
            let resolved = match state {
                NfaState::Token { matcher, next } => {
                    let mut terms = Vec::with_capacity(matcher.terms.len());
                    for term in &matcher.terms {
                        if let Some(id) = forward_index.term_id(&matcher.annotation, term)? {
                            terms.push(id);
                        }
                    }
                    terms.sort_unstable();
                    terms.dedup();
                    let annotation = annotations
                        .iter()
                        .position(|a| *a == matcher.annotation)
                        .unwrap_or_default();
                    ResolvedState::Token {
                        annotation,
                        terms,
                        negate: matcher.negate,
                        next: *next,
                    }
                }
                NfaState::Any { next } => ResolvedState::Any { next: *next },
                NfaState::Or { branches } => ResolvedState::Or {
                    branches: branches.clone(),
                },
                NfaState::And { branches, next } => ResolvedState::And {
                    branches: branches.clone(),
                    next: *next,
                },
                NfaState::Match => ResolvedState::Match,
            };
            states.push(resolved);
        }
        Ok(ResolvedNfa {
            states,
            start: self.start(),
            direction: self.direction(),
            annotations,
        })
    }
}

impl ResolvedNfa {
    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    pub fn direction(&self) -> MatchDirection {
        self.direction
    }

    /// Every position where a match starting at `anchor` ends, ascending.
    ///
    /// Forward automata read tokens `anchor, anchor + 1, ...` and report exclusive
    /// ends; backward automata read `anchor - 1, anchor - 2, ...` and report starts.
    pub fn find_matches(&self, tokens: &DocumentTokens, anchor: i32, out: &mut Vec<i32>) {
        let mut ends = BTreeSet::new();
        self.walk(self.start, anchor, tokens, &mut ends);
        out.clear();
        out.extend(ends);
    }

    fn step(&self, position: i32) -> (i32, i32) {
        match self.direction {
            MatchDirection::Forward => (position, position + 1),
            MatchDirection::Backward => (position - 1, position - 1),
        }
    }

    fn walk(&self, from: StateId, position: i32, tokens: &DocumentTokens, ends: &mut BTreeSet<i32>) {
        let mut stack = vec![(from, position)];
        let mut visited = HashSet::new();
        while let Some((state, position)) = stack.pop() {
            if !visited.insert((state, position)) {
                continue;
            }
            match &self.states[state] {
                ResolvedState::Match => {
                    ends.insert(position);
                }
                ResolvedState::Token {
                    annotation,
                    terms,
                    negate,
                    next,
                } => {
                    let (read, after) = self.step(position);
                    if let Some(token) = tokens.token(*annotation, read) {
                        if terms.binary_search(&token).is_ok() != *negate {
                            stack.push((*next, after));
                        }
                    }
                }
                ResolvedState::Any { next } => {
                    let (read, after) = self.step(position);
                    if read >= 0 && read < tokens.length() {
                        stack.push((*next, after));
                    }
                }
                ResolvedState::Or { branches } => {
                    stack.extend(branches.iter().map(|&b| (b, position)));
                }
                ResolvedState::And { branches, next } => {
                    let mut common: Option<BTreeSet<i32>> = None;
                    for &branch in branches {
                        let mut branch_ends = BTreeSet::new();
                        self.walk(branch, position, tokens, &mut branch_ends);
                        common = Some(match common {
                            None => branch_ends,
                            Some(c) => c.intersection(&branch_ends).copied().collect(),
                        });
                    }
                    for end in common.unwrap_or_default() {
                        stack.push((*next, end));
                    }
                }
            }
        }
    }
}
