//! Token automata for forward-index matching.
//!
//! A query fragment is compiled into an [`Nfa`] whose token tests still hold
//! term strings, so it can live inside a query tree that spans segments. Per
//! segment it is resolved against the forward index into a [`ResolvedNfa`]
//! whose tests compare term ids, and then walked from anchor positions over
//! the token ids of each document.

pub mod builder;
pub mod matcher;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

pub use builder::NfaBuilder;
pub use matcher::{DocumentTokens, ResolvedNfa};

/// Index of a state in its automaton
pub type StateId = usize;

/// Which way an automaton walks from its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchDirection {
    /// From the anchor hit's end towards the document end
    Forward,
    /// From the anchor hit's start towards the document start
    Backward,
}

/// Test applied to the token at the current position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMatcher {
    pub annotation: String,
    pub terms: Vec<String>,
    /// Match any token except the listed terms
    pub negate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NfaState {
    Token { matcher: TokenMatcher, next: StateId },
    Any { next: StateId },
    Or { branches: Vec<StateId> },
    /// Every branch must match the same stretch; each branch ends in its own `Match`
    And { branches: Vec<StateId>, next: StateId },
    Match,
}

/// Compiled automaton; term tests are still strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nfa {
    states: Vec<NfaState>,
    start: StateId,
    direction: MatchDirection,
}

impl Nfa {
    pub(crate) fn new(states: Vec<NfaState>, start: StateId, direction: MatchDirection) -> Self {
        Self {
            states,
            start,
            direction,
        }
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn states(&self) -> &[NfaState] {
        &self.states
    }

    pub fn direction(&self) -> MatchDirection {
        self.direction
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Annotations the token tests read, in first-use order
    pub fn annotations(&self) -> Vec<String> {
        let mut annotations: Vec<String> = Vec::new();
        for state in &self.states {
            if let NfaState::Token { matcher, .. } = state {
                if !annotations.contains(&matcher.annotation) {
                    annotations.push(matcher.annotation.clone());
                }
            }
        }
        annotations
    }

    /// Whether `Match` is reachable from the start without consuming a token
    pub fn matches_empty(&self) -> bool {
        self.reaches_match_without_tokens(self.start, &mut Vec::new())
    }

    fn reaches_match_without_tokens(&self, state: StateId, visiting: &mut Vec<StateId>) -> bool {
        if visiting.contains(&state) {
            return false;
        }
        visiting.push(state);
        let found = match &self.states[state] {
            NfaState::Match => true,
            NfaState::Token { .. } | NfaState::Any { .. } => false,
            NfaState::Or { branches } => branches
                .iter()
                .any(|&b| self.reaches_match_without_tokens(b, visiting)),
            NfaState::And { branches, next } => {
                branches
                    .iter()
                    .all(|&b| self.reaches_match_without_tokens(b, &mut Vec::new()))
                    && self.reaches_match_without_tokens(*next, visiting)
            }
        };
        visiting.pop();
        found
    }
}
