use log::debug;

use super::{MatchDirection, Nfa, NfaState, StateId, TokenMatcher};
use crate::error::{Result, SpanError};
use crate::query::{QueryNode, ShapeProperties};
use crate::spans::Direction;

/// Compiles query fragments into automata.
///
/// States are built back to front: compiling a node takes the state to
/// continue with and returns the node's entry state. A backward automaton is
/// the same fragment compiled with every sequence reversed.
pub struct NfaBuilder {
    states: Vec<NfaState>,
    max_states: usize,
    backward: bool,
}

impl NfaBuilder {
    pub fn build(fragment: &QueryNode, direction: MatchDirection, max_states: usize) -> Result<Nfa> {
        if !fragment.can_make_nfa() {
            return Err(SpanError::NotAutomatonCapable(fragment.name().to_string()));
        }
        if fragment.matches_empty_sequence() {
            return Err(SpanError::EmptyMatchingAutomaton);
        }
        let mut builder = NfaBuilder {
            states: Vec::new(),
            max_states,
            backward: direction == MatchDirection::Backward,
        };
        let accept = builder.add(NfaState::Match)?;
        let start = builder.compile(fragment, accept)?;
        debug!(
            "Built {:?} automaton with {} states for {} fragment",
            direction,
            builder.states.len(),
            fragment.name()
        );
        Ok(Nfa::new(builder.states, start, direction))
    }

    fn add(&mut self, state: NfaState) -> Result<StateId> {
        if self.states.len() >= self.max_states {
            return Err(SpanError::PatternTooLarge {
                limit: self.max_states,
            });
        }
        self.states.push(state);
        Ok(self.states.len() - 1)
    }

    fn token(&mut self, annotation: &str, terms: Vec<String>, negate: bool, next: StateId) -> Result<StateId> {
        self.add(NfaState::Token {
            matcher: TokenMatcher {
                annotation: annotation.to_string(),
                terms,
                negate,
            },
            next,
        })
    }

    fn compile(&mut self, node: &QueryNode, next: StateId) -> Result<StateId> {
        match node {
            QueryNode::Term { annotation, term, .. } => {
                self.token(annotation, vec![term.clone()], false, next)
            }
            QueryNode::MultiTerm {
                annotation,
                expansion: Some(terms),
                ..
            } => self.token(annotation, terms.clone(), false, next),
            QueryNode::AnyToken { min, max, .. } => {
                self.repeat(&mut |b, n| b.add(NfaState::Any { next: n }), *min, *max, next)
            }
            QueryNode::Sequence(clauses) => self.compile_sequence(clauses.iter(), next),
            QueryNode::Or(clauses) => {
                let branches = clauses
                    .iter()
                    .map(|c| self.compile(c, next))
                    .collect::<Result<Vec<_>>>()?;
                self.add(NfaState::Or { branches })
            }
            QueryNode::Repetition { clause, min, max } => {
                self.repeat(&mut |b, n| b.compile(clause, n), *min, *max, next)
            }
            QueryNode::AndNot { include, exclude } if exclude.is_empty() => {
                let mut branches = Vec::with_capacity(include.len());
                for clause in include {
                    let accept = self.add(NfaState::Match)?;
                    branches.push(self.compile(clause, accept)?);
                }
                self.add(NfaState::And { branches, next })
            }
            QueryNode::Not {
                clause: Some(clause),
                ..
            } => match clause.as_ref() {
                QueryNode::Term { annotation, term, .. } => {
                    self.token(annotation, vec![term.clone()], true, next)
                }
                QueryNode::MultiTerm {
                    annotation,
                    expansion: Some(terms),
                    ..
                } => self.token(annotation, terms.clone(), true, next),
                other => Err(SpanError::NotAutomatonCapable(format!("not({})", other.name()))),
            },
            QueryNode::Expansion {
                clause,
                direction,
                min,
                max,
            } => {
                let field = clause.field();
                let gap = QueryNode::AnyToken {
                    field: field.to_string(),
                    min: *min,
                    max: *max,
                };
                let parts = match direction {
                    Direction::Right => [clause.as_ref(), &gap],
                    Direction::Left => [&gap, clause.as_ref()],
                };
                self.compile_sequence(parts.into_iter(), next)
            }
            other => Err(SpanError::NotAutomatonCapable(other.name().to_string())),
        }
    }

    fn compile_sequence<'a, I>(&mut self, clauses: I, next: StateId) -> Result<StateId>
    where
        I: DoubleEndedIterator<Item = &'a QueryNode>,
    {
        let mut current = next;
        if self.backward {
            for clause in clauses {
                current = self.compile(clause, current)?;
            }
        } else {
            for clause in clauses.rev() {
                current = self.compile(clause, current)?;
            }
        }
        Ok(current)
    }

    /// `min` mandatory copies of a unit followed by `max - min` optional ones, or a loop if unbounded
    fn repeat(
        &mut self,
        unit: &mut dyn FnMut(&mut Self, StateId) -> Result<StateId>,
        min: u32,
        max: Option<u32>,
        next: StateId,
    ) -> Result<StateId> {
        let mut current = match max {
            None => {
                let repeat = self.add(NfaState::Or { branches: Vec::new() })?;
                let body = unit(self, repeat)?;
                self.states[repeat] = NfaState::Or {
                    branches: vec![body, next],
                };
                repeat
            }
            Some(max) => {
                let mut current = next;
                for _ in min..max {
                    let body = unit(self, current)?;
                    current = self.add(NfaState::Or {
                        branches: vec![body, next],
                    })?;
                }
                current
            }
        };
        for _ in 0..min {
            current = unit(self, current)?;
        }
        Ok(current)
    }
}
