//! Static guarantees about the hits a node produces.
//!
//! The rewrite engine and cursor creation rely on these to pick algorithms
//! and to decide where explicit sorting is needed. A claim here that the
//! cursor does not honour is a correctness bug.

use super::QueryNode;
use crate::nfa::MatchDirection;
use crate::spans::Direction;
use crate::types::SortBy;

/// Shape of a node's hit stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub same_length: bool,
    pub min_length: u32,
    pub max_length: Option<u32>,
    pub start_sorted: bool,
    pub end_sorted: bool,
    pub unique_start: bool,
    pub unique_end: bool,
    pub all_unique: bool,
    pub matches_empty: bool,
}

impl Shape {
    /// Hits of one fixed length, sorted and unique in every respect
    fn fixed(length: u32) -> Self {
        Shape {
            same_length: true,
            min_length: length,
            max_length: Some(length),
            start_sorted: true,
            end_sorted: true,
            unique_start: true,
            unique_end: true,
            all_unique: true,
            matches_empty: false,
        }
    }

    /// Shape of hits re-sorted by start and deduplicated
    fn normalized(self) -> Self {
        Shape {
            start_sorted: true,
            end_sorted: self.same_length,
            unique_start: self.same_length,
            unique_end: self.same_length,
            all_unique: true,
            ..self
        }
    }
}

/// Shape of the concatenation of hit streams with the given shapes
pub(crate) fn sequence_shape(shapes: &[Shape]) -> Shape {
    Shape {
        same_length: shapes.iter().all(|s| s.same_length),
        min_length: shapes.iter().map(|s| s.min_length).fold(0, u32::saturating_add),
        max_length: shapes.iter().map(|s| s.max_length).fold(Some(0), add_max),
        start_sorted: true,
        end_sorted: false,
        unique_start: false,
        unique_end: false,
        all_unique: true,
        matches_empty: shapes.iter().all(|s| s.matches_empty),
    }
    .normalized()
}

pub(crate) fn add_max(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    Some(a?.saturating_add(b?))
}

pub(crate) fn mul_max(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    Some(a?.saturating_mul(b?))
}

/// Static properties of a query node
pub trait ShapeProperties {
    fn shape(&self) -> Shape;

    fn hits_all_same_length(&self) -> bool {
        self.shape().same_length
    }

    fn hits_length_min(&self) -> u32 {
        self.shape().min_length
    }

    fn hits_length_max(&self) -> Option<u32> {
        self.shape().max_length
    }

    fn hits_start_sorted(&self) -> bool {
        self.shape().start_sorted
    }

    fn hits_end_sorted(&self) -> bool {
        self.shape().end_sorted
    }

    fn hits_unique_start(&self) -> bool {
        self.shape().unique_start
    }

    fn hits_unique_end(&self) -> bool {
        self.shape().unique_end
    }

    fn hits_all_unique(&self) -> bool {
        self.shape().all_unique
    }

    fn matches_empty_sequence(&self) -> bool {
        self.shape().matches_empty
    }

    /// Whether the node can be compiled into a token automaton
    fn can_make_nfa(&self) -> bool;
}

impl ShapeProperties for QueryNode {
    fn shape(&self) -> Shape {
        match self {
            QueryNode::Term { .. } | QueryNode::MultiTerm { .. } | QueryNode::Not { .. } => {
                Shape::fixed(1)
            }
            QueryNode::NoHits { .. } => Shape::fixed(0),
            QueryNode::AnyToken { min, max, .. } => {
                let same = *max == Some(*min);
                Shape {
                    same_length: same,
                    min_length: *min,
                    max_length: *max,
                    start_sorted: true,
                    end_sorted: same,
                    unique_start: same,
                    unique_end: same,
                    all_unique: true,
                    matches_empty: *min == 0,
                }
            }
            QueryNode::Tags { .. } => Shape {
                same_length: false,
                min_length: 0,
                max_length: None,
                start_sorted: true,
                end_sorted: false,
                unique_start: false,
                unique_end: false,
                all_unique: false,
                matches_empty: false,
            },
            QueryNode::Sequence(clauses) => {
                let shapes: Vec<Shape> = clauses.iter().map(|c| c.shape()).collect();
                sequence_shape(&shapes)
            }
            QueryNode::Repetition { clause, min, max } => {
                let c = clause.shape();
                Shape {
                    same_length: c.same_length && *max == Some(*min),
                    min_length: c.min_length.saturating_mul(*min),
                    max_length: mul_max(c.max_length, *max),
                    start_sorted: true,
                    end_sorted: false,
                    unique_start: false,
                    unique_end: false,
                    all_unique: true,
                    matches_empty: *min == 0 || c.matches_empty,
                }
                .normalized()
            }
            QueryNode::Or(clauses) => {
                let shapes: Vec<Shape> = clauses.iter().map(|c| c.shape()).collect();
                let min_length = shapes.iter().map(|s| s.min_length).min().unwrap_or(0);
                let max_length = shapes
                    .iter()
                    .map(|s| s.max_length)
                    .try_fold(0u32, |acc, m| m.map(|m| acc.max(m)));
                let same = shapes.iter().all(|s| s.same_length) && max_length == Some(min_length);
                if let [single] = shapes.as_slice() {
                    if single.start_sorted {
                        return *single;
                    }
                    return Shape {
                        start_sorted: true,
                        end_sorted: single.same_length,
                        ..*single
                    };
                }
                Shape {
                    same_length: same,
                    min_length,
                    max_length,
                    start_sorted: true,
                    end_sorted: same,
                    unique_start: false,
                    unique_end: false,
                    all_unique: false,
                    matches_empty: shapes.iter().any(|s| s.matches_empty),
                }
            }
            QueryNode::AndNot { include, .. } => {
                let shapes: Vec<Shape> = include.iter().map(|c| c.shape()).collect();
                if shapes.is_empty() {
                    return Shape::fixed(1);
                }
                let any_same = shapes.iter().any(|s| s.same_length);
                Shape {
                    same_length: any_same,
                    min_length: shapes.iter().map(|s| s.min_length).max().unwrap_or(0),
                    max_length: shapes.iter().filter_map(|s| s.max_length).min(),
                    start_sorted: true,
                    end_sorted: any_same,
                    unique_start: shapes.iter().any(|s| s.unique_start),
                    unique_end: shapes.iter().any(|s| s.unique_end),
                    all_unique: shapes.iter().any(|s| s.all_unique),
                    matches_empty: shapes.iter().all(|s| s.matches_empty),
                }
            }
            QueryNode::PositionFilter { producer, .. } => producer.shape(),
            QueryNode::Expansion {
                clause,
                direction,
                min,
                max,
            } => {
                let c = clause.shape();
                let fixed = *max == Some(*min);
                let start_sorted = match direction {
                    Direction::Right => c.start_sorted && (c.unique_start || fixed),
                    Direction::Left => c.start_sorted && fixed,
                };
                Shape {
                    same_length: c.same_length && fixed,
                    min_length: c.min_length.saturating_add(*min),
                    max_length: add_max(c.max_length, *max),
                    start_sorted,
                    end_sorted: c.end_sorted && fixed,
                    unique_start: c.unique_start && fixed,
                    unique_end: c.unique_end && fixed,
                    all_unique: c.all_unique && (fixed || c.same_length),
                    matches_empty: c.matches_empty && *min == 0,
                }
            }
            QueryNode::Edge { clause, trailing } => {
                let c = clause.shape();
                let (sorted, unique) = if *trailing {
                    (c.end_sorted, c.unique_end)
                } else {
                    (c.start_sorted, c.unique_start)
                };
                Shape {
                    same_length: true,
                    min_length: 0,
                    max_length: Some(0),
                    start_sorted: sorted,
                    end_sorted: sorted,
                    unique_start: unique,
                    unique_end: unique,
                    all_unique: unique,
                    matches_empty: false,
                }
            }
            QueryNode::CaptureGroup { clause, .. } | QueryNode::Constrained { clause, .. } => {
                clause.shape()
            }
            QueryNode::Sorted { clause, by, unique } => {
                let c = clause.shape();
                let (start_sorted, end_sorted) = match by {
                    SortBy::Start => (true, c.same_length),
                    SortBy::End => (c.same_length, true),
                };
                Shape {
                    start_sorted,
                    end_sorted,
                    all_unique: *unique || c.all_unique,
                    ..c
                }
            }
            QueryNode::Unique(clause) => Shape {
                all_unique: true,
                ..clause.shape()
            },
            QueryNode::ForwardIndexMatch {
                anchor,
                fragment,
                direction,
                ..
            } => {
                let a = anchor.shape();
                let f = fragment.shape();
                let forward = *direction == MatchDirection::Forward;
                let start_sorted =
                    a.start_sorted && (f.same_length || (forward && a.unique_start));
                Shape {
                    same_length: a.same_length && f.same_length,
                    min_length: a.min_length.saturating_add(f.min_length),
                    max_length: add_max(a.max_length, f.max_length),
                    start_sorted,
                    end_sorted: a.end_sorted && a.same_length && f.same_length,
                    unique_start: a.unique_start && f.same_length,
                    unique_end: a.unique_end && f.same_length,
                    all_unique: a.all_unique && f.same_length,
                    matches_empty: false,
                }
            }
        }
    }

    fn can_make_nfa(&self) -> bool {
        match self {
            QueryNode::Term { .. } | QueryNode::AnyToken { .. } => true,
            QueryNode::MultiTerm { expansion, .. } => expansion.is_some(),
            QueryNode::Sequence(clauses) | QueryNode::Or(clauses) => {
                clauses.iter().all(|c| c.can_make_nfa())
            }
            QueryNode::Repetition { clause, .. } | QueryNode::Expansion { clause, .. } => {
                clause.can_make_nfa()
            }
            QueryNode::AndNot { include, exclude } => {
                exclude.is_empty() && !include.is_empty() && include.iter().all(|c| c.can_make_nfa())
            }
            QueryNode::Not { clause: Some(clause), .. } => matches!(
                clause.as_ref(),
                QueryNode::Term { .. } | QueryNode::MultiTerm { expansion: Some(_), .. }
            ),
            _ => false,
        }
    }
}
