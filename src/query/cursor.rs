//! Turning rewritten query trees into cursors for one segment.

use log::debug;

use super::shape::{sequence_shape, Shape};
use super::{QueryNode, ShapeProperties};
use crate::error::{Result, SpanError};
use crate::index::{SegmentContext, END_TAG_ANNOTATION, TAG_ANNOTATION};
use crate::spans::{
    AndSpans, AnyTokenSpans, CaptureGroupSpans, ConstrainedSpans, EdgeSpans, ExpansionSpans,
    ForwardIndexMatchSpans, NotSpans, OrSpans, PositionFilterSpans, RawSequenceSpans,
    RepetitionSpans, SimpleSequenceSpans, SortedSpans, Spans, TagSpans, TermSpans, UniqueSpans,
};
use crate::types::SortBy;

type Cursor = Box<dyn Spans>;

/// Cursor emitting the clause hits in start order
fn start_sorted(cursor: Cursor, shape: &Shape, reuse_threshold: usize) -> Cursor {
    if shape.start_sorted {
        cursor
    } else {
        Box::new(SortedSpans::new(cursor, SortBy::Start, false, reuse_threshold))
    }
}

impl QueryNode {
    /// Cursor over this node's hits in one segment, `None` when the segment
    /// cannot contain any.
    ///
    /// The tree must have been rewritten: unexpanded multi-terms, attribute
    /// tags and AND-NOT exclusions have no cursor of their own.
    pub fn create_cursor(&self, segment: &SegmentContext) -> Result<Option<Cursor>> {
        let threshold = segment.bucket_reuse_threshold;
        let cursor: Cursor = match self {
            QueryNode::Term { annotation, term, .. } => match segment.index.postings(annotation, term)? {
                Some(postings) => Box::new(TermSpans::new(postings)),
                None => return Ok(None),
            },
            QueryNode::MultiTerm {
                annotation,
                expansion: Some(terms),
                ..
            } => {
                let mut clauses: Vec<Cursor> = Vec::with_capacity(terms.len());
                for term in terms {
                    if let Some(postings) = segment.index.postings(annotation, term)? {
                        clauses.push(Box::new(TermSpans::new(postings)));
                    }
                }
                match clauses.len() {
                    0 => return Ok(None),
                    1 => clauses.remove(0),
                    _ => Box::new(UniqueSpans::new(Box::new(OrSpans::new(clauses)))),
                }
            }
            QueryNode::MultiTerm { pattern, .. } => {
                return Err(SpanError::internal(format!(
                    "pattern '{}' reached cursor creation unexpanded",
                    pattern
                )))
            }
            QueryNode::AnyToken { min, max, .. } => {
                Box::new(AnyTokenSpans::new(segment.index.clone(), *min, *max))
            }
            QueryNode::Tags { name, attributes, .. } => {
                if !attributes.is_empty() {
                    return Err(SpanError::internal(format!(
                        "tag '{}' reached cursor creation with attribute conditions",
                        name
                    )));
                }
                let Some(starts) = segment.index.postings(TAG_ANNOTATION, name)? else {
                    return Ok(None);
                };
                match segment.index.postings(END_TAG_ANNOTATION, name)? {
                    Some(ends) => Box::new(TagSpans::legacy(starts, ends, threshold)),
                    None => Box::new(TagSpans::with_payloads(starts, threshold)),
                }
            }
            QueryNode::Sequence(clauses) => return self.sequence_cursor(clauses, segment),
            QueryNode::Repetition { clause, min, max } => {
                if *min == 0 {
                    return Err(SpanError::internal(
                        "optional repetition reached cursor creation; rewrite the query first",
                    ));
                }
                let Some(inner) = clause.create_cursor(segment)? else {
                    return Ok(None);
                };
                Box::new(RepetitionSpans::new(inner, *min, *max, threshold)?)
            }
            QueryNode::Or(clauses) => {
                let mut cursors: Vec<Cursor> = Vec::with_capacity(clauses.len());
                for clause in clauses {
                    if let Some(cursor) = clause.create_cursor(segment)? {
                        cursors.push(start_sorted(cursor, &clause.shape(), threshold));
                    }
                }
                match cursors.len() {
                    0 => return Ok(None),
                    1 => cursors.remove(0),
                    _ => Box::new(OrSpans::new(cursors)),
                }
            }
            QueryNode::AndNot { include, exclude } => {
                if !exclude.is_empty() {
                    return Err(SpanError::internal(
                        "AND-NOT exclusions reached cursor creation; rewrite the query first",
                    ));
                }
                let mut cursors: Vec<Cursor> = Vec::with_capacity(include.len());
                for clause in include {
                    match clause.create_cursor(segment)? {
                        Some(cursor) => cursors.push(start_sorted(cursor, &clause.shape(), threshold)),
                        None => return Ok(None),
                    }
                }
                match AndSpans::from_clauses(cursors) {
                    Some(cursor) => cursor,
                    None => return Err(SpanError::EmptyAndNot),
                }
            }
            QueryNode::Not { clause, .. } => {
                let inner = match clause {
                    Some(clause) => clause
                        .create_cursor(segment)?
                        .map(|c| start_sorted(c, &clause.shape(), threshold)),
                    None => None,
                };
                Box::new(NotSpans::new(segment.index.clone(), inner))
            }
            QueryNode::PositionFilter {
                producer,
                filter,
                operation,
                invert,
                left_adjust,
                right_adjust,
            } => {
                let Some(producer) = producer.create_cursor(segment)? else {
                    return Ok(None);
                };
                match filter.create_cursor(segment)? {
                    Some(filter) => Box::new(
                        PositionFilterSpans::new(producer, filter, *operation, *invert, threshold)
                            .with_adjustments(*left_adjust, *right_adjust),
                    ),
                    None if *invert => producer,
                    None => return Ok(None),
                }
            }
            QueryNode::Expansion {
                clause,
                direction,
                min,
                max,
            } => {
                let Some(inner) = clause.create_cursor(segment)? else {
                    return Ok(None);
                };
                Box::new(ExpansionSpans::new(
                    inner,
                    segment.index.clone(),
                    *direction,
                    *min,
                    *max,
                ))
            }
            QueryNode::Edge { clause, trailing } => {
                let Some(inner) = clause.create_cursor(segment)? else {
                    return Ok(None);
                };
                Box::new(EdgeSpans::new(inner, *trailing))
            }
            QueryNode::CaptureGroup { clause, name } => {
                let Some(inner) = clause.create_cursor(segment)? else {
                    return Ok(None);
                };
                Box::new(CaptureGroupSpans::new(inner, name.as_str()))
            }
            QueryNode::Constrained { clause, constraint } => {
                let annotations = constraint.annotations();
                let forward_index = segment.forward_index(annotations.first().copied().unwrap_or(""))?;
                let Some(inner) = clause.create_cursor(segment)? else {
                    return Ok(None);
                };
                Box::new(ConstrainedSpans::new(inner, constraint.clone(), forward_index.clone()))
            }
            QueryNode::Sorted { clause, by, unique } => {
                let Some(inner) = clause.create_cursor(segment)? else {
                    return Ok(None);
                };
                Box::new(SortedSpans::new(inner, *by, *unique, threshold))
            }
            QueryNode::Unique(clause) => {
                let Some(inner) = clause.create_cursor(segment)? else {
                    return Ok(None);
                };
                let shape = clause.shape();
                if shape.start_sorted && shape.same_length {
                    Box::new(UniqueSpans::new(inner))
                } else {
                    Box::new(SortedSpans::new(inner, SortBy::Start, true, threshold))
                }
            }
            QueryNode::ForwardIndexMatch { anchor, nfa, .. } => {
                let annotations = nfa.annotations();
                let forward_index = segment.forward_index(annotations.first().map_or("", String::as_str))?;
                let Some(anchor) = anchor.create_cursor(segment)? else {
                    return Ok(None);
                };
                let resolved = nfa.resolve(forward_index.as_ref())?;
                Box::new(ForwardIndexMatchSpans::new(anchor, resolved, forward_index.clone()))
            }
            QueryNode::NoHits { .. } => return Ok(None),
        };
        Ok(Some(cursor))
    }

    /// Clauses joined pairwise from the left, picking the cheapest join that
    /// keeps the combined stream start-sorted and unique.
    fn sequence_cursor(&self, clauses: &[QueryNode], segment: &SegmentContext) -> Result<Option<Cursor>> {
        let threshold = segment.bucket_reuse_threshold;
        let Some((first, rest)) = clauses.split_first() else {
            return Err(SpanError::NoClauses("sequence"));
        };
        let Some(mut cursor) = first.create_cursor(segment)? else {
            return Ok(None);
        };
        let mut shape = first.shape();
        for clause in rest {
            let Some(right) = clause.create_cursor(segment)? else {
                return Ok(None);
            };
            let right_shape = clause.shape();
            cursor = join(cursor, &shape, right, &right_shape, threshold);
            shape = sequence_shape(&[shape, right_shape]);
        }
        Ok(Some(cursor))
    }
}

fn join(left: Cursor, ls: &Shape, right: Cursor, rs: &Shape, threshold: usize) -> Cursor {
    let simple = ls.end_sorted && ls.unique_end && rs.start_sorted && rs.unique_start;
    debug!("Sequence join: {}", if simple { "simple" } else { "raw" });
    let joined: Cursor = if simple {
        Box::new(SimpleSequenceSpans::new(left, right))
    } else {
        let left = if ls.end_sorted {
            left
        } else {
            Box::new(SortedSpans::new(left, SortBy::End, false, threshold))
        };
        let right = start_sorted(right, rs, threshold);
        Box::new(RawSequenceSpans::new(left, right, threshold))
    };
    let ordered = ls.same_length && rs.same_length && (simple || (ls.all_unique && rs.all_unique));
    if ordered {
        joined
    } else {
        Box::new(SortedSpans::new(joined, SortBy::Start, true, threshold))
    }
}
