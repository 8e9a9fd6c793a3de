//! Query rewriting against index-wide statistics.
//!
//! Rewriting is a pure function of the tree and the statistics. Nodes are
//! rewritten bottom-up and the whole pass is repeated until the tree stops
//! changing, so rewriting an already rewritten tree returns it unchanged.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::cost::{estimated_hits, prefer_automaton};
use super::shape::{add_max, mul_max};
use super::{QueryNode, ShapeProperties};
use crate::error::{Result, SpanError};
use crate::index::IndexStats;
use crate::nfa::MatchDirection;
use crate::spans::{Direction, FilterOperation};
use crate::types::SortBy;

/// Passes after which rewriting gives up looking for a fixed point
const MAX_REWRITE_PASSES: usize = 32;

/// Knobs of the rewrite engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteOptions {
    /// Whether sequence clauses may be combined into forward index automata
    pub forward_index_enabled: bool,
    /// Multi-term clauses with at most this many literal characters always use an automaton
    pub nfa_fixed_char_threshold: usize,
    /// Weight of one automaton step relative to one postings hit
    pub nfa_cost_factor: u64,
    pub max_nfa_states: usize,
    pub max_term_expansions: usize,
    /// Annotation whose token count stands for "every token"
    pub default_annotation: String,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            forward_index_enabled: true,
            nfa_fixed_char_threshold: 4,
            nfa_cost_factor: 10,
            max_nfa_states: 10_000,
            max_term_expansions: 1024,
            default_annotation: "word".to_string(),
        }
    }
}

impl QueryNode {
    /// Rewrite into an equivalent, cheaper tree ready for cursor creation
    pub fn rewrite(&self, stats: &dyn IndexStats, options: &RewriteOptions) -> Result<QueryNode> {
        let rewriter = Rewriter { stats, options };
        let mut node = self.clone();
        for pass in 0..MAX_REWRITE_PASSES {
            let next = rewriter.normalize_root(rewriter.rewrite(&node)?);
            if next == node {
                debug!("Rewrite reached a fixed point after {} passes", pass + 1);
                return Ok(node);
            }
            node = next;
        }
        warn!(
            "Rewrite did not settle after {} passes, using last tree",
            MAX_REWRITE_PASSES
        );
        Ok(node)
    }

    /// Equivalent node that never matches the empty sequence, `None` if it only matches it
    pub fn without_empty(&self) -> Option<QueryNode> {
        if !self.matches_empty_sequence() {
            return Some(self.clone());
        }
        match self {
            QueryNode::AnyToken { field, max, .. } => Some(QueryNode::AnyToken {
                field: field.clone(),
                min: 1,
                max: *max,
            }),
            QueryNode::Repetition { clause, max, .. } => Some(QueryNode::Repetition {
                clause: Box::new(clause.without_empty()?),
                min: 1,
                max: *max,
            }),
            QueryNode::Or(clauses) => {
                let clauses: Vec<QueryNode> = clauses.iter().filter_map(|c| c.without_empty()).collect();
                or_of(clauses)
            }
            QueryNode::Sequence(clauses) => sequence_without_empty(clauses),
            QueryNode::AndNot { include, exclude } => {
                let include = include
                    .iter()
                    .map(|c| c.without_empty())
                    .collect::<Option<Vec<_>>>()?;
                Some(QueryNode::AndNot {
                    include,
                    exclude: exclude.clone(),
                })
            }
            QueryNode::Expansion {
                clause,
                direction,
                max,
                ..
            } => {
                let gaps = (*max != Some(0)).then(|| QueryNode::AnyToken {
                    field: clause.field().to_string(),
                    min: 1,
                    max: *max,
                });
                let nonempty = clause.without_empty().map(|c| QueryNode::Expansion {
                    clause: Box::new(c),
                    direction: *direction,
                    min: 0,
                    max: *max,
                });
                or_of(nonempty.into_iter().chain(gaps).collect())
            }
            QueryNode::PositionFilter {
                producer,
                filter,
                operation,
                invert,
                left_adjust,
                right_adjust,
            } => Some(QueryNode::PositionFilter {
                producer: Box::new(producer.without_empty()?),
                filter: filter.clone(),
                operation: *operation,
                invert: *invert,
                left_adjust: *left_adjust,
                right_adjust: *right_adjust,
            }),
            QueryNode::CaptureGroup { clause, name } => Some(QueryNode::CaptureGroup {
                clause: Box::new(clause.without_empty()?),
                name: name.clone(),
            }),
            QueryNode::Constrained { clause, constraint } => Some(QueryNode::Constrained {
                clause: Box::new(clause.without_empty()?),
                constraint: constraint.clone(),
            }),
            QueryNode::Sorted { clause, by, unique } => Some(QueryNode::Sorted {
                clause: Box::new(clause.without_empty()?),
                by: *by,
                unique: *unique,
            }),
            QueryNode::Unique(clause) => Some(QueryNode::Unique(Box::new(clause.without_empty()?))),
            other => Some(other.clone()),
        }
    }
}

/// Non-empty matches of a sequence whose clauses all match the empty sequence:
/// either the first clause matches something, or it is empty and the rest is not.
fn sequence_without_empty(clauses: &[QueryNode]) -> Option<QueryNode> {
    let (first, rest) = clauses.split_first()?;
    if rest.is_empty() {
        return first.without_empty();
    }
    let mut options = Vec::new();
    if let Some(first) = first.without_empty() {
        let mut with_first = vec![first];
        with_first.extend(rest.iter().cloned());
        options.push(QueryNode::Sequence(with_first));
    }
    if let Some(rest) = sequence_without_empty(rest) {
        options.push(rest);
    }
    or_of(options)
}

fn or_of(mut clauses: Vec<QueryNode>) -> Option<QueryNode> {
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(QueryNode::Or(clauses)),
    }
}

fn sequence_of(mut clauses: Vec<QueryNode>) -> QueryNode {
    if clauses.len() == 1 {
        if let Some(single) = clauses.pop() {
            return single;
        }
    }
    QueryNode::Sequence(clauses)
}

/// Hits are single tokens
fn single_token(node: &QueryNode) -> bool {
    let shape = node.shape();
    shape.same_length && shape.min_length == 1
}

fn is_no_hits(node: &QueryNode) -> bool {
    matches!(node, QueryNode::NoHits { .. })
}

/// Clause and bounds of a node seen as a repetition
fn as_repetition(node: &QueryNode) -> (&QueryNode, u32, Option<u32>) {
    match node {
        QueryNode::Repetition { clause, min, max } => (clause, *min, *max),
        other => (other, 1, Some(1)),
    }
}

struct Rewriter<'a> {
    stats: &'a dyn IndexStats,
    options: &'a RewriteOptions,
}

impl Rewriter<'_> {
    /// Top-level hits must not be empty and must come out sorted and unique
    fn normalize_root(&self, node: QueryNode) -> QueryNode {
        let node = if node.matches_empty_sequence() {
            node.without_empty()
                .unwrap_or_else(|| QueryNode::no_hits(node.field()))
        } else {
            node
        };
        let shape = node.shape();
        if shape.start_sorted && shape.all_unique {
            return node;
        }
        match node {
            QueryNode::Sorted { clause, .. } => QueryNode::sorted(*clause, SortBy::Start, true),
            other => QueryNode::sorted(other, SortBy::Start, true),
        }
    }

    fn rewrite(&self, node: &QueryNode) -> Result<QueryNode> {
        let rewritten = match node {
            QueryNode::Term {
                field,
                annotation,
                term,
            } => {
                if self.stats.total_term_freq(annotation, term)? == 0 {
                    QueryNode::no_hits(field)
                } else {
                    node.clone()
                }
            }
            QueryNode::MultiTerm {
                field,
                annotation,
                kind,
                pattern,
                expansion,
            } => {
                let mut terms = match expansion {
                    Some(terms) => terms.clone(),
                    None => self.stats.expand_terms(
                        annotation,
                        &kind.to_regex(pattern),
                        self.options.max_term_expansions,
                    )?,
                };
                match terms.len() {
                    0 => QueryNode::no_hits(field),
                    1 => QueryNode::term(field, annotation, &terms.remove(0)),
                    _ => QueryNode::MultiTerm {
                        field: field.clone(),
                        annotation: annotation.clone(),
                        kind: *kind,
                        pattern: pattern.clone(),
                        expansion: Some(terms),
                    },
                }
            }
            QueryNode::AnyToken { .. } | QueryNode::NoHits { .. } => node.clone(),
            QueryNode::Tags {
                field,
                name,
                attributes,
            } => self.rewrite_tags(field, name, attributes),
            QueryNode::Sequence(clauses) => self.rewrite_sequence(clauses)?,
            QueryNode::Repetition { clause, min, max } => self.rewrite_repetition(clause, *min, *max)?,
            QueryNode::Or(clauses) => self.rewrite_or(clauses)?,
            QueryNode::AndNot { include, exclude } => self.rewrite_and_not(include, exclude)?,
            QueryNode::Not { field, clause } => match clause {
                None => node.clone(),
                Some(clause) => {
                    // empty hits cover no token
                    let clause = self.rewrite(clause)?.without_empty();
                    QueryNode::Not {
                        field: field.clone(),
                        clause: clause.filter(|c| !is_no_hits(c)).map(Box::new),
                    }
                }
            },
            QueryNode::PositionFilter {
                producer,
                filter,
                operation,
                invert,
                left_adjust,
                right_adjust,
            } => {
                let producer = self.rewrite(producer)?;
                let filter = self.rewrite(filter)?;
                let filter = match filter.without_empty() {
                    Some(filter) => filter,
                    None => QueryNode::no_hits(filter.field()),
                };
                if is_no_hits(&producer) {
                    producer
                } else if is_no_hits(&filter) {
                    if *invert {
                        producer
                    } else {
                        QueryNode::no_hits(producer.field())
                    }
                } else {
                    QueryNode::PositionFilter {
                        producer: Box::new(producer),
                        filter: Box::new(filter),
                        operation: *operation,
                        invert: *invert,
                        left_adjust: *left_adjust,
                        right_adjust: *right_adjust,
                    }
                }
            }
            QueryNode::Expansion {
                clause,
                direction,
                min,
                max,
            } => {
                let clause = self.rewrite(clause)?;
                match clause {
                    c if is_no_hits(&c) => c,
                    c if *min == 0 && *max == Some(0) => c,
                    c if c.matches_empty_sequence() => {
                        // an empty hit expands into every gap of the allowed lengths
                        let gaps = QueryNode::AnyToken {
                            field: c.field().to_string(),
                            min: *min,
                            max: *max,
                        };
                        match c.without_empty() {
                            Some(nonempty) => QueryNode::Or(vec![
                                QueryNode::Expansion {
                                    clause: Box::new(nonempty),
                                    direction: *direction,
                                    min: *min,
                                    max: *max,
                                },
                                gaps,
                            ]),
                            None => gaps,
                        }
                    }
                    QueryNode::Expansion {
                        clause: inner,
                        direction: inner_direction,
                        min: inner_min,
                        max: inner_max,
                    } if inner_direction == *direction => QueryNode::Expansion {
                        clause: inner,
                        direction: *direction,
                        min: min.saturating_add(inner_min),
                        max: add_max(*max, inner_max),
                    },
                    c => QueryNode::Expansion {
                        clause: Box::new(c),
                        direction: *direction,
                        min: *min,
                        max: *max,
                    },
                }
            }
            QueryNode::Edge { clause, trailing } => {
                let clause = self.rewrite(clause)?;
                match clause.without_empty() {
                    Some(clause) if !is_no_hits(&clause) => QueryNode::edge(clause, *trailing),
                    _ => QueryNode::no_hits(clause.field()),
                }
            }
            QueryNode::CaptureGroup { clause, name } => {
                let clause = self.rewrite(clause)?;
                if is_no_hits(&clause) {
                    clause
                } else {
                    QueryNode::capture_group(clause, name)
                }
            }
            QueryNode::Constrained { clause, constraint } => {
                let clause = self.rewrite(clause)?;
                if is_no_hits(&clause) {
                    clause
                } else {
                    QueryNode::Constrained {
                        clause: Box::new(clause),
                        constraint: constraint.clone(),
                    }
                }
            }
            QueryNode::Sorted { clause, by, unique } => self.rewrite_sorted(clause, *by, *unique)?,
            QueryNode::Unique(clause) => {
                let clause = self.rewrite(clause)?;
                let shape = clause.shape();
                if is_no_hits(&clause) || shape.all_unique {
                    clause
                } else if shape.start_sorted && shape.same_length {
                    QueryNode::unique(clause)
                } else {
                    QueryNode::sorted(clause, SortBy::Start, true)
                }
            }
            QueryNode::ForwardIndexMatch {
                anchor,
                fragment,
                direction,
                nfa,
            } => {
                let anchor = self.rewrite(anchor)?;
                if is_no_hits(&anchor) {
                    anchor
                } else {
                    QueryNode::ForwardIndexMatch {
                        anchor: Box::new(anchor),
                        fragment: fragment.clone(),
                        direction: *direction,
                        nfa: nfa.clone(),
                    }
                }
            }
        };
        Ok(rewritten)
    }

    /// Attribute conditions become a filter on the element start
    fn rewrite_tags(&self, field: &str, name: &str, attributes: &BTreeMap<String, String>) -> QueryNode {
        let bare = QueryNode::tags(field, name);
        if attributes.is_empty() {
            return bare;
        }
        let mut terms: Vec<QueryNode> = attributes
            .iter()
            .map(|(attribute, value)| QueryNode::attribute(field, attribute, value))
            .collect();
        let filter = if terms.len() == 1 {
            terms.remove(0)
        } else {
            QueryNode::AndNot {
                include: terms,
                exclude: Vec::new(),
            }
        };
        QueryNode::PositionFilter {
            producer: Box::new(bare),
            filter: Box::new(filter),
            operation: FilterOperation::StartsAt,
            invert: false,
            left_adjust: 0,
            right_adjust: 0,
        }
    }

    fn rewrite_sequence(&self, clauses: &[QueryNode]) -> Result<QueryNode> {
        let mut flat = Vec::with_capacity(clauses.len());
        for clause in clauses {
            match self.rewrite(clause)? {
                QueryNode::Sequence(inner) => flat.extend(inner),
                c if is_no_hits(&c) => return Ok(c),
                c => flat.push(c),
            }
        }
        let flat = fold_repetitions(merge_any_tokens(flat));
        if flat.len() == 1 {
            return Ok(sequence_of(flat));
        }
        // optional clauses split before gaps are absorbed, an expansion keeps no empty hits
        if let Some(index) = flat.iter().position(|c| c.matches_empty_sequence()) {
            return Ok(split_optional(flat, index));
        }
        let flat = absorb_any_tokens(flat);
        if flat.len() == 1 {
            return Ok(sequence_of(flat));
        }
        let flat = match self.combine_with_automaton(&flat)? {
            Some(combined) => combined,
            None => flat,
        };
        Ok(sequence_of(flat))
    }

    /// Replace the first profitable (anchor, fragment) pair of neighbours with an automaton match
    fn combine_with_automaton(&self, clauses: &[QueryNode]) -> Result<Option<Vec<QueryNode>>> {
        if !self.options.forward_index_enabled {
            return Ok(None);
        }
        for i in 0..clauses.len().saturating_sub(1) {
            let (left, right) = (&clauses[i], &clauses[i + 1]);
            let Some(direction) = self.automaton_direction(left, right)? else {
                continue;
            };
            let (anchor, fragment) = match direction {
                MatchDirection::Forward => (left, right),
                MatchDirection::Backward => (right, left),
            };
            match QueryNode::forward_index_match(
                anchor.clone(),
                fragment.clone(),
                direction,
                self.options.max_nfa_states,
            ) {
                Ok(combined) => {
                    debug!(
                        "Matching {} clause by automaton from {} anchor",
                        fragment.name(),
                        anchor.name()
                    );
                    let mut out = clauses[..i].to_vec();
                    out.push(combined);
                    out.extend(clauses[i + 2..].iter().cloned());
                    return Ok(Some(out));
                }
                Err(SpanError::PatternTooLarge { limit }) => {
                    warn!(
                        "Automaton for {} clause exceeds {} states, matching it by postings",
                        fragment.name(),
                        limit
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Which neighbour becomes the automaton, if either should
    fn automaton_direction(&self, left: &QueryNode, right: &QueryNode) -> Result<Option<MatchDirection>> {
        let left_capable = self.automaton_capable(left);
        let right_capable = self.automaton_capable(right);
        let direction = match (left_capable, right_capable) {
            (false, false) => return Ok(None),
            (false, true) => MatchDirection::Forward,
            (true, false) => MatchDirection::Backward,
            (true, true) => {
                let left_hits = estimated_hits(left, self.stats, self.options)?;
                let right_hits = estimated_hits(right, self.stats, self.options)?;
                if left_hits <= right_hits {
                    MatchDirection::Forward
                } else {
                    MatchDirection::Backward
                }
            }
        };
        let (anchor, candidate) = match direction {
            MatchDirection::Forward => (left, right),
            MatchDirection::Backward => (right, left),
        };
        if anchor.matches_empty_sequence() || is_no_hits(anchor) {
            return Ok(None);
        }
        let chosen = prefer_automaton(anchor, candidate, self.stats, self.options)?;
        Ok(chosen.then_some(direction))
    }

    fn automaton_capable(&self, node: &QueryNode) -> bool {
        node.can_make_nfa()
            && !node.matches_empty_sequence()
            && node
                .annotations()
                .iter()
                .all(|a| self.stats.has_forward_index(a))
    }

    fn rewrite_repetition(&self, clause: &QueryNode, min: u32, max: Option<u32>) -> Result<QueryNode> {
        let clause = self.rewrite(clause)?;
        if is_no_hits(&clause) && min > 0 {
            return Ok(clause);
        }
        if min == 1 && max == Some(1) {
            return Ok(clause);
        }
        if clause.matches_empty_sequence() {
            // empty hits pad any run, so only the non-empty ones are repeated
            return Ok(match clause.without_empty() {
                Some(nonempty) => QueryNode::Repetition {
                    clause: Box::new(nonempty),
                    min: 0,
                    max,
                },
                None => clause,
            });
        }
        Ok(match clause {
            QueryNode::Repetition {
                clause: inner,
                min: 1,
                max: inner_max,
            } => QueryNode::Repetition {
                clause: inner,
                min,
                max: mul_max(max, inner_max),
            },
            QueryNode::AnyToken {
                field,
                min: 1,
                max: Some(1),
            } => QueryNode::AnyToken { field, min, max },
            c => QueryNode::Repetition {
                clause: Box::new(c),
                min,
                max,
            },
        })
    }

    fn rewrite_or(&self, clauses: &[QueryNode]) -> Result<QueryNode> {
        let field = clauses.first().map(|c| c.field().to_string()).unwrap_or_default();
        let mut flat: Vec<QueryNode> = Vec::with_capacity(clauses.len());
        for clause in clauses {
            match self.rewrite(clause)? {
                c if is_no_hits(&c) => {}
                QueryNode::Or(inner) => push_unique(&mut flat, inner),
                c => push_unique(&mut flat, [c]),
            }
        }
        if flat.len() > 1 && flat.iter().all(is_negated_token) {
            let include = flat
                .into_iter()
                .filter_map(|c| match c {
                    QueryNode::Not { clause, .. } => clause.map(|c| *c),
                    _ => None,
                })
                .collect();
            return Ok(QueryNode::Not {
                field,
                clause: Some(Box::new(QueryNode::AndNot {
                    include,
                    exclude: Vec::new(),
                })),
            });
        }
        Ok(or_of(flat).unwrap_or_else(|| QueryNode::no_hits(&field)))
    }

    fn rewrite_and_not(&self, include: &[QueryNode], exclude: &[QueryNode]) -> Result<QueryNode> {
        if include.is_empty() && exclude.is_empty() {
            return Err(SpanError::EmptyAndNot);
        }
        let field = include
            .first()
            .or_else(|| exclude.first())
            .map(|c| c.field().to_string())
            .unwrap_or_default();
        let mut inc: Vec<QueryNode> = Vec::new();
        let mut exc: Vec<QueryNode> = Vec::new();
        for clause in include {
            match self.rewrite(clause)? {
                c if is_no_hits(&c) => return Ok(c),
                QueryNode::AndNot {
                    include: more,
                    exclude: less,
                } => {
                    push_unique(&mut inc, more);
                    push_unique(&mut exc, less);
                }
                c => push_unique(&mut inc, [c]),
            }
        }
        for clause in exclude {
            match self.rewrite(clause)? {
                c if is_no_hits(&c) => {}
                QueryNode::Or(alternatives) => push_unique(&mut exc, alternatives),
                c => push_unique(&mut exc, [c]),
            }
        }

        // empty hits neither exclude anything nor survive next to non-empty includes
        exc = exc.iter().filter_map(QueryNode::without_empty).collect();
        if !inc.iter().all(|c| c.matches_empty_sequence()) {
            match inc.iter().map(QueryNode::without_empty).collect::<Option<Vec<_>>>() {
                Some(nonempty) => inc = nonempty,
                None => return Ok(QueryNode::no_hits(&field)),
            }
        }

        // single-token negations among single-token includes are exclusions
        if inc.iter().all(single_token) {
            let (negated, positive): (Vec<QueryNode>, Vec<QueryNode>) =
                inc.into_iter().partition(is_negated_token);
            inc = positive;
            for node in negated {
                if let QueryNode::Not {
                    clause: Some(clause),
                    ..
                } = node
                {
                    push_unique(&mut exc, [*clause]);
                }
            }
        }

        let (single, multi): (Vec<QueryNode>, Vec<QueryNode>) = exc.into_iter().partition(single_token);
        if inc.is_empty() {
            // every token, less the single-token exclusions
            let clause = or_of(single).map(Box::new);
            return Ok(exclude_matches(QueryNode::Not { field, clause }, multi));
        }
        let mut node = if inc.len() == 1 {
            inc.remove(0)
        } else {
            QueryNode::AndNot {
                include: inc,
                exclude: Vec::new(),
            }
        };
        if let Some(filter) = or_of(single) {
            node = QueryNode::PositionFilter {
                producer: Box::new(node),
                filter: Box::new(filter),
                operation: FilterOperation::Containing,
                invert: true,
                left_adjust: 0,
                right_adjust: 0,
            };
        }
        Ok(exclude_matches(node, multi))
    }

    fn rewrite_sorted(&self, clause: &QueryNode, by: SortBy, unique: bool) -> Result<QueryNode> {
        let clause = self.rewrite(clause)?;
        if is_no_hits(&clause) {
            return Ok(clause);
        }
        let shape = clause.shape();
        let sorted = match by {
            SortBy::Start => shape.start_sorted,
            SortBy::End => shape.end_sorted,
        };
        if sorted && (!unique || shape.all_unique) {
            return Ok(clause);
        }
        Ok(match clause {
            QueryNode::Sorted {
                clause: inner,
                unique: inner_unique,
                ..
            } => QueryNode::sorted(*inner, by, unique || inner_unique),
            QueryNode::Unique(inner) => QueryNode::sorted(*inner, by, true),
            c => QueryNode::sorted(c, by, unique),
        })
    }
}

/// Drop producer hits identical to a hit of any multi-token exclusion
fn exclude_matches(producer: QueryNode, multi: Vec<QueryNode>) -> QueryNode {
    match or_of(multi) {
        Some(filter) => QueryNode::PositionFilter {
            producer: Box::new(producer),
            filter: Box::new(filter),
            operation: FilterOperation::Matches,
            invert: true,
            left_adjust: 0,
            right_adjust: 0,
        },
        None => producer,
    }
}

fn is_negated_token(node: &QueryNode) -> bool {
    matches!(node, QueryNode::Not { clause: Some(clause), .. } if single_token(clause))
}

fn push_unique(out: &mut Vec<QueryNode>, nodes: impl IntoIterator<Item = QueryNode>) {
    for node in nodes {
        if !out.contains(&node) {
            out.push(node);
        }
    }
}

/// Neighbouring any-token gaps become one gap
fn merge_any_tokens(clauses: Vec<QueryNode>) -> Vec<QueryNode> {
    let mut out: Vec<QueryNode> = Vec::with_capacity(clauses.len());
    for clause in clauses {
        if let (
            Some(QueryNode::AnyToken {
                min: prev_min,
                max: prev_max,
                ..
            }),
            QueryNode::AnyToken { min, max, .. },
        ) = (out.last_mut(), &clause)
        {
            *prev_min = prev_min.saturating_add(*min);
            *prev_max = add_max(*prev_max, *max);
            continue;
        }
        out.push(clause);
    }
    out
}

/// Neighbouring copies of one clause become a repetition
fn fold_repetitions(clauses: Vec<QueryNode>) -> Vec<QueryNode> {
    let mut out: Vec<QueryNode> = Vec::with_capacity(clauses.len());
    for clause in clauses {
        if let Some(prev) = out.last() {
            let (prev_base, prev_min, prev_max) = as_repetition(prev);
            let (base, min, max) = as_repetition(&clause);
            let foldable = prev_base == base
                && !matches!(base, QueryNode::AnyToken { .. })
                && !base.has_captures();
            if foldable {
                let folded = QueryNode::Repetition {
                    clause: Box::new(base.clone()),
                    min: prev_min.saturating_add(min),
                    max: add_max(prev_max, max),
                };
                out.pop();
                out.push(folded);
                continue;
            }
        }
        out.push(clause);
    }
    out
}

/// Gaps become expansions of the following clause, or of the preceding one at the end
fn absorb_any_tokens(clauses: Vec<QueryNode>) -> Vec<QueryNode> {
    if clauses.len() < 2 {
        return clauses;
    }
    let mut out: Vec<QueryNode> = Vec::with_capacity(clauses.len());
    let mut gap: Option<(u32, Option<u32>)> = None;
    for clause in clauses {
        if let QueryNode::AnyToken { min, max, .. } = clause {
            gap = Some((min, max));
            continue;
        }
        out.push(match gap.take() {
            Some((min, max)) => QueryNode::Expansion {
                clause: Box::new(clause),
                direction: Direction::Left,
                min,
                max,
            },
            None => clause,
        });
    }
    if let Some((min, max)) = gap {
        if let Some(last) = out.pop() {
            out.push(QueryNode::Expansion {
                clause: Box::new(last),
                direction: Direction::Right,
                min,
                max,
            });
        }
    }
    out
}

/// Either the optional clause matches something, or it is left out
fn split_optional(clauses: Vec<QueryNode>, index: usize) -> QueryNode {
    let mut without = clauses.clone();
    without.remove(index);
    let mut alternatives = Vec::with_capacity(2);
    if let Some(nonempty) = clauses[index].without_empty() {
        let mut with = clauses;
        with[index] = nonempty;
        alternatives.push(sequence_of(with));
    }
    alternatives.push(sequence_of(without));
    or_of(alternatives).unwrap_or_else(|| QueryNode::Sequence(Vec::new()))
}
