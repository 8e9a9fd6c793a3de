//! Cost estimates steering the choice between automaton and reverse matching.

use log::debug;

use super::{QueryNode, RewriteOptions, ShapeProperties};
use crate::error::Result;
use crate::index::{IndexStats, TAG_ANNOTATION};

/// Multiplier applied to hit estimates of unbounded expansions
const UNBOUNDED_EXPANSION_FACTOR: u64 = 10;

/// Rough number of hits the node produces across the index
pub fn estimated_hits(node: &QueryNode, stats: &dyn IndexStats, options: &RewriteOptions) -> Result<u64> {
    let hits = match node {
        QueryNode::Term { annotation, term, .. } => stats.total_term_freq(annotation, term)?,
        QueryNode::MultiTerm {
            annotation,
            expansion: Some(terms),
            ..
        } => {
            let mut total = 0u64;
            for term in terms {
                total = total.saturating_add(stats.total_term_freq(annotation, term)?);
            }
            total
        }
        QueryNode::MultiTerm { annotation, .. } => stats.sum_total_term_freq(annotation)?,
        QueryNode::AnyToken { .. } | QueryNode::Not { .. } => {
            stats.sum_total_term_freq(&options.default_annotation)?
        }
        QueryNode::Tags { name, .. } => stats.total_term_freq(TAG_ANNOTATION, name)?,
        QueryNode::Sequence(clauses) => min_hits(clauses, stats, options)?,
        QueryNode::AndNot { include, .. } if !include.is_empty() => min_hits(include, stats, options)?,
        QueryNode::AndNot { .. } => stats.sum_total_term_freq(&options.default_annotation)?,
        QueryNode::Or(clauses) => {
            let mut total = 0u64;
            for clause in clauses {
                total = total.saturating_add(estimated_hits(clause, stats, options)?);
            }
            total
        }
        QueryNode::Expansion { clause, min, max, .. } => {
            let choices = max.map_or(UNBOUNDED_EXPANSION_FACTOR, |max| u64::from(max - min) + 1);
            estimated_hits(clause, stats, options)?.saturating_mul(choices)
        }
        QueryNode::PositionFilter { producer, .. } => estimated_hits(producer, stats, options)?,
        QueryNode::ForwardIndexMatch { anchor, .. } => estimated_hits(anchor, stats, options)?,
        QueryNode::Repetition { clause, .. }
        | QueryNode::Edge { clause, .. }
        | QueryNode::CaptureGroup { clause, .. }
        | QueryNode::Constrained { clause, .. }
        | QueryNode::Sorted { clause, .. }
        | QueryNode::Unique(clause) => estimated_hits(clause, stats, options)?,
        QueryNode::NoHits { .. } => 0,
    };
    Ok(hits)
}

fn min_hits(clauses: &[QueryNode], stats: &dyn IndexStats, options: &RewriteOptions) -> Result<u64> {
    let mut least = u64::MAX;
    for clause in clauses {
        least = least.min(estimated_hits(clause, stats, options)?);
    }
    Ok(if least == u64::MAX { 0 } else { least })
}

/// Tokens an automaton for the node inspects per anchor hit
pub fn automaton_steps(node: &QueryNode) -> u64 {
    let shape = node.shape();
    let steps = shape
        .max_length
        .unwrap_or_else(|| shape.min_length.saturating_add(1));
    u64::from(steps.max(1))
}

/// Literal characters a multi-term pattern pins down
pub fn fixed_chars(node: &QueryNode) -> Option<usize> {
    match node {
        QueryNode::MultiTerm { kind, pattern, .. } => Some(kind.fixed_chars(pattern)),
        QueryNode::Not {
            clause: Some(clause),
            ..
        } => fixed_chars(clause),
        _ => None,
    }
}

/// Whether matching `candidate` with an automaton from the hits of `anchor`
/// beats matching it through its own postings.
///
/// Ties go to reverse matching, except that short literal patterns always
/// use the automaton since their expansions are expensive to merge.
pub fn prefer_automaton(
    anchor: &QueryNode,
    candidate: &QueryNode,
    stats: &dyn IndexStats,
    options: &RewriteOptions,
) -> Result<bool> {
    if let Some(chars) = fixed_chars(candidate) {
        if chars <= options.nfa_fixed_char_threshold {
            debug!(
                "Automaton for {} clause: {} fixed chars <= {}",
                candidate.name(),
                chars,
                options.nfa_fixed_char_threshold
            );
            return Ok(true);
        }
    }
    let automaton_cost = estimated_hits(anchor, stats, options)?
        .saturating_mul(automaton_steps(candidate))
        .saturating_mul(options.nfa_cost_factor);
    let reverse_cost = estimated_hits(candidate, stats, options)?;
    debug!(
        "Cost for {} clause: automaton {} vs reverse {}",
        candidate.name(),
        automaton_cost,
        reverse_cost
    );
    Ok(automaton_cost < reverse_cost)
}
