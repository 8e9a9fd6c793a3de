use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpanError};
use crate::index::{attribute_term, TAG_ANNOTATION};
use crate::nfa::{MatchDirection, Nfa, NfaBuilder};
use crate::spans::{Direction, FilterOperation};
use crate::types::SortBy;

/// How the pattern of a multi-term node is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultiTermKind {
    /// Terms starting with the pattern
    Prefix,
    /// `*` matches any run of characters, `?` a single character
    Wildcard,
    /// Full-term regular expression
    Regex,
}

impl MultiTermKind {
    /// Anchorless regular expression equivalent to the pattern
    pub fn to_regex(&self, pattern: &str) -> String {
        match self {
            MultiTermKind::Prefix => format!("{}.*", regex::escape(pattern)),
            MultiTermKind::Wildcard => {
                let mut out = String::with_capacity(pattern.len() + 8);
                for c in pattern.chars() {
                    match c {
                        '*' => out.push_str(".*"),
                        '?' => out.push('.'),
                        c => out.push_str(&regex::escape(&c.to_string())),
                    }
                }
                out
            }
            MultiTermKind::Regex => pattern.to_string(),
        }
    }

    /// Number of literal characters every matching term must contain
    pub fn fixed_chars(&self, pattern: &str) -> usize {
        match self {
            MultiTermKind::Prefix => pattern.chars().count(),
            MultiTermKind::Wildcard => pattern.chars().filter(|c| *c != '*' && *c != '?').count(),
            MultiTermKind::Regex => pattern
                .trim_start_matches('^')
                .chars()
                .take_while(|c| c.is_alphanumeric())
                .count(),
        }
    }
}

/// Condition on the captured groups of a hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupConstraint {
    /// Both groups cover the same token sequence in `annotation`
    SameTokens {
        left: String,
        right: String,
        annotation: String,
    },
    And(Vec<GroupConstraint>),
    Or(Vec<GroupConstraint>),
    Not(Box<GroupConstraint>),
}

impl GroupConstraint {
    pub fn same_tokens(left: &str, right: &str, annotation: &str) -> Self {
        GroupConstraint::SameTokens {
            left: left.to_string(),
            right: right.to_string(),
            annotation: annotation.to_string(),
        }
    }

    pub fn group_names(&self) -> Vec<&str> {
        match self {
            GroupConstraint::SameTokens { left, right, .. } => vec![left.as_str(), right.as_str()],
            GroupConstraint::And(cs) | GroupConstraint::Or(cs) => {
                cs.iter().flat_map(|c| c.group_names()).collect()
            }
            GroupConstraint::Not(c) => c.group_names(),
        }
    }

    pub fn annotations(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        self.collect_annotations(&mut out);
        out
    }

    fn collect_annotations<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            GroupConstraint::SameTokens { annotation, .. } => {
                if !out.contains(&annotation.as_str()) {
                    out.push(annotation.as_str());
                }
            }
            GroupConstraint::And(cs) | GroupConstraint::Or(cs) => {
                cs.iter().for_each(|c| c.collect_annotations(out))
            }
            GroupConstraint::Not(c) => c.collect_annotations(out),
        }
    }
}

/// A span query tree.
///
/// Leaves name the base `field` they search plus the annotation (token
/// property) they read. Composite nodes require all children to share one
/// base field; the constructors check this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryNode {
    Term {
        field: String,
        annotation: String,
        term: String,
    },
    /// Prefix/wildcard/regex term; `expansion` holds the matching terms once rewritten
    MultiTerm {
        field: String,
        annotation: String,
        kind: MultiTermKind,
        pattern: String,
        expansion: Option<Vec<String>>,
    },
    AnyToken {
        field: String,
        min: u32,
        max: Option<u32>,
    },
    Tags {
        field: String,
        name: String,
        attributes: BTreeMap<String, String>,
    },
    Sequence(Vec<QueryNode>),
    Repetition {
        clause: Box<QueryNode>,
        min: u32,
        max: Option<u32>,
    },
    Or(Vec<QueryNode>),
    /// Hits of all includes (same start and end) overlapping no exclude
    AndNot {
        include: Vec<QueryNode>,
        exclude: Vec<QueryNode>,
    },
    /// Single tokens not covered by the clause; every token without one
    Not {
        field: String,
        clause: Option<Box<QueryNode>>,
    },
    PositionFilter {
        producer: Box<QueryNode>,
        filter: Box<QueryNode>,
        operation: FilterOperation,
        invert: bool,
        left_adjust: i32,
        right_adjust: i32,
    },
    Expansion {
        clause: Box<QueryNode>,
        direction: Direction,
        min: u32,
        max: Option<u32>,
    },
    Edge {
        clause: Box<QueryNode>,
        trailing: bool,
    },
    CaptureGroup {
        clause: Box<QueryNode>,
        name: String,
    },
    Constrained {
        clause: Box<QueryNode>,
        constraint: GroupConstraint,
    },
    Sorted {
        clause: Box<QueryNode>,
        by: SortBy,
        unique: bool,
    },
    Unique(Box<QueryNode>),
    /// Anchor hits extended by walking `nfa` (compiled from `fragment`) over the forward index
    ForwardIndexMatch {
        anchor: Box<QueryNode>,
        fragment: Box<QueryNode>,
        direction: MatchDirection,
        nfa: Arc<Nfa>,
    },
    NoHits {
        field: String,
    },
}

fn check_fields<'a>(clauses: impl IntoIterator<Item = &'a QueryNode>) -> Result<()> {
    let mut expected: Option<&str> = None;
    for clause in clauses {
        let field = clause.field();
        match expected {
            None => expected = Some(field),
            Some(e) if e != field => {
                return Err(SpanError::FieldMismatch {
                    expected: e.to_string(),
                    found: field.to_string(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn check_bounds(min: u32, max: Option<u32>) -> Result<()> {
    if max.map_or(false, |max| max < min || max == 0) {
        return Err(SpanError::InvalidRepetition { min, max });
    }
    Ok(())
}

impl QueryNode {
    pub fn term(field: &str, annotation: &str, term: &str) -> Self {
        QueryNode::Term {
            field: field.to_string(),
            annotation: annotation.to_string(),
            term: term.to_string(),
        }
    }

    pub fn multi_term(field: &str, annotation: &str, kind: MultiTermKind, pattern: &str) -> Self {
        QueryNode::MultiTerm {
            field: field.to_string(),
            annotation: annotation.to_string(),
            kind,
            pattern: pattern.to_string(),
            expansion: None,
        }
    }

    pub fn any_token(field: &str, min: u32, max: Option<u32>) -> Result<Self> {
        check_bounds(min, max)?;
        Ok(QueryNode::AnyToken {
            field: field.to_string(),
            min,
            max,
        })
    }

    pub fn tags(field: &str, name: &str) -> Self {
        QueryNode::Tags {
            field: field.to_string(),
            name: name.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn tags_with_attributes(field: &str, name: &str, attributes: &[(&str, &str)]) -> Self {
        QueryNode::Tags {
            field: field.to_string(),
            name: name.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn sequence(clauses: Vec<QueryNode>) -> Result<Self> {
        if clauses.is_empty() {
            return Err(SpanError::NoClauses("sequence"));
        }
        check_fields(&clauses)?;
        Ok(QueryNode::Sequence(clauses))
    }

    /// `min` may be 0 to make the clause optional; rewriting splits the empty alternative off
    /// before cursors are created, which need at least one repetition
    pub fn repetition(clause: QueryNode, min: u32, max: Option<u32>) -> Result<Self> {
        check_bounds(min, max)?;
        Ok(QueryNode::Repetition {
            clause: Box::new(clause),
            min,
            max,
        })
    }

    pub fn or(clauses: Vec<QueryNode>) -> Result<Self> {
        if clauses.is_empty() {
            return Err(SpanError::NoClauses("or"));
        }
        check_fields(&clauses)?;
        Ok(QueryNode::Or(clauses))
    }

    pub fn and(clauses: Vec<QueryNode>) -> Result<Self> {
        Self::and_not(clauses, Vec::new())
    }

    pub fn and_not(include: Vec<QueryNode>, exclude: Vec<QueryNode>) -> Result<Self> {
        if include.is_empty() && exclude.is_empty() {
            return Err(SpanError::EmptyAndNot);
        }
        check_fields(include.iter().chain(exclude.iter()))?;
        Ok(QueryNode::AndNot { include, exclude })
    }

    pub fn not(field: &str, clause: Option<QueryNode>) -> Result<Self> {
        if let Some(clause) = &clause {
            check_fields([clause, &QueryNode::no_hits(field)])?;
        }
        Ok(QueryNode::Not {
            field: field.to_string(),
            clause: clause.map(Box::new),
        })
    }

    pub fn position_filter(
        producer: QueryNode,
        filter: QueryNode,
        operation: FilterOperation,
        invert: bool,
    ) -> Result<Self> {
        check_fields([&producer, &filter])?;
        Ok(QueryNode::PositionFilter {
            producer: Box::new(producer),
            filter: Box::new(filter),
            operation,
            invert,
            left_adjust: 0,
            right_adjust: 0,
        })
    }

    /// Shift the producer hit by the given offsets before testing; only valid on position filters
    pub fn with_adjustments(self, left: i32, right: i32) -> Result<Self> {
        match self {
            QueryNode::PositionFilter {
                producer,
                filter,
                operation,
                invert,
                ..
            } => Ok(QueryNode::PositionFilter {
                producer,
                filter,
                operation,
                invert,
                left_adjust: left,
                right_adjust: right,
            }),
            other => Err(SpanError::internal(format!(
                "adjustments only apply to position filters, got {}",
                other.name()
            ))),
        }
    }

    pub fn expansion(clause: QueryNode, direction: Direction, min: u32, max: Option<u32>) -> Result<Self> {
        if max.map_or(false, |max| max < min) {
            return Err(SpanError::InvalidExpansion { min, max });
        }
        Ok(QueryNode::Expansion {
            clause: Box::new(clause),
            direction,
            min,
            max,
        })
    }

    pub fn edge(clause: QueryNode, trailing: bool) -> Self {
        QueryNode::Edge {
            clause: Box::new(clause),
            trailing,
        }
    }

    pub fn capture_group(clause: QueryNode, name: &str) -> Self {
        QueryNode::CaptureGroup {
            clause: Box::new(clause),
            name: name.to_string(),
        }
    }

    pub fn constrained(clause: QueryNode, constraint: GroupConstraint) -> Result<Self> {
        let names = clause.capture_names();
        if let Some(missing) = constraint.group_names().into_iter().find(|n| !names.iter().any(|m| m == n)) {
            return Err(SpanError::UnknownCaptureGroup(missing.to_string()));
        }
        Ok(QueryNode::Constrained {
            clause: Box::new(clause),
            constraint,
        })
    }

    pub fn sorted(clause: QueryNode, by: SortBy, unique: bool) -> Self {
        QueryNode::Sorted {
            clause: Box::new(clause),
            by,
            unique,
        }
    }

    pub fn unique(clause: QueryNode) -> Self {
        QueryNode::Unique(Box::new(clause))
    }

    /// Compile `fragment` into an automaton walked from the hits of `anchor`
    pub fn forward_index_match(
        anchor: QueryNode,
        fragment: QueryNode,
        direction: MatchDirection,
        max_states: usize,
    ) -> Result<Self> {
        check_fields([&anchor, &fragment])?;
        let nfa = NfaBuilder::build(&fragment, direction, max_states)?;
        Ok(QueryNode::ForwardIndexMatch {
            anchor: Box::new(anchor),
            fragment: Box::new(fragment),
            direction,
            nfa: Arc::new(nfa),
        })
    }

    pub fn no_hits(field: &str) -> Self {
        QueryNode::NoHits {
            field: field.to_string(),
        }
    }

    /// Tag attribute term, indexed at the element start
    pub(crate) fn attribute(field: &str, attribute: &str, value: &str) -> Self {
        QueryNode::term(field, TAG_ANNOTATION, &attribute_term(attribute, value))
    }

    /// Base field this node searches
    pub fn field(&self) -> &str {
        match self {
            QueryNode::Term { field, .. }
            | QueryNode::MultiTerm { field, .. }
            | QueryNode::AnyToken { field, .. }
            | QueryNode::Tags { field, .. }
            | QueryNode::Not { field, .. }
            | QueryNode::NoHits { field } => field,
            QueryNode::Sequence(clauses) | QueryNode::Or(clauses) => {
                clauses.first().map(|c| c.field()).unwrap_or("")
            }
            QueryNode::AndNot { include, exclude } => include
                .first()
                .or_else(|| exclude.first())
                .map(|c| c.field())
                .unwrap_or(""),
            QueryNode::PositionFilter { producer, .. } => producer.field(),
            QueryNode::ForwardIndexMatch { anchor, .. } => anchor.field(),
            QueryNode::Repetition { clause, .. }
            | QueryNode::Expansion { clause, .. }
            | QueryNode::Edge { clause, .. }
            | QueryNode::CaptureGroup { clause, .. }
            | QueryNode::Constrained { clause, .. }
            | QueryNode::Sorted { clause, .. }
            | QueryNode::Unique(clause) => clause.field(),
        }
    }

    /// Short variant name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            QueryNode::Term { .. } => "term",
            QueryNode::MultiTerm { .. } => "multi_term",
            QueryNode::AnyToken { .. } => "any_token",
            QueryNode::Tags { .. } => "tags",
            QueryNode::Sequence(_) => "sequence",
            QueryNode::Repetition { .. } => "repetition",
            QueryNode::Or(_) => "or",
            QueryNode::AndNot { .. } => "and_not",
            QueryNode::Not { .. } => "not",
            QueryNode::PositionFilter { .. } => "position_filter",
            QueryNode::Expansion { .. } => "expansion",
            QueryNode::Edge { .. } => "edge",
            QueryNode::CaptureGroup { .. } => "capture_group",
            QueryNode::Constrained { .. } => "constrained",
            QueryNode::Sorted { .. } => "sorted",
            QueryNode::Unique(_) => "unique",
            QueryNode::ForwardIndexMatch { .. } => "forward_index_match",
            QueryNode::NoHits { .. } => "no_hits",
        }
    }

    /// Direct children, in evaluation order
    pub fn children(&self) -> Vec<&QueryNode> {
        match self {
            QueryNode::Term { .. }
            | QueryNode::MultiTerm { .. }
            | QueryNode::AnyToken { .. }
            | QueryNode::Tags { .. }
            | QueryNode::NoHits { .. } => Vec::new(),
            QueryNode::Sequence(clauses) | QueryNode::Or(clauses) => clauses.iter().collect(),
            QueryNode::AndNot { include, exclude } => include.iter().chain(exclude.iter()).collect(),
            QueryNode::Not { clause, .. } => clause.iter().map(|c| c.as_ref()).collect(),
            QueryNode::PositionFilter { producer, filter, .. } => vec![&**producer, &**filter],
            QueryNode::ForwardIndexMatch { anchor, fragment, .. } => vec![&**anchor, &**fragment],
            QueryNode::Repetition { clause, .. }
            | QueryNode::Expansion { clause, .. }
            | QueryNode::Edge { clause, .. }
            | QueryNode::CaptureGroup { clause, .. }
            | QueryNode::Constrained { clause, .. }
            | QueryNode::Sorted { clause, .. }
            | QueryNode::Unique(clause) => vec![&**clause],
        }
    }

    /// Capture group names in the order their cursors register them
    pub fn capture_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_capture_names(&mut names);
        names
    }

    fn collect_capture_names(&self, names: &mut Vec<String>) {
        match self {
            QueryNode::CaptureGroup { clause, name } => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
                clause.collect_capture_names(names);
            }
            // negated and excluded clauses never report groups
            QueryNode::Not { .. } => {}
            QueryNode::AndNot { include, .. } => {
                include.iter().for_each(|c| c.collect_capture_names(names))
            }
            QueryNode::PositionFilter { producer, filter, invert, .. } => {
                producer.collect_capture_names(names);
                if !invert {
                    filter.collect_capture_names(names);
                }
            }
            // the automaton reports no groups for its fragment
            QueryNode::ForwardIndexMatch { anchor, .. } => anchor.collect_capture_names(names),
            other => other
                .children()
                .into_iter()
                .for_each(|c| c.collect_capture_names(names)),
        }
    }

    /// Whether any capture group sits below this node
    pub fn has_captures(&self) -> bool {
        matches!(self, QueryNode::CaptureGroup { .. })
            || self.children().into_iter().any(|c| c.has_captures())
    }

    /// Annotations read by the leaves below this node
    pub fn annotations(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_annotations(&mut out);
        out
    }

    fn collect_annotations(&self, out: &mut Vec<String>) {
        match self {
            QueryNode::Term { annotation, .. } | QueryNode::MultiTerm { annotation, .. } => {
                if !out.contains(annotation) {
                    out.push(annotation.clone());
                }
            }
            other => other.children().into_iter().for_each(|c| c.collect_annotations(out)),
        }
    }
}
