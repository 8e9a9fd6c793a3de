//! Error types for span query construction, rewriting and execution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building, rewriting or executing span queries
#[derive(Debug, Error)]
pub enum SpanError {
    #[error("clauses reference different base fields: '{expected}' and '{found}'")]
    FieldMismatch { expected: String, found: String },

    #[error("AND-NOT query needs at least one clause")]
    EmptyAndNot,

    #[error("{0} query needs at least one clause")]
    NoClauses(&'static str),

    #[error("invalid repetition bounds: min {min}, max {max:?}")]
    InvalidRepetition { min: u32, max: Option<u32> },

    #[error("invalid expansion bounds: min {min}, max {max:?}")]
    InvalidExpansion { min: u32, max: Option<u32> },

    #[error("cannot build an automaton for a clause that matches the empty sequence")]
    EmptyMatchingAutomaton,

    #[error("clause cannot be compiled into an automaton: {0}")]
    NotAutomatonCapable(String),

    #[error("pattern too large: automaton needs more than {limit} states")]
    PatternTooLarge { limit: usize },

    #[error("invalid term pattern '{pattern}': {reason}")]
    InvalidTermPattern { pattern: String, reason: String },

    #[error("no forward index available for annotation '{0}'")]
    ForwardIndexUnavailable(String),

    #[error("unknown annotation '{0}'")]
    UnknownAnnotation(String),

    #[error("constraint refers to unknown capture group '{0}'")]
    UnknownCaptureGroup(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),
}

/// Stable, machine-readable classification of a [`SpanError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid query tree (fatal, surfaced at construction)
    Construction,
    /// Query could not be rewritten (e.g. invalid term pattern)
    Rewrite,
    /// Automaton construction exceeded its size limit
    PatternTooLarge,
    /// Failure reading the underlying index
    Execution,
    /// A rewrite or protocol invariant was violated
    Internal,
}

impl SpanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpanError::FieldMismatch { .. }
            | SpanError::EmptyAndNot
            | SpanError::NoClauses(_)
            | SpanError::UnknownCaptureGroup(_)
            | SpanError::InvalidRepetition { .. }
            | SpanError::InvalidExpansion { .. }
            | SpanError::EmptyMatchingAutomaton
            | SpanError::NotAutomatonCapable(_) => ErrorKind::Construction,
            SpanError::InvalidTermPattern { .. } | SpanError::UnknownAnnotation(_) => {
                ErrorKind::Rewrite
            }
            SpanError::PatternTooLarge { .. } => ErrorKind::PatternTooLarge,
            SpanError::ForwardIndexUnavailable(_) | SpanError::Io(_) | SpanError::Tantivy(_) => {
                ErrorKind::Execution
            }
            SpanError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        SpanError::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SpanError>;
