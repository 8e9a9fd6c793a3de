//! Query trees: construction, static shape, rewriting and cursor creation.
//!
//! A [`QueryNode`] is built by the caller (or deserialized), rewritten once
//! against index-wide statistics with [`QueryNode::rewrite`], and then turned
//! into a cursor per segment with [`QueryNode::create_cursor`].

pub mod cost;
pub mod cursor;
pub mod execute;
pub mod node;
pub mod rewrite;
pub mod shape;

#[cfg(test)]
mod tests;

pub use execute::{collect_hits, SegmentHits};
pub use node::{GroupConstraint, MultiTermKind, QueryNode};
pub use rewrite::RewriteOptions;
pub use shape::{Shape, ShapeProperties};
