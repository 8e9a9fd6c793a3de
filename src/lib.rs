pub mod engine;
pub mod error;
pub mod index;
pub mod nfa;
pub mod query;
pub mod results;
pub mod spans;
pub mod tantivy_integration;
pub mod types;

pub use engine::{SpanConfig, SpanDocument, SpanEngine};
pub use error::{ErrorKind, Result, SpanError};
pub use query::{collect_hits, GroupConstraint, MultiTermKind, QueryNode, RewriteOptions, ShapeProperties};
pub use results::{SearchResults, SpanHit};
pub use spans::{Direction, FilterOperation, Spans};
pub use types::{Hit, NamedCapture, SortBy, Span, SpanWithCaptures};
