pub mod span;

pub use span::{
    DocId, Hit, NamedCapture, SortBy, Span, SpanWithCaptures, NOT_POSITIONED, NOT_STARTED_DOC,
    NO_MORE_DOCS, NO_MORE_POSITIONS,
};
