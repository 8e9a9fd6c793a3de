//! tantivy-backed implementations of the index collaborators
//!
//! - `position_tokenizer`: tokenizers that index each token at its position
//! - `fields`: annotation name to tantivy field mapping
//! - `segment`: postings, document lengths and stored-field forward index of one segment
//! - `stats`: term statistics and regex expansion over the whole searcher

pub mod fields;
pub mod position_tokenizer;
pub mod segment;
pub mod stats;

#[cfg(test)]
mod tests;

pub use fields::IndexFields;
pub use position_tokenizer::{AnnotationTokenizer, TagTokenizer};
pub use segment::{TantivyPostings, TantivySegment};
pub use stats::TantivyStats;
