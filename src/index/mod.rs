//! Interfaces to the index structures the span engine reads from.
//!
//! The engine never builds or owns an index. It consumes:
//! - [`SegmentIndex`]: postings with positions (and optional payloads) plus
//!   per-document field lengths, for one segment
//! - [`ForwardIndex`]: per-document, per-position token ids, for automaton matching
//! - [`IndexStats`]: term statistics and multi-term expansion, used once per search
//!   by the rewrite engine
//!
//! [`memory::MemoryIndex`] implements all three over an in-memory corpus; the
//! tantivy-backed implementation lives in `tantivy_integration`.

pub mod memory;

use std::sync::Arc;

use crate::error::Result;
use crate::types::DocId;

/// Identifier of a term in the forward index of one annotation
pub type TermId = u32;

/// Annotation holding start tags (and tag attributes)
pub const TAG_ANNOTATION: &str = "starttag";

/// Annotation holding end tags in the legacy tag format
pub const END_TAG_ANNOTATION: &str = "endtag";

/// Default number of hits a bucket may hold before its buffers are released
pub const DEFAULT_BUCKET_REUSE_THRESHOLD: usize = 4096;

/// Term under which an element attribute is indexed at the element start
pub fn attribute_term(attribute: &str, value: &str) -> String {
    format!("@{}={}", attribute, value)
}

/// Payload stored with a start tag: the (exclusive) end position of the element
pub fn encode_tag_payload(end: i32) -> [u8; 4] {
    end.to_le_bytes()
}

pub fn decode_tag_payload(payload: &[u8]) -> Option<i32> {
    let bytes: [u8; 4] = payload.get(..4)?.try_into().ok()?;
    Some(i32::from_le_bytes(bytes))
}

/// Postings cursor for a single term: documents in increasing order, positions
/// in increasing order within each document.
pub trait PostingsIterator: Send {
    /// Current document, `NOT_STARTED_DOC` before the first call to `next_doc`/`advance`
    fn doc(&self) -> DocId;

    fn next_doc(&mut self) -> Result<DocId>;

    /// First document >= target. Callers only pass targets beyond the current document.
    fn advance(&mut self, target: DocId) -> Result<DocId>;

    /// Number of positions in the current document
    fn freq(&self) -> u32;

    /// Next position in the current document, or `NO_MORE_POSITIONS`
    fn next_position(&mut self) -> Result<i32>;

    /// Payload of the current position, if the index stores payloads
    fn payload(&self) -> Option<&[u8]>;

    /// Estimated number of documents
    fn cost(&self) -> u64;
}

/// One searchable segment of the inverted index
pub trait SegmentIndex: Send + Sync {
    /// Exclusive upper bound on document ids in this segment
    fn max_doc(&self) -> DocId;

    /// False for deleted documents
    fn is_live(&self, doc: DocId) -> bool;

    /// Postings for a term of an annotation, `None` if the term does not occur
    fn postings(&self, annotation: &str, term: &str) -> Result<Option<Box<dyn PostingsIterator>>>;

    /// Number of tokens in the document
    fn field_length(&self, doc: DocId) -> Result<u32>;
}

/// Random access to the token ids of a document
pub trait ForwardIndex: Send + Sync {
    /// Id of a term string, `None` if the annotation has no such term
    fn term_id(&self, annotation: &str, term: &str) -> Result<Option<TermId>>;

    fn token_id_at(&self, doc: DocId, annotation: &str, position: u32) -> Result<TermId>;

    fn doc_length(&self, doc: DocId) -> Result<u32>;

    /// Fill `out` with the token ids of the whole document
    fn document_tokens(&self, doc: DocId, annotation: &str, out: &mut Vec<TermId>) -> Result<()> {
        out.clear();
        let len = self.doc_length(doc)?;
        for position in 0..len {
            out.push(self.token_id_at(doc, annotation, position)?);
        }
        Ok(())
    }
}

/// Index-wide statistics consulted by the rewrite engine
pub trait IndexStats {
    /// Number of occurrences of the term
    fn total_term_freq(&self, annotation: &str, term: &str) -> Result<u64>;

    /// Number of tokens in the annotation
    fn sum_total_term_freq(&self, annotation: &str) -> Result<u64>;

    /// Terms of the annotation fully matching `regex`, at most `limit` of them
    fn expand_terms(&self, annotation: &str, regex: &str, limit: usize) -> Result<Vec<String>>;

    /// Whether automaton matching may read this annotation from a forward index
    fn has_forward_index(&self, annotation: &str) -> bool;
}

/// Everything a cursor tree needs from one segment
#[derive(Clone)]
pub struct SegmentContext {
    pub index: Arc<dyn SegmentIndex>,
    pub forward_index: Option<Arc<dyn ForwardIndex>>,
    pub bucket_reuse_threshold: usize,
}

impl SegmentContext {
    pub fn new(index: Arc<dyn SegmentIndex>) -> Self {
        Self {
            index,
            forward_index: None,
            bucket_reuse_threshold: DEFAULT_BUCKET_REUSE_THRESHOLD,
        }
    }

    pub fn with_forward_index(mut self, forward_index: Arc<dyn ForwardIndex>) -> Self {
        self.forward_index = Some(forward_index);
        self
    }

    pub fn with_bucket_reuse_threshold(mut self, threshold: usize) -> Self {
        self.bucket_reuse_threshold = threshold;
        self
    }

    pub fn forward_index(&self, annotation: &str) -> Result<&Arc<dyn ForwardIndex>> {
        self.forward_index
            .as_ref()
            .ok_or_else(|| crate::error::SpanError::ForwardIndexUnavailable(annotation.to_string()))
    }
}
