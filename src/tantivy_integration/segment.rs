//! One tantivy segment seen as a span index and a forward index.

use std::sync::Arc;

use log::trace;
use tantivy::columnar::Column;
use tantivy::fastfield::AliveBitSet;
use tantivy::postings::{Postings, SegmentPostings};
use tantivy::schema::{IndexRecordOption, TantivyDocument, Value};
use tantivy::{DocSet, SegmentReader, Term};

use super::fields::IndexFields;
use super::position_tokenizer::split_tokens;
use crate::engine::constants::FIELD_TOKEN_COUNT;
use crate::error::{Result, SpanError};
use crate::index::{ForwardIndex, PostingsIterator, SegmentIndex, TermId};
use crate::types::{DocId, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Token id for stored tokens missing from the term dictionary
pub const UNKNOWN_TOKEN: TermId = TermId::MAX;

/// Postings of one term, skipping deleted documents
pub struct TantivyPostings {
    postings: SegmentPostings,
    alive: Option<AliveBitSet>,
    doc: DocId,
    positions: Vec<u32>,
    next: usize,
}

impl TantivyPostings {
    pub fn new(postings: SegmentPostings, alive: Option<AliveBitSet>) -> Self {
        Self {
            postings,
            alive,
            doc: NOT_STARTED_DOC,
            positions: Vec::new(),
            next: 0,
        }
    }

    fn is_alive(&self, doc: DocId) -> bool {
        self.alive.as_ref().map_or(true, |alive| alive.is_alive(doc))
    }

    /// Move past deleted documents and load the positions of the one landed on
    fn settle(&mut self, mut doc: DocId) -> DocId {
        while doc != NO_MORE_DOCS && !self.is_alive(doc) {
            doc = self.postings.advance();
        }
        self.doc = doc;
        self.positions.clear();
        self.next = 0;
        if doc != NO_MORE_DOCS {
            self.postings.positions(&mut self.positions);
        }
        doc
    }
}

impl PostingsIterator for TantivyPostings {
    fn doc(&self) -> DocId {
        self.doc
    }

    fn next_doc(&mut self) -> Result<DocId> {
        let doc = match self.doc {
            NO_MORE_DOCS => return Ok(NO_MORE_DOCS),
            // segment postings are created on their first document
            NOT_STARTED_DOC => self.postings.doc(),
            _ => self.postings.advance(),
        };
        Ok(self.settle(doc))
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        let doc = match self.doc {
            NO_MORE_DOCS => return Ok(NO_MORE_DOCS),
            NOT_STARTED_DOC if self.postings.doc() >= target => self.postings.doc(),
            _ => self.postings.seek(target),
        };
        Ok(self.settle(doc))
    }

    fn freq(&self) -> u32 {
        self.positions.len() as u32
    }

    fn next_position(&mut self) -> Result<i32> {
        match self.positions.get(self.next) {
            Some(&position) => {
                self.next += 1;
                Ok(position as i32)
            }
            None => Ok(NO_MORE_POSITIONS),
        }
    }

    fn payload(&self) -> Option<&[u8]> {
        None
    }

    fn cost(&self) -> u64 {
        self.postings.size_hint() as u64
    }
}

/// Span index over a tantivy segment
///
/// Postings come from the inverted index, document lengths from the FAST
/// token count column. When annotations are stored, the stored token
/// sequences double as a forward index whose term ids are the segment's
/// term ordinals.
#[derive(Clone)]
pub struct TantivySegment {
    reader: SegmentReader,
    fields: Arc<IndexFields>,
    lengths: Column<u64>,
}

impl TantivySegment {
    pub fn open(reader: &SegmentReader, fields: Arc<IndexFields>) -> Result<Self> {
        let lengths = reader.fast_fields().u64(FIELD_TOKEN_COUNT)?;
        Ok(Self {
            reader: reader.clone(),
            fields,
            lengths,
        })
    }

    fn to_term_id(ordinal: u64) -> Result<TermId> {
        TermId::try_from(ordinal)
            .ok()
            .filter(|id| *id != UNKNOWN_TOKEN)
            .ok_or_else(|| SpanError::internal(format!("term ordinal {} exceeds the term id range", ordinal)))
    }
}

impl SegmentIndex for TantivySegment {
    fn max_doc(&self) -> DocId {
        self.reader.max_doc()
    }

    fn is_live(&self, doc: DocId) -> bool {
        self.reader.alive_bitset().map_or(true, |alive| alive.is_alive(doc))
    }

    fn postings(&self, annotation: &str, term: &str) -> Result<Option<Box<dyn PostingsIterator>>> {
        let field = self.fields.annotation(annotation)?;
        let inverted = self.reader.inverted_index(field)?;
        let term = Term::from_field_text(field, term);
        let postings = inverted.read_postings(&term, IndexRecordOption::WithFreqsAndPositions)?;
        Ok(postings.map(|postings| {
            Box::new(TantivyPostings::new(postings, self.reader.alive_bitset().cloned()))
                as Box<dyn PostingsIterator>
        }))
    }

    fn field_length(&self, doc: DocId) -> Result<u32> {
        Ok(self.lengths.first(doc).unwrap_or(0) as u32)
    }
}

impl ForwardIndex for TantivySegment {
    fn term_id(&self, annotation: &str, term: &str) -> Result<Option<TermId>> {
        let field = self.fields.annotation(annotation)?;
        let inverted = self.reader.inverted_index(field)?;
        inverted.terms().term_ord(term)?.map(Self::to_term_id).transpose()
    }

    fn token_id_at(&self, doc: DocId, annotation: &str, position: u32) -> Result<TermId> {
        let mut tokens = Vec::new();
        self.document_tokens(doc, annotation, &mut tokens)?;
        tokens
            .get(position as usize)
            .copied()
            .ok_or_else(|| SpanError::internal(format!("position {} beyond end of doc {}", position, doc)))
    }

    fn doc_length(&self, doc: DocId) -> Result<u32> {
        self.field_length(doc)
    }

    fn document_tokens(&self, doc: DocId, annotation: &str, out: &mut Vec<TermId>) -> Result<()> {
        out.clear();
        if !self.fields.is_stored(annotation) {
            return Err(SpanError::ForwardIndexUnavailable(annotation.to_string()));
        }
        let field = self.fields.annotation(annotation)?;
        let store = self.reader.get_store_reader(1)?;
        let stored: TantivyDocument = store.get(doc)?;
        let text = stored.get_first(field).and_then(|value| value.as_str()).unwrap_or("");
        let inverted = self.reader.inverted_index(field)?;
        let dictionary = inverted.terms();
        for token in split_tokens(text) {
            let id = match dictionary.term_ord(token)? {
                Some(ordinal) => Self::to_term_id(ordinal)?,
                None => UNKNOWN_TOKEN,
            };
            out.push(id);
        }
        trace!("Loaded {} '{}' tokens of doc {}", out.len(), annotation, doc);
        Ok(())
    }
}
