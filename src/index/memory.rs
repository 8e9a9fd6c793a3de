//! In-memory corpus implementing every index collaborator.
//!
//! Small and simple on purpose: documents are token arrays per annotation
//! plus optional element tags. Used by the cursor tests and handy for
//! embedding the engine without tantivy.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::warn;
use regex::Regex;

use super::{
    attribute_term, encode_tag_payload, ForwardIndex, IndexStats, PostingsIterator, SegmentContext,
    SegmentIndex, TermId, END_TAG_ANNOTATION, TAG_ANNOTATION,
};
use crate::error::{Result, SpanError};
use crate::types::{DocId, NOT_STARTED_DOC, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// How element tags are laid out in the postings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFormat {
    /// Start tag postings carry the element end as payload
    Payload,
    /// Separate start tag and end tag postings, matched per document
    Legacy,
}

/// An element spanning tokens `start..end`
#[derive(Debug, Clone)]
pub struct MemoryTag {
    pub name: String,
    pub start: i32,
    pub end: i32,
    pub attributes: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    annotations: BTreeMap<String, Vec<String>>,
    tags: Vec<MemoryTag>,
    deleted: bool,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document with a single `word` annotation from whitespace-separated text
    pub fn from_words(text: &str) -> Self {
        Self::new().annotation("word", text.split_whitespace())
    }

    pub fn annotation<I, S>(mut self, name: &str, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.annotations
            .insert(name.to_string(), tokens.into_iter().map(Into::into).collect());
        self
    }

    pub fn tag(mut self, name: &str, start: i32, end: i32) -> Self {
        self.tags.push(MemoryTag {
            name: name.to_string(),
            start,
            end,
            attributes: Vec::new(),
        });
        self
    }

    pub fn tag_with_attributes(mut self, name: &str, start: i32, end: i32, attributes: &[(&str, &str)]) -> Self {
        self.tags.push(MemoryTag {
            name: name.to_string(),
            start,
            end,
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    fn length(&self) -> u32 {
        self.annotations.values().map(|t| t.len() as u32).max().unwrap_or(0)
    }
}

#[derive(Debug)]
struct PostingDoc {
    doc: DocId,
    positions: Vec<(i32, Option<[u8; 4]>)>,
}

type PostingsList = Arc<Vec<PostingDoc>>;

/// Builds a [`MemoryIndex`] document by document
pub struct MemoryIndexBuilder {
    docs: Vec<MemoryDocument>,
    tag_format: TagFormat,
}

impl MemoryIndexBuilder {
    pub fn new() -> Self {
        Self {
            docs: Vec::new(),
            tag_format: TagFormat::Payload,
        }
    }

    pub fn tag_format(mut self, format: TagFormat) -> Self {
        self.tag_format = format;
        self
    }

    pub fn add_document(mut self, doc: MemoryDocument) -> Self {
        self.docs.push(doc);
        self
    }

    pub fn build(self) -> MemoryIndex {
        // annotation -> term -> doc -> positions
        let mut raw: HashMap<String, BTreeMap<String, BTreeMap<DocId, Vec<(i32, Option<[u8; 4]>)>>>> =
            HashMap::new();
        let mut term_ids: HashMap<String, HashMap<String, TermId>> = HashMap::new();
        let mut forward: HashMap<String, Vec<Vec<TermId>>> = HashMap::new();
        let num_docs = self.docs.len();

        for (doc_idx, doc) in self.docs.iter().enumerate() {
            let doc_id = doc_idx as DocId;
            for (annotation, tokens) in &doc.annotations {
                let ids = term_ids.entry(annotation.clone()).or_default();
                let fi = forward
                    .entry(annotation.clone())
                    .or_insert_with(|| vec![Vec::new(); num_docs]);
                for (pos, token) in tokens.iter().enumerate() {
                    let next_id = ids.len() as TermId;
                    let id = *ids.entry(token.clone()).or_insert(next_id);
                    fi[doc_idx].push(id);
                    raw.entry(annotation.clone())
                        .or_default()
                        .entry(token.clone())
                        .or_default()
                        .entry(doc_id)
                        .or_default()
                        .push((pos as i32, None));
                }
            }
            for tag in &doc.tags {
                if self.tag_format == TagFormat::Legacy && tag.start == tag.end {
                    continue;
                }
                let starts = raw.entry(TAG_ANNOTATION.to_string()).or_default();
                let payload = match self.tag_format {
                    TagFormat::Payload => Some(encode_tag_payload(tag.end)),
                    TagFormat::Legacy => None,
                };
                starts
                    .entry(tag.name.clone())
                    .or_default()
                    .entry(doc_id)
                    .or_default()
                    .push((tag.start, payload));
                for (attr, value) in &tag.attributes {
                    starts
                        .entry(attribute_term(attr, value))
                        .or_default()
                        .entry(doc_id)
                        .or_default()
                        .push((tag.start, None));
                }
                if self.tag_format == TagFormat::Legacy {
                    raw.entry(END_TAG_ANNOTATION.to_string())
                        .or_default()
                        .entry(tag.name.clone())
                        .or_default()
                        .entry(doc_id)
                        .or_default()
                        .push((tag.end, None));
                }
            }
        }

        let postings = raw
            .into_iter()
            .map(|(annotation, terms)| {
                let terms = terms
                    .into_iter()
                    .map(|(term, docs)| {
                        let list: Vec<PostingDoc> = docs
                            .into_iter()
                            .map(|(doc, mut positions)| {
                                positions.sort_by_key(|(p, _)| *p);
                                PostingDoc { doc, positions }
                            })
                            .collect();
                        (term, Arc::new(list))
                    })
                    .collect();
                (annotation, terms)
            })
            .collect();

        MemoryIndex {
            postings,
            lengths: self.docs.iter().map(|d| d.length()).collect(),
            live: Arc::new(self.docs.iter().map(|d| !d.deleted).collect()),
            term_ids,
            forward,
        }
    }
}

impl Default for MemoryIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A single-segment in-memory index
pub struct MemoryIndex {
    postings: HashMap<String, BTreeMap<String, PostingsList>>,
    lengths: Vec<u32>,
    live: Arc<Vec<bool>>,
    term_ids: HashMap<String, HashMap<String, TermId>>,
    forward: HashMap<String, Vec<Vec<TermId>>>,
}

impl MemoryIndex {
    pub fn builder() -> MemoryIndexBuilder {
        MemoryIndexBuilder::new()
    }

    /// Index of `word`-annotated documents, one per text
    pub fn from_texts(texts: &[&str]) -> Self {
        texts
            .iter()
            .fold(MemoryIndexBuilder::new(), |b, text| b.add_document(MemoryDocument::from_words(text)))
            .build()
    }

    /// Segment context with this index as both inverted and forward index
    pub fn segment_context(self: &Arc<Self>) -> SegmentContext {
        SegmentContext::new(self.clone()).with_forward_index(self.clone())
    }

    fn forward_doc(&self, doc: DocId, annotation: &str) -> Result<&[TermId]> {
        let docs = self
            .forward
            .get(annotation)
            .ok_or_else(|| SpanError::ForwardIndexUnavailable(annotation.to_string()))?;
        Ok(docs.get(doc as usize).map(|d| d.as_slice()).unwrap_or(&[]))
    }
}

impl SegmentIndex for MemoryIndex {
    fn max_doc(&self) -> DocId {
        self.lengths.len() as DocId
    }

    fn is_live(&self, doc: DocId) -> bool {
        self.live.get(doc as usize).copied().unwrap_or(false)
    }

    fn postings(&self, annotation: &str, term: &str) -> Result<Option<Box<dyn PostingsIterator>>> {
        let list = self.postings.get(annotation).and_then(|terms| terms.get(term));
        Ok(list.map(|list| {
            Box::new(MemoryPostings {
                list: list.clone(),
                live: self.live.clone(),
                doc_idx: None,
                pos_idx: 0,
            }) as Box<dyn PostingsIterator>
        }))
    }

    fn field_length(&self, doc: DocId) -> Result<u32> {
        Ok(self.lengths.get(doc as usize).copied().unwrap_or(0))
    }
}

impl ForwardIndex for MemoryIndex {
    fn term_id(&self, annotation: &str, term: &str) -> Result<Option<TermId>> {
        Ok(self.term_ids.get(annotation).and_then(|ids| ids.get(term)).copied())
    }

    fn token_id_at(&self, doc: DocId, annotation: &str, position: u32) -> Result<TermId> {
        self.forward_doc(doc, annotation)?
            .get(position as usize)
            .copied()
            .ok_or_else(|| SpanError::internal(format!("position {} beyond end of doc {}", position, doc)))
    }

    fn doc_length(&self, doc: DocId) -> Result<u32> {
        Ok(self.lengths.get(doc as usize).copied().unwrap_or(0))
    }

    fn document_tokens(&self, doc: DocId, annotation: &str, out: &mut Vec<TermId>) -> Result<()> {
        out.clear();
        out.extend_from_slice(self.forward_doc(doc, annotation)?);
        Ok(())
    }
}

impl IndexStats for MemoryIndex {
    fn total_term_freq(&self, annotation: &str, term: &str) -> Result<u64> {
        Ok(self
            .postings
            .get(annotation)
            .and_then(|terms| terms.get(term))
            .map(|list| list.iter().map(|d| d.positions.len() as u64).sum())
            .unwrap_or(0))
    }

    fn sum_total_term_freq(&self, annotation: &str) -> Result<u64> {
        Ok(self
            .postings
            .get(annotation)
            .map(|terms| {
                terms
                    .values()
                    .flat_map(|list| list.iter())
                    .map(|d| d.positions.len() as u64)
                    .sum()
            })
            .unwrap_or(0))
    }

    fn expand_terms(&self, annotation: &str, regex: &str, limit: usize) -> Result<Vec<String>> {
        let anchored = format!("^(?:{})$", regex);
        let re = Regex::new(&anchored).map_err(|e| SpanError::InvalidTermPattern {
            pattern: regex.to_string(),
            reason: e.to_string(),
        })?;
        let Some(terms) = self.postings.get(annotation) else {
            return Ok(Vec::new());
        };
        let mut expanded = Vec::new();
        for term in terms.keys().filter(|t| re.is_match(t)) {
            if expanded.len() >= limit {
                warn!("Pattern '{}' exceeds expansion cap ({}), truncating", regex, limit);
                break;
            }
            expanded.push(term.clone());
        }
        Ok(expanded)
    }

    fn has_forward_index(&self, annotation: &str) -> bool {
        self.forward.contains_key(annotation)
    }
}

struct MemoryPostings {
    list: PostingsList,
    live: Arc<Vec<bool>>,
    doc_idx: Option<usize>,
    pos_idx: usize,
}

impl MemoryPostings {
    fn is_live(&self, idx: usize) -> bool {
        self.live.get(self.list[idx].doc as usize).copied().unwrap_or(false)
    }

    fn settle(&mut self, mut idx: usize) -> DocId {
        while idx < self.list.len() && !self.is_live(idx) {
            idx += 1;
        }
        self.doc_idx = Some(idx);
        self.pos_idx = 0;
        self.doc()
    }
}

impl PostingsIterator for MemoryPostings {
    fn doc(&self) -> DocId {
        match self.doc_idx {
            None => NOT_STARTED_DOC,
            Some(idx) => self.list.get(idx).map(|d| d.doc).unwrap_or(NO_MORE_DOCS),
        }
    }

    fn next_doc(&mut self) -> Result<DocId> {
        let next = self.doc_idx.map(|i| (i + 1).min(self.list.len())).unwrap_or(0);
        Ok(self.settle(next))
    }

    fn advance(&mut self, target: DocId) -> Result<DocId> {
        let from = self.doc_idx.map(|i| (i + 1).min(self.list.len())).unwrap_or(0);
        let offset = self.list[from..].partition_point(|d| d.doc < target);
        Ok(self.settle(from + offset))
    }

    fn freq(&self) -> u32 {
        self.doc_idx
            .and_then(|idx| self.list.get(idx))
            .map(|d| d.positions.len() as u32)
            .unwrap_or(0)
    }

    fn next_position(&mut self) -> Result<i32> {
        let Some(doc) = self.doc_idx.and_then(|idx| self.list.get(idx)) else {
            return Ok(NO_MORE_POSITIONS);
        };
        if self.pos_idx >= doc.positions.len() {
            return Ok(NO_MORE_POSITIONS);
        }
        let pos = doc.positions[self.pos_idx].0;
        self.pos_idx += 1;
        Ok(pos)
    }

    fn payload(&self) -> Option<&[u8]> {
        let doc = self.list.get(self.doc_idx?)?;
        let (_, payload) = doc.positions.get(self.pos_idx.checked_sub(1)?)?;
        payload.as_ref().map(|p| p.as_slice())
    }

    fn cost(&self) -> u64 {
        self.list.len() as u64
    }
}
