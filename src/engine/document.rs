//! Token documents and their indexing

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use tantivy::schema::TantivyDocument;
use tantivy::Term;

use crate::engine::constants::*;
use crate::engine::core::SpanEngine;
use crate::index::{attribute_term, END_TAG_ANNOTATION, TAG_ANNOTATION};
use crate::tantivy_integration::position_tokenizer::{
    encode_tag_positions, encode_tokens, LABEL_SEPARATOR, POSITION_SEPARATOR,
};
use crate::tantivy_integration::IndexFields;

/// An element spanning tokens `start..end`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagElement {
    pub name: String,
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// A tokenized document: parallel token sequences per annotation plus elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanDocument {
    pub id: String,
    pub annotations: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub tags: Vec<TagElement>,
}

impl SpanDocument {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            annotations: BTreeMap::new(),
            tags: Vec::new(),
        }
    }

    /// Document with a `word` annotation from whitespace-separated text
    pub fn from_words(id: &str, text: &str) -> Self {
        Self::new(id).with_annotation(FIELD_WORD, text.split_whitespace())
    }

    pub fn with_annotation<I, S>(mut self, name: &str, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.annotations
            .insert(name.to_string(), tokens.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_tag(self, name: &str, start: u32, end: u32) -> Self {
        self.with_tag_attributes(name, start, end, &[])
    }

    pub fn with_tag_attributes(mut self, name: &str, start: u32, end: u32, attributes: &[(&str, &str)]) -> Self {
        self.tags.push(TagElement {
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

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.annotations.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the document fits a schema with the given annotations
    pub fn validate(&self, annotations: &[String]) -> Result<()> {
        let len = self.len();
        for (name, tokens) in &self.annotations {
            if !annotations.contains(name) {
                return Err(anyhow!("Document '{}' has unknown annotation '{}'", self.id, name));
            }
            if tokens.len() != len {
                return Err(anyhow!(
                    "Document '{}': annotation '{}' has {} tokens, expected {}",
                    self.id,
                    name,
                    tokens.len(),
                    len
                ));
            }
            if let Some(bad) = tokens.iter().find(|t| t.is_empty() || t.contains(POSITION_SEPARATOR)) {
                return Err(anyhow!("Document '{}': invalid token {:?} in '{}'", self.id, bad, name));
            }
        }
        for tag in &self.tags {
            if tag.start > tag.end || tag.end as usize > len {
                return Err(anyhow!(
                    "Document '{}': element '{}' {}..{} outside 0..{}",
                    self.id,
                    tag.name,
                    tag.start,
                    tag.end,
                    len
                ));
            }
            let labels = std::iter::once(&tag.name).chain(tag.attributes.keys()).chain(tag.attributes.values());
            for label in labels {
                if label.is_empty() || label.contains(POSITION_SEPARATOR) || label.contains(LABEL_SEPARATOR) {
                    return Err(anyhow!("Document '{}': invalid element label {:?}", self.id, label));
                }
            }
        }
        Ok(())
    }

    /// Start and end tag labels per position, `len + 1` positions each
    fn tag_positions(&self) -> (Vec<Vec<String>>, Vec<Vec<String>>) {
        let slots = self.len() + 1;
        let mut starts = vec![Vec::new(); slots];
        let mut ends = vec![Vec::new(); slots];
        // start and end tags alone cannot pair an empty element
        for tag in self.tags.iter().filter(|t| t.start < t.end) {
            let at_start = &mut starts[tag.start as usize];
            at_start.push(tag.name.clone());
            at_start.extend(tag.attributes.iter().map(|(k, v)| attribute_term(k, v)));
            ends[tag.end as usize].push(tag.name.clone());
        }
        (starts, ends)
    }

    pub(crate) fn to_tantivy(&self, fields: &IndexFields) -> Result<TantivyDocument> {
        let mut doc = TantivyDocument::default();
        doc.add_text(fields.doc_id, &self.id);
        doc.add_u64(fields.token_count, self.len() as u64);
        for (name, tokens) in &self.annotations {
            doc.add_text(fields.annotation(name)?, encode_tokens(tokens));
        }
        let skipped = self.tags.iter().filter(|t| t.start == t.end).count();
        if skipped > 0 {
            debug!("Document '{}': {} empty elements not indexed", self.id, skipped);
        }
        if !self.tags.is_empty() {
            let (starts, ends) = self.tag_positions();
            doc.add_text(fields.annotation(TAG_ANNOTATION)?, encode_tag_positions(&starts));
            doc.add_text(fields.annotation(END_TAG_ANNOTATION)?, encode_tag_positions(&ends));
        }
        Ok(doc)
    }
}

impl SpanEngine {
    /// Add a document to the index (visible after `commit`)
    pub fn add_document(&mut self, document: &SpanDocument) -> Result<()> {
        document.validate(&self.config.schema.annotations)?;
        let doc = document.to_tantivy(&self.fields)?;
        match &mut self.writer {
            Some(writer) => {
                writer.add_document(doc)?;
                Ok(())
            }
            None => Err(anyhow!(
                "Cannot add document: Engine is in READ-ONLY mode (index lock could not be acquired)"
            )),
        }
    }

    pub fn add_documents(&mut self, documents: &[SpanDocument]) -> Result<()> {
        for document in documents {
            self.add_document(document)?;
        }
        Ok(())
    }

    /// Delete every document with the given external id (visible after `commit`)
    pub fn delete_document(&mut self, id: &str) -> Result<()> {
        let term = Term::from_field_text(self.fields.doc_id, id);
        match &mut self.writer {
            Some(writer) => {
                writer.delete_term(term);
                Ok(())
            }
            None => Err(anyhow!("Cannot delete document: Engine is in READ-ONLY mode")),
        }
    }

    /// Commit pending changes and refresh the reader
    pub fn commit(&mut self) -> Result<()> {
        match &mut self.writer {
            Some(writer) => {
                writer.commit()?;
            }
            None => return Err(anyhow!("Cannot commit: Engine is in READ-ONLY mode")),
        }
        self.reader.reload()?;
        log::info!("Committed, {} documents searchable", self.num_docs());
        Ok(())
    }
}
