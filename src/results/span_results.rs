use serde::{Deserialize, Serialize};
use tantivy::DocAddress;

use crate::types::{NamedCapture, Span};

/// One hit with its document and captured groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanHit {
    /// External document id
    pub document_id: String,
    pub segment_ord: u32,
    pub doc: u32,
    pub span: Span,
    pub captures: Vec<NamedCapture>,
    /// Tokens of the default annotation covered by the hit, when stored
    pub tokens: Vec<String>,
}

impl SpanHit {
    pub fn doc_address(&self) -> DocAddress {
        DocAddress::new(self.segment_ord, self.doc)
    }

    pub fn capture(&self, name: &str) -> Option<&Span> {
        self.captures.iter().find(|c| c.name == name).map(|c| &c.span)
    }

    /// Covered tokens joined by spaces
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }
}

/// Hits of a search in (segment, doc, start, end) order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Hits matched, including those past the limit
    pub total_hits: usize,
    /// Whether the hit limit cut the search short
    pub truncated: bool,
    pub group_names: Vec<String>,
    pub hits: Vec<SpanHit>,
    /// Debug form of the query actually executed
    pub rewritten_query: String,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// External ids of the documents with hits, first occurrence order
    pub fn document_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for hit in &self.hits {
            if !ids.contains(&hit.document_id.as_str()) {
                ids.push(&hit.document_id);
            }
        }
        ids
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
