//! Mapping from annotation names to tantivy fields.

use std::collections::HashMap;

use tantivy::schema::{Field, Schema};

use crate::engine::constants::{FIELD_DOC_ID, FIELD_TOKEN_COUNT};
use crate::error::{Result, SpanError};
use crate::index::{END_TAG_ANNOTATION, TAG_ANNOTATION};

/// Fields of a span index
#[derive(Debug, Clone)]
pub struct IndexFields {
    annotations: HashMap<String, Field>,
    stored: HashMap<String, bool>,
    pub doc_id: Field,
    pub token_count: Field,
}

impl IndexFields {
    /// Look up the annotation fields (plus tag fields) in a schema
    pub fn from_schema(schema: &Schema, annotations: &[String]) -> Result<Self> {
        let mut fields = HashMap::new();
        let mut stored = HashMap::new();
        let names = annotations
            .iter()
            .map(String::as_str)
            .chain([TAG_ANNOTATION, END_TAG_ANNOTATION]);
        for name in names {
            let field = schema
                .get_field(name)
                .map_err(|_| SpanError::UnknownAnnotation(name.to_string()))?;
            stored.insert(name.to_string(), schema.get_field_entry(field).is_stored());
            fields.insert(name.to_string(), field);
        }
        Ok(Self {
            annotations: fields,
            stored,
            doc_id: schema.get_field(FIELD_DOC_ID)?,
            token_count: schema.get_field(FIELD_TOKEN_COUNT)?,
        })
    }

    pub fn annotation(&self, name: &str) -> Result<Field> {
        self.annotations
            .get(name)
            .copied()
            .ok_or_else(|| SpanError::UnknownAnnotation(name.to_string()))
    }

    /// Whether the annotation's token sequence is stored and can serve as a forward index
    pub fn is_stored(&self, name: &str) -> bool {
        self.stored.get(name).copied().unwrap_or(false)
    }
}
