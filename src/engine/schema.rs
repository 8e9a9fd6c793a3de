//! Schema creation from the engine configuration

use anyhow::{anyhow, Result};
use tantivy::schema::{
    IndexRecordOption, Schema, SchemaBuilder, TextFieldIndexing, TextOptions, FAST, STORED, STRING,
};

use crate::engine::config::SchemaConfig;
use crate::engine::constants::*;
use crate::index::{END_TAG_ANNOTATION, TAG_ANNOTATION};

/// Build the tantivy schema of a span index
///
/// Every annotation becomes a text field indexed with positions through the
/// annotation tokenizer (stored when configured, so the stored token
/// sequence can serve as a forward index). Start and end tags get their
/// own position-aware fields. The token count is a FAST field.
pub fn build_schema(config: &SchemaConfig) -> Result<Schema> {
    let mut builder = Schema::builder();
    for annotation in &config.annotations {
        check_annotation_name(annotation)?;
        add_annotation_field(&mut builder, annotation, config.store_annotations);
    }
    add_tag_field(&mut builder, TAG_ANNOTATION);
    add_tag_field(&mut builder, END_TAG_ANNOTATION);
    builder.add_text_field(FIELD_DOC_ID, STRING | STORED);
    builder.add_u64_field(FIELD_TOKEN_COUNT, STORED | FAST);

    log::info!(
        "Schema created: {} annotations with positions, tags in '{}'/'{}'",
        config.annotations.len(),
        TAG_ANNOTATION,
        END_TAG_ANNOTATION
    );
    Ok(builder.build())
}

fn check_annotation_name(name: &str) -> Result<()> {
    if RESERVED_FIELDS.contains(&name) || name == TAG_ANNOTATION || name == END_TAG_ANNOTATION {
        return Err(anyhow!("'{}' is reserved and cannot be used as an annotation", name));
    }
    if name.is_empty() {
        return Err(anyhow!("Annotation names cannot be empty"));
    }
    Ok(())
}

fn add_annotation_field(builder: &mut SchemaBuilder, name: &str, stored: bool) {
    let indexing = TextFieldIndexing::default()
        .set_tokenizer(ANNOTATION_TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let mut options = TextOptions::default().set_indexing_options(indexing);
    if stored {
        options = options.set_stored();
    }
    builder.add_text_field(name, options);
    log::debug!("Added annotation field '{}' (stored: {})", name, stored);
}

fn add_tag_field(builder: &mut SchemaBuilder, name: &str) {
    let indexing = TextFieldIndexing::default()
        .set_tokenizer(TAG_TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    builder.add_text_field(name, TextOptions::default().set_indexing_options(indexing));
    log::debug!("Added tag field '{}'", name);
}
