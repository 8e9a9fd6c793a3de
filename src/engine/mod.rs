//! Engine module: span search over a tantivy index
//!
//! - `constants`: field and tokenizer names
//! - `config`: engine configuration (YAML)
//! - `schema`: schema creation from the configuration
//! - `core`: SpanEngine struct and constructors
//! - `execution`: query rewriting and parallel per-segment search
//! - `document`: token documents, adding, deleting and committing

pub mod config;
pub mod constants;
pub mod core;
pub mod document;
pub mod execution;
pub mod schema;

pub use config::{BucketConfig, ExpansionConfig, MatchingConfig, SchemaConfig, SpanConfig};
pub use constants::*;
pub use core::SpanEngine;
pub use document::{SpanDocument, TagElement};
pub use schema::build_schema;
