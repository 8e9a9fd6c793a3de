//! Field and tokenizer names shared by schema creation, indexing and search

/// Stored external document identifier, indexed as a raw string for deletion
pub const FIELD_DOC_ID: &str = "doc_id";

/// Number of tokens in the document (FAST)
pub const FIELD_TOKEN_COUNT: &str = "token_count";

pub const FIELD_WORD: &str = "word";
pub const FIELD_LEMMA: &str = "lemma";
pub const FIELD_POS: &str = "pos";

/// Tokenizer registered for annotation fields
pub const ANNOTATION_TOKENIZER: &str = "annotation_tokenizer";

/// Tokenizer registered for start and end tag fields
pub const TAG_TOKENIZER: &str = "tag_tokenizer";

/// Names that cannot be used as annotations
pub const RESERVED_FIELDS: [&str; 2] = [FIELD_DOC_ID, FIELD_TOKEN_COUNT];
