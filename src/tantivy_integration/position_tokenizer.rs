//! Position-aware tokenizers for annotation and tag fields
//!
//! Annotation fields hold one token per position: `The|quick|fox` indexes
//! `The` at 0, `quick` at 1 and `fox` at 2, with no normalization applied.
//!
//! Tag fields can hold several labels at one position and none at others:
//! `np,@type=full||` indexes `np` and `@type=full` at position 0 and nothing
//! at positions 1 and 2. Start tags are indexed at the first token of the
//! element, end tags at the (exclusive) end position.

use tantivy::tokenizer::{Token, TokenStream, Tokenizer};

/// Separates positions in both encodings
pub const POSITION_SEPARATOR: char = '|';

/// Separates labels sharing a position in the tag encoding
pub const LABEL_SEPARATOR: char = ',';

/// Stream emitting labels at the position they were listed at
pub struct TagTokenStream {
    labels: Vec<Vec<String>>,
    position: usize,
    label_index: usize,
    token: Token,
}

impl TagTokenStream {
    pub fn new(labels: Vec<Vec<String>>) -> Self {
        Self {
            labels,
            position: 0,
            label_index: 0,
            token: Token::default(),
        }
    }
}

impl TokenStream for TagTokenStream {
    fn advance(&mut self) -> bool {
        while let Some(at_position) = self.labels.get(self.position) {
            if let Some(label) = at_position.get(self.label_index) {
                self.token.text.clear();
                self.token.text.push_str(label);
                self.token.position = self.position;
                self.token.offset_from = self.position;
                self.token.offset_to = self.position + 1;
                self.label_index += 1;
                return true;
            }
            self.position += 1;
            self.label_index = 0;
        }
        false
    }

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }
}

/// Tokenizer for start and end tag fields
#[derive(Clone)]
pub struct TagTokenizer;

impl Tokenizer for TagTokenizer {
    type TokenStream<'a> = TagTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        let labels = text
            .split(POSITION_SEPARATOR)
            .map(|labels| {
                if labels.is_empty() {
                    Vec::new()
                } else {
                    labels.split(LABEL_SEPARATOR).map(str::to_string).collect()
                }
            })
            .collect();
        TagTokenStream::new(labels)
    }
}

/// Encode labels per position for a tag field
pub fn encode_tag_positions(labels: &[Vec<String>]) -> String {
    labels
        .iter()
        .map(|at_position| at_position.join(&LABEL_SEPARATOR.to_string()))
        .collect::<Vec<_>>()
        .join(&POSITION_SEPARATOR.to_string())
}

/// Stream emitting one token per position
pub struct AnnotationTokenStream {
    tokens: Vec<String>,
    index: usize,
    token: Token,
}

impl AnnotationTokenStream {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens,
            index: 0,
            token: Token::default(),
        }
    }
}

impl TokenStream for AnnotationTokenStream {
    fn advance(&mut self) -> bool {
        let Some(text) = self.tokens.get(self.index) else {
            return false;
        };
        self.token.text.clear();
        self.token.text.push_str(text);
        self.token.position = self.index;
        self.token.offset_from = self.index;
        self.token.offset_to = self.index + 1;
        self.index += 1;
        true
    }

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }
}

/// Tokenizer for annotation fields (word, lemma, pos, ...)
#[derive(Clone)]
pub struct AnnotationTokenizer;

impl Tokenizer for AnnotationTokenizer {
    type TokenStream<'a> = AnnotationTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        AnnotationTokenStream::new(split_tokens(text).map(str::to_string).collect())
    }
}

/// Encode one annotation of a document for indexing and storage
pub fn encode_tokens(tokens: &[String]) -> String {
    tokens.join(&POSITION_SEPARATOR.to_string())
}

/// Tokens of an encoded annotation, in position order
pub fn split_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(POSITION_SEPARATOR).filter(|_| !text.is_empty())
}
