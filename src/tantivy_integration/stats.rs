//! Index-wide term statistics and regex term expansion.

use std::collections::BTreeSet;

use log::{debug, warn};
use tantivy::postings::Postings;
use tantivy::schema::IndexRecordOption;
use tantivy::{DocSet, Searcher, Term, TERMINATED};
use tantivy_fst::Regex;

use super::fields::IndexFields;
use crate::error::{Result, SpanError};
use crate::index::IndexStats;

/// Statistics over every segment of a searcher
pub struct TantivyStats<'a> {
    searcher: &'a Searcher,
    fields: &'a IndexFields,
}

impl<'a> TantivyStats<'a> {
    pub fn new(searcher: &'a Searcher, fields: &'a IndexFields) -> Self {
        Self { searcher, fields }
    }
}

impl IndexStats for TantivyStats<'_> {
    fn total_term_freq(&self, annotation: &str, term: &str) -> Result<u64> {
        let field = self.fields.annotation(annotation)?;
        let term = Term::from_field_text(field, term);
        let mut total = 0u64;
        for segment in self.searcher.segment_readers() {
            let inverted = segment.inverted_index(field)?;
            let Some(mut postings) = inverted.read_postings(&term, IndexRecordOption::WithFreqs)? else {
                continue;
            };
            while postings.doc() != TERMINATED {
                total += u64::from(postings.term_freq());
                postings.advance();
            }
        }
        Ok(total)
    }

    fn sum_total_term_freq(&self, annotation: &str) -> Result<u64> {
        let field = self.fields.annotation(annotation)?;
        let mut total = 0u64;
        for segment in self.searcher.segment_readers() {
            total += segment.inverted_index(field)?.total_num_tokens();
        }
        Ok(total)
    }

    fn expand_terms(&self, annotation: &str, regex: &str, limit: usize) -> Result<Vec<String>> {
        let field = self.fields.annotation(annotation)?;
        let automaton = Regex::new(regex).map_err(|e| SpanError::InvalidTermPattern {
            pattern: regex.to_string(),
            reason: e.to_string(),
        })?;
        let mut terms = BTreeSet::new();
        for segment in self.searcher.segment_readers() {
            let inverted = segment.inverted_index(field)?;
            let mut stream = inverted.terms().search(&automaton).into_stream()?;
            while stream.advance() {
                terms.insert(String::from_utf8_lossy(stream.key()).into_owned());
            }
        }
        if terms.len() > limit {
            warn!(
                "Pattern '{}' on '{}' matches {} terms, keeping the first {}",
                regex,
                annotation,
                terms.len(),
                limit
            );
        } else {
            debug!("Pattern '{}' on '{}' expanded to {} terms", regex, annotation, terms.len());
        }
        Ok(terms.into_iter().take(limit).collect())
    }

    fn has_forward_index(&self, annotation: &str) -> bool {
        self.fields.is_stored(annotation)
    }
}
