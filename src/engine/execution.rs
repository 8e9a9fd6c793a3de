//! Query execution methods for SpanEngine

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use rayon::prelude::*;
use tantivy::schema::{TantivyDocument, Value};
use tantivy::{DocAddress, Searcher};

use crate::engine::core::SpanEngine;
use crate::index::SegmentContext;
use crate::query::{collect_hits, QueryNode, SegmentHits};
use crate::results::{SearchResults, SpanHit};
use crate::tantivy_integration::position_tokenizer::split_tokens;
use crate::tantivy_integration::{TantivySegment, TantivyStats};
use crate::types::DocId;

impl SpanEngine {
    /// Rewrite a query against the current index statistics
    pub fn rewrite(&self, query: &QueryNode) -> Result<QueryNode> {
        if query.field() != self.config.schema.base_field {
            return Err(anyhow!(
                "Query targets field '{}', index field is '{}'",
                query.field(),
                self.config.schema.base_field
            ));
        }
        let searcher = self.reader.searcher();
        let stats = TantivyStats::new(&searcher, &self.fields);
        let rewritten = query
            .rewrite(&stats, &self.config.rewrite_options())
            .context("Failed to rewrite query")?;
        debug!("Rewritten query: {:?}", rewritten);
        Ok(rewritten)
    }

    /// Run a query, returning at most `limit` hits
    pub fn search(&self, query: &QueryNode, limit: Option<usize>) -> Result<SearchResults> {
        let rewritten = self.rewrite(query)?;
        let searcher = self.reader.searcher();

        // PARALLEL: segments are searched independently and merged in segment order
        let per_segment: Vec<Result<SegmentHits>> = searcher
            .segment_readers()
            .par_iter()
            .map(|reader| {
                let segment = Arc::new(TantivySegment::open(reader, self.fields.clone())?);
                let mut context = SegmentContext::new(segment.clone())
                    .with_bucket_reuse_threshold(self.config.buckets.reuse_threshold);
                if self.config.schema.store_annotations {
                    context = context.with_forward_index(segment);
                }
                Ok(collect_hits(&rewritten, &context, limit)?)
            })
            .collect();

        let limit = limit.unwrap_or(usize::MAX);
        let mut group_names = rewritten.capture_names();
        let mut hits = Vec::new();
        let mut total_hits = 0;
        for (segment_ord, segment_hits) in per_segment.into_iter().enumerate() {
            let segment_hits = segment_hits.with_context(|| format!("Search failed in segment {}", segment_ord))?;
            if !segment_hits.group_names.is_empty() {
                group_names = segment_hits.group_names;
            }
            total_hits += segment_hits.total_hits;
            let room = limit.saturating_sub(hits.len());
            hits.extend(
                segment_hits
                    .hits
                    .into_iter()
                    .take(room)
                    .map(|(doc, hit)| (segment_ord as u32, doc, hit)),
            );
        }
        let truncated = total_hits > hits.len();

        let hits = hits
            .into_iter()
            .map(|(segment_ord, doc, hit)| self.describe_hit(&searcher, segment_ord, doc, hit))
            .collect::<Result<Vec<_>>>()?;
        info!(
            "Query matched {} hits, returning {}{}",
            total_hits,
            hits.len(),
            if truncated { " (truncated)" } else { "" }
        );

        Ok(SearchResults {
            total_hits,
            truncated,
            group_names,
            hits,
            rewritten_query: format!("{:?}", rewritten),
        })
    }

    fn describe_hit(
        &self,
        searcher: &Searcher,
        segment_ord: u32,
        doc: DocId,
        hit: crate::types::SpanWithCaptures,
    ) -> Result<SpanHit> {
        let stored: TantivyDocument = searcher.doc(DocAddress::new(segment_ord, doc))?;
        let document_id = stored
            .get_first(self.fields.doc_id)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let default_annotation = self.config.default_annotation();
        let tokens = match self.fields.annotation(default_annotation) {
            Ok(field) if self.fields.is_stored(default_annotation) => {
                let text = stored.get_first(field).and_then(|v| v.as_str()).unwrap_or("");
                let start = hit.span.start.max(0) as usize;
                let end = hit.span.end.max(0) as usize;
                split_tokens(text)
                    .skip(start)
                    .take(end.saturating_sub(start))
                    .map(str::to_string)
                    .collect()
            }
            _ => Vec::new(),
        };
        Ok(SpanHit {
            document_id,
            segment_ord,
            doc,
            span: hit.span,
            captures: hit.captures,
            tokens,
        })
    }
}
