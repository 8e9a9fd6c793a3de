//! Driving a cursor tree over one segment.

use log::debug;

use super::QueryNode;
use crate::error::Result;
use crate::index::SegmentContext;
use crate::spans::{HitQueryContext, Spans};
use crate::types::{DocId, Span, SpanWithCaptures, NO_MORE_DOCS, NO_MORE_POSITIONS};

/// Hits found in one segment, in document then hit order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentHits {
    /// Capture group names by slot
    pub group_names: Vec<String>,
    pub hits: Vec<(DocId, SpanWithCaptures)>,
    /// Hits in the segment, including those past the limit
    pub total_hits: usize,
}

impl SegmentHits {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Documents with at least one hit
    pub fn docs(&self) -> Vec<DocId> {
        let mut docs: Vec<DocId> = self.hits.iter().map(|(doc, _)| *doc).collect();
        docs.dedup();
        docs
    }
}

/// Run a rewritten query over a segment, keeping the first `limit` hits.
///
/// Hits past the limit are counted but not materialized.
pub fn collect_hits(node: &QueryNode, segment: &SegmentContext, limit: Option<usize>) -> Result<SegmentHits> {
    let mut context = HitQueryContext::with_names(node.capture_names());
    let Some(mut cursor) = node.create_cursor(segment)? else {
        return Ok(SegmentHits {
            group_names: context.names().to_vec(),
            hits: Vec::new(),
            total_hits: 0,
        });
    };
    cursor.set_context(&mut context);
    let mut groups: Vec<Option<Span>> = vec![None; context.num_groups()];
    let limit = limit.unwrap_or(usize::MAX);
    let mut hits = Vec::new();
    let mut total_hits = 0;

    while cursor.next_doc()? != NO_MORE_DOCS {
        let doc = cursor.doc_id();
        while cursor.next_start_position()? != NO_MORE_POSITIONS {
            total_hits += 1;
            if hits.len() >= limit {
                continue;
            }
            let span = Span::new(cursor.start_position(), cursor.end_position());
            let mut hit = SpanWithCaptures::new(span);
            if !groups.is_empty() {
                groups.iter_mut().for_each(|g| *g = None);
                cursor.get_captured_groups(&mut groups);
                for (name, group) in context.names().iter().zip(&groups) {
                    if let Some(group) = group {
                        hit.add_capture(name.clone(), *group);
                    }
                }
            }
            hits.push((doc, hit));
            if hits.len() == limit {
                debug!("Hit limit {} reached in doc {}, counting the rest", limit, doc);
            }
        }
    }

    Ok(SegmentHits {
        group_names: context.names().to_vec(),
        hits,
        total_hits,
    })
}
