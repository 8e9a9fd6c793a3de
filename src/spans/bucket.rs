//! Buffered hits of one document (or one start position).

use log::warn;

use super::{current_span, Spans};
use crate::error::Result;
use crate::types::{SortBy, Span, NO_MORE_POSITIONS};

/// Hits gathered from a cursor together with their captured groups.
///
/// Buffers are reused across documents unless a document produced more hits
/// than the reuse threshold, in which case they are released on `clear`.
#[derive(Debug)]
pub struct HitBucket {
    spans: Vec<Span>,
    groups: Vec<Option<Span>>,
    num_groups: usize,
    reuse_threshold: usize,
    scratch: Vec<Option<Span>>,
}

impl HitBucket {
    pub fn new(reuse_threshold: usize) -> Self {
        Self {
            spans: Vec::new(),
            groups: Vec::new(),
            num_groups: 0,
            reuse_threshold,
            scratch: Vec::new(),
        }
    }

    /// Number of group slots stored per hit; must be set before filling
    pub fn set_num_groups(&mut self, num_groups: usize) {
        self.num_groups = num_groups;
        self.scratch = vec![None; num_groups];
        self.clear();
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn clear(&mut self) {
        if self.spans.capacity() > self.reuse_threshold {
            warn!(
                "Releasing hit bucket buffers ({} hits, threshold {})",
                self.spans.capacity(),
                self.reuse_threshold
            );
            self.spans = Vec::new();
            self.groups = Vec::new();
        } else {
            self.spans.clear();
            self.groups.clear();
        }
    }

    /// Hits the buffers hold without reallocating
    pub fn capacity(&self) -> usize {
        self.spans.capacity()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn span(&self, index: usize) -> Span {
        self.spans[index]
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn groups(&self, index: usize) -> &[Option<Span>] {
        &self.groups[index * self.num_groups..(index + 1) * self.num_groups]
    }

    /// Copy the stored groups of a hit into `out`, leaving unset slots alone
    pub fn copy_groups(&self, index: usize, out: &mut [Option<Span>]) {
        for (slot, group) in self.groups(index).iter().enumerate() {
            if let (Some(group), Some(target)) = (group, out.get_mut(slot)) {
                *target = Some(*group);
            }
        }
    }

    pub fn push(&mut self, span: Span, groups: &[Option<Span>]) {
        self.spans.push(span);
        if self.num_groups > 0 {
            let n = groups.len().min(self.num_groups);
            self.groups.extend_from_slice(&groups[..n]);
            self.groups.extend(std::iter::repeat(None).take(self.num_groups - n));
        }
    }

    pub fn push_span(&mut self, span: Span) {
        self.spans.push(span);
        self.groups.extend(std::iter::repeat(None).take(self.num_groups));
    }

    /// Append the cursor's current hit
    pub fn push_current(&mut self, spans: &dyn Spans, captures: bool) {
        let span = current_span(spans);
        if self.num_groups > 0 && captures {
            self.scratch.iter_mut().for_each(|g| *g = None);
            spans.get_captured_groups(&mut self.scratch);
            self.spans.push(span);
            self.groups.extend_from_slice(&self.scratch);
        } else {
            self.push_span(span);
        }
    }

    /// Append all remaining hits of the cursor's current document
    pub fn fill(&mut self, spans: &mut dyn Spans, captures: bool) -> Result<()> {
        while spans.next_start_position()? != NO_MORE_POSITIONS {
            self.push_current(spans, captures);
        }
        Ok(())
    }

    /// Sort hits (and their groups) and optionally drop duplicate spans
    pub fn sort(&mut self, by: SortBy, unique: bool) {
        if self.num_groups == 0 {
            self.spans.sort_by(|a, b| by.compare(a, b));
            if unique {
                self.spans.dedup();
            }
            return;
        }
        let mut order: Vec<usize> = (0..self.spans.len()).collect();
        order.sort_by(|&a, &b| by.compare(&self.spans[a], &self.spans[b]).then(a.cmp(&b)));
        let mut spans = Vec::with_capacity(order.len());
        let mut groups = Vec::with_capacity(self.groups.len());
        for idx in order {
            let span = self.spans[idx];
            if unique && spans.last() == Some(&span) {
                continue;
            }
            spans.push(span);
            groups.extend_from_slice(self.groups(idx));
        }
        self.spans = spans;
        self.groups = groups;
    }
}
