//! Span Tree Builder
//!
//! Rebuilds the parent/child structure of a flat span list and flattens it
//! into a depth-annotated, pre-order sequence ready for rendering.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::models::telemetry::{compare_timestamps, Span};

/// Default nesting limit for one trace
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanTreeError {
    #[error("span '{span_id}' is nested deeper than {max_depth} levels")]
    DepthExceeded { span_id: String, max_depth: usize },
}

/// A span with its position in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedSpan {
    pub span: Span,
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub struct SpanTreeBuilder {
    max_depth: usize,
}

impl Default for SpanTreeBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl SpanTreeBuilder {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Order `spans` as a pre-order walk of their tree.
    ///
    /// Roots are spans without a parent or whose parent is not part of this
    /// trace. Roots and siblings are visited in start-time order. Every span
    /// is emitted at most once; spans that only reach each other through a
    /// cycle have no root and are left out.
    pub fn build(&self, spans: &[Span]) -> Result<Vec<OrderedSpan>, SpanTreeError> {
        let known: HashSet<&str> = spans.iter().map(|s| s.span_id.as_str()).collect();

        let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut roots: Vec<usize> = Vec::new();
        for (idx, span) in spans.iter().enumerate() {
            match span.parent_id() {
                Some(parent) if known.contains(parent) => {
                    children.entry(parent).or_default().push(idx)
                }
                _ => roots.push(idx),
            }
        }

        let by_start = |a: &usize, b: &usize| {
            compare_timestamps(&spans[*a].start_time, &spans[*b].start_time)
        };
        roots.sort_by(by_start);
        for siblings in children.values_mut() {
            siblings.sort_by(by_start);
        }

        let mut ordered = Vec::with_capacity(spans.len());
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<(usize, usize)> = roots.iter().rev().map(|&idx| (idx, 0)).collect();

        while let Some((idx, depth)) = stack.pop() {
            let span = &spans[idx];
            if !visited.insert(span.span_id.as_str()) {
                continue;
            }
            if depth > self.max_depth {
                return Err(SpanTreeError::DepthExceeded {
                    span_id: span.span_id.clone(),
                    max_depth: self.max_depth,
                });
            }

            ordered.push(OrderedSpan {
                span: span.clone(),
                depth,
            });

            if let Some(kids) = children.get(span.span_id.as_str()) {
                stack.extend(kids.iter().rev().map(|&child| (child, depth + 1)));
            }
        }

        Ok(ordered)
    }
}
