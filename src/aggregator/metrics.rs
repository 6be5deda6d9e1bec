//! Metric rollups and summary statistics.
//!
//! Rollups run as a separate pass after the tree is fully built, so every
//! child's contribution is final before it is summed into its parent.

use crate::parser::schema::{Metrics, Span};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Compute cumulative metrics for a subtree
///
/// **Public** - main entry point for metrics calculation
///
/// Post-order: `totals = metrics + sum(child.totals)` on every span.
/// Idempotent, so it is safe to re-run after spans change.
pub fn aggregate(span: &mut Span) -> Metrics {
    let mut totals = span.metrics;
    for child in &mut span.children {
        totals += aggregate(child);
    }
    span.totals = totals;
    totals
}

/// Time spent in a span excluding its children (ms)
pub fn self_time(span: &Span) -> f64 {
    let children: f64 = span.children.iter().map(|c| c.duration).sum();
    (span.duration - children).max(0.0)
}

/// A span ranked by its own time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotSpan {
    pub index: usize,
    pub title: String,
    pub kind: String,
    pub duration: f64,
    pub self_time: f64,
    /// Percentage of the whole log's duration
    pub percentage: f64,
}

/// Spans with the most self time, descending
///
/// **Public** - used for the terminal summary and the report
pub fn hot_spans(root: &Span, top_n: usize) -> Vec<HotSpan> {
    let total = root.duration;
    let mut spans = Vec::new();
    for child in &root.children {
        child.walk(&mut |span| spans.push(span));
    }

    spans.sort_by(|a, b| self_time(b).total_cmp(&self_time(a)));

    spans
        .into_iter()
        .take(top_n)
        .map(|span| {
            let own = self_time(span);
            HotSpan {
                index: span.index,
                title: span.title.clone(),
                kind: span.kind.label().to_string(),
                duration: span.duration,
                self_time: own,
                percentage: if total > 0.0 { own / total * 100.0 } else { 0.0 },
            }
        })
        .collect()
}

/// Per-kind counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindStats {
    pub count: usize,
    pub self_time: f64,
}

/// Whole-log statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogSummary {
    /// Spans excluding the root
    pub span_count: usize,

    /// Deepest nesting below the root
    pub max_depth: usize,

    /// Root rollups
    pub totals: Metrics,

    pub duration_ms: f64,

    pub by_kind: BTreeMap<String, KindStats>,
}

impl LogSummary {
    /// Get human-readable summary
    ///
    /// **Public** - for logging and debugging
    pub fn summary(&self) -> String {
        format!(
            "Spans: {} | Depth: {} | Duration: {:.2} ms | SOQL: {} ({} rows) | DML: {} ({} rows) | Callouts: {} | Heap: {} bytes",
            self.span_count,
            self.max_depth,
            self.duration_ms,
            self.totals.soql,
            self.totals.rows,
            self.totals.dml,
            self.totals.dml_rows,
            self.totals.callouts,
            self.totals.heap
        )
    }
}

/// Summarize an aggregated tree
pub fn summarize(root: &Span) -> LogSummary {
    let mut summary = LogSummary {
        totals: root.totals,
        duration_ms: root.duration,
        ..Default::default()
    };

    fn visit(span: &Span, depth: usize, summary: &mut LogSummary) {
        summary.span_count += 1;
        summary.max_depth = summary.max_depth.max(depth);
        let stats = summary
            .by_kind
            .entry(span.kind.label().to_string())
            .or_default();
        stats.count += 1;
        stats.self_time += self_time(span);
        for child in &span.children {
            visit(child, depth + 1, summary);
        }
    }

    for child in &root.children {
        visit(child, 1, &mut summary);
    }

    debug!("{}", summary.summary());
    summary
}
