//! Aggregation of the span tree into metrics and table rows.
//!
//! This module transforms a parsed span tree into:
//! - Cumulative metrics on every span (rollups)
//! - Flattened, depth-annotated rows for tabular display
//! - Hot spans and whole-log summary statistics

pub mod flatten;
pub mod metrics;

// Re-export main types and functions
pub use flatten::{flatten, FlatRow, FlatTable, FlattenOptions};
pub use metrics::{aggregate, hot_spans, self_time, summarize, HotSpan, KindStats, LogSummary};
