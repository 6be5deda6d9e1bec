//! Flatten the span tree into profiler table rows.
//!
//! Low-signal spans (plain method entries, constructors, assignments,
//! statements) are elided unless they are slow. Eliding never re-parents:
//! the children of an elided span keep the level they have in the tree.

use super::metrics::self_time;
use crate::parser::schema::{Metrics, Span};
use crate::utils::config::{AnalyzerConfig, DEFAULT_FLATTEN_THRESHOLD_MS};
use serde::{Deserialize, Serialize};

/// One table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRow {
    /// Dotted path of sibling positions, e.g. `1.2.4`
    pub key: String,

    /// Span construction index
    pub index: usize,

    /// Tree depth, root = 1
    pub level: usize,

    /// 1-based position among the span's siblings in the tree
    pub position: usize,

    pub title: String,
    pub kind: String,
    pub duration: f64,
    pub self_time: f64,
    pub metrics: Metrics,
    pub totals: Metrics,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub apex_class: Option<String>,

    pub log_start_line: usize,
    pub log_end_line: usize,
    pub hidden: bool,
}

/// Flattened rows plus the deepest level emitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatTable {
    pub rows: Vec<FlatRow>,
    pub max_level: usize,
}

impl FlatTable {
    pub fn visible_rows(&self) -> impl Iterator<Item = &FlatRow> {
        self.rows.iter().filter(|r| !r.hidden)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlattenOptions {
    /// Low-signal spans must take longer than this (ms) to be emitted
    pub threshold_ms: f64,

    /// Emit spans hidden by the visibility filter
    pub include_hidden: bool,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            threshold_ms: DEFAULT_FLATTEN_THRESHOLD_MS,
            include_hidden: true,
        }
    }
}

impl From<&AnalyzerConfig> for FlattenOptions {
    fn from(config: &AnalyzerConfig) -> Self {
        Self {
            threshold_ms: config.flatten_threshold_ms,
            ..Default::default()
        }
    }
}

/// Flatten a tree into table rows
///
/// **Public** - main entry point for tabular display
pub fn flatten(root: &Span, options: &FlattenOptions) -> FlatTable {
    let mut table = FlatTable::default();
    visit(root, 1, 1, String::from("1"), options, &mut table);
    table
}

fn is_elided(span: &Span, options: &FlattenOptions) -> bool {
    !span.is_root() && span.kind.is_low_signal() && span.duration <= options.threshold_ms
}

fn visit(
    span: &Span,
    level: usize,
    position: usize,
    key: String,
    options: &FlattenOptions,
    table: &mut FlatTable,
) {
    if span.hidden && !options.include_hidden && !span.is_root() {
        return;
    }

    if !is_elided(span, options) {
        table.max_level = table.max_level.max(level);
        table.rows.push(FlatRow {
            key: key.clone(),
            index: span.index,
            level,
            position,
            title: span.title.clone(),
            kind: span.kind.label().to_string(),
            duration: span.duration,
            self_time: self_time(span),
            metrics: span.metrics,
            totals: span.totals,
            line_number: span.line_number,
            apex_class: span.apex_class.clone(),
            log_start_line: span.log_start_line,
            log_end_line: span.log_end_line,
            hidden: span.hidden,
        });
    }

    for (i, child) in span.children.iter().enumerate() {
        let child_key = format!("{}.{}", key, i + 1);
        visit(child, level + 1, i + 1, child_key, options, table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::schema::SpanKind;

    fn node(index: usize, kind: SpanKind, duration: f64, children: Vec<Span>) -> Span {
        let mut s = Span::detached(index, kind, format!("s{}", index));
        s.duration = duration;
        s.children = children;
        s
    }

    #[test]
    fn test_root_is_level_one() {
        let root = Span::root();
        let table = flatten(&root, &FlattenOptions::default());
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].level, 1);
        assert_eq!(table.rows[0].key, "1");
        assert_eq!(table.max_level, 1);
    }

    #[test]
    fn test_slow_method_is_kept() {
        let mut root = Span::root();
        root.children = vec![
            node(1, SpanKind::Method, 10.0, vec![]),
            node(2, SpanKind::Method, 10.5, vec![]),
        ];
        let table = flatten(&root, &FlattenOptions::default());
        let indexes: Vec<usize> = table.rows.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 2]);
        assert_eq!(table.rows[1].position, 2);
        assert_eq!(table.rows[1].key, "1.2");
    }

    #[test]
    fn test_hidden_rows_can_be_skipped() {
        let mut root = Span::root();
        let mut hidden = node(
            1,
            SpanKind::CodeUnit,
            1.0,
            vec![node(2, SpanKind::CodeUnit, 1.0, vec![])],
        );
        hidden.hidden = true;
        hidden.children[0].hidden = true;
        root.children = vec![hidden, node(3, SpanKind::CodeUnit, 1.0, vec![])];

        let options = FlattenOptions {
            include_hidden: false,
            ..Default::default()
        };
        let table = flatten(&root, &options);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.visible_rows().count(), 2);

        let all = flatten(&root, &FlattenOptions::default());
        assert_eq!(all.rows.len(), 4);
        assert_eq!(all.visible_rows().count(), 2);
    }
}
