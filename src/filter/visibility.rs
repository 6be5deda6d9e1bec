//! Visibility filtering.
//!
//! A span is shown when it matches the active filter or when any of its
//! descendants is shown. Recomputation recurses first and combines on the
//! way back up, since a parent depends on its children's outcome.
//!
//! A collapsed span freezes its subtree: its children keep whatever state
//! they had when it was collapsed.

use crate::parser::schema::{Metrics, Span};
use crate::utils::error::FilterError;
use log::debug;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::str::FromStr;

/// Filter by the presence of a rolled-up metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFilter {
    Soql,
    Sosl,
    Dml,
    Callout,
    Rows,
    Heap,
}

impl TypeFilter {
    pub const ALL: [TypeFilter; 6] = [
        Self::Soql,
        Self::Sosl,
        Self::Dml,
        Self::Callout,
        Self::Rows,
        Self::Heap,
    ];

    /// The cumulative metric this filter looks at
    pub fn metric(self, totals: &Metrics) -> u64 {
        match self {
            Self::Soql => totals.soql,
            Self::Sosl => totals.sosl,
            Self::Dml => totals.dml,
            Self::Callout => totals.callouts,
            Self::Rows => totals.rows.saturating_add(totals.dml_rows),
            Self::Heap => totals.heap,
        }
    }

    pub fn matches(self, span: &Span) -> bool {
        self.metric(&span.totals) > 0
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Soql => "SOQL",
            Self::Sosl => "SOSL",
            Self::Dml => "DML",
            Self::Callout => "Callout",
            Self::Rows => "Rows",
            Self::Heap => "Heap",
        }
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeFilter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FilterError::UnknownType(s.to_string()))
    }
}

/// Free-text title matcher, always case-insensitive
#[derive(Debug, Clone)]
pub enum SearchPattern {
    /// Lowercased needle
    Substring(String),
    Regex(Regex),
}

impl SearchPattern {
    pub fn substring(text: &str) -> Self {
        Self::Substring(text.to_lowercase())
    }

    pub fn regex(pattern: &str) -> Result<Self, FilterError> {
        let re = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self::Regex(re))
    }

    pub fn matches(&self, title: &str) -> bool {
        match self {
            Self::Substring(needle) => title.to_lowercase().contains(needle.as_str()),
            Self::Regex(re) => re.is_match(title),
        }
    }
}

/// Active filter: both families must match; an inactive family matches all
#[derive(Debug, Clone, Default)]
pub struct SpanFilter {
    pub type_filter: Option<TypeFilter>,
    pub search: Option<SearchPattern>,
}

impl SpanFilter {
    pub fn by_type(type_filter: TypeFilter) -> Self {
        Self {
            type_filter: Some(type_filter),
            search: None,
        }
    }

    pub fn by_search(search: SearchPattern) -> Self {
        Self {
            type_filter: None,
            search: Some(search),
        }
    }

    pub fn is_active(&self) -> bool {
        self.type_filter.is_some() || self.search.is_some()
    }

    pub fn matches(&self, span: &Span) -> bool {
        let type_ok = self.type_filter.map_or(true, |t| t.matches(span));
        let search_ok = self
            .search
            .as_ref()
            .map_or(true, |s| s.matches(&span.title));
        type_ok && search_ok
    }
}

/// Recompute `hidden` over the whole tree
///
/// **Public** - main entry point for filtering
///
/// Returns the number of visible spans (root included).
pub fn apply_filter(root: &mut Span, filter: &SpanFilter) -> usize {
    let mut visible = 0;
    if !recompute(root, filter, &mut visible) {
        visible += 1;
    }
    root.hidden = false;
    debug!(
        "Filter applied (active: {}): {} visible spans",
        filter.is_active(),
        visible
    );
    visible
}

/// Returns whether `span` ended up visible
fn recompute(span: &mut Span, filter: &SpanFilter, visible: &mut usize) -> bool {
    let mut any_child_visible = false;
    if span.expanded {
        for child in &mut span.children {
            any_child_visible |= recompute(child, filter, visible);
        }
    } else {
        any_child_visible = span.children.iter().any(|c| !c.hidden);
    }

    span.hidden = !filter.matches(span) && !any_child_visible;
    if !span.hidden {
        *visible += 1;
    }
    !span.hidden
}

/// Set a span's expanded flag by index; returns false if not found
pub fn set_expanded(root: &mut Span, index: usize, expanded: bool) -> bool {
    match root.find_mut(index) {
        Some(span) => {
            span.expanded = expanded;
            true
        }
        None => false,
    }
}
