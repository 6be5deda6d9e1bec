//! Map discovered classes to their source and back to spans.
//!
//! Selecting a class fetches its source once, then walks the whole tree
//! (regardless of visibility) and colours every source line a span of that
//! class executed. Exceptions override the colour of their line.

pub mod fetch;

pub use fetch::{DirectorySourceFetcher, HttpSourceFetcher};

use crate::parser::schema::Span;
use crate::utils::error::FetchError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source of class bodies, one string per line
pub trait SourceFetcher {
    fn fetch(&self, class_name: &str) -> Result<Vec<String>, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineState {
    #[default]
    NotExecuted,
    Executed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLine {
    /// 1-based
    pub number: u32,
    pub text: String,
    pub state: LineState,
}

/// A fetched class body with execution colouring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSource {
    pub name: String,
    pub lines: Vec<SourceLine>,
}

impl ClassSource {
    fn new(name: &str, lines: Vec<String>) -> Self {
        let lines = lines
            .into_iter()
            .enumerate()
            .map(|(i, text)| SourceLine {
                number: i as u32 + 1,
                text,
                state: LineState::NotExecuted,
            })
            .collect();
        Self {
            name: name.to_string(),
            lines,
        }
    }

    pub fn line(&self, number: u32) -> Option<&SourceLine> {
        number
            .checked_sub(1)
            .and_then(|i| self.lines.get(i as usize))
    }

    pub fn executed_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.state != LineState::NotExecuted)
            .count()
    }

    /// Clear and recompute line states from the tree
    fn colour(&mut self, root: &Span) {
        for line in &mut self.lines {
            line.state = LineState::NotExecuted;
        }

        let name = self.name.clone();
        let lines = &mut self.lines;
        root.walk(&mut |span| {
            if span.apex_class.as_deref() != Some(name.as_str()) {
                return;
            }
            let Some(number) = span.line_number else {
                return;
            };
            let Some(line) = number
                .checked_sub(1)
                .and_then(|i| lines.get_mut(i as usize))
            else {
                debug!("{} has no line {}", name, number);
                return;
            };
            if span.kind.is_error() {
                line.state = LineState::Error;
            } else if line.state == LineState::NotExecuted {
                line.state = LineState::Executed;
            }
        });
    }
}

/// Per-session class cache plus the current selection
pub struct ClassCorrelator<F> {
    fetcher: F,
    cache: HashMap<String, ClassSource>,
    selected: Option<String>,
}

impl<F: SourceFetcher> ClassCorrelator<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            cache: HashMap::new(),
            selected: None,
        }
    }

    /// Select a class, fetching it on first use, and colour its lines
    ///
    /// **Public** - main entry point for correlation
    ///
    /// Failed fetches are not cached, so selecting the class again retries.
    /// A failed selection leaves nothing selected.
    pub fn select(&mut self, root: &Span, class_name: &str) -> Result<&ClassSource, FetchError> {
        self.selected = None;
        if !self.cache.contains_key(class_name) {
            let lines = self.fetcher.fetch(class_name).map_err(|e| {
                warn!("Could not fetch source for {}: {}", class_name, e);
                e
            })?;
            self.cache
                .insert(class_name.to_string(), ClassSource::new(class_name, lines));
        }

        self.selected = Some(class_name.to_string());
        let source = self
            .cache
            .get_mut(class_name)
            .ok_or_else(|| FetchError::NotFound(class_name.to_string()))?;
        source.colour(root);
        debug!(
            "Correlated {}: {} of {} lines executed",
            class_name,
            source.executed_count(),
            source.lines.len()
        );
        Ok(&*source)
    }

    pub fn selected(&self) -> Option<&ClassSource> {
        self.selected
            .as_deref()
            .and_then(|name| self.cache.get(name))
    }

    pub fn is_cached(&self, class_name: &str) -> bool {
        self.cache.contains_key(class_name)
    }

    /// Spans of the selected class that ran the given source line
    pub fn spans_at_line<'a>(&self, root: &'a Span, line: u32) -> Vec<&'a Span> {
        match self.selected.as_deref() {
            Some(class_name) => spans_at_line(root, class_name, line),
            None => Vec::new(),
        }
    }
}

/// All spans of `class_name` whose record referenced `line`, in tree order
pub fn spans_at_line<'a>(root: &'a Span, class_name: &str, line: u32) -> Vec<&'a Span> {
    let mut found = Vec::new();
    root.walk(&mut |span| {
        if span.line_number == Some(line) && span.apex_class.as_deref() == Some(class_name) {
            found.push(span);
        }
    });
    found
}
