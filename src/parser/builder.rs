//! Span tree builder.
//!
//! Walks the log's logical records once and assembles the span tree. Open
//! spans are kept on an explicit frame stack: each frame is a span still
//! waiting for one of its terminator tags. A terminator closes the frame
//! that expects it and hands the finished span to its parent frame.
//!
//! All mutable parse state (cursor, last seen timestamp, index counter,
//! discovered classes, diagnostics) belongs to one [`LogParser`]. Parsing a
//! second log means building a second parser.

use super::diagnostic::{Diagnostic, DiagnosticKind};
use super::dispatch::{rule_for, Opener, Rule};
use super::lines::{LineReader, LogRecord};
use super::schema::{Attachment, Span, SpanKind};
use super::timestamp::Timestamp;
use crate::aggregator::aggregate;
use log::{debug, warn};
use std::collections::BTreeSet;

/// Class and trigger names seen while building the tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredClasses {
    names: BTreeSet<String>,
    first: Option<String>,
}

impl DiscoveredClasses {
    pub fn insert(&mut self, name: &str) {
        if self.first.is_none() {
            self.first = Some(name.to_string());
        }
        self.names.insert(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// The first class discovered, selected for correlation by default
    pub fn first(&self) -> Option<&str> {
        self.first.as_deref()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Result of parsing one log
#[derive(Debug, Clone)]
pub struct ParsedLog {
    pub root: Span,
    pub classes: DiscoveredClasses,
    pub diagnostics: Vec<Diagnostic>,
    /// Physical lines in the source text
    pub line_count: usize,
}

/// A span waiting for its terminator
struct Frame {
    span: Span,
    terminators: &'static [&'static str],
}

impl Frame {
    fn expects(&self, tag: &str) -> bool {
        self.terminators.contains(&tag)
    }
}

/// Single-use parser over one log text
pub struct LogParser<'a> {
    reader: LineReader<'a>,
    last_seen: Timestamp,
    last_line: usize,
    next_index: usize,
    classes: DiscoveredClasses,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> LogParser<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            reader: LineReader::new(text),
            last_seen: Timestamp::default(),
            last_line: 0,
            next_index: 1,
            classes: DiscoveredClasses::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Build the span tree
    ///
    /// Metrics rollups are not computed here; see [`parse_log`].
    pub fn parse(mut self) -> ParsedLog {
        let mut stack = vec![Frame {
            span: Span::root(),
            terminators: &[],
        }];

        while let Some(record) = self.reader.next_record() {
            self.observe(&record);
            if stack[0].span.start.is_none() && stack[0].span.start_nanos.is_none() {
                stack[0].span.start = record.timestamp.time;
                stack[0].span.start_nanos = record.timestamp.nanos;
                stack[0].span.log_start_line = record.start_line;
            }
            self.dispatch(&mut stack, record);
        }

        // Truncated logs leave frames open; close them at the last timestamp seen.
        while stack.len() > 1 {
            if let Some(frame) = stack.pop() {
                debug!(
                    "Closing unterminated {} at end of log",
                    frame.span.kind.label()
                );
                let mut span = frame.span;
                span.close(self.last_seen, self.last_line);
                adopt(&mut stack, span);
            }
        }

        let mut root = match stack.pop() {
            Some(frame) => frame.span,
            None => Span::root(),
        };
        root.close(self.last_seen, self.last_line);

        debug!(
            "Built span tree: {} spans, {} classes, {} diagnostics",
            root.span_count(),
            self.classes.len(),
            self.diagnostics.len()
        );

        ParsedLog {
            root,
            classes: self.classes,
            diagnostics: self.diagnostics,
            line_count: self.reader.physical_line_count(),
        }
    }

    /// Track the running timestamp used to close spans at end of input
    fn observe(&mut self, record: &LogRecord) {
        let ts = record.timestamp;
        if !ts.is_complete() {
            self.report(
                record.start_line,
                DiagnosticKind::InvalidTimestamp {
                    value: record.raw_timestamp.clone(),
                },
            );
        }
        if ts.time.is_some() {
            self.last_seen.time = ts.time;
        }
        if ts.nanos.is_some() {
            self.last_seen.nanos = ts.nanos;
        }
        self.last_line = record.end_line;
    }

    fn dispatch(&mut self, stack: &mut Vec<Frame>, record: LogRecord) {
        let tag = record.tag.as_str();

        if let Some(depth) = stack.iter().rposition(|f| f.expects(tag)) {
            self.close_through(stack, depth, &record);
            return;
        }

        match rule_for(tag) {
            Rule::Begin { open, terminators } => {
                let span = self.open(stack, open, &record);
                stack.push(Frame { span, terminators });
            }
            Rule::SelfClosing(open) => {
                let mut span = self.open(stack, open, &record);
                // Borrow the next record's time without consuming it.
                let end = self.reader.peek_timestamp().unwrap_or(record.timestamp);
                span.close(end, record.end_line);
                adopt(stack, span);
            }
            Rule::Attach(attachment) => self.attach(stack, attachment, &record),
            Rule::End => {
                self.report(
                    record.start_line,
                    DiagnosticKind::UnexpectedTerminator {
                        tag: tag.to_string(),
                    },
                );
                // The observed terminator wins: it closes whatever is open.
                if stack.len() > 1 {
                    let depth = stack.len() - 1;
                    self.close_through(stack, depth, &record);
                }
            }
            Rule::Ignore => {}
        }
    }

    /// Close every frame from the top down to `depth` (inclusive)
    ///
    /// Frames above `depth` did not expect this terminator; each one is
    /// reported and closed at the terminator's time.
    fn close_through(&mut self, stack: &mut Vec<Frame>, depth: usize, record: &LogRecord) {
        while stack.len() > depth + 1 {
            let Some(frame) = stack.pop() else { break };
            self.report(
                record.start_line,
                DiagnosticKind::TerminatorMismatch {
                    expected: frame.terminators.join("/"),
                    found: record.tag.clone(),
                },
            );
            let mut span = frame.span;
            span.close(record.timestamp, record.end_line);
            adopt(stack, span);
        }

        if stack.len() <= 1 {
            return;
        }
        if let Some(frame) = stack.pop() {
            let mut span = frame.span;
            if let Some(problem) = span.finish_with(record) {
                self.report(record.start_line, problem);
            }
            span.close(record.timestamp, record.end_line);
            adopt(stack, span);
        }
    }

    /// Spans that name no class of their own run inside the enclosing one
    fn open(&mut self, stack: &[Frame], open: Opener, record: &LogRecord) -> Span {
        let mut draft = open(record);
        for problem in &draft.problems {
            self.report(record.start_line, problem.clone());
        }
        match &draft.apex_class {
            Some(class_name) => self.classes.insert(class_name),
            None => {
                draft.apex_class = stack
                    .iter()
                    .rev()
                    .find_map(|f| f.span.apex_class.clone());
            }
        }

        let index = self.next_index;
        self.next_index += 1;
        Span::open(index, draft, record)
    }

    /// Attach to the most specific open span that accepts the data
    fn attach(&mut self, stack: &mut [Frame], attachment: Attachment, record: &LogRecord) {
        let Some(pos) = stack
            .iter()
            .rposition(|f| f.span.kind.accepts(attachment))
        else {
            debug!(
                "No open span accepts {} at line {}",
                record.tag, record.start_line
            );
            return;
        };

        let frame = &mut stack[pos].span;
        let to_invocation = attachment.is_workflow()
            && frame
                .children
                .last()
                .is_some_and(|c| matches!(c.kind, SpanKind::WorkflowRuleInvocation(_)));

        let target = if to_invocation {
            let last = frame.children.len() - 1;
            &mut frame.children[last]
        } else {
            frame
        };

        if let Some(problem) = target.attach(attachment, record) {
            self.report(record.start_line, problem);
        }
    }

    fn report(&mut self, line: usize, kind: DiagnosticKind) {
        let diagnostic = Diagnostic { line, kind };
        warn!("{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}

/// Append a finished span to the innermost open frame
fn adopt(stack: &mut [Frame], span: Span) {
    if let Some(parent) = stack.last_mut() {
        parent.span.children.push(span);
    }
}

/// Parse a log and compute metric rollups
///
/// **Public** - main entry point for parsing
pub fn parse_log(text: &str) -> ParsedLog {
    let mut parsed = LogParser::new(text).parse();
    aggregate(&mut parsed.root);
    parsed
}
