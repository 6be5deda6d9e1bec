//! Logical line reader.
//!
//! A debug log is a sequence of physical lines. A logical record starts on a
//! line carrying a timestamp at column 0; any following line without one
//! (stack traces, explain plans, multi-line debug output) continues the
//! previous record.
//!
//! The reader never materializes the record list. It keeps a cursor over
//! physical lines and derives record boundaries as it goes.

use super::timestamp::{parse_timestamp, Timestamp};
use log::debug;
use regex::Regex;
use std::sync::OnceLock;

fn record_start() -> &'static Regex {
    static RECORD_START: OnceLock<Regex> = OnceLock::new();
    RECORD_START.get_or_init(|| {
        Regex::new(r"^\d{2}:\d{2}:\d{2}(\.\d+)? \(\d+\)\|").expect("valid regex")
    })
}

/// Whether a physical line starts a new logical record
pub fn is_record_start(line: &str) -> bool {
    record_start().is_match(line)
}

/// One logical record: `timestamp|TAG|field|field...`
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// First physical line (1-based)
    pub start_line: usize,

    /// Last physical line, including continuations (1-based)
    pub end_line: usize,

    /// Raw timestamp text
    pub raw_timestamp: String,

    pub timestamp: Timestamp,

    pub tag: String,

    /// Fields after the tag
    pub fields: Vec<String>,
}

impl LogRecord {
    /// Parse a logical record from its joined text
    pub fn parse(text: &str, start_line: usize, end_line: usize) -> Self {
        let mut parts = text.split('|');
        let raw_timestamp = parts.next().unwrap_or_default().to_string();
        let tag = parts.next().unwrap_or_default().trim().to_string();
        let fields = parts.map(str::to_string).collect();

        Self {
            start_line,
            end_line,
            timestamp: parse_timestamp(&raw_timestamp),
            raw_timestamp,
            tag,
            fields,
        }
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Last non-empty field
    pub fn last_field(&self) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .map(String::as_str)
            .find(|f| !f.trim().is_empty())
    }

    /// Fields from `index` onwards, re-joined with the delimiter
    ///
    /// Free text (debug messages, query bodies) may itself contain `|`.
    pub fn rest_from(&self, index: usize) -> Option<String> {
        if index >= self.fields.len() {
            return None;
        }
        Some(self.fields[index..].join("|"))
    }

    /// Source line from a `[N]` field; `[EXTERNAL]` and friends yield `None`
    pub fn line_ref(&self) -> Option<u32> {
        self.fields
            .first()
            .and_then(|f| f.strip_prefix('['))
            .and_then(|f| f.strip_suffix(']'))
            .and_then(|n| n.parse().ok())
    }

    /// Value of the first `Key:value` field for `key`
    pub fn keyed(&self, key: &str) -> Option<&str> {
        self.fields.iter().find_map(|f| {
            f.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix(':'))
                .map(str::trim)
        })
    }
}

/// Cursor over the physical lines of a log
pub struct LineReader<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> LineReader<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
        }
    }

    pub fn physical_line_count(&self) -> usize {
        self.lines.len()
    }

    /// Consume and return the next logical record
    pub fn next_record(&mut self) -> Option<LogRecord> {
        let start = self.next_start(self.pos)?;
        if start > self.pos {
            debug!(
                "Skipping {} line(s) outside any record at line {}",
                start - self.pos,
                self.pos + 1
            );
        }

        let end = self.record_end(start);
        self.pos = end;
        Some(self.assemble(start, end))
    }

    /// Return the next logical record without consuming it
    pub fn peek_record(&self) -> Option<LogRecord> {
        let start = self.next_start(self.pos)?;
        let end = self.record_end(start);
        Some(self.assemble(start, end))
    }

    /// Timestamp of the next record, without consuming it
    pub fn peek_timestamp(&self) -> Option<Timestamp> {
        let start = self.next_start(self.pos)?;
        let head = self.lines[start].split('|').next().unwrap_or_default();
        Some(parse_timestamp(head))
    }

    fn next_start(&self, from: usize) -> Option<usize> {
        (from..self.lines.len()).find(|&i| is_record_start(self.lines[i]))
    }

    /// One past the last continuation line of the record starting at `start`
    fn record_end(&self, start: usize) -> usize {
        self.next_start(start + 1).unwrap_or(self.lines.len())
    }

    fn assemble(&self, start: usize, end: usize) -> LogRecord {
        let text = self.lines[start..end].join("\n");
        LogRecord::parse(&text, start + 1, end)
    }
}
