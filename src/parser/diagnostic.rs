//! Non-fatal parse diagnostics.
//!
//! Diagnostics are developer-facing only. They are logged as warnings and
//! collected on the parse result; they never change the tree's shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What went wrong
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosticKind {
    #[error("expected {expected} but found {found}")]
    TerminatorMismatch { expected: String, found: String },

    #[error("terminator {tag} has no open span to close")]
    UnexpectedTerminator { tag: String },

    #[error("invalid number '{value}' in field {field}")]
    InvalidNumber { field: String, value: String },

    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },
}

/// A diagnostic anchored to a physical log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// 1-based physical line of the offending record
    pub line: usize,

    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}
