//! Log parsing and span tree construction.
//!
//! This module handles:
//! - Splitting raw log text into logical records
//! - Mapping record tags to span rules
//! - Building the nested span tree
//! - Defining the span data model

pub mod builder;
pub mod diagnostic;
pub mod dispatch;
pub mod lines;
pub mod schema;
pub mod timestamp;

// Re-export main types
pub use builder::{parse_log, DiscoveredClasses, LogParser, ParsedLog};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use lines::{LineReader, LogRecord};
pub use schema::{Metrics, Span, SpanKind};
