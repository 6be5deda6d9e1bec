//! Apex Trace Studio
//!
//! Execution trace reconstruction and profiling for Apex debug logs.
//!
//! A log is read once into a span tree (one span per begin/end event pair),
//! metrics are rolled up bottom-up, and the tree is then projected into
//! a profiler table, a flame graph, and a per-class source view.
//!
//! ```ignore
//! use apex_trace_studio::aggregator::{flatten, FlattenOptions};
//! use apex_trace_studio::parser::parse_log;
//!
//! let parsed = parse_log(&std::fs::read_to_string("debug.log")?);
//! let table = flatten(&parsed.root, &FlattenOptions::default());
//! ```
//!
//! This crate also provides the `apex-trace` CLI.

pub mod aggregator;
pub mod commands;
pub mod correlate;
pub mod filter;
pub mod flamegraph;
pub mod output;
pub mod parser;
pub mod utils;
