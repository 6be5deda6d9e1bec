//! JSON report output.
//!
//! A report is a self-contained snapshot of one analysed log: summary
//! statistics, the hottest spans, the flattened profiler table, discovered
//! classes and parse diagnostics.

use super::validate_output_path;
use crate::aggregator::{FlatRow, HotSpan, LogSummary};
use crate::parser::Diagnostic;
use crate::utils::error::OutputError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Report schema version
    pub version: String,

    /// Path of the analysed log
    pub log_file: String,

    /// RFC 3339 generation time
    pub generated_at: String,

    pub summary: LogSummary,

    pub hot_spans: Vec<HotSpan>,

    pub rows: Vec<FlatRow>,

    /// Discovered class and trigger names, sorted
    pub classes: Vec<String>,

    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Write a report to a JSON file
///
/// **Public** - main entry point for JSON output
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
pub fn write_report(report: &Report, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing report to: {}", output_path.display());

    validate_output_path(output_path)?;

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, report).map_err(OutputError::SerializationFailed)?;

    info!(
        "Report written successfully ({} bytes)",
        calculate_file_size(output_path)
    );

    Ok(())
}

/// Serialize a report without touching the filesystem
pub fn report_to_string(report: &Report) -> Result<String, OutputError> {
    serde_json::to_string_pretty(report).map_err(OutputError::SerializationFailed)
}

fn calculate_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Read a report back from a JSON file
///
/// **Public** - used by `validate` and tests
///
/// # Errors
/// * `OutputError::WriteFailed` - File read error (reusing WriteFailed for I/O)
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_report(input_path: impl AsRef<Path>) -> Result<Report, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading report from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::WriteFailed)?;
    let report: Report = serde_json::from_reader(file).map_err(OutputError::SerializationFailed)?;

    debug!(
        "Report loaded: version {}, log {}",
        report.version, report.log_file
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DiagnosticKind;
    use tempfile::NamedTempFile;

    fn create_test_report() -> Report {
        Report {
            version: "1.0.0".to_string(),
            log_file: "debug.log".to_string(),
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            summary: LogSummary::default(),
            hot_spans: Vec::new(),
            rows: Vec::new(),
            classes: vec!["AccountService".to_string()],
            diagnostics: vec![Diagnostic {
                line: 7,
                kind: DiagnosticKind::UnexpectedTerminator {
                    tag: "METHOD_EXIT".to_string(),
                },
            }],
        }
    }

    #[test]
    fn test_write_and_read_report() {
        let report = create_test_report();
        let temp_file = NamedTempFile::new().unwrap();

        write_report(&report, temp_file.path()).unwrap();
        let loaded = read_report(temp_file.path()).unwrap();

        assert_eq!(loaded, report);
    }

    #[test]
    fn test_diagnostics_are_flattened() {
        let json = report_to_string(&create_test_report()).unwrap();
        assert!(json.contains(r#""type": "unexpected_terminator""#));
        assert!(json.contains(r#""line": 7"#));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested_path = temp_dir.path().join("nested/dirs/report.json");

        write_report(&create_test_report(), &nested_path).unwrap();
        assert!(nested_path.exists());
    }
}
